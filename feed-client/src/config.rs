//! Configuration types for the feed-client crate
//!
//! [`FeedConfig`] describes how to reach the event feed and
//! [`ReadErrorPolicy`] how the receive loop reacts to read failures.

use std::fmt;
use std::str::FromStr;

use crate::error::FeedError;

/// Connection settings for the deCONZ websocket feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Websocket URL of the feed (`ws://` or `wss://`)
    /// Default: ws://raspbeegw.lan:8088
    pub url: String,

    /// Value sent in the `Origin` header
    /// Default: http://localhost/
    pub origin: String,

    /// Subprotocol requested through `Sec-WebSocket-Protocol`
    /// Default: none
    pub protocol: Option<String>,

    /// Accept invalid TLS certificates and host names on `wss://` URLs
    /// Default: false
    pub insecure_skip_verify: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "ws://raspbeegw.lan:8088".to_string(),
            origin: "http://localhost/".to_string(),
            protocol: None,
            insecure_skip_verify: false,
        }
    }
}

impl FeedConfig {
    /// Create a FeedConfig for the given URL with default settings otherwise
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        let protocol = protocol.into();
        self.protocol = if protocol.is_empty() { None } else { Some(protocol) };
        self
    }

    pub fn with_insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = skip;
        self
    }

    /// Validate the configuration and return the parsed feed URL
    pub fn validate(&self) -> Result<url::Url, FeedError> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| FeedError::InvalidRequest(format!("invalid url '{}': {e}", self.url)))?;

        match parsed.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(FeedError::InvalidRequest(format!(
                    "unsupported url scheme '{other}', expected ws or wss"
                )))
            }
        }

        if parsed.host_str().is_none() {
            return Err(FeedError::InvalidRequest(format!(
                "url '{}' has no host",
                self.url
            )));
        }

        if self.origin.trim().is_empty() {
            return Err(FeedError::InvalidRequest("origin must not be empty".to_string()));
        }

        Ok(parsed)
    }

    /// Whether the URL asks for a TLS connection
    pub fn is_secure(&self) -> bool {
        self.url.starts_with("wss://")
    }
}

/// What the receive loop does after forwarding a read failure.
///
/// The error reporter ends the pipeline on the first failure it sees, so
/// `Stop` is the default. `Continue` keeps reading after every failure and
/// may push further errors that nobody drains before shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadErrorPolicy {
    /// Stop the loop after the first read failure
    #[default]
    Stop,
    /// Keep reading after read failures; a clean close still ends the loop
    Continue,
}

impl ReadErrorPolicy {
    /// Whether the loop should keep reading after `error`.
    pub fn keeps_reading_after(&self, error: &FeedError) -> bool {
        match self {
            ReadErrorPolicy::Stop => false,
            ReadErrorPolicy::Continue => !error.is_clean_close(),
        }
    }
}

impl fmt::Display for ReadErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadErrorPolicy::Stop => write!(f, "stop"),
            ReadErrorPolicy::Continue => write!(f, "continue"),
        }
    }
}

impl FromStr for ReadErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stop" => Ok(ReadErrorPolicy::Stop),
            "continue" => Ok(ReadErrorPolicy::Continue),
            other => Err(format!(
                "invalid read error policy '{other}', expected stop or continue"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_config() {
        let config = FeedConfig::default();
        assert_eq!(config.url, "ws://raspbeegw.lan:8088");
        assert_eq!(config.origin, "http://localhost/");
        assert_eq!(config.protocol, None);
        assert!(!config.insecure_skip_verify);
        assert!(config.validate().is_ok());
        assert!(!config.is_secure());
    }

    #[test]
    fn test_builder_pattern() {
        let config = FeedConfig::new("wss://gateway.lan:443")
            .with_origin("http://bridge/")
            .with_protocol("deconz")
            .with_insecure_skip_verify(true);

        assert_eq!(config.origin, "http://bridge/");
        assert_eq!(config.protocol.as_deref(), Some("deconz"));
        assert!(config.insecure_skip_verify);
        assert!(config.is_secure());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_protocol_means_none() {
        let config = FeedConfig::default().with_protocol("");
        assert_eq!(config.protocol, None);
    }

    #[rstest]
    #[case::not_a_url("not a url")]
    #[case::http_scheme("http://gateway.lan:8088")]
    #[case::empty_host("ws://:8088")]
    fn test_invalid_urls_are_rejected(#[case] url: &str) {
        assert!(matches!(
            FeedConfig::new(url).validate(),
            Err(FeedError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_blank_origin_is_rejected() {
        assert!(FeedConfig::default().with_origin("  ").validate().is_err());
    }

    #[test]
    fn test_read_error_policy() {
        let read = FeedError::Read("reset".to_string());
        let closed = FeedError::Closed { reason: None };

        assert!(!ReadErrorPolicy::Stop.keeps_reading_after(&read));
        assert!(!ReadErrorPolicy::Stop.keeps_reading_after(&closed));
        assert!(ReadErrorPolicy::Continue.keeps_reading_after(&read));
        assert!(!ReadErrorPolicy::Continue.keeps_reading_after(&closed));
    }

    #[test]
    fn test_read_error_policy_parsing() {
        assert_eq!("stop".parse::<ReadErrorPolicy>(), Ok(ReadErrorPolicy::Stop));
        assert_eq!(
            "Continue".parse::<ReadErrorPolicy>(),
            Ok(ReadErrorPolicy::Continue)
        );
        assert!("retry".parse::<ReadErrorPolicy>().is_err());
        assert_eq!(ReadErrorPolicy::default().to_string(), "stop");
    }
}
