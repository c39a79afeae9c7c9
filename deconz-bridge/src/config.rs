//! Configuration for the bridge
//!
//! Command line flags (with environment variable fallbacks) are parsed into
//! [`Args`] and converted once into an immutable [`BridgeConfig`]. Each
//! component receives only its own part of the configuration.

use std::time::Duration;

use clap::Parser;
use deconz_events::DEFAULT_TOPIC_PREFIX;
use feed_client::{FeedConfig, ReadErrorPolicy};
use tracing::info;

use crate::error::{BridgeError, Result};
use crate::logging::LoggingMode;

/// Default MQTT port when the broker address has none.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Republish deCONZ sensor notifications to an MQTT broker.
///
/// Connects to the deCONZ websocket feed, decodes each notification and
/// publishes presence, temperature and humidity readings to
/// `<prefix>/sensor/<id>/<key>`.
#[derive(Parser, Debug, Clone)]
#[command(name = "deconz-bridge")]
#[command(version, about)]
pub struct Args {
    /// Websocket address of the deCONZ event feed
    #[arg(long, env = "DECONZ_URL", default_value = "ws://raspbeegw.lan:8088")]
    pub url: String,

    /// Origin header sent with the websocket handshake
    #[arg(long, env = "DECONZ_ORIGIN", default_value = "http://localhost/")]
    pub origin: String,

    /// Websocket subprotocol
    #[arg(long, env = "DECONZ_PROTOCOL")]
    pub protocol: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, env = "DECONZ_INSECURE_SKIP_VERIFY")]
    pub insecure_skip_verify: bool,

    /// MQTT broker address (tcp://host:port, mqtt://host:port or host:port)
    #[arg(long, env = "MQTT_BROKER", default_value = "tcp://openhab.lan:1883")]
    pub broker: String,

    /// MQTT client identifier
    #[arg(long, env = "MQTT_CLIENT_ID", default_value = "deconz-bridge")]
    pub client_id: String,

    /// MQTT keep-alive interval in seconds
    #[arg(long, env = "MQTT_KEEP_ALIVE", value_name = "SECONDS", default_value_t = 2)]
    pub keep_alive: u64,

    /// Seconds to wait for the broker to accept the connection
    #[arg(long, env = "MQTT_CONNECT_TIMEOUT", value_name = "SECONDS", default_value_t = 5)]
    pub connect_timeout: u64,

    /// Seconds to wait for a single publish to be written
    #[arg(long, env = "MQTT_PUBLISH_TIMEOUT", value_name = "SECONDS", default_value_t = 1)]
    pub publish_timeout: u64,

    /// First level of every published topic
    #[arg(long, env = "MQTT_TOPIC_PREFIX", default_value = DEFAULT_TOPIC_PREFIX)]
    pub topic_prefix: String,

    /// What the feed receiver does after a read error (stop or continue)
    #[arg(long, env = "DECONZ_READ_ERROR_POLICY", default_value = "stop")]
    pub read_error_policy: ReadErrorPolicy,

    /// Capacity of the frame and error channels between pipeline stages
    #[arg(long, env = "DECONZ_CHANNEL_CAPACITY", default_value_t = 1)]
    pub channel_capacity: usize,

    /// Log output mode (silent, development, debug or json)
    #[arg(long, env = "DECONZ_LOG_MODE", default_value = "development")]
    pub log_mode: LoggingMode,
}

/// MQTT broker settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Broker host name or address
    /// Default: openhab.lan
    pub host: String,

    /// Broker port
    /// Default: 1883
    pub port: u16,

    /// MQTT client identifier
    /// Default: deconz-bridge
    pub client_id: String,

    /// Keep-alive interval; a missing ping response ends the connection
    /// Default: 2 seconds
    pub keep_alive: Duration,

    /// Time allowed for the broker to acknowledge the connection
    /// Default: 5 seconds
    pub connect_timeout: Duration,

    /// Time allowed for one publish to be written to the socket
    /// Default: 1 second
    pub publish_timeout: Duration,

    /// Capacity of the client's request queue
    /// Default: 10
    pub request_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "openhab.lan".to_string(),
            port: DEFAULT_MQTT_PORT,
            client_id: "deconz-bridge".to_string(),
            keep_alive: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(5),
            publish_timeout: Duration::from_secs(1),
            request_capacity: 10,
        }
    }
}

impl BrokerConfig {
    /// Create a BrokerConfig for `address` with default settings otherwise
    pub fn from_address(address: &str) -> Result<Self> {
        let (host, port) = parse_broker_address(address)?;
        Ok(Self {
            host,
            port,
            ..Default::default()
        })
    }

    /// `host:port`, for log output
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, publish: Duration) -> Self {
        self.connect_timeout = connect;
        self.publish_timeout = publish;
        self
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(BridgeError::Config("MQTT client id must not be empty".to_string()));
        }

        if self.keep_alive < Duration::from_secs(1) {
            return Err(BridgeError::Config(
                "MQTT keep-alive must be at least one second".to_string(),
            ));
        }

        if self.connect_timeout.is_zero() || self.publish_timeout.is_zero() {
            return Err(BridgeError::Config(
                "MQTT timeouts must be greater than 0".to_string(),
            ));
        }

        if self.request_capacity == 0 {
            return Err(BridgeError::Config(
                "MQTT request capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Settings for the pipeline stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// First level of every published topic
    /// Default: deconz
    pub topic_prefix: String,

    /// Receiver behavior after a read error
    /// Default: stop
    pub read_error_policy: ReadErrorPolicy,

    /// Capacity of the frame and error channels
    /// Default: 1
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            read_error_policy: ReadErrorPolicy::Stop,
            channel_capacity: 1,
        }
    }
}

impl PipelineConfig {
    pub fn with_topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = prefix.into();
        self
    }

    pub fn with_read_error_policy(mut self, policy: ReadErrorPolicy) -> Self {
        self.read_error_policy = policy;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        let prefix = self.topic_prefix.as_str();
        if prefix.is_empty() || prefix.starts_with('/') || prefix.ends_with('/') {
            return Err(BridgeError::Config(format!(
                "invalid topic prefix '{prefix}': must be non-empty without leading or trailing '/'"
            )));
        }

        if prefix.contains(['+', '#']) {
            return Err(BridgeError::Config(format!(
                "invalid topic prefix '{prefix}': wildcards are not allowed"
            )));
        }

        if self.channel_capacity == 0 {
            return Err(BridgeError::Config(
                "Channel capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Complete bridge configuration, fixed at startup
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub feed: FeedConfig,
    pub broker: BrokerConfig,
    pub pipeline: PipelineConfig,
    pub log_mode: LoggingMode,
}

impl BridgeConfig {
    /// Parse the process command line into a validated config.
    ///
    /// Flags that are not given fall back to their environment variables,
    /// then to defaults. Invalid flags print usage and exit, as clap does.
    pub fn from_args() -> Result<Self> {
        Self::try_from(Args::parse())
    }

    /// Validate every part of the configuration
    pub fn validate(&self) -> Result<()> {
        self.feed.validate()?;
        self.broker.validate()?;
        self.pipeline.validate()
    }

    /// Log a configuration summary
    pub fn log_summary(&self) {
        info!(
            url = %self.feed.url,
            origin = %self.feed.origin,
            protocol = ?self.feed.protocol,
            insecure_skip_verify = self.feed.insecure_skip_verify,
            "feed configuration"
        );
        info!(
            broker = %self.broker.address(),
            client_id = %self.broker.client_id,
            keep_alive_secs = self.broker.keep_alive.as_secs(),
            "broker configuration"
        );
        info!(
            topic_prefix = %self.pipeline.topic_prefix,
            read_error_policy = %self.pipeline.read_error_policy,
            channel_capacity = self.pipeline.channel_capacity,
            log_mode = %self.log_mode,
            "pipeline configuration"
        );
    }
}

impl TryFrom<Args> for BridgeConfig {
    type Error = BridgeError;

    fn try_from(args: Args) -> Result<Self> {
        let mut feed = FeedConfig::new(args.url)
            .with_origin(args.origin)
            .with_insecure_skip_verify(args.insecure_skip_verify);
        if let Some(protocol) = args.protocol {
            feed = feed.with_protocol(protocol);
        }

        let broker = BrokerConfig::from_address(&args.broker)?
            .with_client_id(args.client_id)
            .with_keep_alive(Duration::from_secs(args.keep_alive))
            .with_timeouts(
                Duration::from_secs(args.connect_timeout),
                Duration::from_secs(args.publish_timeout),
            );

        let pipeline = PipelineConfig::default()
            .with_topic_prefix(args.topic_prefix)
            .with_read_error_policy(args.read_error_policy)
            .with_channel_capacity(args.channel_capacity);

        let config = Self {
            feed,
            broker,
            pipeline,
            log_mode: args.log_mode,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Split a broker address into host and port.
fn parse_broker_address(address: &str) -> Result<(String, u16)> {
    let address = address.trim();
    if address.is_empty() {
        return Err(BridgeError::Config("MQTT broker address must not be empty".to_string()));
    }

    if address.contains("://") {
        let parsed = url::Url::parse(address)
            .map_err(|e| BridgeError::Config(format!("invalid broker url '{address}': {e}")))?;

        if !matches!(parsed.scheme(), "tcp" | "mqtt") {
            return Err(BridgeError::Config(format!(
                "unsupported broker scheme '{}', expected tcp or mqtt",
                parsed.scheme()
            )));
        }

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| BridgeError::Config(format!("broker url '{address}' has no host")))?;

        return Ok((host.to_string(), parsed.port().unwrap_or(DEFAULT_MQTT_PORT)));
    }

    match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port
                .parse::<u16>()
                .map_err(|_| BridgeError::Config(format!("invalid broker port '{port}'")))?;
            Ok((host.to_string(), port))
        }
        Some(_) => Err(BridgeError::Config(format!("broker address '{address}' has no host"))),
        None => Ok((address.to_string(), DEFAULT_MQTT_PORT)),
    }
}
