//! Websocket connection to the deCONZ event feed.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{ORIGIN, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::frame::RawFrame;
use crate::source::FrameSource;

/// A connected websocket feed.
///
/// The connection is established once by [`WebSocketFeed::connect`]; there is
/// no reconnection. Text and binary messages are surfaced as [`RawFrame`]s,
/// control frames are consumed silently.
pub struct WebSocketFeed {
    url: String,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl WebSocketFeed {
    /// Connect to the feed described by `config`.
    ///
    /// Sends the configured `Origin` header and, if set, the subprotocol in
    /// `Sec-WebSocket-Protocol`. When `insecure_skip_verify` is set on a
    /// `wss://` URL, certificate and host name validation are disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the TLS connector
    /// cannot be built or the websocket handshake fails.
    pub async fn connect(config: &FeedConfig) -> Result<Self, FeedError> {
        config.validate()?;

        let request = build_request(config)?;
        let connector = build_connector(config)?;

        match &config.protocol {
            Some(protocol) => info!(
                url = %config.url,
                protocol = %protocol,
                origin = %config.origin,
                "connecting to event feed"
            ),
            None => info!(url = %config.url, origin = %config.origin, "connecting to event feed"),
        }

        let (stream, response) = connect_async_tls_with_config(request, None, false, connector)
            .await
            .map_err(|e| FeedError::Connect {
                url: config.url.clone(),
                reason: e.to_string(),
            })?;

        debug!(status = %response.status(), "websocket handshake completed");
        info!(url = %config.url, "connected to event feed");

        Ok(Self {
            url: config.url.clone(),
            stream,
            closed: false,
        })
    }

    /// The URL this feed is connected to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FrameSource for WebSocketFeed {
    async fn next_frame(&mut self) -> Result<RawFrame, FeedError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(RawFrame::from(text)),
                Some(Ok(Message::Binary(data))) => return Ok(RawFrame::from(data)),
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.into_owned());
                    debug!(reason = ?reason, "received close frame");
                    return Err(FeedError::Closed { reason });
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    trace!("control frame");
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(WsError::ConnectionClosed)) | None => return Err(FeedError::closed()),
                Some(Err(e)) => return Err(FeedError::Read(e.to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), FeedError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        match self.stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => {
                debug!(url = %self.url, "event feed closed");
                Ok(())
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "failed to close event feed cleanly");
                Err(FeedError::Read(e.to_string()))
            }
        }
    }
}

/// Build the handshake request with `Origin` and optional subprotocol headers.
fn build_request(config: &FeedConfig) -> Result<Request, FeedError> {
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| FeedError::InvalidRequest(e.to_string()))?;

    let origin = HeaderValue::from_str(&config.origin)
        .map_err(|e| FeedError::InvalidRequest(format!("invalid origin: {e}")))?;
    request.headers_mut().insert(ORIGIN, origin);

    if let Some(protocol) = &config.protocol {
        let protocol = HeaderValue::from_str(protocol)
            .map_err(|e| FeedError::InvalidRequest(format!("invalid protocol: {e}")))?;
        request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, protocol);
    }

    Ok(request)
}

/// Only a `wss://` URL with verification disabled needs a custom connector.
fn build_connector(config: &FeedConfig) -> Result<Option<Connector>, FeedError> {
    if !(config.is_secure() && config.insecure_skip_verify) {
        return Ok(None);
    }

    warn!(url = %config.url, "TLS certificate verification is disabled");

    let tls = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .map_err(|e| FeedError::Tls(e.to_string()))?;

    Ok(Some(Connector::NativeTls(tls)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_origin_and_protocol() {
        let config = FeedConfig::new("ws://gateway.lan:8088")
            .with_origin("http://bridge/")
            .with_protocol("deconz");

        let request = build_request(&config).unwrap();
        assert_eq!(request.headers()[ORIGIN], "http://bridge/");
        assert_eq!(request.headers()[SEC_WEBSOCKET_PROTOCOL], "deconz");
        assert_eq!(request.uri().host(), Some("gateway.lan"));
    }

    #[test]
    fn test_request_without_protocol() {
        let request = build_request(&FeedConfig::default()).unwrap();
        assert!(request.headers().get(SEC_WEBSOCKET_PROTOCOL).is_none());
    }

    #[test]
    fn test_invalid_origin_is_rejected() {
        let config = FeedConfig::default().with_origin("http://bad\norigin/");
        assert!(matches!(
            build_request(&config),
            Err(FeedError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_connector_only_for_insecure_wss() {
        let plain = FeedConfig::new("ws://gateway.lan:8088").with_insecure_skip_verify(true);
        assert!(build_connector(&plain).unwrap().is_none());

        let verified = FeedConfig::new("wss://gateway.lan:443");
        assert!(build_connector(&verified).unwrap().is_none());
    }

    #[test]
    fn test_insecure_wss_uses_native_tls_connector() {
        let insecure = FeedConfig::new("wss://gateway.lan:443").with_insecure_skip_verify(true);
        assert!(matches!(
            build_connector(&insecure),
            Ok(Some(Connector::NativeTls(_)))
        ));
    }

    #[test]
    fn test_connect_rejects_invalid_config_before_dialing() {
        let config = FeedConfig::new("http://gateway.lan:8088");
        let result = tokio_test::block_on(WebSocketFeed::connect(&config));
        assert!(matches!(result, Err(FeedError::InvalidRequest(_))));
    }
}
