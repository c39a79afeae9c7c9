//! Error types for the feed-client crate.

/// Errors raised while connecting to or reading from the event feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The remote end closed the stream cleanly
    #[error("Connection closed by remote{}", close_suffix(.reason))]
    Closed {
        /// Close reason sent by the remote, if any
        reason: Option<String>,
    },

    /// The connection request could not be built from the configuration
    #[error("Invalid feed request: {0}")]
    InvalidRequest(String),

    /// The TLS connector could not be constructed
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// The websocket handshake failed
    #[error("Failed to connect to {url}: {reason}")]
    Connect {
        /// The URL that was dialed
        url: String,
        /// Underlying failure
        reason: String,
    },

    /// Reading from an established connection failed
    #[error("Read error: {0}")]
    Read(String),
}

impl FeedError {
    /// Returns `true` if this error signals a remote-initiated end of stream
    /// rather than a failure.
    pub fn is_clean_close(&self) -> bool {
        matches!(self, FeedError::Closed { .. })
    }

    pub(crate) fn closed() -> Self {
        FeedError::Closed { reason: None }
    }
}

fn close_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) if !reason.is_empty() => format!(": {reason}"),
        _ => String::new(),
    }
}

/// Convenience type alias for Results using FeedError.
pub type Result<T> = std::result::Result<T, FeedError>;
