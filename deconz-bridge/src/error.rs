//! Error types for the deconz-bridge crate.

use std::time::Duration;

use feed_client::FeedError;

use crate::logging::LoggingError;

/// Errors that stop the bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connecting to or reading from the event feed failed
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    /// The broker connection could not be established
    #[error("Failed to connect to MQTT broker {broker}: {reason}")]
    PublisherConnect {
        /// Broker address as host:port
        broker: String,
        /// Underlying failure
        reason: String,
    },

    /// A pipeline task panicked or was aborted
    #[error("Pipeline task '{task}' failed: {reason}")]
    Task {
        /// Name of the task
        task: &'static str,
        /// Join failure
        reason: String,
    },

    /// Logging could not be initialized
    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),
}

/// Errors from a single publish. These never stop the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The client rejected the request
    #[error("MQTT client error: {0}")]
    Client(String),

    /// The broker connection is gone
    #[error("MQTT connection lost")]
    ConnectionLost,

    /// The packet was not written within the publish timeout
    #[error("Publish not sent within {0:?}")]
    Timeout(Duration),
}

/// Convenience type alias for Results using BridgeError.
pub type Result<T> = std::result::Result<T, BridgeError>;
