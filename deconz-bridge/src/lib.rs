//! deCONZ to MQTT bridge
//!
//! Reads sensor notifications from the deCONZ websocket event feed and
//! republishes presence, temperature and humidity readings to an MQTT broker.
//!
//! # Architecture
//!
//! ```text
//! WebSocketFeed → receiver ─frames─→ translator → MqttPublisher
//!                    │
//!                    └─errors─→ reporter → PipelineOutcome
//! ```
//!
//! The three stages run as separate tasks joined by bounded channels.
//! [`run_pipeline`] owns them and decides how the run ends: a clean close by
//! the gateway or an operator interrupt is a success, anything else a
//! failure. Frames that cannot be decoded and publishes that fail are logged
//! and skipped.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use deconz_bridge::{run, BridgeConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> deconz_bridge::Result<()> {
//! let config = BridgeConfig::from_args()?;
//! let outcome = run(config, CancellationToken::new()).await;
//! println!("bridge stopped: {outcome:?}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod publisher;
pub mod reporter;
pub mod translator;

pub use config::{Args, BridgeConfig, BrokerConfig, PipelineConfig};
pub use error::{BridgeError, PublishError, Result};
pub use logging::{init_logging, LoggingError, LoggingMode};
pub use pipeline::{run, run_pipeline, PipelineOutcome};
pub use publisher::{MqttPublisher, Publisher};
pub use reporter::run_reporter;
pub use translator::{run_translator, TranslatorExit, TranslatorStats};
