//! Websocket client for the deCONZ event feed.
//!
//! This crate owns the inbound side of the bridge: it connects to the feed,
//! reads raw frames off the connection and hands them to a consumer through
//! channels. It has no knowledge of the JSON carried inside the frames.
//!
//! # Overview
//!
//! - [`WebSocketFeed`]: the long-lived connection, established once from a
//!   [`FeedConfig`] (URL, `Origin` header, optional subprotocol, TLS toggle).
//! - [`FrameSource`]: the seam between the connection and the receive loop.
//!   The websocket implements it; tests drive the loop with scripted sources.
//! - [`run_receiver`]: the receive loop. Frames go to one channel, read
//!   failures to another, and [`ReadErrorPolicy`] decides whether the loop
//!   keeps reading after a failure.
//! - [`FeedError`]: read and connect failures, with
//!   [`FeedError::is_clean_close`] separating a remote close from a real error.
//!
//! # Example
//!
//! ```no_run
//! use feed_client::{run_receiver, FeedConfig, ReadErrorPolicy, WebSocketFeed};
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), feed_client::FeedError> {
//!     let config = FeedConfig::new("ws://raspbeegw.lan:8088");
//!     let feed = WebSocketFeed::connect(&config).await?;
//!
//!     let (frame_tx, mut frame_rx) = mpsc::channel(1);
//!     let (error_tx, _error_rx) = mpsc::channel(1);
//!     let cancel = CancellationToken::new();
//!
//!     tokio::spawn(run_receiver(feed, frame_tx, error_tx, ReadErrorPolicy::Stop, cancel));
//!
//!     while let Some(frame) = frame_rx.recv().await {
//!         println!("received {} bytes", frame.len());
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod connection;
mod error;
mod frame;
mod receiver;
mod source;

pub use config::{FeedConfig, ReadErrorPolicy};
pub use connection::WebSocketFeed;
pub use error::{FeedError, Result};
pub use frame::RawFrame;
pub use receiver::run_receiver;
pub use source::FrameSource;
