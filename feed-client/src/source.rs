//! The seam between a feed connection and the receive loop.

use async_trait::async_trait;

use crate::error::FeedError;
use crate::frame::RawFrame;

/// A source of raw frames, read by exactly one task.
///
/// `next_frame` waits until a frame is available. It reports a remote close
/// as [`FeedError::Closed`] and any other failure as a different variant.
/// `close` is called once by whoever owns the source at shutdown.
#[async_trait]
pub trait FrameSource: Send {
    /// Read the next frame from the feed.
    async fn next_frame(&mut self) -> Result<RawFrame, FeedError>;

    /// Release the underlying connection.
    async fn close(&mut self) -> Result<(), FeedError>;
}
