//! Inbound receive loop
//!
//! Pulls frames off a [`FrameSource`] and forwards them to the frame channel,
//! or forwards read failures to the error channel.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ReadErrorPolicy;
use crate::error::FeedError;
use crate::frame::RawFrame;
use crate::source::FrameSource;

/// Run the receive loop until the source fails, a channel closes or `cancel`
/// fires.
///
/// Frames are forwarded in read order. Sending waits while the consumer is
/// not ready, so a frame is never dropped to make room. A read failure is
/// forwarded to `errors`; whether the loop continues afterwards is decided by
/// `policy`. A clean close always ends the loop.
///
/// The source is returned so the caller can close it.
pub async fn run_receiver<S: FrameSource>(
    mut source: S,
    frames: mpsc::Sender<RawFrame>,
    errors: mpsc::Sender<FeedError>,
    policy: ReadErrorPolicy,
    cancel: CancellationToken,
) -> S {
    info!(%policy, "feed receiver started");

    let mut forwarded: u64 = 0;
    let mut failures: u64 = 0;

    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("feed receiver cancelled");
                break;
            }
            result = source.next_frame() => result,
        };

        match result {
            Ok(frame) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("feed receiver cancelled while handing off a frame");
                        break;
                    }
                    sent = frames.send(frame) => {
                        if sent.is_err() {
                            debug!("frame consumer dropped, stopping feed receiver");
                            break;
                        }
                        forwarded += 1;
                    }
                }
            }
            Err(error) => {
                failures += 1;
                let keep_reading = policy.keeps_reading_after(&error);

                if error.is_clean_close() {
                    debug!(%error, "feed closed");
                } else {
                    warn!(%error, keep_reading, "feed read failed");
                }

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    sent = errors.send(error) => {
                        if sent.is_err() {
                            debug!("error consumer dropped, stopping feed receiver");
                            break;
                        }
                    }
                }

                if !keep_reading {
                    break;
                }
            }
        }
    }

    info!(forwarded, failures, "feed receiver stopped");
    source
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    struct VecSource(VecDeque<Result<RawFrame, FeedError>>);

    #[async_trait]
    impl FrameSource for VecSource {
        async fn next_frame(&mut self) -> Result<RawFrame, FeedError> {
            match self.0.pop_front() {
                Some(item) => item,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> Result<(), FeedError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stop_policy_ends_after_first_error() {
        let source = VecSource(VecDeque::from(vec![
            Ok(RawFrame::from("a")),
            Err(FeedError::Read("reset".to_string())),
            Ok(RawFrame::from("never read")),
        ]));
        let (frame_tx, mut frame_rx) = mpsc::channel(4);
        let (error_tx, mut error_rx) = mpsc::channel(4);

        let source = run_receiver(
            source,
            frame_tx,
            error_tx,
            ReadErrorPolicy::Stop,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(frame_rx.recv().await, Some(RawFrame::from("a")));
        assert!(frame_rx.recv().await.is_none());
        assert!(matches!(error_rx.recv().await, Some(FeedError::Read(_))));
        assert!(error_rx.recv().await.is_none());
        assert_eq!(source.0.len(), 1);
    }

    #[tokio::test]
    async fn test_continue_policy_keeps_reading_until_close() {
        let source = VecSource(VecDeque::from(vec![
            Err(FeedError::Read("hiccup".to_string())),
            Ok(RawFrame::from("b")),
            Err(FeedError::Closed { reason: None }),
        ]));
        let (frame_tx, mut frame_rx) = mpsc::channel(4);
        let (error_tx, mut error_rx) = mpsc::channel(4);

        run_receiver(
            source,
            frame_tx,
            error_tx,
            ReadErrorPolicy::Continue,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(frame_rx.recv().await, Some(RawFrame::from("b")));
        assert!(matches!(error_rx.recv().await, Some(FeedError::Read(_))));
        assert!(matches!(error_rx.recv().await, Some(FeedError::Closed { .. })));
        assert!(error_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_blocked_read() {
        let source = VecSource(VecDeque::new());
        let (frame_tx, _frame_rx) = mpsc::channel(1);
        let (error_tx, _error_rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_receiver(
            source,
            frame_tx,
            error_tx,
            ReadErrorPolicy::Stop,
            cancel.clone(),
        ));

        cancel.cancel();
        assert!(handle.await.is_ok());
    }
}
