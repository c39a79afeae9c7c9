//! Error reporter task
//!
//! Turns the first feed failure into the pipeline's outcome.

use feed_client::FeedError;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::error::BridgeError;
use crate::pipeline::PipelineOutcome;

/// Wait for the first feed failure and decide how the pipeline ends.
///
/// A clean remote close ends it successfully; any other failure ends it
/// with an error. Returns `None` if the channel closes with nothing on it.
pub async fn run_reporter(mut errors: mpsc::Receiver<FeedError>) -> Option<PipelineOutcome> {
    let failure = errors.recv().await?;

    if failure.is_clean_close() {
        info!(%failure, "event feed closed by the gateway");
        Some(PipelineOutcome::RemoteClosed)
    } else {
        error!(%failure, "event feed failed");
        Some(PipelineOutcome::Failed(BridgeError::Feed(failure)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clean_close_is_success() {
        let (tx, rx) = mpsc::channel(1);
        tx.send(FeedError::Closed {
            reason: Some("bye".to_string()),
        })
        .await
        .unwrap();

        assert!(matches!(
            run_reporter(rx).await,
            Some(PipelineOutcome::RemoteClosed)
        ));
    }

    #[tokio::test]
    async fn test_read_error_is_failure() {
        let (tx, rx) = mpsc::channel(1);
        tx.send(FeedError::Read("connection reset".to_string()))
            .await
            .unwrap();

        match run_reporter(rx).await {
            Some(PipelineOutcome::Failed(BridgeError::Feed(FeedError::Read(reason)))) => {
                assert_eq!(reason, "connection reset");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_only_first_error_counts() {
        let (tx, rx) = mpsc::channel(2);
        tx.send(FeedError::Closed { reason: None }).await.unwrap();
        tx.send(FeedError::Read("late".to_string())).await.unwrap();

        assert!(matches!(
            run_reporter(rx).await,
            Some(PipelineOutcome::RemoteClosed)
        ));
    }

    #[test]
    fn test_closed_channel_yields_nothing() {
        let (tx, rx) = mpsc::channel::<FeedError>(1);
        drop(tx);
        assert!(tokio_test::block_on(run_reporter(rx)).is_none());
    }
}
