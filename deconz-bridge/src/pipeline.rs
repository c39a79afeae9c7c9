//! Pipeline coordinator
//!
//! Wires the feed receiver, the error reporter and the translator together,
//! waits for the first terminal condition and shuts everything down in
//! order. No task exits the process; the outcome is returned to `main`.

use std::future::Future;
use std::process::ExitCode;

use feed_client::{run_receiver, FrameSource, WebSocketFeed};
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{BridgeConfig, PipelineConfig};
use crate::error::{BridgeError, Result};
use crate::publisher::{MqttPublisher, Publisher};
use crate::reporter::run_reporter;
use crate::translator::{run_translator, TranslatorExit};

/// How a pipeline run ended.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// The gateway closed the feed cleanly
    RemoteClosed,
    /// The operator asked the bridge to stop
    Interrupted,
    /// A fatal failure
    Failed(BridgeError),
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, PipelineOutcome::Failed(_))
    }

    /// Process exit status: success for a clean close or an interrupt.
    pub fn exit_code(&self) -> ExitCode {
        if self.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

/// Connect to the event feed and bridge it to the broker until the feed
/// ends or `shutdown` fires.
///
/// The configuration is validated first. The broker connection is made by
/// the translator once the pipeline runs.
pub async fn run(config: BridgeConfig, shutdown: CancellationToken) -> PipelineOutcome {
    if let Err(e) = config.validate() {
        error!(error = %e, "refusing to start with an invalid configuration");
        return PipelineOutcome::Failed(e);
    }

    let feed = match WebSocketFeed::connect(&config.feed).await {
        Ok(feed) => feed,
        Err(e) => {
            error!(error = %e, url = %config.feed.url, "cannot connect to the event feed");
            return PipelineOutcome::Failed(e.into());
        }
    };

    let broker = config.broker.clone();
    run_pipeline(
        feed,
        move || MqttPublisher::connect(broker),
        &config.pipeline,
        shutdown,
    )
    .await
}

/// Run the three pipeline tasks over `source`.
///
/// The run ends when the error reporter reports a feed failure or a clean
/// close, when the translator stops (a failed broker connection), or when
/// `shutdown` is cancelled. The source is closed exactly once and the
/// publisher, if one was connected, is disconnected before returning.
pub async fn run_pipeline<S, P, F, Fut>(
    mut source: S,
    connect: F,
    config: &PipelineConfig,
    shutdown: CancellationToken,
) -> PipelineOutcome
where
    S: FrameSource + 'static,
    P: Publisher + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<P>> + Send + 'static,
{
    if let Err(e) = config.validate() {
        error!(error = %e, "refusing to start with an invalid pipeline configuration");
        if let Err(close) = source.close().await {
            debug!(error = %close, "closing the event feed failed");
        }
        return PipelineOutcome::Failed(e);
    }

    let stop_feed = CancellationToken::new();
    let stop_translator = CancellationToken::new();
    let (frame_tx, frame_rx) = mpsc::channel(config.channel_capacity);
    let (error_tx, error_rx) = mpsc::channel(config.channel_capacity);

    let mut translator = tokio::spawn(run_translator(
        frame_rx,
        connect,
        config.topic_prefix.clone(),
        stop_translator.clone(),
    ));
    let receiver = tokio::spawn(run_receiver(
        source,
        frame_tx,
        error_tx,
        config.read_error_policy,
        stop_feed.clone(),
    ));
    let mut reporter = tokio::spawn(run_reporter(error_rx));

    info!(
        channel_capacity = config.channel_capacity,
        read_error_policy = %config.read_error_policy,
        "pipeline started"
    );

    let mut exit: Option<TranslatorExit<P>> = None;
    let mut translator_done = false;

    let outcome = tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
            info!("shutdown requested");
            PipelineOutcome::Interrupted
        }
        reported = &mut reporter => match reported {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                // The receiver stopped without a failure, so the translator
                // dropped its end first.
                translator_done = true;
                settle_translator((&mut translator).await, &mut exit)
                    .unwrap_or(PipelineOutcome::RemoteClosed)
            }
            Err(e) => task_failed("reporter", e),
        },
        joined = &mut translator => {
            translator_done = true;
            match settle_translator(joined, &mut exit) {
                Some(outcome) => outcome,
                // Drained: the receiver has stopped and its failure, if
                // any, is with the reporter.
                None => match (&mut reporter).await {
                    Ok(Some(outcome)) => outcome,
                    Ok(None) => PipelineOutcome::RemoteClosed,
                    Err(e) => task_failed("reporter", e),
                },
            }
        }
    };

    // Frames already read are still translated unless the operator
    // interrupted; the translator drains once the receiver is gone.
    stop_feed.cancel();
    if matches!(outcome, PipelineOutcome::Interrupted) {
        stop_translator.cancel();
    }

    match receiver.await {
        Ok(mut source) => {
            if let Err(e) = source.close().await {
                debug!(error = %e, "closing the event feed failed");
            }
        }
        Err(e) => warn!(error = %e, "feed receiver task failed"),
    }

    reporter.abort();

    if !translator_done {
        if let Some(late) = settle_translator(translator.await, &mut exit) {
            debug!(outcome = ?late, "translator failed during shutdown");
        }
    }

    if let Some(mut exit) = exit {
        if let Some(publisher) = exit.publisher.as_mut() {
            publisher.disconnect().await;
        }

        let stats = exit.stats;
        info!(
            frames = stats.frames,
            decoded = stats.decoded,
            decode_errors = stats.decode_errors,
            non_sensor = stats.non_sensor,
            readings = stats.readings,
            published = stats.published,
            publish_failures = stats.publish_failures,
            "pipeline statistics"
        );
    }

    match &outcome {
        PipelineOutcome::Failed(e) => error!(error = %e, "pipeline stopped"),
        other => info!(outcome = ?other, "pipeline stopped"),
    }

    outcome
}

/// Keep a drained translator's exit; turn a failed one into an outcome.
fn settle_translator<P>(
    joined: std::result::Result<Result<TranslatorExit<P>>, JoinError>,
    exit: &mut Option<TranslatorExit<P>>,
) -> Option<PipelineOutcome> {
    match joined {
        Ok(Ok(done)) => {
            *exit = Some(done);
            None
        }
        Ok(Err(e)) => {
            error!(error = %e, "translator failed");
            Some(PipelineOutcome::Failed(e))
        }
        Err(e) => Some(task_failed("translator", e)),
    }
}

fn task_failed(task: &'static str, error: JoinError) -> PipelineOutcome {
    PipelineOutcome::Failed(BridgeError::Task {
        task,
        reason: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerConfig;
    use feed_client::{FeedConfig, FeedError};
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_rejects_invalid_config_before_connecting() {
        let config = BridgeConfig {
            feed: FeedConfig::new("ws://127.0.0.1:1"),
            broker: BrokerConfig::default().with_keep_alive(Duration::from_millis(500)),
            pipeline: PipelineConfig::default(),
            log_mode: Default::default(),
        };

        let outcome = run(config, CancellationToken::new()).await;
        assert!(matches!(outcome, PipelineOutcome::Failed(BridgeError::Config(_))));
    }

    #[test]
    fn test_exit_codes() {
        assert!(PipelineOutcome::RemoteClosed.is_success());
        assert!(PipelineOutcome::Interrupted.is_success());

        let failed = PipelineOutcome::Failed(BridgeError::Feed(FeedError::Read(
            "reset".to_string(),
        )));
        assert!(!failed.is_success());
        assert_eq!(format!("{:?}", failed.exit_code()), format!("{:?}", ExitCode::FAILURE));
    }
}
