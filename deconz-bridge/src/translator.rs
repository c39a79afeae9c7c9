//! Translator task
//!
//! Consumes raw frames in order, turns each into at most one publish message
//! and hands it to the [`Publisher`]. Bad frames and failed publishes are
//! logged and skipped; only a failed broker connection stops the task.

use std::future::Future;

use deconz_events::{reading_topic, translate, DecodeError};
use feed_client::RawFrame;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::publisher::Publisher;

/// Counters for one translator run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TranslatorStats {
    /// Frames taken off the channel
    pub frames: u64,
    /// Frames that decoded into an envelope
    pub decoded: u64,
    pub decode_errors: u64,
    /// Envelopes for resources other than sensors
    pub non_sensor: u64,
    /// Decoded frames that carried a sensor or button reading
    pub readings: u64,
    pub published: u64,
    pub publish_failures: u64,
}

/// What the translator leaves behind when it stops.
pub struct TranslatorExit<P> {
    /// The publisher, if the connection was made
    pub publisher: Option<P>,
    pub stats: TranslatorStats,
}

/// Run the translator until the frame channel closes or `cancel` fires.
///
/// `connect` is called once, before the first frame is read. A connect
/// failure is returned as the task's error.
pub async fn run_translator<P, F, Fut>(
    mut frames: mpsc::Receiver<RawFrame>,
    connect: F,
    topic_prefix: String,
    cancel: CancellationToken,
) -> Result<TranslatorExit<P>>
where
    P: Publisher,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<P>>,
{
    let mut stats = TranslatorStats::default();

    let mut publisher = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("translator cancelled before the broker connection was made");
            return Ok(TranslatorExit { publisher: None, stats });
        }
        connected = connect() => connected?,
    };

    info!(%topic_prefix, "translator started");

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("translator cancelled");
                break;
            }
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => {
                    debug!("frame channel closed");
                    break;
                }
            },
        };

        handle_frame(&frame, &topic_prefix, &mut publisher, &mut stats).await;
    }

    info!(
        frames = stats.frames,
        published = stats.published,
        decode_errors = stats.decode_errors,
        publish_failures = stats.publish_failures,
        "translator stopped"
    );

    Ok(TranslatorExit {
        publisher: Some(publisher),
        stats,
    })
}

async fn handle_frame<P: Publisher>(
    frame: &RawFrame,
    topic_prefix: &str,
    publisher: &mut P,
    stats: &mut TranslatorStats,
) {
    stats.frames += 1;

    let translation = match translate(frame.as_bytes(), topic_prefix) {
        Ok(translation) => translation,
        Err(error) => {
            stats.decode_errors += 1;
            log_decode_error(&error, frame);
            return;
        }
    };
    stats.decoded += 1;

    let envelope = &translation.envelope;
    if !envelope.is_sensor() {
        stats.non_sensor += 1;
        debug!(
            resource = %envelope.resource,
            event = %envelope.event,
            id = %envelope.id,
            "notification for a non-sensor resource"
        );
    }

    let readings = &translation.readings;
    if readings.button.is_some() || readings.sensor.is_some() {
        stats.readings += 1;
    }

    if let Some(button) = &readings.button {
        info!(
            topic = %reading_topic(topic_prefix, &envelope.id, button),
            value = %button.payload(),
            "button event"
        );
    }

    let Some(message) = translation.message else {
        return;
    };

    match publisher.publish(&message).await {
        Ok(()) => {
            stats.published += 1;
            debug!(topic = %message.topic, payload = %message.payload, "published");
        }
        Err(error) => {
            stats.publish_failures += 1;
            warn!(%error, topic = %message.topic, "publish failed");
        }
    }
}

fn log_decode_error(error: &DecodeError, frame: &RawFrame) {
    match error {
        DecodeError::Json(_) | DecodeError::NotAnObject(_) => {
            warn!(%error, frame = %frame.to_text_lossy(), "frame is not a notification, skipping");
        }
        _ => {
            warn!(%error, "invalid notification, skipping");
        }
    }
}
