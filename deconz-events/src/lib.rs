//! # deconz-events
//!
//! Turns deCONZ websocket notifications into broker messages.
//!
//! A notification is decoded into an [`Envelope`], its state mapping is
//! reduced to [`StateReadings`], and a publishable reading becomes a
//! [`PublishMessage`]. At most one message comes out of each notification.
//!
//! ```
//! use deconz_events::{translate, DEFAULT_TOPIC_PREFIX};
//!
//! let frame = br#"{"e":"changed","r":"sensors","id":"7","state":{"temperature":2150}}"#;
//! let translation = translate(frame, DEFAULT_TOPIC_PREFIX).unwrap();
//! let message = translation.message.unwrap();
//!
//! assert_eq!(message.topic, "deconz/sensor/7/temperature");
//! assert_eq!(message.payload, "21.500000");
//! ```

mod envelope;
mod error;
mod message;
mod reading;

pub use envelope::{Envelope, SENSOR_RESOURCE};
pub use error::{DecodeError, Result};
pub use message::{reading_topic, PublishMessage, DEFAULT_TOPIC_PREFIX};
pub use reading::{
    SensorReading, StateReadings, BUTTON_EVENT_KEY, HUMIDITY_KEY, PRESENCE_KEY, PUBLISHABLE_KEYS,
    TEMPERATURE_KEY,
};

/// Result of translating one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub envelope: Envelope,
    /// Readings from the state mapping; empty when there is no state
    pub readings: StateReadings,
    /// The message to publish, if the state held a publishable reading
    pub message: Option<PublishMessage>,
}

/// Decode a frame and derive its publish message.
///
/// Notifications for resources other than sensors are translated the same
/// way; callers decide whether to log or filter them.
pub fn translate(frame: &[u8], topic_prefix: &str) -> Result<Translation> {
    let envelope = Envelope::from_slice(frame)?;

    let readings = match &envelope.state {
        Some(state) => StateReadings::from_state(state)?,
        None => StateReadings::default(),
    };

    if !readings.ignored.is_empty() {
        tracing::debug!(
            id = %envelope.id,
            ignored = ?readings.ignored,
            "state carried more than one publishable key"
        );
    }

    let message = readings
        .sensor
        .as_ref()
        .and_then(|reading| PublishMessage::for_reading(topic_prefix, &envelope.id, reading));

    Ok(Translation {
        envelope,
        readings,
        message,
    })
}
