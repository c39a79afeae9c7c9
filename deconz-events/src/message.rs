//! Topic/payload pairs sent to the broker.

use crate::reading::SensorReading;

/// Default first topic level.
pub const DEFAULT_TOPIC_PREFIX: &str = "deconz";

/// One message for the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishMessage {
    pub topic: String,
    pub payload: String,
}

impl PublishMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Build the message for a publishable reading.
    ///
    /// The topic is `<prefix>/sensor/<id>/<key>`. Returns `None` for
    /// readings that are never published.
    pub fn for_reading(prefix: &str, object_id: &str, reading: &SensorReading) -> Option<Self> {
        if !reading.is_publishable() {
            return None;
        }
        Some(Self::new(
            reading_topic(prefix, object_id, reading),
            reading.payload(),
        ))
    }
}

/// Topic a reading maps to, including display-only readings.
///
/// Button events map to `<prefix>/button/<id>/buttonevent`, everything else
/// to `<prefix>/sensor/<id>/<key>`.
pub fn reading_topic(prefix: &str, object_id: &str, reading: &SensorReading) -> String {
    let kind = match reading {
        SensorReading::ButtonEvent(_) => "button",
        _ => "sensor",
    };
    format!("{prefix}/{kind}/{object_id}/{}", reading.key())
}
