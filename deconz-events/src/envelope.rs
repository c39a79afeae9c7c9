//! The top-level object of one feed notification.

use serde_json::{Map, Value};

use crate::error::{json_type, DecodeError, Result};

/// Resource type carried by sensor notifications.
pub const SENSOR_RESOURCE: &str = "sensors";

/// A decoded feed notification.
///
/// Only the fields the bridge understands are kept. `state` is `None` for
/// notifications that carry no state, such as `added` or `deleted` events,
/// and for an explicit `"state": null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Event kind (`e`), e.g. `changed`
    pub event: String,
    /// Resource type (`r`), e.g. `sensors` or `lights`
    pub resource: String,
    /// Object id (`id`) of the device on the gateway
    pub id: String,
    /// Message type (`t`), usually `event`
    pub message_type: Option<String>,
    /// State mapping (`state`)
    pub state: Option<Map<String, Value>>,
}

impl Envelope {
    /// Decode and validate a notification.
    ///
    /// `e`, `r` and `id` must be strings and `state` must be an object or
    /// null. `t` is informational: a value that is not a string is dropped.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| DecodeError::Json(e.to_string()))?;
        Self::from_value(value)
    }

    /// Validate an already parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut object = match value {
            Value::Object(object) => object,
            other => return Err(DecodeError::NotAnObject(json_type(&other))),
        };

        let resource = required_string(&object, "r")?;
        let event = required_string(&object, "e")?;
        let id = required_string(&object, "id")?;

        let message_type = match object.get("t") {
            None | Some(Value::Null) => None,
            Some(Value::String(t)) => Some(t.clone()),
            Some(other) => {
                tracing::debug!(id = %id, found = json_type(other), "ignoring non-string message type");
                None
            }
        };

        let state = match object.remove("state") {
            None | Some(Value::Null) => None,
            Some(Value::Object(state)) => Some(state),
            Some(other) => return Err(mismatch("state", "object", &other)),
        };

        Ok(Self {
            event,
            resource,
            id,
            message_type,
            state,
        })
    }

    /// Whether this notification concerns a sensor resource.
    pub fn is_sensor(&self) -> bool {
        self.resource == SENSOR_RESOURCE
    }
}

fn required_string(object: &Map<String, Value>, field: &'static str) -> Result<String> {
    match object.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(mismatch(field, "string", other)),
        None => Err(DecodeError::MissingField(field)),
    }
}

pub(crate) fn mismatch(field: impl Into<String>, expected: &'static str, found: &Value) -> DecodeError {
    DecodeError::TypeMismatch {
        field: field.into(),
        expected,
        found: json_type(found),
    }
}
