//! Error types for the deconz-events crate.

/// Errors produced while decoding a feed notification.
///
/// Every variant is recoverable: the offending frame is dropped and the
/// next one is decoded normally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The frame is not valid JSON
    #[error("Invalid JSON: {0}")]
    Json(String),

    /// The frame is valid JSON but not an object
    #[error("Expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    /// A required field is absent
    #[error("Missing field '{0}'")]
    MissingField(&'static str),

    /// A field is present with the wrong JSON type
    #[error("Field '{field}' should be {expected}, found {found}")]
    TypeMismatch {
        /// The field name, e.g. `id` or `state.presence`
        field: String,
        /// The expected JSON type
        expected: &'static str,
        /// The JSON type actually found
        found: &'static str,
    },
}

/// Convenience type alias for Results using DecodeError.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Name of the JSON type of `value`, for error messages.
pub(crate) fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
