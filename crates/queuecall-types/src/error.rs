//! Error types for decoding broadcast payloads.

/// A broadcast payload could not be turned into a typed event.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// The payload JSON did not match the expected shape.
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A field was present but outside its allowed range.
    #[error("field {field} out of range: {value}")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value, rendered for logging.
        value: String,
    },

    /// A clip reference that is not a plain file name.
    #[error("clip must be a plain file name: {0:?}")]
    UnsafeClip(String),
}
