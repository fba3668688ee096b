//! Error types for the broadcast bus.

use queuecall_types::PayloadError;

/// Errors surfaced to whoever initiated a publish or subscribe.
///
/// Delivery itself is best-effort; once a message leaves `publish` there is
/// no error path back to the sender.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The transport is unavailable or rejected the operation.
    #[error("transport error: {0}")]
    Transport(String),

    /// The outgoing event could not be encoded.
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),

    /// The outgoing message could not be serialized for the wire.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
