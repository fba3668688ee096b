//! Error types for the store adapters.
//!
//! All failures are propagated via [`StoreError`]. Callers that poll the
//! store treat every variant the same way: keep the last good snapshot and
//! try again on the next tick.

use queuecall_types::ClinicId;

/// Errors that can occur while reading or writing clinic state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No clinic is provisioned under this id.
    #[error("clinic not found: {0}")]
    NotFound(ClinicId),

    /// The store cannot be reached right now.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
