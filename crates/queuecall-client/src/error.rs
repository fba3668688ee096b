//! Error types for the client binary.

/// Top-level error for the client binary.
///
/// Each variant wraps a subsystem error so `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: queuecall_core::ConfigError,
    },

    /// The clinic store could not be reached or seeded.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: queuecall_store::StoreError,
    },

    /// The broadcast bus could not be reached.
    #[error("bus error: {source}")]
    Bus {
        /// The underlying bus error.
        #[from]
        source: queuecall_bus::BusError,
    },

    /// An operator action failed.
    #[error("control error: {source}")]
    Control {
        /// The underlying control error.
        #[from]
        source: queuecall_core::ControlError,
    },

    /// Reading operator input or waiting for a signal failed.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
