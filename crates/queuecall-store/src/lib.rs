//! Clinic counter store adapters for QueueCall.
//!
//! The store is an external collaborator: it owns the authoritative
//! [`ClinicState`] per clinic, control panels write to it, and every client
//! polls it. This crate defines the contract and two adapters.
//!
//! # Modules
//!
//! - [`store`] -- the [`ClinicStore`] trait and call-timestamp helper.
//! - [`memory`] -- [`MemoryClinicStore`] for single-process setups and tests.
//! - [`dragonfly`] -- [`DragonflyClinicStore`] over `fred`.
//! - [`observe`] -- [`observe()`] poll stream.
//! - [`error`] -- [`StoreError`].
//!
//! [`ClinicState`]: queuecall_types::ClinicState

pub mod dragonfly;
pub mod error;
pub mod memory;
pub mod observe;
pub mod store;

pub use dragonfly::DragonflyClinicStore;
pub use error::StoreError;
pub use memory::MemoryClinicStore;
pub use observe::observe;
pub use store::{ClinicStore, next_call_time};
