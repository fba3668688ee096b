//! Broadcast bus for QueueCall clients.
//!
//! Operator actions that are not part of the clinic counter (manual name
//! calls, transfers, text messages, instant clips, video control and the
//! emergency signal) travel as [`BroadcastMessage`]s on named channels.
//! Delivery is fire-and-forget: at most once, unordered across channels,
//! no retry, no persistence.
//!
//! ```text
//! ControlPanel --publish--> BroadcastBus --transport--> every subscriber
//!                                 |                       (incl. sender)
//!                        LocalTransport | NatsTransport
//! ```
//!
//! # Modules
//!
//! - [`bus`] -- [`BroadcastBus`] and [`Subscription`].
//! - [`transport`] -- the [`BroadcastTransport`] seam.
//! - [`local`] -- in-process transport over `tokio::sync::broadcast`.
//! - [`nats`] -- NATS transport.
//! - [`error`] -- [`BusError`].
//!
//! [`BroadcastMessage`]: queuecall_types::BroadcastMessage

pub mod bus;
pub mod error;
pub mod local;
pub mod nats;
pub mod transport;

pub use bus::{BroadcastBus, Subscription};
pub use error::BusError;
pub use local::LocalTransport;
pub use nats::NatsTransport;
pub use transport::BroadcastTransport;
