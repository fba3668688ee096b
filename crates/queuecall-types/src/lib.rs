//! Shared type definitions for the QueueCall clinic call-out engine.
//!
//! Everything that crosses a process boundary lives here: the clinic
//! snapshot read from the external store, the broadcast wire format, and
//! the announcement/clip vocabulary the audio layer understands. All types
//! derive [`ts_rs::TS`] so the display front-ends share the same shapes.
//!
//! # Modules
//!
//! - [`ids`] -- `ClinicId` and `ScreenGroupId` newtypes over UUID v7.
//! - [`clinic`] -- [`ClinicState`], the per-clinic public snapshot.
//! - [`announcement`] -- [`Clip`], [`AnnouncementKind`], [`AnnouncementEvent`].
//! - [`broadcast`] -- [`BroadcastMessage`] and the typed [`BroadcastEvent`].
//! - [`error`] -- [`PayloadError`] for payload decoding.

pub mod announcement;
pub mod broadcast;
pub mod clinic;
pub mod error;
pub mod ids;

pub use announcement::{AnnouncementEvent, AnnouncementKind, Clip, is_plain_file_name};
pub use broadcast::{
    BroadcastEvent, BroadcastEventType, BroadcastMessage, CONTROL_ALERTS, ClinicMessage,
    ClinicTransfer, EmergencySignal, NameAlert, PlayInstant, VideoCommand, VoiceBroadcast,
};
pub use clinic::ClinicState;
pub use error::PayloadError;
pub use ids::{ClinicId, ScreenGroupId};
