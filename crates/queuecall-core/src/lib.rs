//! Client-side engine for QueueCall displays, operator consoles and patient
//! devices.
//!
//! Every client polls the clinic store, subscribes to the broadcast bus and
//! feeds both into a single [`ClientSession`]. The session detects call-outs
//! by comparing snapshots, serialises audio through an [`AudioSequencer`],
//! enforces emergency suppression, and predicts a patient's turn.
//!
//! # Modules
//!
//! - [`config`] -- `queuecall-config.yaml` loading and typed sections.
//! - [`detector`] -- [`ClinicStateStore`] cache and [`ChangeDetector`].
//! - [`sequencer`] -- [`AudioPlayer`] seam and the serial [`AudioSequencer`].
//! - [`emergency`] -- [`EmergencyController`] siren state machine.
//! - [`predictor`] -- [`TurnPredictor`] tiers, cues and wait estimates.
//! - [`session`] -- [`ClientSession`], its inputs and display outputs.
//! - [`feed`] -- store polling and bus subscriptions into a session.
//! - [`control`] -- [`ControlPanel`] operator actions.

pub mod config;
pub mod control;
pub mod detector;
pub mod emergency;
pub mod feed;
pub mod predictor;
pub mod sequencer;
pub mod session;

pub use config::{ClientRole, ConfigError, QueueConfig};
pub use control::{ControlError, ControlPanel};
pub use detector::{ChangeDetector, ClinicStateStore, classify};
pub use emergency::{EmergencyController, EmergencySession, EmergencyTrigger};
pub use feed::{spawn_snapshot_feed, subscribe_broadcasts};
pub use predictor::{PatientTrackingSession, TurnCue, TurnPredictor, TurnTier, TurnUpdate};
pub use sequencer::{
    AudioPlayer, AudioSequencer, ClipFailure, Completion, PlaybackError, PlaybackOutcome,
    PlaybackReport,
};
pub use session::{ClientEvent, ClientProfile, ClientSession, DisplayUpdate, OperatorAction};
