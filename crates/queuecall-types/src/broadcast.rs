//! Broadcast messages exchanged on the `control-alerts` channel.
//!
//! On the wire a broadcast is a [`BroadcastMessage`]: channel name, a
//! kebab-case event type, and an untyped JSON payload. Each subscriber
//! decodes only the payloads it cares about into a [`BroadcastEvent`], so a
//! malformed payload is discarded by its own handler and never reaches the
//! others on the same channel.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::announcement::is_plain_file_name;
use crate::error::PayloadError;
use crate::ids::ClinicId;

/// The single channel that carries every operator alert.
pub const CONTROL_ALERTS: &str = "control-alerts";

/// Closed set of event types multiplexed on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export, export_to = "bindings/")]
pub enum BroadcastEventType {
    /// Pre-recorded or ad-hoc recorded voice clip.
    VoiceBroadcast,
    /// Play a numbered instant clip.
    PlayInstant,
    /// Remote control of the display video player.
    VideoControl,
    /// Call a patient by name.
    NameAlert,
    /// Text message addressed to one clinic.
    ClinicMessage,
    /// A ticket moved from one clinic to another.
    ClinicTransfer,
    /// Emergency raised somewhere in the building.
    Emergency,
}

impl BroadcastEventType {
    /// Every event type, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::VoiceBroadcast,
        Self::PlayInstant,
        Self::VideoControl,
        Self::NameAlert,
        Self::ClinicMessage,
        Self::ClinicTransfer,
        Self::Emergency,
    ];

    /// Wire name of the event type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VoiceBroadcast => "voice-broadcast",
            Self::PlayInstant => "play-instant",
            Self::VideoControl => "video-control",
            Self::NameAlert => "name-alert",
            Self::ClinicMessage => "clinic-message",
            Self::ClinicTransfer => "clinic-transfer",
            Self::Emergency => "emergency",
        }
    }
}

impl core::fmt::Display for BroadcastEventType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A broadcast as it travels over the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BroadcastMessage {
    /// Channel name, e.g. [`CONTROL_ALERTS`].
    pub channel: String,
    /// Which kind of event the payload carries.
    pub event_type: BroadcastEventType,
    /// Event-specific payload, decoded by the receiving handler.
    pub payload: serde_json::Value,
}

/// `voice-broadcast` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VoiceBroadcast {
    /// Recorded clip reference (file name under the asset directory).
    pub clip: String,
    /// Optional caption shown while the clip plays.
    #[serde(default)]
    pub label: Option<String>,
}

impl VoiceBroadcast {
    /// Reject clip references that would resolve outside the asset
    /// directory.
    pub fn validate(self) -> Result<Self, PayloadError> {
        if is_plain_file_name(&self.clip) {
            Ok(self)
        } else {
            Err(PayloadError::UnsafeClip(self.clip))
        }
    }
}

/// `play-instant` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PlayInstant {
    /// Instant clip number, resolves to `instant{n}`.
    pub clip: u32,
}

/// `video-control` payload: fire-and-forget player command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "command", content = "value", rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum VideoCommand {
    /// Resume playback.
    Play,
    /// Pause playback.
    Pause,
    /// Skip to the next video.
    Next,
    /// Go back to the previous video.
    Prev,
    /// Set volume, 0.0 to 1.0 inclusive.
    Volume(f32),
}

impl VideoCommand {
    /// Reject volumes outside `0.0..=1.0` (and NaN).
    pub fn validate(self) -> Result<Self, PayloadError> {
        match self {
            Self::Volume(v) if !(0.0..=1.0).contains(&v) => Err(PayloadError::OutOfRange {
                field: "volume",
                value: v.to_string(),
            }),
            other => Ok(other),
        }
    }
}

/// `name-alert` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NameAlert {
    /// Free-text patient name.
    pub name: String,
    /// Label of the clinic the patient should go to.
    pub clinic_label: String,
    /// Target clinic, when the sender knows it.
    #[serde(default)]
    pub clinic_id: Option<ClinicId>,
    /// Target room number, when the sender knows it.
    #[serde(default)]
    pub clinic_number: Option<u32>,
}

/// `clinic-message` payload. Only the addressed clinic shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ClinicMessage {
    /// The clinic the message is addressed to.
    pub clinic_id: ClinicId,
    /// Message text.
    pub text: String,
}

/// `clinic-transfer` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ClinicTransfer {
    /// Ticket being moved.
    pub ticket_number: u32,
    /// Clinic the ticket leaves.
    pub from_clinic: ClinicId,
    /// Clinic the ticket goes to.
    pub to_clinic: ClinicId,
    /// Room number of the destination clinic.
    pub to_clinic_number: u32,
}

/// `emergency` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EmergencySignal {
    /// `true` when an emergency ticket was raised.
    pub active: bool,
    /// Clinic that raised it, if known.
    #[serde(default)]
    pub clinic_id: Option<ClinicId>,
    /// Operator note shown with the alert.
    #[serde(default)]
    pub note: Option<String>,
}

/// A decoded broadcast, one variant per [`BroadcastEventType`].
#[derive(Debug, Clone, PartialEq)]
pub enum BroadcastEvent {
    /// See [`VoiceBroadcast`].
    VoiceBroadcast(VoiceBroadcast),
    /// See [`PlayInstant`].
    PlayInstant(PlayInstant),
    /// See [`VideoCommand`].
    VideoControl(VideoCommand),
    /// See [`NameAlert`].
    NameAlert(NameAlert),
    /// See [`ClinicMessage`].
    ClinicMessage(ClinicMessage),
    /// See [`ClinicTransfer`].
    ClinicTransfer(ClinicTransfer),
    /// See [`EmergencySignal`].
    Emergency(EmergencySignal),
}

impl BroadcastEvent {
    /// The wire event type of this event.
    pub const fn event_type(&self) -> BroadcastEventType {
        match self {
            Self::VoiceBroadcast(_) => BroadcastEventType::VoiceBroadcast,
            Self::PlayInstant(_) => BroadcastEventType::PlayInstant,
            Self::VideoControl(_) => BroadcastEventType::VideoControl,
            Self::NameAlert(_) => BroadcastEventType::NameAlert,
            Self::ClinicMessage(_) => BroadcastEventType::ClinicMessage,
            Self::ClinicTransfer(_) => BroadcastEventType::ClinicTransfer,
            Self::Emergency(_) => BroadcastEventType::Emergency,
        }
    }

    /// Decode `payload` as the event named by `event_type`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] when a field is missing, mistyped, or out of
    /// range.
    pub fn decode(
        event_type: BroadcastEventType,
        payload: &serde_json::Value,
    ) -> Result<Self, PayloadError> {
        let event = match event_type {
            BroadcastEventType::VoiceBroadcast => {
                Self::VoiceBroadcast(VoiceBroadcast::deserialize(payload)?.validate()?)
            }
            BroadcastEventType::PlayInstant => Self::PlayInstant(PlayInstant::deserialize(payload)?),
            BroadcastEventType::VideoControl => {
                Self::VideoControl(VideoCommand::deserialize(payload)?.validate()?)
            }
            BroadcastEventType::NameAlert => Self::NameAlert(NameAlert::deserialize(payload)?),
            BroadcastEventType::ClinicMessage => {
                Self::ClinicMessage(ClinicMessage::deserialize(payload)?)
            }
            BroadcastEventType::ClinicTransfer => {
                Self::ClinicTransfer(ClinicTransfer::deserialize(payload)?)
            }
            BroadcastEventType::Emergency => Self::Emergency(EmergencySignal::deserialize(payload)?),
        };
        Ok(event)
    }

    /// Encode the payload half of the event.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Json`] if serialization fails.
    pub fn payload(&self) -> Result<serde_json::Value, PayloadError> {
        let value = match self {
            Self::VoiceBroadcast(p) => serde_json::to_value(p)?,
            Self::PlayInstant(p) => serde_json::to_value(p)?,
            Self::VideoControl(p) => serde_json::to_value(p)?,
            Self::NameAlert(p) => serde_json::to_value(p)?,
            Self::ClinicMessage(p) => serde_json::to_value(p)?,
            Self::ClinicTransfer(p) => serde_json::to_value(p)?,
            Self::Emergency(p) => serde_json::to_value(p)?,
        };
        Ok(value)
    }

    /// Wrap the event in a [`BroadcastMessage`] for `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Json`] if serialization fails.
    pub fn to_message(&self, channel: &str) -> Result<BroadcastMessage, PayloadError> {
        Ok(BroadcastMessage {
            channel: channel.to_owned(),
            event_type: self.event_type(),
            payload: self.payload()?,
        })
    }
}
