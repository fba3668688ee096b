//! Announcements and the audio clips they are made of.
//!
//! An [`AnnouncementEvent`] is derived and ephemeral: it exists only for the
//! duration of one playback and is never persisted.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::broadcast::{ClinicTransfer, NameAlert};
use crate::clinic::ClinicState;
use crate::ids::ClinicId;

/// A single playable audio clip identifier.
///
/// Clips resolve to files under the asset directory following a fixed
/// naming convention, see [`Clip::file_name`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Clip {
    /// Attention chime played before every call-out.
    Ding,
    /// Spoken ticket number, `{n}.{ext}`.
    TicketNumber(u32),
    /// Spoken clinic room number, `clinic{n}.{ext}`.
    ClinicNumber(u32),
    /// Pre-recorded instant clip, `instant{n}.{ext}`.
    Instant(u32),
    /// Siren loop, `emergency.{ext}`.
    Emergency,
    /// Ad-hoc recorded voice clip, referenced by file name.
    Recorded(String),
}

impl Clip {
    /// Resolve the clip to its asset file name.
    ///
    /// `ding_file` is the configured chime file (it carries its own
    /// extension); every other clip uses `extension`.
    pub fn file_name(&self, extension: &str, ding_file: &str) -> String {
        match self {
            Self::Ding => ding_file.to_owned(),
            Self::TicketNumber(n) => format!("{n}.{extension}"),
            Self::ClinicNumber(n) => format!("clinic{n}.{extension}"),
            Self::Instant(n) => format!("instant{n}.{extension}"),
            Self::Emergency => format!("emergency.{extension}"),
            Self::Recorded(name) => name.clone(),
        }
    }

    /// Whether the clip names a file directly inside the asset directory.
    ///
    /// Only [`Clip::Recorded`] carries a free-form name; it must have no
    /// path separators and must not be `.` or `..`.
    pub fn is_plain_file(&self) -> bool {
        match self {
            Self::Recorded(name) => is_plain_file_name(name),
            _ => true,
        }
    }

    /// Whether this is the emergency siren clip.
    pub const fn is_siren(&self) -> bool {
        matches!(self, Self::Emergency)
    }
}

impl core::fmt::Display for Clip {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Ding => write!(f, "ding"),
            Self::TicketNumber(n) => write!(f, "{n}"),
            Self::ClinicNumber(n) => write!(f, "clinic{n}"),
            Self::Instant(n) => write!(f, "instant{n}"),
            Self::Emergency => write!(f, "emergency"),
            Self::Recorded(name) => write!(f, "recorded:{name}"),
        }
    }
}

/// Whether `name` is a bare file name: non-empty, not `.` or `..`, and
/// free of path separators, drive prefixes and NUL.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', ':', '\0'])
}

/// Why an announcement is being made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AnnouncementKind {
    /// Counter moved forward.
    Next,
    /// Counter moved backward.
    Previous,
    /// Same number called again.
    Repeat,
    /// Operator called an explicit number.
    Special,
    /// A patient called by name.
    Name,
    /// A ticket sent on to another clinic.
    Transfer,
}

/// An ordered audio call-out for one clinic event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AnnouncementEvent {
    /// Clinic the call is for. Absent for name alerts with no clinic id.
    pub clinic_id: Option<ClinicId>,
    /// Ticket being called. Absent for name alerts.
    pub ticket_number: Option<u32>,
    /// Room number the patient should go to.
    pub clinic_number: Option<u32>,
    /// Classification of the call.
    pub kind: AnnouncementKind,
    /// Clips to play, in order.
    pub audio_clip_sequence: Vec<Clip>,
}

impl AnnouncementEvent {
    /// Build a ticket call-out for `state`: ding, ticket number, clinic number.
    pub fn call(kind: AnnouncementKind, state: &ClinicState) -> Self {
        Self {
            clinic_id: Some(state.clinic_id),
            ticket_number: Some(state.current_number),
            clinic_number: Some(state.clinic_number),
            kind,
            audio_clip_sequence: vec![
                Clip::Ding,
                Clip::TicketNumber(state.current_number),
                Clip::ClinicNumber(state.clinic_number),
            ],
        }
    }

    /// Build the call-out for a ticket transferred to another clinic.
    pub fn transfer(transfer: &ClinicTransfer) -> Self {
        Self {
            clinic_id: Some(transfer.to_clinic),
            ticket_number: Some(transfer.ticket_number),
            clinic_number: Some(transfer.to_clinic_number),
            kind: AnnouncementKind::Transfer,
            audio_clip_sequence: vec![
                Clip::Ding,
                Clip::TicketNumber(transfer.ticket_number),
                Clip::ClinicNumber(transfer.to_clinic_number),
            ],
        }
    }

    /// Build the chime for a name alert. The name itself is shown, not spoken.
    pub fn name(alert: &NameAlert) -> Self {
        let mut audio_clip_sequence = vec![Clip::Ding];
        if let Some(n) = alert.clinic_number {
            audio_clip_sequence.push(Clip::ClinicNumber(n));
        }
        Self {
            clinic_id: alert.clinic_id,
            ticket_number: None,
            clinic_number: alert.clinic_number,
            kind: AnnouncementKind::Name,
            audio_clip_sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_file_names_follow_asset_convention() {
        assert_eq!(Clip::Ding.file_name("mp3", "ding.wav"), "ding.wav");
        assert_eq!(Clip::TicketNumber(42).file_name("mp3", "ding.wav"), "42.mp3");
        assert_eq!(Clip::ClinicNumber(3).file_name("mp3", "ding.wav"), "clinic3.mp3");
        assert_eq!(Clip::Instant(2).file_name("ogg", "ding.wav"), "instant2.ogg");
        assert_eq!(Clip::Emergency.file_name("mp3", "ding.wav"), "emergency.mp3");
        assert_eq!(
            Clip::Recorded("voice-17.webm".to_owned()).file_name("mp3", "ding.wav"),
            "voice-17.webm"
        );
    }

    #[test]
    fn call_sequence_is_ding_ticket_clinic() {
        let mut state = ClinicState::new(ClinicId::new(), "Eye", 3);
        state.current_number = 7;
        let event = AnnouncementEvent::call(AnnouncementKind::Next, &state);
        assert_eq!(
            event.audio_clip_sequence,
            vec![Clip::Ding, Clip::TicketNumber(7), Clip::ClinicNumber(3)]
        );
        assert_eq!(event.ticket_number, Some(7));
        assert_eq!(event.clinic_id, Some(state.clinic_id));
    }

    #[test]
    fn name_alert_without_clinic_number_is_just_a_chime() {
        let alert = NameAlert {
            name: "Sara Ali".to_owned(),
            clinic_label: "Pediatrics".to_owned(),
            clinic_id: None,
            clinic_number: None,
        };
        let event = AnnouncementEvent::name(&alert);
        assert_eq!(event.audio_clip_sequence, vec![Clip::Ding]);
        assert_eq!(event.kind, AnnouncementKind::Name);
    }

    #[test]
    fn clip_serializes_with_kind_tag() {
        let json = serde_json::to_value(Clip::TicketNumber(5)).unwrap_or_default();
        assert_eq!(json["kind"], "ticket_number");
        assert_eq!(json["value"], 5);
    }
}
