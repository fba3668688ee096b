//! Public clinic state as published by the external store.
//!
//! Every client keeps a read-only cached copy of this record per clinic.
//! `last_call_time` is the authoritative "a call happened" signal: it moves
//! on every next/previous/repeat/special call, including repeats where the
//! counter itself is unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{ClinicId, ScreenGroupId};

/// Snapshot of a single clinic's public state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ClinicState {
    /// The clinic this snapshot describes.
    pub clinic_id: ClinicId,
    /// Human-readable clinic name shown on displays.
    pub display_name: String,
    /// Room number used for the `clinic{n}` announcement clip.
    pub clinic_number: u32,
    /// The "now serving" ticket counter. Unsigned, so never negative.
    pub current_number: u32,
    /// Soft on/off state; inactive clinics are still observed.
    pub is_active: bool,
    /// Time of the most recent call-out, `None` before the first call.
    #[ts(type = "string | null")]
    pub last_call_time: Option<DateTime<Utc>>,
    /// Screen group the clinic belongs to, if any.
    pub screen_group: Option<ScreenGroupId>,
}

impl ClinicState {
    /// Create a freshly provisioned clinic: counter at zero, active, never called.
    pub fn new(clinic_id: ClinicId, display_name: impl Into<String>, clinic_number: u32) -> Self {
        Self {
            clinic_id,
            display_name: display_name.into(),
            clinic_number,
            current_number: 0,
            is_active: true,
            last_call_time: None,
            screen_group: None,
        }
    }

    /// Builder-style helper to set the screen group.
    #[must_use]
    pub const fn with_screen_group(mut self, group: ScreenGroupId) -> Self {
        self.screen_group = Some(group);
        self
    }

    /// Whether `other` carries a different call timestamp (null-safe).
    pub fn call_time_differs(&self, other: &Self) -> bool {
        self.last_call_time != other.last_call_time
    }
}
