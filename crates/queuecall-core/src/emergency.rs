//! Emergency mode for one client.
//!
//! While active, the siren loops and every other sound is suppressed. The
//! controller is a two-state machine, `Idle` and `Active`. A broadcast can
//! activate it but only the local operator can return it to idle.

use chrono::{DateTime, Utc};
use queuecall_types::{ClinicId, Clip};
use tracing::{debug, info};

use crate::sequencer::AudioSequencer;

/// Who put the client into emergency mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyTrigger {
    /// The operator of this client.
    Operator,
    /// An `emergency` broadcast from another client.
    Broadcast,
}

/// An active emergency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmergencySession {
    /// When the emergency began on this client.
    pub started_at: DateTime<Utc>,
    /// What activated it.
    pub trigger: EmergencyTrigger,
    /// Clinic the alarm was raised from, if known.
    pub clinic_id: Option<ClinicId>,
    /// Note shown with the alert.
    pub note: Option<String>,
}

/// Drives the siren loop and tracks whether emergency mode is on.
#[derive(Debug)]
pub struct EmergencyController {
    sequencer: AudioSequencer,
    session: Option<EmergencySession>,
}

impl EmergencyController {
    /// Create an idle controller that plays the siren through `sequencer`.
    pub const fn new(sequencer: AudioSequencer) -> Self {
        Self {
            sequencer,
            session: None,
        }
    }

    /// Whether emergency mode is on.
    pub const fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// The active emergency, if any.
    pub const fn session(&self) -> Option<&EmergencySession> {
        self.session.as_ref()
    }

    /// Enter emergency mode, preempting all playback with the siren loop.
    ///
    /// Returns the new session, or `None` if already active (the existing
    /// session and loop are left untouched).
    pub fn activate(
        &mut self,
        trigger: EmergencyTrigger,
        clinic_id: Option<ClinicId>,
        note: Option<String>,
    ) -> Option<&EmergencySession> {
        if self.session.is_some() {
            debug!(trigger = ?trigger, "emergency already active");
            return None;
        }
        self.sequencer.preempt_loop(Clip::Emergency);
        info!(trigger = ?trigger, clinic_id = ?clinic_id, "emergency activated");
        self.session = Some(EmergencySession {
            started_at: Utc::now(),
            trigger,
            clinic_id,
            note,
        });
        self.session.as_ref()
    }

    /// Return to idle, hard-stopping the siren. Returns the ended session.
    pub fn deactivate(&mut self) -> Option<EmergencySession> {
        let ended = self.session.take()?;
        self.sequencer.stop_loop();
        let lasted = Utc::now().signed_duration_since(ended.started_at);
        info!(
            trigger = ?ended.trigger,
            lasted_ms = lasted.num_milliseconds(),
            "emergency cleared"
        );
        Some(ended)
    }
}
