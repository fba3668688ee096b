//! Turn prediction for a patient holding a ticket.
//!
//! The predictor compares the held ticket against the clinic's counter on
//! every snapshot and places the patient in a [`TurnTier`]. Entering
//! `Approaching` or `Now` produces a one-off [`TurnCue`]; staying in a tier
//! produces nothing. Once `Now` is reached it is kept, even if the operator
//! steps the counter back, so the patient is not told they have more time.
//!
//! Wait estimates come from an exponential moving average of how long the
//! clinic takes per ticket.

use std::time::Duration;

use chrono::{DateTime, Utc};
use queuecall_types::{ClinicId, ClinicState, Clip};
use tracing::{debug, info};

/// Default remaining-turn threshold for [`TurnTier::Approaching`].
pub const DEFAULT_APPROACHING_THRESHOLD: u32 = 3;

/// Default weight of the newest pace sample.
pub const DEFAULT_PACE_SMOOTHING: f64 = 0.3;

/// How close the patient's turn is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TurnTier {
    /// More than the threshold ahead.
    Waiting,
    /// Within the threshold.
    Approaching,
    /// Called or passed.
    Now,
}

/// Side effect fired on entering a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnCue {
    /// Short chime plus a visual notice.
    Light,
    /// Spoken call-out plus a prominent notice.
    Strong,
}

impl TurnCue {
    /// Clips to play for this cue.
    pub fn clips(self, held_ticket_number: u32, clinic_number: u32) -> Vec<Clip> {
        match self {
            Self::Light => vec![Clip::Ding],
            Self::Strong => vec![
                Clip::Ding,
                Clip::TicketNumber(held_ticket_number),
                Clip::ClinicNumber(clinic_number),
            ],
        }
    }
}

/// The ticket one patient is tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatientTrackingSession {
    /// Clinic the ticket belongs to.
    pub clinic_id: ClinicId,
    /// The held ticket.
    pub held_ticket_number: u32,
    /// Tier last reported, `None` before the first snapshot.
    pub last_notified_tier: Option<TurnTier>,
}

impl PatientTrackingSession {
    /// Start tracking `held_ticket_number` at `clinic_id`.
    pub const fn new(clinic_id: ClinicId, held_ticket_number: u32) -> Self {
        Self {
            clinic_id,
            held_ticket_number,
            last_notified_tier: None,
        }
    }
}

/// Outcome of evaluating one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnUpdate {
    /// Clinic evaluated.
    pub clinic_id: ClinicId,
    /// The held ticket.
    pub held_ticket_number: u32,
    /// Counter at evaluation time.
    pub current_number: u32,
    /// Tickets still ahead. Negative once passed.
    pub remaining: i64,
    /// Tier after this evaluation.
    pub tier: TurnTier,
    /// Cue to fire, only on tier entry.
    pub cue: Option<TurnCue>,
    /// Expected time until the held ticket is called, once a pace is known.
    pub estimated_wait: Option<Duration>,
}

/// Exponential moving average of seconds per ticket.
#[derive(Debug, Clone, PartialEq)]
struct CallPacing {
    smoothing: f64,
    anchor: Option<(u32, DateTime<Utc>)>,
    secs_per_ticket: Option<f64>,
}

impl CallPacing {
    const fn new(smoothing: f64) -> Self {
        Self {
            smoothing,
            anchor: None,
            secs_per_ticket: None,
        }
    }

    fn record(&mut self, state: &ClinicState) {
        let Some(called_at) = state.last_call_time else {
            return;
        };
        match self.anchor {
            Some((number, at)) if state.current_number > number && called_at > at => {
                let advanced = f64::from(state.current_number.saturating_sub(number));
                #[allow(clippy::cast_precision_loss)]
                let elapsed = called_at.signed_duration_since(at).num_milliseconds() as f64 / 1000.0;
                let sample = elapsed / advanced;
                let average = self.secs_per_ticket.map_or(sample, |previous| {
                    self.smoothing.mul_add(sample, (1.0 - self.smoothing) * previous)
                });
                debug!(sample, average, "call pace updated");
                self.secs_per_ticket = Some(average);
                self.anchor = Some((state.current_number, called_at));
            }
            Some((number, _)) if state.current_number == number => {}
            _ => self.anchor = Some((state.current_number, called_at)),
        }
    }

    fn estimate(&self, remaining: i64) -> Option<Duration> {
        if remaining <= 0 {
            return Some(Duration::ZERO);
        }
        #[allow(clippy::cast_precision_loss)]
        let turns = remaining as f64;
        self.secs_per_ticket
            .and_then(|secs| Duration::try_from_secs_f64(secs * turns).ok())
    }
}

/// Evaluates snapshots for one tracked ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnPredictor {
    session: PatientTrackingSession,
    approaching_threshold: u32,
    pacing: CallPacing,
}

impl TurnPredictor {
    /// Track `held_ticket_number` at `clinic_id` with default tuning.
    pub const fn track(clinic_id: ClinicId, held_ticket_number: u32) -> Self {
        Self::new(
            PatientTrackingSession::new(clinic_id, held_ticket_number),
            DEFAULT_APPROACHING_THRESHOLD,
            DEFAULT_PACE_SMOOTHING,
        )
    }

    /// Create a predictor with explicit tuning.
    pub const fn new(
        session: PatientTrackingSession,
        approaching_threshold: u32,
        pace_smoothing: f64,
    ) -> Self {
        Self {
            session,
            approaching_threshold,
            pacing: CallPacing::new(pace_smoothing),
        }
    }

    /// The tracked ticket.
    pub const fn session(&self) -> &PatientTrackingSession {
        &self.session
    }

    /// Tier for a given number of remaining turns, ignoring history.
    pub fn tier_for(&self, remaining: i64) -> TurnTier {
        if remaining <= 0 {
            TurnTier::Now
        } else if remaining <= i64::from(self.approaching_threshold) {
            TurnTier::Approaching
        } else {
            TurnTier::Waiting
        }
    }

    /// Evaluate `state`. Snapshots of other clinics yield `None`.
    pub fn observe(&mut self, state: &ClinicState) -> Option<TurnUpdate> {
        if state.clinic_id != self.session.clinic_id {
            return None;
        }
        self.pacing.record(state);

        let remaining = i64::from(self.session.held_ticket_number)
            .saturating_sub(i64::from(state.current_number));
        let previous = self.session.last_notified_tier;
        let tier = if previous == Some(TurnTier::Now) {
            TurnTier::Now
        } else {
            self.tier_for(remaining)
        };
        let cue = if previous == Some(tier) {
            None
        } else {
            match tier {
                TurnTier::Waiting => None,
                TurnTier::Approaching => Some(TurnCue::Light),
                TurnTier::Now => Some(TurnCue::Strong),
            }
        };
        if let Some(cue) = cue {
            info!(
                clinic_id = %state.clinic_id,
                held = self.session.held_ticket_number,
                current = state.current_number,
                cue = ?cue,
                "turn tier entered"
            );
        }
        self.session.last_notified_tier = Some(tier);

        Some(TurnUpdate {
            clinic_id: state.clinic_id,
            held_ticket_number: self.session.held_ticket_number,
            current_number: state.current_number,
            remaining,
            tier,
            cue,
            estimated_wait: self.pacing.estimate(remaining),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;

    fn state_at(id: ClinicId, number: u32, called: DateTime<Utc>) -> ClinicState {
        let mut state = ClinicState::new(id, "Eye", 6);
        state.current_number = number;
        state.last_call_time = Some(called);
        state
    }

    #[test]
    fn each_tier_fires_once() {
        let id = ClinicId::new();
        let mut predictor = TurnPredictor::track(id, 10);
        let t0 = Utc::now();

        let cues: Vec<_> = [5, 8, 9, 10]
            .into_iter()
            .enumerate()
            .filter_map(|(i, n)| {
                let at = t0 + ChronoDuration::seconds(i64::try_from(i).unwrap_or(0) * 60);
                predictor.observe(&state_at(id, n, at))
            })
            .map(|u| (u.tier, u.cue))
            .collect();

        assert_eq!(
            cues,
            vec![
                (TurnTier::Waiting, None),
                (TurnTier::Approaching, Some(TurnCue::Light)),
                (TurnTier::Approaching, None),
                (TurnTier::Now, Some(TurnCue::Strong)),
            ]
        );
    }

    #[test]
    fn now_is_sticky() {
        let id = ClinicId::new();
        let mut predictor = TurnPredictor::track(id, 4);
        let t0 = Utc::now();
        let first = predictor.observe(&state_at(id, 4, t0));
        assert_eq!(first.map(|u| u.cue), Some(Some(TurnCue::Strong)));

        let stepped_back = predictor.observe(&state_at(id, 2, t0 + ChronoDuration::seconds(5)));
        assert_eq!(stepped_back.as_ref().map(|u| u.tier), Some(TurnTier::Now));
        assert_eq!(stepped_back.and_then(|u| u.cue), None);
    }

    #[test]
    fn first_snapshot_inside_threshold_cues() {
        let id = ClinicId::new();
        let mut predictor = TurnPredictor::track(id, 12);
        let update = predictor.observe(&state_at(id, 10, Utc::now()));
        assert_eq!(update.and_then(|u| u.cue), Some(TurnCue::Light));
    }

    #[test]
    fn other_clinics_are_ignored() {
        let mut predictor = TurnPredictor::track(ClinicId::new(), 12);
        assert!(predictor.observe(&state_at(ClinicId::new(), 12, Utc::now())).is_none());
        assert_eq!(predictor.session().last_notified_tier, None);
    }

    #[test]
    fn wait_estimate_follows_pace() {
        let id = ClinicId::new();
        let mut predictor = TurnPredictor::track(id, 20);
        let t0 = Utc::now();

        let cold = predictor.observe(&state_at(id, 10, t0));
        assert_eq!(cold.and_then(|u| u.estimated_wait), None);

        // Two tickets in two minutes: one minute per ticket, eight to go.
        let warm = predictor.observe(&state_at(id, 12, t0 + ChronoDuration::seconds(120)));
        let wait = warm.and_then(|u| u.estimated_wait).map(|d| d.as_secs());
        assert_eq!(wait, Some(480));
    }

    #[test]
    fn light_and_strong_cue_clips() {
        assert_eq!(TurnCue::Light.clips(7, 2), vec![Clip::Ding]);
        assert_eq!(
            TurnCue::Strong.clips(7, 2),
            vec![Clip::Ding, Clip::TicketNumber(7), Clip::ClinicNumber(2)]
        );
    }
}
