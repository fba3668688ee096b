//! Call-out detection from successive clinic snapshots.
//!
//! Each client keeps its own [`ClinicStateStore`] of the last snapshot it
//! saw per clinic. [`ChangeDetector`] compares every fresh snapshot against
//! that cache and emits at most one [`AnnouncementEvent`]. A call-out is
//! signalled only by a change in `last_call_time`; the direction of the
//! counter change classifies it.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use queuecall_types::{AnnouncementEvent, AnnouncementKind, ClinicId, ClinicState};
use tracing::debug;

/// Last-known snapshot per clinic, as seen by one client.
#[derive(Debug, Clone, Default)]
pub struct ClinicStateStore {
    snapshots: BTreeMap<ClinicId, ClinicState>,
}

impl ClinicStateStore {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last snapshot seen for `clinic_id`.
    pub fn get(&self, clinic_id: ClinicId) -> Option<&ClinicState> {
        self.snapshots.get(&clinic_id)
    }

    /// Store `state`, returning the snapshot it replaced.
    pub fn replace(&mut self, state: ClinicState) -> Option<ClinicState> {
        self.snapshots.insert(state.clinic_id, state)
    }

    /// Number of clinics seen so far.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether no snapshot has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// All cached snapshots, ordered by clinic id.
    pub fn iter(&self) -> impl Iterator<Item = &ClinicState> {
        self.snapshots.values()
    }
}

/// Classify the transition from `previous` to `current`.
///
/// Returns `None` when `last_call_time` did not change, whatever else did.
pub fn classify(previous: &ClinicState, current: &ClinicState) -> Option<AnnouncementKind> {
    if !current.call_time_differs(previous) {
        return None;
    }
    Some(match current.current_number.cmp(&previous.current_number) {
        Ordering::Greater => AnnouncementKind::Next,
        Ordering::Less => AnnouncementKind::Previous,
        Ordering::Equal => AnnouncementKind::Repeat,
    })
}

/// Turns a stream of snapshots into announcement events.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    cache: ClinicStateStore,
}

impl ChangeDetector {
    /// Create a detector with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `snapshot` and return the announcement it implies, if any.
    ///
    /// The first snapshot for a clinic only primes the cache. The cached
    /// snapshot is replaced on every call, announcement or not.
    pub fn observe(&mut self, snapshot: ClinicState) -> Option<AnnouncementEvent> {
        let event = match self.cache.get(snapshot.clinic_id) {
            None => {
                debug!(clinic_id = %snapshot.clinic_id, "first snapshot, priming cache");
                None
            }
            Some(previous) => classify(previous, &snapshot)
                .map(|kind| AnnouncementEvent::call(kind, &snapshot)),
        };
        self.cache.replace(snapshot);
        event
    }

    /// Last snapshot seen for `clinic_id`.
    pub fn last_seen(&self, clinic_id: ClinicId) -> Option<&ClinicState> {
        self.cache.get(clinic_id)
    }

    /// The underlying snapshot cache.
    pub const fn cache(&self) -> &ClinicStateStore {
        &self.cache
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, Utc};
    use queuecall_types::Clip;

    use super::*;

    fn snapshot(id: ClinicId, number: u32, called_secs: Option<i64>) -> ClinicState {
        let base = Utc::now();
        let mut state = ClinicState::new(id, "General", 2);
        state.current_number = number;
        state.last_call_time = called_secs.map(|s| base + Duration::seconds(s));
        state
    }

    fn at(base: &ClinicState, number: u32, call: Option<chrono::DateTime<Utc>>) -> ClinicState {
        let mut state = base.clone();
        state.current_number = number;
        state.last_call_time = call;
        state
    }

    #[test]
    fn cold_start_announces_nothing() {
        let mut detector = ChangeDetector::new();
        let id = ClinicId::new();
        assert!(detector.observe(snapshot(id, 12, Some(0))).is_none());
        assert_eq!(detector.last_seen(id).map(|s| s.current_number), Some(12));
    }

    #[test]
    fn repeat_then_next_sequence() {
        let mut detector = ChangeDetector::new();
        let first = snapshot(ClinicId::new(), 5, Some(0));
        let t0 = first.last_call_time.unwrap();

        assert!(detector.observe(first.clone()).is_none());

        let repeat = detector.observe(at(&first, 5, Some(t0 + Duration::seconds(1))));
        assert_eq!(repeat.map(|e| e.kind), Some(AnnouncementKind::Repeat));

        let next = detector
            .observe(at(&first, 7, Some(t0 + Duration::seconds(2))))
            .unwrap();
        assert_eq!(next.kind, AnnouncementKind::Next);
        assert_eq!(
            next.audio_clip_sequence,
            vec![Clip::Ding, Clip::TicketNumber(7), Clip::ClinicNumber(2)]
        );

        let again = detector.observe(at(&first, 7, Some(t0 + Duration::seconds(3))));
        assert_eq!(again.map(|e| e.kind), Some(AnnouncementKind::Repeat));
    }

    #[test]
    fn decrement_is_previous() {
        let mut detector = ChangeDetector::new();
        let first = snapshot(ClinicId::new(), 9, Some(0));
        let t0 = first.last_call_time.unwrap();
        detector.observe(first.clone());
        let event = detector.observe(at(&first, 8, Some(t0 + Duration::seconds(1))));
        assert_eq!(event.map(|e| e.kind), Some(AnnouncementKind::Previous));
    }

    #[test]
    fn counter_change_without_call_time_is_silent() {
        let mut detector = ChangeDetector::new();
        let first = snapshot(ClinicId::new(), 9, Some(0));
        detector.observe(first.clone());
        let reset = at(&first, 0, first.last_call_time);
        assert!(detector.observe(reset).is_none());
        assert_eq!(
            detector.last_seen(first.clinic_id).map(|s| s.current_number),
            Some(0)
        );
    }

    #[test]
    fn active_toggle_is_silent() {
        let mut detector = ChangeDetector::new();
        let first = snapshot(ClinicId::new(), 3, Some(0));
        detector.observe(first.clone());
        let mut closed = first;
        closed.is_active = false;
        assert!(detector.observe(closed).is_none());
    }

    #[test]
    fn first_ever_call_announces() {
        let mut detector = ChangeDetector::new();
        let fresh = snapshot(ClinicId::new(), 0, None);
        detector.observe(fresh.clone());
        let event = detector.observe(at(&fresh, 1, Some(Utc::now())));
        assert_eq!(event.map(|e| e.kind), Some(AnnouncementKind::Next));
    }

    #[test]
    fn clinics_are_independent() {
        let mut detector = ChangeDetector::new();
        let a = snapshot(ClinicId::new(), 4, Some(0));
        let b = snapshot(ClinicId::new(), 4, Some(0));
        detector.observe(a.clone());
        assert!(detector.observe(b.clone()).is_none(), "b is cold even though a is warm");

        let later = a.last_call_time.map(|t| t + Duration::seconds(5));
        let event = detector.observe(at(&a, 5, later));
        assert_eq!(event.and_then(|e| e.clinic_id), Some(a.clinic_id));
        assert_eq!(detector.cache().len(), 2);
    }
}
