//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use queuecall_core::{
    AudioPlayer, AudioSequencer, ClientProfile, ClientRole, ClientSession, DisplayUpdate,
    PlaybackError,
};
use queuecall_types::{ClinicId, ClinicState, Clip};
use tokio::sync::{Notify, mpsc};

/// Clip played after the clips under test to prove the queue has drained.
pub const SENTINEL: Clip = Clip::Instant(999);

/// Records every clip it is asked to play. Clips finish at once unless held.
#[derive(Clone, Default)]
pub struct FakePlayer {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    attempts: Mutex<Vec<Clip>>,
    failing: Mutex<HashSet<Clip>>,
    gates: Mutex<HashMap<Clip, Arc<Notify>>>,
    stops: AtomicUsize,
}

impl FakePlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `clip` fail with [`PlaybackError::Missing`].
    pub fn fail(&self, clip: Clip) {
        self.inner.failing.lock().unwrap().insert(clip);
    }

    /// Make `clip` block until the returned gate is notified.
    pub fn hold(&self, clip: Clip) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.inner
            .gates
            .lock()
            .unwrap()
            .insert(clip, Arc::clone(&gate));
        gate
    }

    /// Every clip attempted so far, in order.
    pub fn attempts(&self) -> Vec<Clip> {
        self.inner.attempts.lock().unwrap().clone()
    }

    /// Attempts minus siren clips and the sentinel.
    pub fn announcements(&self) -> Vec<Clip> {
        self.attempts()
            .into_iter()
            .filter(|c| !c.is_siren() && *c != SENTINEL)
            .collect()
    }

    /// How many times playback was hard-stopped.
    pub fn stops(&self) -> usize {
        self.inner.stops.load(Ordering::SeqCst)
    }

    /// Wait until `clip` has been attempted at least once.
    pub async fn started(&self, clip: &Clip) {
        for _ in 0..400 {
            if self.attempts().contains(clip) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("{clip} never started");
    }
}

impl AudioPlayer for FakePlayer {
    async fn play(&self, clip: &Clip) -> Result<(), PlaybackError> {
        self.inner.attempts.lock().unwrap().push(clip.clone());
        let gate = self.inner.gates.lock().unwrap().get(clip).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.inner.failing.lock().unwrap().contains(clip) {
            return Err(PlaybackError::Missing(clip.to_string()));
        }
        Ok(())
    }

    fn stop(&self) {
        self.inner.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// A session wired to a [`FakePlayer`] with its display output captured.
pub struct Harness {
    pub session: ClientSession,
    pub player: FakePlayer,
    pub sequencer: AudioSequencer,
    pub updates: mpsc::UnboundedReceiver<DisplayUpdate>,
}

impl Harness {
    pub fn new(role: ClientRole, clinics: impl IntoIterator<Item = ClinicId>) -> Self {
        let player = FakePlayer::new();
        let sequencer = AudioSequencer::spawn(player.clone());
        let (tx, updates) = mpsc::unbounded_channel();
        let session = ClientSession::new(ClientProfile::new(role, clinics), sequencer.clone(), tx);
        Self {
            session,
            player,
            sequencer,
            updates,
        }
    }

    /// Display updates emitted since the last drain.
    pub fn drain(&mut self) -> Vec<DisplayUpdate> {
        let mut out = Vec::new();
        while let Ok(update) = self.updates.try_recv() {
            out.push(update);
        }
        out
    }

    /// Wait for everything queued so far to play, then return the
    /// non-siren clips attempted.
    pub async fn settle(&self) -> Vec<Clip> {
        self.sequencer.play(vec![SENTINEL]).wait().await;
        self.player.announcements()
    }
}

/// A snapshot of `clinic_id` at counter `number`, called `secs` after `base`.
pub fn snapshot(clinic_id: ClinicId, number: u32, base: DateTime<Utc>, secs: i64) -> ClinicState {
    let mut state = ClinicState::new(clinic_id, "General", 2);
    state.current_number = number;
    state.last_call_time = Some(base + chrono::Duration::seconds(secs));
    state
}

/// Announcements among `updates`.
pub fn announcements(updates: &[DisplayUpdate]) -> Vec<&queuecall_types::AnnouncementEvent> {
    updates
        .iter()
        .filter_map(|u| match u {
            DisplayUpdate::Announcement(a) => Some(a),
            _ => None,
        })
        .collect()
}
