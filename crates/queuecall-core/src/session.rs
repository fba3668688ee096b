//! The per-client event loop.
//!
//! A [`ClientSession`] owns everything one client knows: its snapshot cache,
//! emergency state, optional patient tracking and the audio sequencer. Every
//! input arrives as a [`ClientEvent`] and is handled to completion before
//! the next one, so call detection and emergency suppression never race.
//! Everything the front-end should render leaves as a [`DisplayUpdate`].

use std::collections::BTreeSet;

use queuecall_types::{
    AnnouncementEvent, BroadcastEvent, ClinicId, ClinicMessage, ClinicState, ClinicTransfer, Clip,
    EmergencySignal, NameAlert, VideoCommand, VoiceBroadcast,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{ClientRole, PredictorConfig};
use crate::detector::ChangeDetector;
use crate::emergency::{EmergencyController, EmergencySession, EmergencyTrigger};
use crate::predictor::{PatientTrackingSession, TurnPredictor, TurnUpdate};
use crate::sequencer::AudioSequencer;

/// An input to a [`ClientSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A fresh snapshot from the store.
    Snapshot(ClinicState),
    /// A store read failed; the last snapshot is kept.
    SnapshotFailed {
        /// Clinic whose read failed.
        clinic_id: ClinicId,
        /// Error text.
        error: String,
    },
    /// A decoded broadcast.
    Broadcast(BroadcastEvent),
    /// A local operator or patient action.
    Operator(OperatorAction),
}

/// An action taken on this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorAction {
    /// Toggle emergency mode. Turning it on needs `confirmed`.
    ToggleEmergency {
        /// Whether the operator confirmed the activation prompt.
        confirmed: bool,
    },
    /// Begin tracking a ticket.
    StartTracking {
        /// Clinic the ticket is for.
        clinic_id: ClinicId,
        /// The held ticket.
        ticket_number: u32,
    },
    /// Stop tracking.
    StopTracking,
}

/// Something the front-end should render.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayUpdate {
    /// A watched clinic's snapshot changed.
    ClinicUpdated(ClinicState),
    /// A call-out is being announced.
    Announcement(AnnouncementEvent),
    /// Emergency mode began.
    EmergencyAlert(EmergencySession),
    /// Emergency mode ended.
    EmergencyCleared,
    /// A message for a watched clinic.
    ClinicMessage(ClinicMessage),
    /// A name called by an operator.
    NameAlert(NameAlert),
    /// A ticket moved to a watched clinic.
    Transfer(ClinicTransfer),
    /// A recorded broadcast is playing.
    VoiceBroadcast(VoiceBroadcast),
    /// Drive the video player.
    Video(VideoCommand),
    /// Patient turn status.
    Turn(TurnUpdate),
    /// Patient tracking ended.
    TrackingStopped,
}

/// What a client is and which clinics it watches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientProfile {
    /// Client role.
    pub role: ClientRole,
    /// Clinics shown and announced by this client.
    pub clinics: BTreeSet<ClinicId>,
}

impl ClientProfile {
    /// A profile for `role` watching `clinics`.
    pub fn new(role: ClientRole, clinics: impl IntoIterator<Item = ClinicId>) -> Self {
        Self {
            role,
            clinics: clinics.into_iter().collect(),
        }
    }

    /// Whether `clinic_id` is on the watch list.
    pub fn watches(&self, clinic_id: ClinicId) -> bool {
        self.clinics.contains(&clinic_id)
    }
}

/// One client's state and behaviour.
#[derive(Debug)]
pub struct ClientSession {
    profile: ClientProfile,
    detector: ChangeDetector,
    emergency: EmergencyController,
    predictor: Option<TurnPredictor>,
    predictor_config: PredictorConfig,
    sequencer: AudioSequencer,
    updates: mpsc::UnboundedSender<DisplayUpdate>,
}

impl ClientSession {
    /// Create a session that plays through `sequencer` and renders to `updates`.
    pub fn new(
        profile: ClientProfile,
        sequencer: AudioSequencer,
        updates: mpsc::UnboundedSender<DisplayUpdate>,
    ) -> Self {
        Self {
            profile,
            detector: ChangeDetector::new(),
            emergency: EmergencyController::new(sequencer.clone()),
            predictor: None,
            predictor_config: PredictorConfig::default(),
            sequencer,
            updates,
        }
    }

    /// Use `config` for trackers started from now on.
    #[must_use]
    pub fn with_predictor_config(mut self, config: PredictorConfig) -> Self {
        self.predictor_config = config;
        self
    }

    /// This client's profile.
    pub const fn profile(&self) -> &ClientProfile {
        &self.profile
    }

    /// Whether emergency mode is on.
    pub const fn is_emergency_active(&self) -> bool {
        self.emergency.is_active()
    }

    /// The tracked ticket, if any.
    pub fn tracking(&self) -> Option<&PatientTrackingSession> {
        self.predictor.as_ref().map(TurnPredictor::session)
    }

    /// Last snapshot seen for `clinic_id`.
    pub fn last_seen(&self, clinic_id: ClinicId) -> Option<&ClinicState> {
        self.detector.last_seen(clinic_id)
    }

    /// Handle events until `events` closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<ClientEvent>) {
        info!(role = ?self.profile.role, clinics = self.profile.clinics.len(), "client session started");
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        if self.emergency.is_active() {
            self.emergency.deactivate();
        }
        info!("client session stopped");
    }

    /// Handle one event to completion.
    pub fn handle(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Snapshot(state) => self.on_snapshot(state),
            ClientEvent::SnapshotFailed { clinic_id, error } => {
                warn!(clinic_id = %clinic_id, error = %error, "snapshot unavailable, keeping last state");
            }
            ClientEvent::Broadcast(event) => self.on_broadcast(event),
            ClientEvent::Operator(action) => self.on_operator(action),
        }
    }

    fn on_snapshot(&mut self, state: ClinicState) {
        let watched = self.profile.watches(state.clinic_id);
        let tracked = self
            .tracking()
            .is_some_and(|t| t.clinic_id == state.clinic_id);
        if !watched && !tracked {
            debug!(clinic_id = %state.clinic_id, "ignoring snapshot for unwatched clinic");
            return;
        }

        let changed = self.detector.last_seen(state.clinic_id) != Some(&state);
        if let Some(predictor) = self.predictor.as_mut() {
            if let Some(update) = predictor.observe(&state) {
                if let Some(cue) = update.cue {
                    let clips = cue.clips(update.held_ticket_number, state.clinic_number);
                    self.play(clips);
                }
                self.emit(DisplayUpdate::Turn(update));
            }
        }

        let announcement = self.detector.observe(state.clone());
        if watched && changed {
            self.emit(DisplayUpdate::ClinicUpdated(state));
        }
        let Some(announcement) = announcement else {
            return;
        };
        if !watched || !self.profile.role.announces_calls() {
            return;
        }
        self.announce(announcement);
    }

    fn on_broadcast(&mut self, event: BroadcastEvent) {
        match event {
            BroadcastEvent::VoiceBroadcast(voice) => {
                if !self.profile.role.announces_calls() {
                    return;
                }
                self.play(vec![Clip::Ding, Clip::Recorded(voice.clip.clone())]);
                self.emit(DisplayUpdate::VoiceBroadcast(voice));
            }
            BroadcastEvent::PlayInstant(instant) => {
                if self.profile.role.announces_calls() {
                    self.play(vec![Clip::Instant(instant.clip)]);
                }
            }
            BroadcastEvent::VideoControl(command) => {
                if self.profile.role.plays_video() {
                    self.emit(DisplayUpdate::Video(command));
                }
            }
            BroadcastEvent::NameAlert(alert) => {
                if alert.clinic_id.is_some_and(|id| !self.profile.watches(id)) {
                    debug!(name = %alert.name, "name alert for another clinic");
                    return;
                }
                if self.profile.role.announces_calls() {
                    self.announce(AnnouncementEvent::name(&alert));
                }
                self.emit(DisplayUpdate::NameAlert(alert));
            }
            BroadcastEvent::ClinicMessage(message) => {
                if self.profile.watches(message.clinic_id) {
                    self.emit(DisplayUpdate::ClinicMessage(message));
                } else {
                    debug!(clinic_id = %message.clinic_id, "message for another clinic");
                }
            }
            BroadcastEvent::ClinicTransfer(transfer) => {
                if !self.profile.watches(transfer.to_clinic) {
                    debug!(to_clinic = %transfer.to_clinic, "transfer to another clinic");
                    return;
                }
                if self.profile.role.announces_calls() {
                    self.announce(AnnouncementEvent::transfer(&transfer));
                }
                self.emit(DisplayUpdate::Transfer(transfer));
            }
            BroadcastEvent::Emergency(signal) => self.on_emergency_signal(signal),
        }
    }

    fn on_emergency_signal(&mut self, signal: EmergencySignal) {
        if !self.profile.role.honors_emergencies() {
            return;
        }
        if !signal.active {
            debug!("remote emergency clear ignored, only the local operator can clear");
            return;
        }
        let session = self
            .emergency
            .activate(EmergencyTrigger::Broadcast, signal.clinic_id, signal.note)
            .cloned();
        if let Some(session) = session {
            self.emit(DisplayUpdate::EmergencyAlert(session));
        }
    }

    fn on_operator(&mut self, action: OperatorAction) {
        match action {
            OperatorAction::ToggleEmergency { confirmed } => {
                if self.emergency.deactivate().is_some() {
                    self.emit(DisplayUpdate::EmergencyCleared);
                } else if !confirmed {
                    info!("emergency activation not confirmed");
                } else if let Some(session) = self
                    .emergency
                    .activate(EmergencyTrigger::Operator, None, None)
                    .cloned()
                {
                    self.emit(DisplayUpdate::EmergencyAlert(session));
                }
            }
            OperatorAction::StartTracking {
                clinic_id,
                ticket_number,
            } => {
                info!(clinic_id = %clinic_id, ticket_number, "tracking ticket");
                let session = PatientTrackingSession::new(clinic_id, ticket_number);
                let mut predictor = TurnPredictor::new(
                    session,
                    self.predictor_config.approaching_threshold,
                    self.predictor_config.pace_smoothing,
                );
                if let Some((update, clinic_number)) = self
                    .detector
                    .last_seen(clinic_id)
                    .and_then(|state| predictor.observe(state).map(|u| (u, state.clinic_number)))
                {
                    if let Some(cue) = update.cue {
                        self.play(cue.clips(update.held_ticket_number, clinic_number));
                    }
                    self.emit(DisplayUpdate::Turn(update));
                }
                self.predictor = Some(predictor);
            }
            OperatorAction::StopTracking => {
                if self.predictor.take().is_some() {
                    self.emit(DisplayUpdate::TrackingStopped);
                }
            }
        }
    }

    fn announce(&self, announcement: AnnouncementEvent) {
        if self.emergency.is_active() {
            debug!(kind = ?announcement.kind, "emergency active, dropping announcement");
            return;
        }
        info!(
            kind = ?announcement.kind,
            ticket = ?announcement.ticket_number,
            clinic = ?announcement.clinic_number,
            "announcing"
        );
        self.sequencer.play(announcement.audio_clip_sequence.clone());
        self.emit(DisplayUpdate::Announcement(announcement));
    }

    fn play(&self, clips: Vec<Clip>) {
        if self.emergency.is_active() {
            debug!(clips = clips.len(), "emergency active, not queueing audio");
            return;
        }
        self.sequencer.play(clips);
    }

    fn emit(&self, update: DisplayUpdate) {
        if self.updates.send(update).is_err() {
            debug!("display receiver closed");
        }
    }
}
