//! Integration tests for a client session driven event by event.
//!
//! Audio assertions call [`Harness::settle`], which queues a sentinel clip
//! and waits for it, so every request made before it has been played.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

mod common;

use chrono::Utc;
use common::{Harness, announcements, snapshot};
use queuecall_core::{
    ClientEvent, ClientRole, DisplayUpdate, EmergencyTrigger, OperatorAction, TurnCue, TurnTier,
};
use queuecall_types::{
    AnnouncementKind, BroadcastEvent, ClinicId, ClinicMessage, ClinicTransfer, Clip,
    EmergencySignal, NameAlert, PlayInstant, VideoCommand,
};

fn emergency(active: bool) -> ClientEvent {
    ClientEvent::Broadcast(BroadcastEvent::Emergency(EmergencySignal {
        active,
        clinic_id: None,
        note: None,
    }))
}

#[tokio::test]
async fn cold_start_then_next_announces_once() {
    let clinic = ClinicId::new();
    let mut h = Harness::new(ClientRole::Display, [clinic]);
    let t0 = Utc::now();

    h.session.handle(ClientEvent::Snapshot(snapshot(clinic, 5, t0, 0)));
    let updates = h.drain();
    assert!(announcements(&updates).is_empty());
    assert!(matches!(updates[..], [DisplayUpdate::ClinicUpdated(_)]));

    h.session.handle(ClientEvent::Snapshot(snapshot(clinic, 6, t0, 10)));
    let updates = h.drain();
    let called = announcements(&updates);
    assert_eq!(called.len(), 1);
    assert_eq!(called[0].kind, AnnouncementKind::Next);
    assert_eq!(called[0].ticket_number, Some(6));

    assert_eq!(
        h.settle().await,
        vec![Clip::Ding, Clip::TicketNumber(6), Clip::ClinicNumber(2)]
    );
}

#[tokio::test]
async fn repeated_poll_of_same_snapshot_is_silent() {
    let clinic = ClinicId::new();
    let mut h = Harness::new(ClientRole::Display, [clinic]);
    let state = snapshot(clinic, 5, Utc::now(), 0);

    h.session.handle(ClientEvent::Snapshot(state.clone()));
    h.session.handle(ClientEvent::Snapshot(state.clone()));
    h.session.handle(ClientEvent::Snapshot(state));

    assert_eq!(h.drain().len(), 1);
    assert!(h.settle().await.is_empty());
}

#[tokio::test]
async fn repeat_then_jump() {
    let clinic = ClinicId::new();
    let mut h = Harness::new(ClientRole::Control, [clinic]);
    let t0 = Utc::now();

    for (number, secs) in [(5, 0), (5, 1), (7, 2), (7, 3)] {
        h.session.handle(ClientEvent::Snapshot(snapshot(clinic, number, t0, secs)));
    }
    let updates = h.drain();
    let kinds: Vec<_> = announcements(&updates).iter().map(|a| a.kind).collect();
    assert_eq!(
        kinds,
        vec![AnnouncementKind::Repeat, AnnouncementKind::Next, AnnouncementKind::Repeat]
    );
}

#[tokio::test]
async fn toggling_active_does_not_announce() {
    let clinic = ClinicId::new();
    let mut h = Harness::new(ClientRole::Display, [clinic]);
    let open = snapshot(clinic, 3, Utc::now(), 0);
    let mut closed = open.clone();
    closed.is_active = false;

    h.session.handle(ClientEvent::Snapshot(open));
    h.session.handle(ClientEvent::Snapshot(closed));

    let updates = h.drain();
    assert_eq!(updates.len(), 2, "both snapshots are rendered");
    assert!(announcements(&updates).is_empty());
}

#[tokio::test]
async fn failed_read_keeps_last_state() {
    let clinic = ClinicId::new();
    let mut h = Harness::new(ClientRole::Display, [clinic]);
    let state = snapshot(clinic, 5, Utc::now(), 0);

    h.session.handle(ClientEvent::Snapshot(state.clone()));
    h.session.handle(ClientEvent::SnapshotFailed {
        clinic_id: clinic,
        error: "store unavailable".to_owned(),
    });
    h.session.handle(ClientEvent::Snapshot(state));

    assert_eq!(h.drain().len(), 1);
    assert_eq!(h.session.last_seen(clinic).map(|s| s.current_number), Some(5));
}

#[tokio::test]
async fn unwatched_clinic_snapshots_are_ignored() {
    let watched = ClinicId::new();
    let other = ClinicId::new();
    let mut h = Harness::new(ClientRole::Display, [watched]);
    let t0 = Utc::now();

    h.session.handle(ClientEvent::Snapshot(snapshot(other, 1, t0, 0)));
    h.session.handle(ClientEvent::Snapshot(snapshot(other, 2, t0, 1)));

    assert!(h.drain().is_empty());
    assert!(h.session.last_seen(other).is_none());
}

#[tokio::test]
async fn emergency_suppresses_call_outs_until_cleared() {
    let clinic = ClinicId::new();
    let mut h = Harness::new(ClientRole::Display, [clinic]);
    let t0 = Utc::now();
    h.session.handle(ClientEvent::Snapshot(snapshot(clinic, 10, t0, 0)));
    h.drain();

    h.session.handle(emergency(true));
    assert!(h.session.is_emergency_active());
    let updates = h.drain();
    assert!(matches!(
        &updates[..],
        [DisplayUpdate::EmergencyAlert(s)] if s.trigger == EmergencyTrigger::Broadcast
    ));
    h.player.started(&Clip::Emergency).await;

    for (number, secs) in [(11, 1), (12, 2), (13, 3)] {
        h.session.handle(ClientEvent::Snapshot(snapshot(clinic, number, t0, secs)));
    }
    h.session.handle(ClientEvent::Broadcast(BroadcastEvent::PlayInstant(PlayInstant { clip: 4 })));
    assert!(announcements(&h.drain()).is_empty());

    h.session.handle(emergency(false));
    assert!(h.session.is_emergency_active(), "remote clear must not end the emergency");

    h.session.handle(ClientEvent::Operator(OperatorAction::ToggleEmergency { confirmed: false }));
    assert!(!h.session.is_emergency_active());
    assert_eq!(h.drain(), vec![DisplayUpdate::EmergencyCleared]);

    assert!(h.settle().await.is_empty(), "nothing from the emergency window is replayed");
    assert!(h.player.stops() >= 1);

    h.session.handle(ClientEvent::Snapshot(snapshot(clinic, 14, t0, 4)));
    assert_eq!(announcements(&h.drain()).len(), 1);
    assert_eq!(
        h.settle().await,
        vec![Clip::Ding, Clip::TicketNumber(14), Clip::ClinicNumber(2)]
    );
}

#[tokio::test]
async fn emergency_cuts_a_running_announcement() {
    let clinic = ClinicId::new();
    let mut h = Harness::new(ClientRole::Display, [clinic]);
    let gate = h.player.hold(Clip::TicketNumber(21));
    let t0 = Utc::now();

    h.session.handle(ClientEvent::Snapshot(snapshot(clinic, 20, t0, 0)));
    h.session.handle(ClientEvent::Snapshot(snapshot(clinic, 21, t0, 1)));
    h.player.started(&Clip::TicketNumber(21)).await;

    h.session.handle(emergency(true));
    h.player.started(&Clip::Emergency).await;
    gate.notify_one();

    h.session.handle(ClientEvent::Operator(OperatorAction::ToggleEmergency { confirmed: true }));
    h.drain();
    assert_eq!(
        h.settle().await,
        vec![Clip::Ding, Clip::TicketNumber(21)],
        "the clinic number after the interrupted clip never plays"
    );
}

#[tokio::test]
async fn operator_activation_needs_confirmation() {
    let mut h = Harness::new(ClientRole::Control, []);

    h.session.handle(ClientEvent::Operator(OperatorAction::ToggleEmergency { confirmed: false }));
    assert!(!h.session.is_emergency_active());
    assert!(h.drain().is_empty());

    h.session.handle(ClientEvent::Operator(OperatorAction::ToggleEmergency { confirmed: true }));
    assert!(h.session.is_emergency_active());
    assert!(matches!(
        &h.drain()[..],
        [DisplayUpdate::EmergencyAlert(s)] if s.trigger == EmergencyTrigger::Operator
    ));

    h.session.handle(emergency(true));
    assert!(h.drain().is_empty(), "already active");
}

#[tokio::test]
async fn clinic_message_reaches_only_its_clinic() {
    let a = ClinicId::new();
    let b = ClinicId::new();
    let mut h = Harness::new(ClientRole::Display, [b]);

    h.session.handle(ClientEvent::Broadcast(BroadcastEvent::ClinicMessage(ClinicMessage {
        clinic_id: a,
        text: "back in 5".to_owned(),
    })));
    assert!(h.drain().is_empty());

    h.session.handle(ClientEvent::Broadcast(BroadcastEvent::ClinicMessage(ClinicMessage {
        clinic_id: b,
        text: "doctor is in".to_owned(),
    })));
    assert!(matches!(
        &h.drain()[..],
        [DisplayUpdate::ClinicMessage(m)] if m.text == "doctor is in"
    ));
}

#[tokio::test]
async fn transfer_is_announced_at_destination() {
    let from = ClinicId::new();
    let to = ClinicId::new();
    let transfer = ClinicTransfer {
        ticket_number: 14,
        from_clinic: from,
        to_clinic: to,
        to_clinic_number: 3,
    };

    let mut source = Harness::new(ClientRole::Display, [from]);
    source
        .session
        .handle(ClientEvent::Broadcast(BroadcastEvent::ClinicTransfer(transfer)));
    assert!(source.drain().is_empty());

    let mut destination = Harness::new(ClientRole::Display, [to]);
    destination
        .session
        .handle(ClientEvent::Broadcast(BroadcastEvent::ClinicTransfer(transfer)));
    let updates = destination.drain();
    assert_eq!(announcements(&updates)[0].kind, AnnouncementKind::Transfer);
    assert!(updates.contains(&DisplayUpdate::Transfer(transfer)));
    assert_eq!(
        destination.settle().await,
        vec![Clip::Ding, Clip::TicketNumber(14), Clip::ClinicNumber(3)]
    );
}

#[tokio::test]
async fn name_alert_scoping() {
    let mine = ClinicId::new();
    let mut h = Harness::new(ClientRole::Display, [mine]);

    h.session.handle(ClientEvent::Broadcast(BroadcastEvent::NameAlert(NameAlert {
        name: "Layla Hassan".to_owned(),
        clinic_label: "Dental".to_owned(),
        clinic_id: Some(ClinicId::new()),
        clinic_number: Some(4),
    })));
    assert!(h.drain().is_empty());

    h.session.handle(ClientEvent::Broadcast(BroadcastEvent::NameAlert(NameAlert {
        name: "Omar Said".to_owned(),
        clinic_label: "Reception".to_owned(),
        clinic_id: None,
        clinic_number: None,
    })));
    let updates = h.drain();
    assert_eq!(announcements(&updates)[0].kind, AnnouncementKind::Name);
    assert_eq!(h.settle().await, vec![Clip::Ding]);
}

#[tokio::test]
async fn video_commands_only_drive_displays() {
    let command = BroadcastEvent::VideoControl(VideoCommand::Volume(0.5));

    let mut display = Harness::new(ClientRole::Display, []);
    display.session.handle(ClientEvent::Broadcast(command.clone()));
    assert_eq!(display.drain(), vec![DisplayUpdate::Video(VideoCommand::Volume(0.5))]);

    let mut console = Harness::new(ClientRole::Control, []);
    console.session.handle(ClientEvent::Broadcast(command));
    assert!(console.drain().is_empty());
}

#[tokio::test]
async fn patient_tracks_turn_without_announcing() {
    let clinic = ClinicId::new();
    let mut h = Harness::new(ClientRole::Patient, []);
    let t0 = Utc::now();

    h.session.handle(ClientEvent::Operator(OperatorAction::StartTracking {
        clinic_id: clinic,
        ticket_number: 10,
    }));
    for (number, secs) in [(5, 0), (8, 60), (9, 120), (10, 180)] {
        h.session.handle(ClientEvent::Snapshot(snapshot(clinic, number, t0, secs)));
    }
    h.session.handle(emergency(true));
    assert!(!h.session.is_emergency_active(), "patients ignore emergencies");

    let updates = h.drain();
    assert!(announcements(&updates).is_empty());
    let turns: Vec<_> = updates
        .iter()
        .filter_map(|u| match u {
            DisplayUpdate::Turn(t) => Some((t.tier, t.cue)),
            _ => None,
        })
        .collect();
    assert_eq!(
        turns,
        vec![
            (TurnTier::Waiting, None),
            (TurnTier::Approaching, Some(TurnCue::Light)),
            (TurnTier::Approaching, None),
            (TurnTier::Now, Some(TurnCue::Strong)),
        ]
    );
    assert_eq!(
        h.settle().await,
        vec![Clip::Ding, Clip::Ding, Clip::TicketNumber(10), Clip::ClinicNumber(2)]
    );

    h.session.handle(ClientEvent::Operator(OperatorAction::StopTracking));
    assert_eq!(h.drain(), vec![DisplayUpdate::TrackingStopped]);
    assert!(h.session.tracking().is_none());
}

#[tokio::test]
async fn tracking_starts_from_cached_snapshot() {
    let clinic = ClinicId::new();
    let mut h = Harness::new(ClientRole::Display, [clinic]);
    h.session.handle(ClientEvent::Snapshot(snapshot(clinic, 30, Utc::now(), 0)));
    h.drain();

    h.session.handle(ClientEvent::Operator(OperatorAction::StartTracking {
        clinic_id: clinic,
        ticket_number: 32,
    }));
    let updates = h.drain();
    assert!(matches!(
        &updates[..],
        [DisplayUpdate::Turn(t)] if t.remaining == 2 && t.cue == Some(TurnCue::Light)
    ));
    assert_eq!(h.session.tracking().map(|t| t.held_ticket_number), Some(32));
}
