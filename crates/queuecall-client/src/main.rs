//! QueueCall client binary.
//!
//! One process is one client: a waiting-room display, an operator console
//! or a patient's tracker, chosen by `client.role` in the configuration.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `queuecall-config.yaml` (or `QUEUECALL_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Open the clinic store (in-memory seed or Dragonfly)
//! 4. Open the broadcast bus (in-process or NATS)
//! 5. Spawn the audio sequencer over the asset player
//! 6. Start the client session and the display renderer
//! 7. Subscribe to broadcasts and start polling watched clinics
//! 8. Run the operator console (control role) until EOF or Ctrl-C

mod console;
mod error;
mod player;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use queuecall_bus::{BroadcastBus, BroadcastTransport, LocalTransport, NatsTransport};
use queuecall_core::config::{LogFormat, SeedClinic, StoreBackend, TransportKind};
use queuecall_core::{
    AudioSequencer, ClientEvent, ClientProfile, ClientRole, ClientSession, ControlPanel,
    DisplayUpdate, OperatorAction, QueueConfig, spawn_snapshot_feed, subscribe_broadcasts,
};
use queuecall_store::{ClinicStore, DragonflyClinicStore, MemoryClinicStore};
use queuecall_types::ClinicId;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::ClientError;
use crate::player::AssetPlayer;

/// Capacity of the session's inbound event queue.
const EVENT_QUEUE_CAPACITY: usize = 256;

/// How long shutdown waits for the session to drain.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Application entry point for a QueueCall client.
///
/// # Errors
///
/// Returns an error if configuration, the store or the bus cannot be
/// initialized.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, config_path) = load_config()?;

    // 2. Initialize structured logging.
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true);
    match config.logging.format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    info!("queuecall-client starting");
    info!(
        path = ?config_path,
        role = ?config.client.role,
        clinics = config.client.clinics.len(),
        store = ?config.store.backend,
        transport = ?config.bus.transport,
        "Configuration loaded"
    );

    // 3. Open the clinic store.
    match config.store.backend {
        StoreBackend::Memory => {
            let store =
                MemoryClinicStore::with_clinics(config.store.seed.iter().map(SeedClinic::to_state));
            info!(seeded = config.store.seed.len(), "In-memory clinic store ready");
            with_store(config, Arc::new(store)).await?;
        }
        StoreBackend::Dragonfly => {
            let url = config.infrastructure.dragonfly_url.clone();
            info!(dragonfly_url = %url, "Connecting to Dragonfly");
            let store = DragonflyClinicStore::connect(&url).await?;
            if !config.store.seed.is_empty() {
                warn!("store.seed is ignored with the dragonfly backend");
            }
            with_store(config, Arc::new(store)).await?;
        }
    }

    info!("queuecall-client shutdown complete");
    Ok(())
}

/// Resolve and load the configuration file.
///
/// Returns the path actually read, or `None` when defaults were used.
fn load_config() -> Result<(QueueConfig, Option<PathBuf>), ClientError> {
    let path = std::env::var("QUEUECALL_CONFIG")
        .map_or_else(|_| PathBuf::from("queuecall-config.yaml"), PathBuf::from);
    if path.exists() {
        let config = QueueConfig::from_file(&path)?;
        Ok((config, Some(path)))
    } else {
        Ok((QueueConfig::parse("")?, None))
    }
}

/// Open the broadcast bus selected in `config`, then run the client.
async fn with_store<S: ClinicStore>(config: QueueConfig, store: Arc<S>) -> Result<(), ClientError> {
    match config.bus.transport {
        TransportKind::Local => {
            info!("Using in-process broadcast bus");
            run(config, store, BroadcastBus::new(LocalTransport::new())).await
        }
        TransportKind::Nats => {
            let url = config.infrastructure.nats_url.clone();
            info!(nats_url = %url, prefix = %config.bus.subject_prefix, "Connecting to NATS");
            let transport = NatsTransport::connect(&url, &config.bus.subject_prefix).await?;
            run(config, store, BroadcastBus::new(transport)).await
        }
    }
}

/// Wire the session to `store` and `bus` and run until shutdown.
async fn run<S: ClinicStore, T: BroadcastTransport>(
    config: QueueConfig,
    store: Arc<S>,
    bus: BroadcastBus<T>,
) -> Result<(), ClientError> {
    // 5. Audio.
    let sequencer = AudioSequencer::spawn(AssetPlayer::new(&config.audio));
    info!(
        asset_dir = %config.audio.asset_dir.display(),
        speaker = cfg!(feature = "speaker"),
        "Audio sequencer started"
    );

    // 6. Session and renderer.
    let profile = ClientProfile::new(config.client.role, config.client.clinics.iter().copied());
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let session = ClientSession::new(profile, sequencer, updates_tx)
        .with_predictor_config(config.predictor.clone());
    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let session_handle = tokio::spawn(session.run(events_rx));
    let render_handle = tokio::spawn(render(updates_rx));

    let mut polled: BTreeSet<ClinicId> = config.client.clinics.iter().copied().collect();
    if let Some(tracking) = config.client.tracking {
        polled.insert(tracking.clinic_id);
        let start = ClientEvent::Operator(OperatorAction::StartTracking {
            clinic_id: tracking.clinic_id,
            ticket_number: tracking.ticket_number,
        });
        if events_tx.send(start).await.is_err() {
            warn!("session stopped before tracking started");
        }
    }

    // 7. Feeds.
    let subscriptions = subscribe_broadcasts(
        &bus,
        &config.bus.channel,
        &config.bus.muted_events,
        &events_tx,
    )
    .await?;
    info!(
        subscriptions = subscriptions.len(),
        channel = %config.bus.channel,
        "Broadcast subscriptions open"
    );
    let feeds = spawn_snapshot_feed(
        &store,
        polled.iter().copied(),
        Duration::from_millis(config.store.poll_interval_ms),
        &events_tx,
    );
    info!(
        clinics = feeds.len(),
        poll_interval_ms = config.store.poll_interval_ms,
        "Snapshot feeds started"
    );

    // 8. Console or wait.
    if config.client.role == ClientRole::Control {
        let panel = ControlPanel::new(Arc::clone(&store), bus.clone(), config.bus.channel.clone());
        println!("{}", console::USAGE);
        tokio::select! {
            result = console::run(&panel, store.as_ref(), &events_tx) => result?,
            signal = tokio::signal::ctrl_c() => signal?,
        }
    } else {
        tokio::signal::ctrl_c().await?;
    }

    info!("Shutting down");
    drop(subscriptions);
    for feed in feeds {
        feed.abort();
    }
    drop(events_tx);
    if tokio::time::timeout(SHUTDOWN_GRACE, session_handle).await.is_err() {
        warn!("session did not stop in time");
    }
    render_handle.abort();
    Ok(())
}

/// Log what a front-end would render.
async fn render(mut updates: mpsc::UnboundedReceiver<DisplayUpdate>) {
    while let Some(update) = updates.recv().await {
        match update {
            DisplayUpdate::Announcement(a) => info!(
                kind = ?a.kind,
                ticket = ?a.ticket_number,
                clinic = ?a.clinic_number,
                "Call-out"
            ),
            DisplayUpdate::ClinicUpdated(s) => info!(
                clinic = %s.display_name,
                number = s.current_number,
                active = s.is_active,
                "Clinic"
            ),
            DisplayUpdate::EmergencyAlert(s) => {
                warn!(trigger = ?s.trigger, note = ?s.note, "EMERGENCY");
            }
            DisplayUpdate::EmergencyCleared => info!("Emergency cleared"),
            DisplayUpdate::ClinicMessage(m) => info!(clinic_id = %m.clinic_id, text = %m.text, "Message"),
            DisplayUpdate::NameAlert(n) => info!(name = %n.name, clinic = %n.clinic_label, "Name call"),
            DisplayUpdate::Transfer(t) => info!(
                ticket = t.ticket_number,
                to_clinic_number = t.to_clinic_number,
                "Transfer"
            ),
            DisplayUpdate::VoiceBroadcast(v) => info!(clip = %v.clip, label = ?v.label, "Voice broadcast"),
            DisplayUpdate::Video(command) => info!(command = ?command, "Video"),
            DisplayUpdate::Turn(t) => info!(
                tier = ?t.tier,
                remaining = t.remaining,
                wait_secs = ?t.estimated_wait.map(|d| d.as_secs()),
                "Turn"
            ),
            DisplayUpdate::TrackingStopped => info!("Tracking stopped"),
        }
    }
}
