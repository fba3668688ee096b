//! Wiring from the store and the bus into a session's event queue.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt as _;
use queuecall_bus::{BroadcastBus, BroadcastTransport, BusError, Subscription};
use queuecall_store::{ClinicStore, observe};
use queuecall_types::{BroadcastEventType, ClinicId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::session::ClientEvent;

/// Poll each clinic in `clinics` every `period` and forward the results.
///
/// One task per clinic. A task ends when `events` is closed.
pub fn spawn_snapshot_feed<S: ClinicStore>(
    store: &Arc<S>,
    clinics: impl IntoIterator<Item = ClinicId>,
    period: Duration,
    events: &mpsc::Sender<ClientEvent>,
) -> Vec<JoinHandle<()>> {
    clinics
        .into_iter()
        .map(|clinic_id| {
            let mut snapshots = observe(Arc::clone(store), clinic_id, period);
            let events = events.clone();
            tokio::spawn(async move {
                while let Some(result) = snapshots.next().await {
                    let event = match result {
                        Ok(state) => ClientEvent::Snapshot(state),
                        Err(e) => {
                            warn!(clinic_id = %clinic_id, error = %e, "clinic snapshot failed");
                            ClientEvent::SnapshotFailed {
                                clinic_id,
                                error: e.to_string(),
                            }
                        }
                    };
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
                debug!(clinic_id = %clinic_id, "snapshot feed stopped");
            })
        })
        .collect()
}

/// Subscribe to every event type on `channel` except `muted`, forwarding
/// decoded broadcasts into `events`.
///
/// Broadcasts are dropped with a warning when the event queue is full.
///
/// # Errors
///
/// Returns [`BusError`] if any subscription cannot be opened.
pub async fn subscribe_broadcasts<T: BroadcastTransport>(
    bus: &BroadcastBus<T>,
    channel: &str,
    muted: &[BroadcastEventType],
    events: &mpsc::Sender<ClientEvent>,
) -> Result<Vec<Subscription>, BusError> {
    let mut subscriptions = Vec::with_capacity(BroadcastEventType::ALL.len());
    for event_type in BroadcastEventType::ALL {
        if muted.contains(&event_type) {
            debug!(event_type = %event_type, "event type muted");
            continue;
        }
        let events = events.clone();
        let subscription = bus
            .subscribe_event(channel, event_type, move |event| {
                if let Err(e) = events.try_send(ClientEvent::Broadcast(event)) {
                    warn!(event_type = %event_type, error = %e, "event queue rejected broadcast");
                }
            })
            .await?;
        subscriptions.push(subscription);
    }
    Ok(subscriptions)
}
