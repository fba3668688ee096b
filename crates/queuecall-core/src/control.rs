//! Operator actions: counter changes through the store, alerts through the bus.
//!
//! Counter operations write the store and nothing else; displays discover
//! the change by polling. Alert operations publish one broadcast on the
//! control channel. A failed publish is reported to the caller, never
//! retried.

use std::sync::Arc;

use queuecall_bus::{BroadcastBus, BroadcastTransport, BusError};
use queuecall_store::{ClinicStore, StoreError};
use queuecall_types::{
    AnnouncementKind, BroadcastEvent, ClinicId, ClinicMessage, ClinicState, ClinicTransfer,
    EmergencySignal, NameAlert, PlayInstant, VideoCommand, VoiceBroadcast,
};
use tracing::{info, warn};

/// Errors from operator actions.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// Reading or writing the clinic failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Publishing the alert failed.
    #[error("broadcast failed: {0}")]
    Broadcast(#[from] BusError),

    /// The counter cannot go below zero.
    #[error("clinic {0} counter is already at zero")]
    CounterAtZero(ClinicId),
}

/// The operator console's write side.
pub struct ControlPanel<S, T> {
    store: Arc<S>,
    bus: BroadcastBus<T>,
    channel: String,
}

impl<S: ClinicStore, T: BroadcastTransport> ControlPanel<S, T> {
    /// Create a panel writing to `store` and publishing on `channel`.
    pub fn new(store: Arc<S>, bus: BroadcastBus<T>, channel: impl Into<String>) -> Self {
        Self {
            store,
            bus,
            channel: channel.into(),
        }
    }

    /// Advance the counter by one and call it.
    pub async fn next(&self, clinic_id: ClinicId) -> Result<ClinicState, ControlError> {
        let state = self.store.fetch(clinic_id).await?;
        let number = state.current_number.saturating_add(1);
        self.call(clinic_id, number, AnnouncementKind::Next).await
    }

    /// Step the counter back by one and call it.
    pub async fn previous(&self, clinic_id: ClinicId) -> Result<ClinicState, ControlError> {
        let state = self.store.fetch(clinic_id).await?;
        let Some(number) = state.current_number.checked_sub(1) else {
            return Err(ControlError::CounterAtZero(clinic_id));
        };
        self.call(clinic_id, number, AnnouncementKind::Previous).await
    }

    /// Call the current number again.
    pub async fn repeat(&self, clinic_id: ClinicId) -> Result<ClinicState, ControlError> {
        let state = self.store.touch_last_call_time(clinic_id).await?;
        info!(
            clinic_id = %clinic_id,
            number = state.current_number,
            kind = ?AnnouncementKind::Repeat,
            "calling ticket"
        );
        Ok(state)
    }

    /// Jump to `number` and call it.
    pub async fn call_number(
        &self,
        clinic_id: ClinicId,
        number: u32,
    ) -> Result<ClinicState, ControlError> {
        self.call(clinic_id, number, AnnouncementKind::Special).await
    }

    /// Set the counter to zero without calling anyone.
    pub async fn reset(&self, clinic_id: ClinicId) -> Result<ClinicState, ControlError> {
        let state = self.store.set_current_number(clinic_id, 0).await?;
        info!(clinic_id = %clinic_id, "counter reset");
        Ok(state)
    }

    /// Open or close the clinic.
    pub async fn set_active(
        &self,
        clinic_id: ClinicId,
        active: bool,
    ) -> Result<ClinicState, ControlError> {
        let state = self.store.set_active(clinic_id, active).await?;
        info!(clinic_id = %clinic_id, active, "clinic availability changed");
        Ok(state)
    }

    /// Flip the clinic between open and closed.
    pub async fn toggle_active(&self, clinic_id: ClinicId) -> Result<ClinicState, ControlError> {
        let state = self.store.fetch(clinic_id).await?;
        self.set_active(clinic_id, !state.is_active).await
    }

    /// Call a patient by name.
    pub async fn announce_name(&self, alert: NameAlert) -> Result<(), ControlError> {
        self.publish(BroadcastEvent::NameAlert(alert)).await
    }

    /// Move a ticket to another clinic.
    pub async fn transfer(&self, transfer: ClinicTransfer) -> Result<(), ControlError> {
        self.publish(BroadcastEvent::ClinicTransfer(transfer)).await
    }

    /// Show `text` on displays watching `clinic_id`.
    pub async fn send_message(
        &self,
        clinic_id: ClinicId,
        text: impl Into<String>,
    ) -> Result<(), ControlError> {
        self.publish(BroadcastEvent::ClinicMessage(ClinicMessage {
            clinic_id,
            text: text.into(),
        }))
        .await
    }

    /// Play instant clip `clip` everywhere.
    pub async fn play_instant(&self, clip: u32) -> Result<(), ControlError> {
        self.publish(BroadcastEvent::PlayInstant(PlayInstant { clip }))
            .await
    }

    /// Play a recorded clip everywhere.
    pub async fn voice_broadcast(
        &self,
        clip: impl Into<String>,
        label: Option<String>,
    ) -> Result<(), ControlError> {
        let voice = VoiceBroadcast {
            clip: clip.into(),
            label,
        }
        .validate()
        .map_err(BusError::from)?;
        self.publish(BroadcastEvent::VoiceBroadcast(voice)).await
    }

    /// Drive the video players.
    pub async fn video_control(&self, command: VideoCommand) -> Result<(), ControlError> {
        let command = command.validate().map_err(BusError::from)?;
        self.publish(BroadcastEvent::VideoControl(command)).await
    }

    /// Put every display into emergency mode.
    pub async fn raise_emergency(
        &self,
        clinic_id: Option<ClinicId>,
        note: Option<String>,
    ) -> Result<(), ControlError> {
        self.publish(BroadcastEvent::Emergency(EmergencySignal {
            active: true,
            clinic_id,
            note,
        }))
        .await
    }

    async fn call(
        &self,
        clinic_id: ClinicId,
        number: u32,
        kind: AnnouncementKind,
    ) -> Result<ClinicState, ControlError> {
        let state = self.store.record_call(clinic_id, number).await?;
        info!(clinic_id = %clinic_id, number, kind = ?kind, "calling ticket");
        Ok(state)
    }

    async fn publish(&self, event: BroadcastEvent) -> Result<(), ControlError> {
        let event_type = event.event_type();
        self.bus
            .publish_event(&self.channel, &event)
            .await
            .map_err(|e| {
                warn!(event_type = %event_type, error = %e, "broadcast not delivered");
                ControlError::Broadcast(e)
            })?;
        info!(event_type = %event_type, channel = %self.channel, "broadcast sent");
        Ok(())
    }
}

impl<S, T> std::fmt::Debug for ControlPanel<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPanel")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}
