//! In-memory clinic store.
//!
//! Used by single-machine deployments (display and control panel in one
//! process) and by tests. The offline switch makes every operation fail
//! with [`StoreError::Unavailable`] so callers can be exercised against an
//! unreachable store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use queuecall_types::{ClinicId, ClinicState};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::store::{ClinicStore, next_call_time};

/// Process-local [`ClinicStore`].
#[derive(Debug, Default)]
pub struct MemoryClinicStore {
    clinics: RwLock<BTreeMap<ClinicId, ClinicState>>,
    offline: AtomicBool,
}

impl MemoryClinicStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `clinics`.
    pub fn with_clinics(clinics: impl IntoIterator<Item = ClinicState>) -> Self {
        let map = clinics.into_iter().map(|c| (c.clinic_id, c)).collect();
        Self {
            clinics: RwLock::new(map),
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate the store becoming unreachable (or reachable again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("memory store is offline".to_owned()));
        }
        Ok(())
    }

    async fn update<F>(&self, clinic_id: ClinicId, apply: F) -> Result<ClinicState, StoreError>
    where
        F: FnOnce(&mut ClinicState) + Send,
    {
        self.ensure_online()?;
        let mut clinics = self.clinics.write().await;
        let state = clinics
            .get_mut(&clinic_id)
            .ok_or(StoreError::NotFound(clinic_id))?;
        apply(state);
        debug!(
            clinic_id = %clinic_id,
            current_number = state.current_number,
            is_active = state.is_active,
            "clinic updated"
        );
        Ok(state.clone())
    }
}

impl ClinicStore for MemoryClinicStore {
    async fn fetch(&self, clinic_id: ClinicId) -> Result<ClinicState, StoreError> {
        self.ensure_online()?;
        self.clinics
            .read()
            .await
            .get(&clinic_id)
            .cloned()
            .ok_or(StoreError::NotFound(clinic_id))
    }

    async fn provision(&self, state: ClinicState) -> Result<(), StoreError> {
        self.ensure_online()?;
        self.clinics.write().await.insert(state.clinic_id, state);
        Ok(())
    }

    async fn record_call(&self, clinic_id: ClinicId, number: u32) -> Result<ClinicState, StoreError> {
        self.update(clinic_id, |state| {
            state.current_number = number;
            state.last_call_time = Some(next_call_time(state.last_call_time));
        })
        .await
    }

    async fn set_current_number(
        &self,
        clinic_id: ClinicId,
        number: u32,
    ) -> Result<ClinicState, StoreError> {
        self.update(clinic_id, |state| state.current_number = number)
            .await
    }

    async fn touch_last_call_time(&self, clinic_id: ClinicId) -> Result<ClinicState, StoreError> {
        self.update(clinic_id, |state| {
            state.last_call_time = Some(next_call_time(state.last_call_time));
        })
        .await
    }

    async fn set_active(&self, clinic_id: ClinicId, active: bool) -> Result<ClinicState, StoreError> {
        self.update(clinic_id, |state| state.is_active = active).await
    }
}
