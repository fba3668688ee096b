//! `Dragonfly` (Redis-compatible) clinic store.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `clinic:{id}:state` | JSON | Full [`ClinicState`] record |
//!
//! Field-level writes are read-modify-write on the whole record. Two
//! operators updating the same clinic at once race; the last write wins.

use fred::prelude::*;
use queuecall_types::{ClinicId, ClinicState};

use crate::error::StoreError;
use crate::store::{ClinicStore, next_call_time};

/// Connection handle to a `Dragonfly` instance holding clinic records.
#[derive(Clone)]
pub struct DragonflyClinicStore {
    client: Client,
}

impl DragonflyClinicStore {
    /// Connect to `Dragonfly` at the given URL (`redis://host:port[/db]`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed.
    /// Returns [`StoreError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let config = Config::from_url(url)
            .map_err(|e| StoreError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self { client })
    }

    /// Key holding the record for `clinic_id`.
    pub fn key(clinic_id: ClinicId) -> String {
        format!("clinic:{clinic_id}:state")
    }

    async fn write(&self, state: &ClinicState) -> Result<(), StoreError> {
        let json = serde_json::to_string(state)?;
        let key = Self::key(state.clinic_id);
        let _: () = self
            .client
            .set(key.as_str(), json.as_str(), None, None, false)
            .await?;
        Ok(())
    }

    async fn update<F>(&self, clinic_id: ClinicId, apply: F) -> Result<ClinicState, StoreError>
    where
        F: FnOnce(&mut ClinicState) + Send,
    {
        let mut state = self.fetch(clinic_id).await?;
        apply(&mut state);
        self.write(&state).await?;
        Ok(state)
    }
}

impl ClinicStore for DragonflyClinicStore {
    async fn fetch(&self, clinic_id: ClinicId) -> Result<ClinicState, StoreError> {
        let key = Self::key(clinic_id);
        let value: Option<String> = self.client.get(key.as_str()).await?;
        value.map_or_else(
            || Err(StoreError::NotFound(clinic_id)),
            |s| Ok(serde_json::from_str(&s)?),
        )
    }

    async fn provision(&self, state: ClinicState) -> Result<(), StoreError> {
        self.write(&state).await
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

impl std::fmt::Debug for DragonflyClinicStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragonflyClinicStore").finish_non_exhaustive()
    }
}
