//! The read/write contract of the external clinic store.

use std::future::Future;

use chrono::{DateTime, TimeDelta, Utc};
use queuecall_types::{ClinicId, ClinicState};

use crate::error::StoreError;

/// Keyed store of [`ClinicState`] records.
///
/// Each write is an atomic single-record update; there is no transaction
/// across clinics or fields. Concurrent operators on the same clinic race
/// and the last write wins. Writes return the record as stored.
pub trait ClinicStore: Send + Sync + 'static {
    /// Read the current state of one clinic.
    fn fetch(
        &self,
        clinic_id: ClinicId,
    ) -> impl Future<Output = Result<ClinicState, StoreError>> + Send;

    /// Create or replace a clinic record.
    fn provision(&self, state: ClinicState) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Set the counter to `number` and record a call, in one write.
    ///
    /// A reader never sees the new number with the old call time.
    fn record_call(
        &self,
        clinic_id: ClinicId,
        number: u32,
    ) -> impl Future<Output = Result<ClinicState, StoreError>> + Send;

    /// Set the "now serving" counter without recording a call.
    fn set_current_number(
        &self,
        clinic_id: ClinicId,
        number: u32,
    ) -> impl Future<Output = Result<ClinicState, StoreError>> + Send;

    /// Record that a call happened now.
    fn touch_last_call_time(
        &self,
        clinic_id: ClinicId,
    ) -> impl Future<Output = Result<ClinicState, StoreError>> + Send;

    /// Switch a clinic on or off.
    fn set_active(
        &self,
        clinic_id: ClinicId,
        active: bool,
    ) -> impl Future<Output = Result<ClinicState, StoreError>> + Send;
}

/// Timestamp for a new call that is strictly after `previous`.
///
/// Two calls within the clock's resolution would otherwise share a
/// timestamp and the second one would never be announced.
pub fn next_call_time(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(prev) if prev >= now => prev
            .checked_add_signed(TimeDelta::milliseconds(1))
            .unwrap_or(prev),
        _ => now,
    }
}
