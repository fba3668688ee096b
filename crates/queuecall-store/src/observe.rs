//! Poll-based snapshot stream for one clinic.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt as _;
use futures::stream::BoxStream;
use queuecall_types::{ClinicId, ClinicState};
use tokio::time::{Interval, MissedTickBehavior};

use crate::error::StoreError;
use crate::store::ClinicStore;

/// Smallest accepted poll period.
const MIN_PERIOD: Duration = Duration::from_millis(10);

/// Poll `clinic_id` every `period`, yielding each fetch result.
///
/// The first fetch happens immediately. Failed fetches are yielded as
/// errors and polling continues; the stream never ends on its own.
pub fn observe<S: ClinicStore>(
    store: Arc<S>,
    clinic_id: ClinicId,
    period: Duration,
) -> BoxStream<'static, Result<ClinicState, StoreError>> {
    let period = period.max(MIN_PERIOD);
    futures::stream::unfold(
        (store, None::<Interval>),
        move |(store, ticker)| async move {
            let mut ticker = ticker.unwrap_or_else(|| {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            });
            ticker.tick().await;
            let result = store.fetch(clinic_id).await;
            Some((result, (store, Some(ticker))))
        },
    )
    .boxed()
}
