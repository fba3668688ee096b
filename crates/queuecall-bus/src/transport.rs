//! The seam between the bus and whatever actually moves messages.

use std::future::Future;

use futures::stream::BoxStream;
use queuecall_types::BroadcastMessage;

use crate::error::BusError;

/// A fire-and-forget publish/subscribe transport.
///
/// Implementations deliver at most once, with no retry and no persistence.
/// A subscriber sees only messages published after its subscription was
/// established, including the ones it published itself.
pub trait BroadcastTransport: Send + Sync + 'static {
    /// Hand a message to the transport.
    ///
    /// `Ok` means the transport accepted it, not that anyone received it.
    fn publish(&self, message: BroadcastMessage) -> impl Future<Output = Result<(), BusError>> + Send;

    /// Open a stream of every message published on `channel`.
    fn subscribe(
        &self,
        channel: &str,
    ) -> impl Future<Output = Result<BoxStream<'static, BroadcastMessage>, BusError>> + Send;
}
