//! In-process transport over [`tokio::sync::broadcast`].
//!
//! Every subscriber gets its own receiver on one shared sender, so all
//! handles in the process (think: several open tabs of the same browser)
//! see the same stream, including the publisher itself.
//!
//! If a subscriber falls behind by more than the channel capacity, lagged
//! messages are skipped and it resumes from the oldest retained one.

use futures::StreamExt as _;
use futures::stream::BoxStream;
use queuecall_types::BroadcastMessage;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::error::BusError;
use crate::transport::BroadcastTransport;

/// Capacity of the shared broadcast channel.
const BROADCAST_CAPACITY: usize = 256;

/// A transport that never leaves the current process.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    tx: broadcast::Sender<BroadcastMessage>,
}

impl LocalTransport {
    /// Create a transport with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(BROADCAST_CAPACITY)
    }

    /// Create a transport that retains at most `capacity` undelivered messages
    /// per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Number of live subscriptions across all channels.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastTransport for LocalTransport {
    async fn publish(&self, message: BroadcastMessage) -> Result<(), BusError> {
        // send returns Err only when there are zero receivers, which is
        // normal when no client is listening.
        let delivered = self.tx.send(message).unwrap_or(0);
        debug!(receivers = delivered, "local broadcast published");
        Ok(())
    }

    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<BoxStream<'static, BroadcastMessage>, BusError> {
        let rx = self.tx.subscribe();
        let channel = channel.to_owned();
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(message) => return Some((message, rx)),
                    Err(RecvError::Lagged(n)) => {
                        debug!(skipped = n, "local subscriber lagged, skipping ahead");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .filter(move |message| futures::future::ready(message.channel == channel));
        Ok(stream.boxed())
    }
}
