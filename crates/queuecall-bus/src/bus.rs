//! The broadcast bus: publish and subscribe by channel and event type.
//!
//! The bus does no per-subscriber filtering beyond the event type. Each
//! handler decides for itself whether a payload is addressed to it, and a
//! payload that fails to decode is dropped by that handler alone.

use std::sync::Arc;

use futures::StreamExt as _;
use queuecall_types::{BroadcastEvent, BroadcastEventType, BroadcastMessage};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::BusError;
use crate::transport::BroadcastTransport;

/// Named-channel publish/subscribe over a [`BroadcastTransport`].
pub struct BroadcastBus<T> {
    transport: Arc<T>,
}

impl<T> Clone for BroadcastBus<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: BroadcastTransport> BroadcastBus<T> {
    /// Create a bus over `transport`.
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Publish a raw payload.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if the transport refuses the message. There is
    /// no retry.
    pub async fn publish(
        &self,
        channel: &str,
        event_type: BroadcastEventType,
        payload: serde_json::Value,
    ) -> Result<(), BusError> {
        let message = BroadcastMessage {
            channel: channel.to_owned(),
            event_type,
            payload,
        };
        self.transport.publish(message).await
    }

    /// Publish a typed event.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if the event cannot be encoded or the transport
    /// refuses it.
    pub async fn publish_event(&self, channel: &str, event: &BroadcastEvent) -> Result<(), BusError> {
        let message = event.to_message(channel)?;
        self.transport.publish(message).await
    }

    /// Register `handler` for every `event_type` message on `channel`.
    ///
    /// The handler runs on its own task and sees payloads in the order the
    /// transport delivers them. Dropping the returned [`Subscription`] stops
    /// delivery.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if the transport cannot open the subscription.
    pub async fn subscribe<F>(
        &self,
        channel: &str,
        event_type: BroadcastEventType,
        mut handler: F,
    ) -> Result<Subscription, BusError>
    where
        F: FnMut(serde_json::Value) + Send + 'static,
    {
        let mut stream = self.transport.subscribe(channel).await?;
        let label = channel.to_owned();
        let handle = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                if message.event_type == event_type {
                    handler(message.payload);
                }
            }
            debug!(channel = label, event_type = %event_type, "broadcast stream ended");
        });
        Ok(Subscription {
            channel: channel.to_owned(),
            event_type,
            handle,
        })
    }

    /// Like [`subscribe`](Self::subscribe), but decodes each payload into a
    /// [`BroadcastEvent`] first. Malformed payloads never reach `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if the transport cannot open the subscription.
    pub async fn subscribe_event<F>(
        &self,
        channel: &str,
        event_type: BroadcastEventType,
        mut handler: F,
    ) -> Result<Subscription, BusError>
    where
        F: FnMut(BroadcastEvent) + Send + 'static,
    {
        self.subscribe(channel, event_type, move |payload| {
            match BroadcastEvent::decode(event_type, &payload) {
                Ok(event) => handler(event),
                Err(e) => {
                    debug!(event_type = %event_type, error = %e, "discarding malformed broadcast");
                }
            }
        })
        .await
    }
}

impl<T> std::fmt::Debug for BroadcastBus<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastBus").finish_non_exhaustive()
    }
}

/// Guard for one registered handler. Delivery stops when it is dropped.
#[derive(Debug)]
pub struct Subscription {
    channel: String,
    event_type: BroadcastEventType,
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Channel this subscription listens on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Event type this subscription is filtered to.
    pub const fn event_type(&self) -> BroadcastEventType {
        self.event_type
    }

    /// Whether the delivery task is still running.
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
