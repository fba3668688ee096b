//! NATS transport for broadcasts that must reach other machines.
//!
//! A channel maps to the subject `{prefix}.{channel}`, so with the default
//! prefix the operator alerts travel on `queuecall.control-alerts`. Payloads
//! are the JSON-encoded [`BroadcastMessage`].

use futures::StreamExt as _;
use futures::stream::BoxStream;
use queuecall_types::BroadcastMessage;
use tracing::{debug, info};

use crate::error::BusError;
use crate::transport::BroadcastTransport;

/// Default subject prefix.
pub const DEFAULT_SUBJECT_PREFIX: &str = "queuecall";

/// NATS-backed transport.
///
/// Wraps a single NATS connection shared by every subscription.
pub struct NatsTransport {
    client: async_nats::Client,
    prefix: String,
}

impl NatsTransport {
    /// Connect to a NATS server.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Transport`] if the connection cannot be established.
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, BusError> {
        info!(url = url, "connecting to NATS server");
        let client = async_nats::connect(url)
            .await
            .map_err(|e| BusError::Transport(format!("failed to connect to {url}: {e}")))?;
        info!("NATS connection established");
        Ok(Self::new(client, prefix))
    }

    /// Wrap an already connected client.
    pub fn new(client: async_nats::Client, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.to_owned(),
        }
    }

    /// Subject used for `channel`.
    pub fn subject(&self, channel: &str) -> String {
        format!("{}.{channel}", self.prefix)
    }

    /// Decode a raw NATS payload.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Serialization`] if the bytes are not a message.
    pub fn decode(data: &[u8]) -> Result<BroadcastMessage, BusError> {
        Ok(serde_json::from_slice(data)?)
    }
}

impl BroadcastTransport for NatsTransport {
    async fn publish(&self, message: BroadcastMessage) -> Result<(), BusError> {
        let subject = self.subject(&message.channel);
        let payload = serde_json::to_vec(&message)?;
        debug!(
            subject = subject,
            event_type = %message.event_type,
            "publishing broadcast"
        );
        self.client
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| BusError::Transport(format!("failed to publish to {subject}: {e}")))
    }

    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<BoxStream<'static, BroadcastMessage>, BusError> {
        let subject = self.subject(channel);
        let subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .map_err(|e| BusError::Transport(format!("failed to subscribe to {subject}: {e}")))?;
        info!(subject = subject, "subscribed to broadcast subject");

        let stream = subscriber.filter_map(|msg| async move {
            match Self::decode(&msg.payload) {
                Ok(message) => Some(message),
                Err(e) => {
                    debug!(error = %e, "dropping undecodable broadcast");
                    None
                }
            }
        });
        Ok(stream.boxed())
    }
}

impl std::fmt::Debug for NatsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsTransport")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
