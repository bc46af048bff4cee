//! NATS-backed broker (§6: `Brokers.{Memory, NATS}`). Reads `NATS_URL`
//! (§6 environment variables) and drives `async-nats`'s client, including
//! its native queue-group support (`Client::queue_subscribe`) rather than
//! reimplementing fan-in — `>` multi-segment wildcards are native to NATS
//! subjects, unlike the memory broker (§4.6's "implementations may also
//! support `>`... where the backing broker supports it").
//!
//! `NatsBroker` mirrors [`crate::memory::Broker`]'s `connect`/`disconnect`/
//! `connected`/`publish`/`subscribe` shape but returns its own
//! [`NatsSubscriptionHandle`] rather than [`crate::memory::Subscription`]
//! (whose cancellation is tied to the memory broker's subscriber table) —
//! callers that need to be generic over backend program against the
//! `connect`/`publish` calls directly rather than a shared `Broker` trait
//! object.

use super::memory::SubscriptionHandler;
use super::types::{BrokerError, DeliveryEvent, Message, PublishOptions, SubscribeOptions};
use async_nats::Client;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

pub struct NatsBroker {
    url: String,
    client: Mutex<Option<Client>>,
}

impl NatsBroker {
    /// `url` defaults to `NATS_URL`, falling back to the NATS default
    /// local port.
    pub fn new() -> Self {
        let url = std::env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".to_string());
        Self::with_url(url)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into(), client: Mutex::new(None) }
    }

    pub async fn connect(&self) -> Result<(), BrokerError> {
        let client = async_nats::connect(&self.url)
            .await
            .map_err(|e| BrokerError::ConnectionError(e.to_string()))?;
        *self.client.lock() = Some(client);
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<(), BrokerError> {
        *self.client.lock() = None;
        Ok(())
    }

    pub fn connected(&self) -> bool {
        self.client.lock().is_some()
    }

    fn client(&self) -> Result<Client, BrokerError> {
        self.client.lock().clone().ok_or_else(|| BrokerError::ConnectionError("not connected".to_string()))
    }

    pub async fn publish(
        &self,
        topic: &str,
        message: Message,
        _options: Option<PublishOptions>,
    ) -> Result<(), BrokerError> {
        self.client()?
            .publish(topic.to_string(), message.body.into())
            .await
            .map_err(|e| BrokerError::PublishError(e.to_string()))
    }

    /// `options.queue_group` is handled natively via
    /// `Client::queue_subscribe` rather than an in-process round-robin
    /// cursor, since the NATS server itself load-balances queue groups.
    pub async fn subscribe(
        &self,
        topic: &str,
        handler: SubscriptionHandler,
        options: Option<SubscribeOptions>,
    ) -> Result<NatsSubscriptionHandle, BrokerError> {
        let client = self.client()?;
        let options = options.unwrap_or_else(SubscribeOptions::new);

        let mut subscriber = match &options.queue_group {
            Some(group) => client
                .queue_subscribe(topic.to_string(), group.clone())
                .await
                .map_err(|e| BrokerError::SubscribeError(e.to_string()))?,
            None => client
                .subscribe(topic.to_string())
                .await
                .map_err(|e| BrokerError::SubscribeError(e.to_string()))?,
        };

        let topic_owned = topic.to_string();
        let task = tokio::spawn(async move {
            while let Some(nats_message) = subscriber.next().await {
                let message = Message::new(nats_message.payload.to_vec());
                let event = DeliveryEvent::new(message, topic_owned.clone());
                handler(event).await;
            }
        });

        Ok(NatsSubscriptionHandle { topic: topic.to_string(), queue_group: options.queue_group, task })
    }
}

impl Default for NatsBroker {
    fn default() -> Self {
        Self::new()
    }
}

/// A live NATS subscription's cancel handle.
pub struct NatsSubscriptionHandle {
    pub topic: String,
    pub queue_group: Option<String>,
    task: JoinHandle<()>,
}

impl NatsSubscriptionHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }
}
