//! Broker data model (§3 "Broker entities") and error taxonomy (§4.6, §7).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// A published payload plus headers, independent of topic (§3).
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub body: Vec<u8>,
    pub headers: HashMap<String, Vec<String>>,
}

impl Message {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self { body: body.into(), headers: HashMap::new() }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.entry(key.into()).or_default().push(value.into());
        self
    }
}

/// Options accepted by [`crate::memory::Broker::publish`]/`subscribe`
/// (§4.6).
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    pub headers: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Subscribers sharing a queue group receive each message at most once
    /// across the group; `None` means fan-out to every subscriber.
    pub queue_group: Option<String>,
    /// Whether delivery is acknowledged automatically on successful
    /// handler return (default `true`, §4.6).
    pub auto_ack: bool,
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self { queue_group: None, auto_ack: true }
    }

    pub fn with_queue_group(mut self, group: impl Into<String>) -> Self {
        self.queue_group = Some(group.into());
        self
    }

    pub fn with_auto_ack(mut self, auto_ack: bool) -> Self {
        self.auto_ack = auto_ack;
        self
    }
}

/// A single delivery handed to a subscriber's handler, carrying the
/// message, its topic, and an ack handle (§3 "Event (broker)").
#[derive(Debug, Clone)]
pub struct DeliveryEvent {
    pub message: Message,
    pub topic: String,
    acked: Arc<AtomicBool>,
}

impl DeliveryEvent {
    pub fn new(message: Message, topic: impl Into<String>) -> Self {
        Self { message, topic: topic.into(), acked: Arc::new(AtomicBool::new(false)) }
    }

    /// Mark this delivery acknowledged. The memory broker does not act on
    /// redelivery for a missing ack (§4.6: "the memory broker ignores
    /// non-ack") — this flag exists for handlers that want to observe it.
    pub fn ack(&self) {
        self.acked.store(true, Ordering::SeqCst);
    }

    pub fn acked(&self) -> bool {
        self.acked.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BrokerError {
    #[error("broker connection error: {0}")]
    ConnectionError(String),
    #[error("publish error: {0}")]
    PublishError(String),
    #[error("subscribe error: {0}")]
    SubscribeError(String),
}

impl BrokerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, BrokerError::ConnectionError(_))
    }
}
