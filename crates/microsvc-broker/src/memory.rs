//! The `Broker` contract and its in-memory implementation (§4.6):
//! synchronous in-process delivery honoring wildcard topic matching and
//! queue-group fan-in.

use super::topic::topic_matches;
use super::types::{BrokerError, DeliveryEvent, Message, PublishOptions, SubscribeOptions};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Invoked once per delivery. Boxed so subscribers can close over
/// arbitrary state (a channel sender, a counter, an ack-tracking struct).
pub type SubscriptionHandler = Arc<dyn Fn(DeliveryEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// Pub/sub contract (§4.6): `connect`/`disconnect`/`connected`, topic
/// publish, wildcard subscribe with optional queue-group load balancing.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn connect(&self) -> Result<(), BrokerError>;
    async fn disconnect(&self) -> Result<(), BrokerError>;
    fn connected(&self) -> bool;

    async fn publish(
        &self,
        topic: &str,
        message: Message,
        options: Option<PublishOptions>,
    ) -> Result<(), BrokerError>;

    async fn subscribe(
        &self,
        topic: &str,
        handler: SubscriptionHandler,
        options: Option<SubscribeOptions>,
    ) -> Result<Subscription, BrokerError>;
}

struct SubscriberEntry {
    topic_pattern: String,
    queue_group: Option<String>,
    handler: SubscriptionHandler,
    cancelled: Arc<AtomicBool>,
}

/// A live subscription; references its topic and optional queue group and
/// is independently cancellable (§3).
pub struct Subscription {
    id: u64,
    pub topic: String,
    pub queue_group: Option<String>,
    cancelled: Arc<AtomicBool>,
    registry: Arc<DashMap<u64, SubscriberEntry>>,
}

impl Subscription {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.registry.remove(&self.id);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// In-process broker: synchronous delivery, `*`/`>` wildcard matching,
/// round-robin queue-group fan-in.
pub struct MemoryBroker {
    connected: AtomicBool,
    subscribers: Arc<DashMap<u64, SubscriberEntry>>,
    next_id: AtomicU64,
    group_cursors: DashMap<String, AtomicUsize>,
}

impl MemoryBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(false),
            subscribers: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            group_cursors: DashMap::new(),
        })
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn connect(&self) -> Result<(), BrokerError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BrokerError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(
        &self,
        topic: &str,
        message: Message,
        _options: Option<PublishOptions>,
    ) -> Result<(), BrokerError> {
        if !self.connected() {
            return Err(BrokerError::ConnectionError("not connected".to_string()));
        }

        // Snapshot matching subscribers, partitioned by queue group.
        let mut fan_out: Vec<(u64, SubscriptionHandler)> = Vec::new();
        let mut groups: std::collections::HashMap<String, Vec<(u64, SubscriptionHandler)>> =
            std::collections::HashMap::new();

        for entry in self.subscribers.iter() {
            if entry.cancelled.load(Ordering::SeqCst) {
                continue;
            }
            if !topic_matches(&entry.topic_pattern, topic) {
                continue;
            }
            match &entry.queue_group {
                None => fan_out.push((*entry.key(), entry.handler.clone())),
                Some(group) => groups
                    .entry(group.clone())
                    .or_default()
                    .push((*entry.key(), entry.handler.clone())),
            }
        }

        let mut deliveries: Vec<BoxFuture<'static, ()>> = Vec::new();
        for (id, handler) in fan_out {
            let event = DeliveryEvent::new(message.clone(), topic);
            let _ = id;
            deliveries.push(handler(event));
        }

        for (group, members) in groups {
            if members.is_empty() {
                continue;
            }
            let cursor = self.group_cursors.entry(group).or_insert_with(|| AtomicUsize::new(0));
            let index = cursor.fetch_add(1, Ordering::SeqCst) % members.len();
            let (_, handler) = &members[index];
            let event = DeliveryEvent::new(message.clone(), topic);
            deliveries.push(handler(event));
        }

        join_all(deliveries).await;
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: SubscriptionHandler,
        options: Option<SubscribeOptions>,
    ) -> Result<Subscription, BrokerError> {
        if !self.connected() {
            return Err(BrokerError::ConnectionError("not connected".to_string()));
        }
        let options = options.unwrap_or_else(SubscribeOptions::new);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cancelled = Arc::new(AtomicBool::new(false));
        self.subscribers.insert(
            id,
            SubscriberEntry {
                topic_pattern: topic.to_string(),
                queue_group: options.queue_group.clone(),
                handler,
                cancelled: cancelled.clone(),
            },
        );
        Ok(Subscription {
            id,
            topic: topic.to_string(),
            queue_group: options.queue_group,
            cancelled,
            registry: self.subscribers.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn counting_handler(counter: Arc<AtomicU32>) -> SubscriptionHandler {
        Arc::new(move |_event| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test]
    async fn publish_while_disconnected_is_a_connection_error() {
        let broker = MemoryBroker::new();
        let err = broker.publish("x", Message::new(b"hi".to_vec()), None).await.unwrap_err();
        assert!(matches!(err, BrokerError::ConnectionError(_)));
    }

    #[tokio::test]
    async fn wildcard_subscribers_receive_matching_topics_only() {
        let broker = MemoryBroker::new();
        broker.connect().await.unwrap();

        let s1_count = Arc::new(AtomicU32::new(0));
        let s2_count = Arc::new(AtomicU32::new(0));
        let _s1 = broker.subscribe("user.*", counting_handler(s1_count.clone()), None).await.unwrap();
        let _s2 = broker.subscribe("*.login", counting_handler(s2_count.clone()), None).await.unwrap();

        broker.publish("user.login", Message::new(b"".to_vec()), None).await.unwrap();
        assert_eq!(s1_count.load(Ordering::SeqCst), 1);
        assert_eq!(s2_count.load(Ordering::SeqCst), 1);

        broker.publish("user.signup", Message::new(b"".to_vec()), None).await.unwrap();
        assert_eq!(s1_count.load(Ordering::SeqCst), 2);
        assert_eq!(s2_count.load(Ordering::SeqCst), 1);

        broker.publish("system.alert", Message::new(b"".to_vec()), None).await.unwrap();
        assert_eq!(s1_count.load(Ordering::SeqCst), 2);
        assert_eq!(s2_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn queue_group_load_balances_while_plain_subscriber_gets_everything() {
        let broker = MemoryBroker::new();
        broker.connect().await.unwrap();

        let counts: Vec<Arc<AtomicU32>> = (0..3).map(|_| Arc::new(AtomicU32::new(0))).collect();
        let mut subs = Vec::new();
        for count in &counts {
            subs.push(
                broker
                    .subscribe(
                        "jobs",
                        counting_handler(count.clone()),
                        Some(SubscribeOptions::new().with_queue_group("workers")),
                    )
                    .await
                    .unwrap(),
            );
        }
        let fan_out_count = Arc::new(AtomicU32::new(0));
        let _fan_out_sub = broker.subscribe("jobs", counting_handler(fan_out_count.clone()), None).await.unwrap();

        for _ in 0..300 {
            broker.publish("jobs", Message::new(b"".to_vec()), None).await.unwrap();
        }

        let total: u32 = counts.iter().map(|c| c.load(Ordering::SeqCst)).sum();
        assert_eq!(total, 300);
        for count in &counts {
            let value = count.load(Ordering::SeqCst);
            assert!((99..=101).contains(&value), "expected ~100, got {value}");
        }
        assert_eq!(fan_out_count.load(Ordering::SeqCst), 300);
    }

    #[tokio::test]
    async fn cancelled_subscription_stops_receiving() {
        let broker = MemoryBroker::new();
        broker.connect().await.unwrap();
        let count = Arc::new(AtomicU32::new(0));
        let sub = broker.subscribe("topic", counting_handler(count.clone()), None).await.unwrap();
        broker.publish("topic", Message::new(b"".to_vec()), None).await.unwrap();
        sub.cancel();
        broker.publish("topic", Message::new(b"".to_vec()), None).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ack_flag_round_trips_through_delivery_event() {
        let broker = MemoryBroker::new();
        broker.connect().await.unwrap();
        let handler: SubscriptionHandler = Arc::new(|event: DeliveryEvent| {
            Box::pin(async move {
                assert!(!event.acked());
                event.ack();
                assert!(event.acked());
            })
        });
        let _sub = broker
            .subscribe("topic", handler, Some(SubscribeOptions::new().with_auto_ack(false)))
            .await
            .unwrap();
        broker.publish("topic", Message::new(b"".to_vec()), None).await.unwrap();
    }
}
