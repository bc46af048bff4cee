//! `microsvc-broker`: topic-based pub/sub with wildcard matching and
//! queue-group load balancing (§4.6), plus a NATS-backed implementation.

pub mod memory;
pub mod nats;
pub mod topic;
pub mod types;

pub use memory::{Broker, MemoryBroker, Subscription, SubscriptionHandler};
pub use nats::{NatsBroker, NatsSubscriptionHandle};
pub use topic::topic_matches;
pub use types::{BrokerError, DeliveryEvent, Message, PublishOptions, SubscribeOptions};
