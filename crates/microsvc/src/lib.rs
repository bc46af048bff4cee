//! microsvc — a microservice toolkit: annotated-style service handlers
//! turned into discoverable, networked RPC endpoints, fronted by an API
//! gateway.
//!
//! This crate is the standard entry point (§6 "Public API"): it
//! re-exports the pieces assembled by the lower-level crates
//! (`microsvc-core`, `microsvc-registry`, `microsvc-broker`,
//! `microsvc-client`, `microsvc-service`, `microsvc-gateway`) under the
//! names the specification uses, organized by concern rather than by
//! crate boundary.
//!
//! # Layers
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   Gateway (reverse proxy, §4.9)          │
//! ├─────────────────────────────────────────┤
//! │   Service runtime + Discovery client     │
//! │   (§4.7, §4.8)                           │
//! ├─────────────────────────────────────────┤
//! │   Registry & Selector │ Broker & PubSub  │
//! │   (§4.4, §4.5)        │ (§4.6)           │
//! ├─────────────────────────────────────────┤
//! │   Context & Middleware chain (§4.3)      │
//! ├─────────────────────────────────────────┤
//! │   Transport + Codec (§4.1, §4.2)         │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use microsvc::{transports, Service, ServiceOptions};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = Arc::new(transports::loopback_default());
//!     let svc = Service::new(ServiceOptions::new("users", transport));
//!     svc.handle(
//!         "create",
//!         Arc::new(microsvc::FnHandler::new(|body, _ctx: &mut microsvc::Context| async move {
//!             Ok(body)
//!         })),
//!     );
//!     svc.start().await.unwrap();
//! }
//! ```

// ===========================================================================
// Transport + Codec (§4.1, §4.2)
// ===========================================================================

pub use microsvc_core::codec;
pub use microsvc_core::context::Context;
pub use microsvc_core::error::{CodecError, PoolError, ServiceError, TransportError};
pub use microsvc_core::middleware;
pub use microsvc_core::task_tracker::TaskTracker;
pub use microsvc_core::transport;

/// §6's `Codecs.{JSON, MsgPack}`.
pub mod codecs {
    pub use microsvc_core::codec::JsonCodec as Json;
    pub use microsvc_core::codec::MsgPackCodec as MsgPack;
    pub use microsvc_core::codec::{Codec, CodecRegistry};
}

/// §6's `Transports.{HTTP, WebSocket, Loopback}`.
pub mod transports {
    pub use microsvc_core::transport::HttpTransport as Http;
    pub use microsvc_core::transport::LoopbackTransport as Loopback;
    pub use microsvc_core::transport::WebSocketTransport as WebSocket;
    pub use microsvc_core::transport::{Handler, Transport, TransportOptions};

    /// Convenience: a loopback transport bound to the default in-process
    /// registry of addresses, suitable for tests and single-process
    /// topologies.
    pub fn loopback_default() -> Loopback {
        Loopback::new(TransportOptions::default())
    }
}

// ===========================================================================
// Registry & Selector (§4.4, §4.5)
// ===========================================================================

/// §6's `Registries.{Memory, Consul}`.
pub mod registries {
    pub use microsvc_registry::consul::ConsulRegistry as Consul;
    pub use microsvc_registry::memory::MemoryRegistry as Memory;
    pub use microsvc_registry::{Event, EventKind, Node, Registry, RegistryError, Service, ANY_VERSION};
}

pub use microsvc_registry::selector::{RandomSelector, RoundRobinSelector, Selector, SelectorError};
pub use microsvc_registry::watcher::{Stopped, WatchItem, Watcher};

// ===========================================================================
// Broker & PubSub (§4.6)
// ===========================================================================

/// §6's `Brokers.{Memory, NATS}`.
pub mod brokers {
    pub use microsvc_broker::memory::MemoryBroker as Memory;
    pub use microsvc_broker::nats::NatsBroker as Nats;
    pub use microsvc_broker::{Broker, BrokerError, DeliveryEvent, Message, PublishOptions, SubscribeOptions};
}

pub use microsvc_broker::topic::topic_matches;

// ===========================================================================
// Service runtime + Discovery client (§4.7, §4.8)
// ===========================================================================

pub use microsvc_client::{Backoff, CallOptions, Client, ClientError};
pub use microsvc_service::{FnHandler, MethodHandler, Service, ServiceOptions, TopicSubscription};

// ===========================================================================
// API Gateway (§4.9)
// ===========================================================================

/// The reverse-proxy front end: route match, per-backend circuit
/// breaker, retry, response cache scaffold, and response
/// transformations. Re-exported as a module so call sites read
/// `gateway::Gateway::builder()`, mirroring §6's `Gateway.Build(...)`.
pub mod gateway {
    pub use microsvc_gateway::*;
}

pub use microsvc_gateway::{Gateway, GatewayBuilder, GatewayError};
