//! `ServiceOptions`: the builder-style configuration surface (§6's
//! `NewService(options)`), matching `mofa-kernel::gateway::GatewayConfig`'s
//! `with_x` method style.

use futures::future::BoxFuture;
use microsvc_broker::{Broker, DeliveryEvent, SubscribeOptions, SubscriptionHandler};
use microsvc_core::codec::CodecRegistry;
use microsvc_core::middleware::{MiddlewareChain, MiddlewareRegistry};
use microsvc_core::transport::Transport;
use microsvc_registry::Registry;
use std::sync::Arc;
use std::time::Duration;

/// A topic subscription declared up front on [`ServiceOptions`], driven by
/// [`crate::Service::start`]'s "subscribe topics" step (§4.7) rather than a
/// manual post-start [`crate::Service::subscribe`] call.
pub struct TopicSubscription {
    pub topic: String,
    pub handler: SubscriptionHandler,
    pub options: Option<SubscribeOptions>,
}

/// Configuration consumed by [`crate::Service::new`]. `registry` and
/// `broker` are optional: a service with neither still runs, it just can't
/// be discovered or `Subscribe` to topics.
pub struct ServiceOptions {
    pub name: String,
    pub version: String,
    pub transport: Arc<dyn Transport>,
    pub codecs: Arc<CodecRegistry>,
    pub middleware: MiddlewareChain,
    pub middleware_registry: MiddlewareRegistry,
    pub registry: Option<Arc<dyn Registry>>,
    pub broker: Option<Arc<dyn Broker>>,
    /// Registration TTL when `registry` is set (§4.4).
    pub registration_ttl: Option<Duration>,
    /// Topics subscribed automatically during `start()` (§4.7 "subscribe
    /// topics"), in declaration order.
    pub topic_subscriptions: Vec<TopicSubscription>,
}

impl ServiceOptions {
    pub fn new(name: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            name: name.into(),
            version: "1.0.0".to_string(),
            transport,
            codecs: Arc::new(CodecRegistry::with_defaults()),
            middleware: MiddlewareChain::new(),
            middleware_registry: MiddlewareRegistry::new(),
            registry: None,
            broker: None,
            registration_ttl: None,
            topic_subscriptions: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_codecs(mut self, codecs: Arc<CodecRegistry>) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn with_middleware(mut self, middleware: MiddlewareChain) -> Self {
        self.middleware = middleware;
        self
    }

    pub fn with_middleware_registry(mut self, registry: MiddlewareRegistry) -> Self {
        self.middleware_registry = registry;
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_broker(mut self, broker: Arc<dyn Broker>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn with_registration_ttl(mut self, ttl: Duration) -> Self {
        self.registration_ttl = Some(ttl);
        self
    }

    /// Declare a topic to subscribe during `start()`'s "subscribe topics"
    /// step (§4.7), instead of calling `Service::subscribe` by hand after
    /// the service is already running.
    pub fn with_subscription(
        mut self,
        topic: impl Into<String>,
        handler: impl Fn(DeliveryEvent) -> BoxFuture<'static, ()> + Send + Sync + 'static,
        options: Option<SubscribeOptions>,
    ) -> Self {
        self.topic_subscriptions.push(TopicSubscription {
            topic: topic.into(),
            handler: Arc::new(handler),
            options,
        });
        self
    }
}
