//! The service runtime (§4.7): binds a handler table to a transport, runs
//! the request lifecycle, and manages a start/stop/subscribe lifecycle.

use crate::handler::MethodHandler;
use crate::options::ServiceOptions;
use async_trait::async_trait;
use futures::future::BoxFuture;
use microsvc_broker::{Broker, DeliveryEvent, SubscribeOptions, Subscription};
use microsvc_core::transport::{Handler, Transport, TransportRequest, TransportResponse};
use microsvc_core::{Context, ServiceError};
use microsvc_registry::{Node, Registry, Service as RegistryService};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// A running (or not-yet-started) microservice: the runtime piece behind
/// §6's `NewService`/`Service.{Start,Stop,Handle,Subscribe}`.
pub struct Service {
    options: ServiceOptions,
    handlers: RwLock<HashMap<String, Arc<dyn MethodHandler>>>,
    subscriptions: Mutex<Vec<Subscription>>,
    started: AtomicBool,
}

impl Service {
    pub fn new(options: ServiceOptions) -> Arc<Self> {
        Arc::new(Self {
            options,
            handlers: RwLock::new(HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    /// Register a handler for `method`. Overwrites any previous handler of
    /// the same name.
    pub fn handle(&self, method: impl Into<String>, handler: Arc<dyn MethodHandler>) {
        self.handlers.write().insert(method.into(), handler);
    }

    /// Subscribe to `topic` on the configured broker (§6), tracking the
    /// resulting [`Subscription`] so [`Service::stop`] can cancel it.
    pub async fn subscribe(
        self: Arc<Self>,
        topic: &str,
        handler: impl Fn(DeliveryEvent) -> BoxFuture<'static, ()> + Send + Sync + 'static,
        options: Option<SubscribeOptions>,
    ) -> Result<(), ServiceError> {
        let broker = self
            .options
            .broker
            .as_ref()
            .ok_or_else(|| ServiceError::Internal("service has no broker configured".to_string()))?;
        let subscription = broker
            .subscribe(topic, Arc::new(handler), options)
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        self.subscriptions.lock().push(subscription);
        Ok(())
    }

    /// Idempotent: starting an already-started service is a no-op. Follows
    /// §4.7's order: start transport, connect broker, subscribe declared
    /// topics, register.
    pub async fn start(self: Arc<Self>) -> Result<(), ServiceError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.options
            .transport
            .listen(self.clone() as Arc<dyn Handler>)
            .await
            .map_err(ServiceError::from)?;

        if let Some(broker) = &self.options.broker {
            broker.connect().await.map_err(|e| ServiceError::Internal(e.to_string()))?;

            for declared in &self.options.topic_subscriptions {
                let subscription = broker
                    .subscribe(&declared.topic, declared.handler.clone(), declared.options.clone())
                    .await
                    .map_err(|e| ServiceError::Internal(e.to_string()))?;
                self.subscriptions.lock().push(subscription);
            }
        }

        if let Some(registry) = &self.options.registry {
            let address = self.options.transport.bound_address().unwrap_or_default();
            let (host, port) = split_host_port(&address);
            let node = Node::new(format!("{}-{}", self.options.name, uuid::Uuid::new_v4()), host, port);
            let service = RegistryService::new(self.options.name.clone(), self.options.version.clone(), vec![node]);
            registry
                .register(service, self.options.registration_ttl)
                .await
                .map_err(|e| ServiceError::Internal(e.to_string()))?;
        }

        info!(service = %self.options.name, "service started");
        Ok(())
    }

    /// Idempotent: stopping a never-started (or already-stopped) service is
    /// a no-op. Follows §4.7's order: unsubscribe, disconnect broker,
    /// deregister, stop transport.
    pub async fn stop(self: Arc<Self>) -> Result<(), ServiceError> {
        if !self.started.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        for subscription in self.subscriptions.lock().drain(..) {
            subscription.cancel();
        }

        if let Some(broker) = &self.options.broker {
            if let Err(e) = broker.disconnect().await {
                warn!(service = %self.options.name, error = %e, "broker disconnect failed during stop");
            }
        }

        if let Some(registry) = &self.options.registry {
            if let Err(e) = registry.deregister(&self.options.name, &self.options.version).await {
                warn!(service = %self.options.name, error = %e, "deregister failed during stop");
            }
        }

        self.options.transport.stop().await.map_err(ServiceError::from)?;
        info!(service = %self.options.name, "service stopped");
        Ok(())
    }

    /// Parse `/<method>` (or `/<service>/<method>`, the leading segment
    /// ignored if it equals this service's name) out of the request path.
    fn resolve_method<'a>(&self, path: &'a str) -> Option<&'a str> {
        let trimmed = path.trim_start_matches('/');
        let mut segments = trimmed.split('/').filter(|s| !s.is_empty());
        let first = segments.next()?;
        match segments.next() {
            Some(second) if first == self.options.name => Some(second),
            Some(_) => None,
            None => Some(first),
        }
    }
}

fn split_host_port(address: &str) -> (String, u16) {
    match address.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().unwrap_or(0)),
        None => (address.to_string(), 0),
    }
}

#[async_trait]
impl Handler for Service {
    /// §4.7's request lifecycle: parse the method out of the path (404 on
    /// miss), negotiate and decode the body, run the middleware chain,
    /// invoke the handler, then encode the response with the negotiated
    /// codec.
    async fn handle(&self, request: TransportRequest) -> TransportResponse {
        let content_type_header = request.header("content-type").map(str::to_string);
        let accept_header = request.header("accept").map(str::to_string);

        let Some(method) = self.resolve_method(&request.path) else {
            return error_response(&self.options.codecs, 404, "route not found", "NOT_FOUND");
        };
        let Some(handler) = self.handlers.read().get(method).cloned() else {
            return error_response(&self.options.codecs, 404, "method not found", "NOT_FOUND");
        };

        let request_codec = match self.options.codecs.negotiate(content_type_header.as_deref(), None, &request.body) {
            Ok(codec) => codec,
            Err(e) => return error_response(&self.options.codecs, 400, &e.to_string(), "BAD_REQUEST"),
        };
        let body = match request_codec.unmarshal(&request.body) {
            Ok(value) => value,
            Err(e) => return error_response(&self.options.codecs, 400, &e.to_string(), "BAD_REQUEST"),
        };

        let response_codec = match self.options.codecs.negotiate(None, accept_header.as_deref(), &[]) {
            Ok(codec) => codec,
            Err(_) => request_codec.clone(),
        };

        let mut ctx = Context::new(request);
        let codecs = self.options.codecs.clone();
        let response_codec_for_terminal = response_codec.clone();

        self.options
            .middleware
            .run(&mut ctx, &self.options.middleware_registry, move |ctx: &mut Context| {
                let handler = handler.clone();
                let body = body.clone();
                let response_codec = response_codec_for_terminal.clone();
                Box::pin(async move {
                    match handler.call(body, ctx).await {
                        Ok(value) => match response_codec.marshal(&value) {
                            Ok(bytes) => {
                                let response = std::mem::take(&mut ctx.response);
                                ctx.response = response
                                    .with_header("content-type", response_codec.content_type())
                                    .with_body(bytes);
                                ctx.response.status = 200;
                            }
                            Err(e) => ctx.set_error(ServiceError::Internal(e.to_string())),
                        },
                        Err(e) => ctx.set_error(e),
                    }
                })
            })
            .await;

        if let Some(error) = ctx.take_error() {
            return error_response(&codecs, error.status_code(), &error.to_string(), error.code());
        }
        ctx.response
    }
}

fn error_response(codecs: &Arc<microsvc_core::codec::CodecRegistry>, status: u16, message: &str, code: &str) -> TransportResponse {
    let body = serde_json::json!({ "error": message, "code": code });
    let codec = codecs.default_codec();
    let (content_type, bytes) = match &codec {
        Some(codec) => (codec.content_type().to_string(), codec.marshal(&body).unwrap_or_default()),
        None => ("application/json".to_string(), serde_json::to_vec(&body).unwrap_or_default()),
    };
    TransportResponse::new(status).with_header("content-type", content_type).with_body(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use microsvc_core::transport::{LoopbackTransport, TransportOptions};
    use std::sync::atomic::AtomicU32;

    struct Echo;

    #[async_trait]
    impl MethodHandler for Echo {
        async fn call(&self, body: Value, _ctx: &mut Context) -> Result<Value, ServiceError> {
            Ok(body)
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl MethodHandler for AlwaysFails {
        async fn call(&self, _body: Value, _ctx: &mut Context) -> Result<Value, ServiceError> {
            Err(ServiceError::Validation("bad input".to_string()))
        }
    }

    fn transport() -> Arc<LoopbackTransport> {
        Arc::new(LoopbackTransport::new(TransportOptions::new(format!(
            "loopback:service-test-{}",
            uuid::Uuid::new_v4()
        ))))
    }

    #[tokio::test]
    async fn start_is_idempotent_and_serves_registered_handler() {
        let service = Service::new(ServiceOptions::new("users", transport()));
        service.handle("echo", Arc::new(Echo));
        service.clone().start().await.unwrap();
        service.clone().start().await.unwrap();

        let request = TransportRequest::new("POST", "/users/echo")
            .with_header("content-type", "application/json")
            .with_body(serde_json::to_vec(&serde_json::json!({"x": 1})).unwrap());
        let response = service.handle_request_for_test(request).await;
        assert_eq!(response.status, 200);

        service.clone().stop().await.unwrap();
        service.stop().await.unwrap();
    }

    #[tokio::test]
    async fn missing_method_is_404() {
        let service = Service::new(ServiceOptions::new("users", transport()));
        service.clone().start().await.unwrap();
        let request = TransportRequest::new("POST", "/users/ghost");
        let response = service.handle_request_for_test(request).await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn handler_error_maps_to_its_status_code() {
        let service = Service::new(ServiceOptions::new("users", transport()));
        service.handle("create", Arc::new(AlwaysFails));
        service.clone().start().await.unwrap();
        let request = TransportRequest::new("POST", "/users/create")
            .with_header("content-type", "application/json")
            .with_body(b"{}".to_vec());
        let response = service.handle_request_for_test(request).await;
        assert_eq!(response.status, 422);
    }

    #[tokio::test]
    async fn self_registers_with_the_configured_registry() {
        let registry = microsvc_registry::MemoryRegistry::new();
        let service = Service::new(ServiceOptions::new("users", transport()).with_registry(registry.clone()));
        service.clone().start().await.unwrap();
        let found = registry.get_service("users", "1.0.0").await.unwrap();
        assert_eq!(found.len(), 1);
        service.stop().await.unwrap();
        assert!(registry.get_service("users", "1.0.0").await.is_err());
    }

    #[tokio::test]
    async fn start_connects_the_broker_and_subscribes_declared_topics() {
        let broker = microsvc_broker::MemoryBroker::new();
        assert!(!broker.connected());

        let received = Arc::new(AtomicU32::new(0));
        let received_clone = received.clone();
        let options = ServiceOptions::new("users", transport()).with_broker(broker.clone()).with_subscription(
            "users.created",
            move |_event| {
                let received = received_clone.clone();
                Box::pin(async move {
                    received.fetch_add(1, Ordering::SeqCst);
                })
            },
            None,
        );
        let service = Service::new(options);
        service.clone().start().await.unwrap();
        assert!(broker.connected());

        broker
            .publish("users.created", microsvc_broker::Message::new(b"{}".to_vec()), None)
            .await
            .unwrap();
        assert_eq!(received.load(Ordering::SeqCst), 1);

        service.stop().await.unwrap();
        assert!(!broker.connected());
    }

    #[tokio::test]
    async fn subscribe_without_a_broker_is_an_error() {
        let service = Service::new(ServiceOptions::new("users", transport()));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let err = service
            .clone()
            .subscribe(
                "events",
                move |_event| {
                    let counter = counter_clone.clone();
                    Box::pin(async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                    })
                },
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    impl Service {
        async fn handle_request_for_test(&self, request: TransportRequest) -> TransportResponse {
            Handler::handle(self, request).await
        }
    }
}
