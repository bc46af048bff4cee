//! Exercises the facade surface end-to-end: a [`Service`] registered with
//! a [`registries::Memory`] registry, discovered and called through a
//! [`Client`], talking over a [`transports::Loopback`] pair — the same
//! wiring §6's `NewService`/`NewClient` describe, assembled purely from
//! `microsvc`'s re-exports rather than the individual crates.

use async_trait::async_trait;
use microsvc::transports::{Loopback, TransportOptions};
use microsvc::{
    codecs::CodecRegistry, registries, registries::Registry, CallOptions, Client, Context,
    MethodHandler, RoundRobinSelector, Service, ServiceOptions,
};
use serde_json::{json, Value};
use std::sync::Arc;

struct Echo;

#[async_trait]
impl MethodHandler for Echo {
    async fn call(&self, body: Value, _ctx: &mut Context) -> Result<Value, microsvc::ServiceError> {
        Ok(json!({ "echoed": body }))
    }
}

#[tokio::test]
async fn service_registers_and_client_discovers_and_calls_it() {
    let registry = registries::Memory::new();
    let bind = "loopback:facade-e2e";

    let server_transport = Arc::new(Loopback::new(TransportOptions::new(bind)));
    let service = Service::new(
        ServiceOptions::new("greeter", server_transport)
            .with_registry(registry.clone() as Arc<dyn registries::Registry>),
    );
    service.handle("hello", Arc::new(Echo));
    service.clone().start().await.unwrap();

    let buckets = registry.get_service("greeter", registries::ANY_VERSION).await.unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].nodes.len(), 1);

    let client_transport = Arc::new(Loopback::new(TransportOptions::default()));
    let client = Client::new(
        registry.clone(),
        Arc::new(RoundRobinSelector::new()),
        client_transport,
        Arc::new(CodecRegistry::with_defaults()),
    );

    let response = client
        .call("greeter", "hello", json!({"name": "Ada"}), Some(CallOptions::new()))
        .await
        .unwrap();
    assert_eq!(response, json!({"echoed": {"name": "Ada"}}));

    service.stop().await.unwrap();
    let buckets_after_stop = registry.get_service("greeter", registries::ANY_VERSION).await.unwrap();
    assert!(buckets_after_stop.is_empty());
}

#[tokio::test]
async fn unknown_method_is_reported_as_not_found() {
    let bind = "loopback:facade-e2e-404";
    let transport = Arc::new(Loopback::new(TransportOptions::new(bind)));
    let registry = registries::Memory::new();
    let service = Service::new(
        ServiceOptions::new("greeter", transport)
            .with_registry(registry.clone() as Arc<dyn registries::Registry>),
    );
    service.handle("hello", Arc::new(Echo));
    service.clone().start().await.unwrap();

    let client_transport = Arc::new(Loopback::new(TransportOptions::default()));
    let client = Client::new(
        registry,
        Arc::new(RoundRobinSelector::new()),
        client_transport,
        Arc::new(CodecRegistry::with_defaults()),
    );

    let response = client
        .call("greeter", "does-not-exist", json!({}), None)
        .await
        .unwrap();
    assert_eq!(response["code"], json!("NOT_FOUND"));

    service.stop().await.unwrap();
}
