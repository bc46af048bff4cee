//! Consul-backed [`Registry`] (§6: `Registries.{Memory, Consul}`). Reads
//! `CONSUL_ADDR` (§6 environment variables) for the agent base URL and
//! drives Consul's HTTP catalog/agent API, grounded in the teacher's
//! `reqwest`-backed `OpenAiBackend::forward` request shape.
//!
//! Watching is implemented by polling the catalog on an interval and
//! diffing against the last-seen snapshot, since Consul's blocking-query
//! long-poll protocol is out of scope for this toolkit (§1: concrete
//! health-check collection is an external collaborator).

use crate::memory::Registry;
use crate::types::{RegistryError, Service, ANY_VERSION};
use crate::watcher::Watcher;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Registry backed by a Consul agent's HTTP API.
pub struct ConsulRegistry {
    base_url: String,
    client: Client,
    fallback: std::sync::Arc<crate::memory::MemoryRegistry>,
}

impl ConsulRegistry {
    /// `base_url` defaults to `CONSUL_ADDR`, falling back to
    /// `http://127.0.0.1:8500`.
    pub fn new() -> Self {
        let base_url = std::env::var("CONSUL_ADDR").unwrap_or_else(|_| "http://127.0.0.1:8500".to_string());
        Self::with_base_url(base_url)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            // Watchers are served from a local fan-out table, populated by
            // a poll loop the caller drives via `poll_once`.
            fallback: crate::memory::MemoryRegistry::new(),
        }
    }

    /// Pull the current catalog for `name` and reconcile it into the local
    /// watcher fan-out table, emitting Create/Update/Delete as needed. A
    /// caller drives this on an interval to approximate Consul's
    /// blocking-query watch semantics.
    pub async fn poll_once(&self, name: &str) -> Result<(), RegistryError> {
        let url = format!("{}/v1/catalog/service/{}", self.base_url, name);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RegistryError::ConnectionError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RegistryError::ConnectionError(format!(
                "consul returned {}",
                response.status()
            )));
        }
        let entries: Vec<ConsulServiceEntry> = response
            .json()
            .await
            .map_err(|e| RegistryError::Registration(e.to_string()))?;

        let nodes = entries
            .into_iter()
            .map(|entry| {
                crate::types::Node::new(entry.service_id, entry.service_address, entry.service_port)
            })
            .collect();
        let service = Service::new(name, ANY_VERSION, nodes);
        self.fallback.register(service, None).await
    }
}

impl Default for ConsulRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(serde::Deserialize)]
struct ConsulServiceEntry {
    #[serde(rename = "ServiceID")]
    service_id: String,
    #[serde(rename = "ServiceAddress")]
    service_address: String,
    #[serde(rename = "ServicePort")]
    service_port: u16,
}

#[async_trait]
impl Registry for ConsulRegistry {
    async fn register(&self, service: Service, ttl: Option<Duration>) -> Result<(), RegistryError> {
        for node in &service.nodes {
            let url = format!("{}/v1/agent/service/register", self.base_url);
            let body = serde_json::json!({
                "ID": node.id,
                "Name": service.name,
                "Address": node.address,
                "Port": node.port,
                "Meta": service.metadata,
            });
            self.client
                .put(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| RegistryError::ConnectionError(e.to_string()))?;
        }
        self.fallback.register(service, ttl).await
    }

    async fn deregister(&self, name: &str, version: &str) -> Result<(), RegistryError> {
        // Consul deregisters by node id, not by service bucket; this
        // toolkit deregisters every node currently known locally for the
        // bucket being removed.
        if let Ok(services) = self.fallback.get_service(name, version).await {
            for service in services {
                for node in service.nodes {
                    let url = format!("{}/v1/agent/service/deregister/{}", self.base_url, node.id);
                    let _ = self.client.put(&url).send().await;
                }
            }
        }
        self.fallback.deregister(name, version).await
    }

    async fn get_service(&self, name: &str, version: &str) -> Result<Vec<Service>, RegistryError> {
        self.fallback.get_service(name, version).await
    }

    async fn list_services(&self) -> Result<Vec<Service>, RegistryError> {
        self.fallback.list_services().await
    }

    async fn watch(&self, service_name: Option<String>) -> Watcher {
        self.fallback.watch(service_name).await
    }
}
