//! The `Registry` contract and its in-memory implementation (§4.4): a
//! guarded map `(name, version) → bucket` plus a watcher list, TTL-based
//! eviction, and a small stats surface (**[EXPANSION]**, grounded in
//! `mofa-runtime::agent::registry::AgentRegistry::stats`).

use super::types::{Event, EventKind, RegistryError, Service, ANY_VERSION};
use super::watcher::Watcher;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Service discovery contract (§4.4): register/deregister/lookup/watch.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Upsert `(service.name, service.version)` with `service.nodes`. An
    /// optional `ttl` schedules eviction unless refreshed by another
    /// `register` call before it elapses.
    async fn register(&self, service: Service, ttl: Option<Duration>) -> Result<(), RegistryError>;

    /// Remove `(name, version)`, regardless of its current node set.
    async fn deregister(&self, name: &str, version: &str) -> Result<(), RegistryError>;

    /// All buckets whose name matches; filtered to `version` unless it's
    /// [`ANY_VERSION`].
    async fn get_service(&self, name: &str, version: &str) -> Result<Vec<Service>, RegistryError>;

    /// Every registered bucket.
    async fn list_services(&self) -> Result<Vec<Service>, RegistryError>;

    /// Open an event stream scoped to `service_name`, or every service if
    /// `None`.
    async fn watch(&self, service_name: Option<String>) -> Watcher;
}

/// Introspection surface (**[EXPANSION]**): counts and a per-version
/// listing, without touching the hot registration/lookup path.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RegistryStats {
    pub service_count: usize,
    pub node_count: usize,
    pub names: Vec<String>,
}

struct Bucket {
    service: Service,
    expires_at: Option<tokio::time::Instant>,
}

struct State {
    buckets: HashMap<(String, String), Bucket>,
    watchers: Vec<Watcher>,
}

/// In-memory [`Registry`]: a single lock guards the bucket map; events fan
/// out to watchers after the lock is released (§4.4's "hold the map lock
/// briefly, then fan out events outside the lock").
pub struct MemoryRegistry {
    state: Mutex<State>,
    watcher_queue_capacity: usize,
    sweep: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryRegistry {
    pub fn new() -> Arc<Self> {
        Self::with_watcher_capacity(256)
    }

    pub fn with_watcher_capacity(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State { buckets: HashMap::new(), watchers: Vec::new() }),
            watcher_queue_capacity: capacity,
            sweep: Mutex::new(None),
        })
    }

    /// Start a background task (**[EXPANSION]** task tracker, §5) that
    /// periodically evicts buckets past their TTL, emitting `Delete`
    /// events the same way an explicit `deregister` would.
    pub fn spawn_ttl_sweep(self: &Arc<Self>, interval: Duration) {
        let registry = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.sweep_expired();
            }
        });
        *self.sweep.lock() = Some(handle);
    }

    pub fn stop_ttl_sweep(&self) {
        if let Some(handle) = self.sweep.lock().take() {
            handle.abort();
        }
    }

    fn sweep_expired(&self) {
        let now = tokio::time::Instant::now();
        let mut expired = Vec::new();
        {
            let mut state = self.state.lock();
            let keys: Vec<_> = state
                .buckets
                .iter()
                .filter(|(_, bucket)| bucket.expires_at.is_some_and(|at| at <= now))
                .map(|(key, _)| key.clone())
                .collect();
            for key in keys {
                if let Some(bucket) = state.buckets.remove(&key) {
                    expired.push(bucket.service);
                }
            }
        }
        for service in expired {
            debug!(name = %service.name, version = %service.version, "ttl expired, evicting");
            self.dispatch(EventKind::Delete, service);
        }
    }

    fn dispatch(&self, kind: EventKind, service: Service) {
        let watchers: Vec<Watcher> = {
            let mut state = self.state.lock();
            state.watchers.retain(|w| !w.is_stopped());
            state.watchers.clone()
        };
        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        let event = Event::new(kind, service, timestamp_ms);
        for watcher in watchers {
            if watcher.matches(&event.service.name) {
                watcher.push(event.clone());
            }
        }
    }

    pub fn stats(&self) -> RegistryStats {
        let state = self.state.lock();
        let names: Vec<String> = {
            let mut names: Vec<String> = state.buckets.keys().map(|(name, _)| name.clone()).collect();
            names.sort();
            names.dedup();
            names
        };
        let node_count = state.buckets.values().map(|b| b.service.nodes.len()).sum();
        RegistryStats { service_count: state.buckets.len(), node_count, names }
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn register(&self, service: Service, ttl: Option<Duration>) -> Result<(), RegistryError> {
        let key = (service.name.clone(), service.version.clone());
        let expires_at = ttl.map(|d| tokio::time::Instant::now() + d);

        let (kind, changed_service) = {
            let mut state = self.state.lock();
            match state.buckets.get(&key) {
                None => {
                    state.buckets.insert(key, Bucket { service: service.clone(), expires_at });
                    (Some(EventKind::Create), service)
                }
                Some(existing) if existing.service.nodes == service.nodes && existing.service.metadata == service.metadata => {
                    // Identical re-registration: still refresh the TTL, but
                    // emit zero events (§8 idempotence law).
                    state.buckets.insert(key, Bucket { service: service.clone(), expires_at });
                    (None, service)
                }
                Some(_) => {
                    state.buckets.insert(key, Bucket { service: service.clone(), expires_at });
                    (Some(EventKind::Update), service)
                }
            }
        };

        if let Some(kind) = kind {
            self.dispatch(kind, changed_service);
        }
        Ok(())
    }

    async fn deregister(&self, name: &str, version: &str) -> Result<(), RegistryError> {
        let key = (name.to_string(), version.to_string());
        let removed = {
            let mut state = self.state.lock();
            state.buckets.remove(&key)
        };
        if let Some(bucket) = removed {
            self.dispatch(EventKind::Delete, bucket.service);
        }
        Ok(())
    }

    async fn get_service(&self, name: &str, version: &str) -> Result<Vec<Service>, RegistryError> {
        let state = self.state.lock();
        let matches: Vec<Service> = state
            .buckets
            .values()
            .filter(|bucket| bucket.service.name == name)
            .filter(|bucket| version == ANY_VERSION || bucket.service.version == version)
            .map(|bucket| bucket.service.clone())
            .collect();
        if matches.is_empty() {
            return Err(RegistryError::ServiceNotFound(name.to_string()));
        }
        Ok(matches)
    }

    async fn list_services(&self) -> Result<Vec<Service>, RegistryError> {
        let state = self.state.lock();
        Ok(state.buckets.values().map(|bucket| bucket.service.clone()).collect())
    }

    async fn watch(&self, service_name: Option<String>) -> Watcher {
        let watcher = Watcher::new(service_name, self.watcher_queue_capacity);
        self.state.lock().watchers.push(watcher.clone());
        watcher
    }
}
