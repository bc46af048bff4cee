//! Registry data model (§3 "Registry entities"): `Node`, `Service`,
//! `Event`, and the crate's error taxonomy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// A single instance of a running service, as advertised to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub address: String,
    pub port: u16,
    pub metadata: HashMap<String, String>,
}

impl Node {
    pub fn new(id: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            port,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// `host:port` address used to dial this node.
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// A versioned bucket of nodes registered under one service name (§3:
/// "(Service.name, Service.version) uniquely identifies a service
/// bucket").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub version: String,
    pub metadata: HashMap<String, String>,
    pub nodes: Vec<Node>,
}

/// Sentinel version matching every registered version of a service name.
pub const ANY_VERSION: &str = "*";

impl Service {
    pub fn new(name: impl Into<String>, version: impl Into<String>, nodes: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            metadata: HashMap::new(),
            nodes,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The change that produced a registry [`Event`] (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

/// A registry change notification delivered to [`crate::watcher::Watcher`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub service: Service,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

impl Event {
    pub fn new(kind: EventKind, service: Service, timestamp_ms: i64) -> Self {
        Self { kind, service, timestamp_ms }
    }
}

/// Registration TTL: how long a registration stays valid without a
/// refreshing re-register before it's evicted (§4.4).
#[derive(Debug, Clone, Copy)]
pub struct Ttl(pub Duration);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("service not found: {0}")]
    ServiceNotFound(String),
    #[error("registration error: {0}")]
    Registration(String),
    #[error("connection error: {0}")]
    ConnectionError(String),
}

impl RegistryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::ConnectionError(_))
    }
}
