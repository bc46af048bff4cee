//! Request context (§3, §4.3): the request, the response under
//! construction, a string metadata map, and a typed attribute bag threaded
//! through the middleware chain and into the handler.
//!
//! Modeled on `mofa_kernel::gateway::types::GatewayContext`'s
//! `get_attr`/`set_attr` pair, which round-trip through `serde_json::Value`
//! rather than a type-erasure crate.

use crate::error::ServiceError;
use crate::transport::{TransportRequest, TransportResponse};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;

/// Per-request state visible to every middleware and the final handler.
pub struct Context {
    pub request: TransportRequest,
    pub response: TransportResponse,
    pub metadata: HashMap<String, String>,
    attributes: HashMap<String, serde_json::Value>,
    error: Option<ServiceError>,
}

impl Context {
    pub fn new(request: TransportRequest) -> Self {
        Self {
            request,
            response: TransportResponse::default(),
            metadata: HashMap::new(),
            attributes: HashMap::new(),
            error: None,
        }
    }

    /// Deserialize a previously-[`Context::set`] attribute. `None` if the
    /// key is absent or doesn't deserialize to `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Store a typed attribute, normalized to JSON (§9's "dynamic attribute
    /// bag → type-tagged map" mapping). Silently drops values that fail to
    /// serialize — callers that need to observe that should serialize
    /// up front and check.
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: &T) {
        if let Ok(json) = serde_json::to_value(value) {
            self.attributes.insert(key.into(), json);
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Remove an attribute, returning whether it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        self.attributes.remove(key).is_some()
    }

    /// Record an error captured by a handler or middleware. The Error
    /// handler middleware (§4.3) reads this to render the final response.
    pub fn set_error(&mut self, error: ServiceError) {
        self.error = Some(error);
    }

    pub fn error(&self) -> Option<&ServiceError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<ServiceError> {
        self.error.take()
    }
}
