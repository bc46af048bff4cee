//! Codec trait, built-in codecs, and content negotiation (§4.1).
//!
//! A [`Codec`] associates a content type with marshal/unmarshal operations.
//! [`CodecRegistry`] is the process-wide content-type → codec map used by
//! transports and the service runtime to negotiate the wire format of a
//! request or response.
//!
//! Per the design notes (§9), the response body union type (bytes | string |
//! map | array | JSON value | nil) is represented here as [`serde_json::Value`]
//! — a tagged sum every codec normalizes to and from bytes. Handler code
//! that wants a concrete Rust type deserializes from that `Value` with
//! ordinary `serde_json::from_value`.

mod json;
mod msgpack;
mod negotiate;

pub use json::JsonCodec;
pub use msgpack::MsgPackCodec;
pub use negotiate::{detect_content_type, parse_accept, select_codec, strip_params};

use crate::error::CodecError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A codec marshals a [`Value`] to bytes and back, tagged with a content type
/// (e.g. `application/json`).
pub trait Codec: Send + Sync {
    /// The content type this codec serves, e.g. `"application/json"`.
    fn content_type(&self) -> &str;

    /// Human-readable display name, e.g. `"JSON"`.
    fn name(&self) -> &str;

    /// Conventional file extension, without the leading dot.
    fn extension(&self) -> &str;

    /// Serialize a value to bytes.
    fn marshal(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    /// Deserialize bytes into a value.
    fn unmarshal(&self, bytes: &[u8]) -> Result<Value, CodecError>;

    /// Fallible variant returning `Value::Null` on failure, per §4.1's
    /// "plus a fallible variant returning a sentinel on failure".
    fn unmarshal_or_null(&self, bytes: &[u8]) -> Value {
        self.unmarshal(bytes).unwrap_or(Value::Null)
    }

    /// Best-effort byte sniff: does `bytes` look like this codec's format?
    /// Used by [`detect_content_type`] when no `Content-Type`/`Accept` header
    /// is present. Optional — the default implementation always returns
    /// `false`, meaning "cannot sniff".
    fn detect(&self, _bytes: &[u8]) -> bool {
        false
    }
}

/// Process-wide content-type → codec map with a configurable default.
///
/// Mirrors the singleton-with-explicit-init/reset pattern used for global
/// state across the design (§9): callers construct their own registry
/// rather than reaching for a hidden global, so tests can swap codecs
/// freely.
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
    default_content_type: String,
}

impl CodecRegistry {
    /// An empty registry with no default codec configured.
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
            default_content_type: String::new(),
        }
    }

    /// A registry pre-populated with [`JsonCodec`] (default) and
    /// [`MsgPackCodec`].
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(JsonCodec::new()));
        registry.register(Arc::new(MsgPackCodec::new()));
        registry.default_content_type = "application/json".to_string();
        registry
    }

    /// Register a codec, keyed by its own [`Codec::content_type`].
    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        self.codecs
            .insert(codec.content_type().to_string(), codec);
    }

    /// Set the content type returned when nothing else matches.
    pub fn set_default(&mut self, content_type: impl Into<String>) {
        self.default_content_type = content_type.into();
    }

    /// Exact lookup by content type (after alias resolution by the caller).
    pub fn get(&self, content_type: &str) -> Option<Arc<dyn Codec>> {
        self.codecs.get(content_type).cloned()
    }

    /// The registry's configured default codec, if registered.
    pub fn default_codec(&self) -> Option<Arc<dyn Codec>> {
        self.codecs.get(&self.default_content_type).cloned()
    }

    pub fn default_content_type(&self) -> &str {
        &self.default_content_type
    }

    /// Full negotiation per §4.1: `Content-Type` header, then `Accept`,
    /// then body sniff, then the registry default.
    pub fn negotiate(
        &self,
        content_type_header: Option<&str>,
        accept_header: Option<&str>,
        body: &[u8],
    ) -> Result<Arc<dyn Codec>, CodecError> {
        select_codec(self, content_type_header, accept_header, body)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_resolves_json_and_msgpack() {
        let registry = CodecRegistry::with_defaults();
        assert!(registry.get("application/json").is_some());
        assert!(registry.get("application/msgpack").is_some());
        assert_eq!(registry.default_content_type(), "application/json");
    }

    #[test]
    fn unknown_content_type_is_absent() {
        let registry = CodecRegistry::with_defaults();
        assert!(registry.get("application/xml").is_none());
    }
}
