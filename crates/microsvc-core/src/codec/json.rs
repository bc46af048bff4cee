//! Built-in JSON codec.

use super::Codec;
use crate::error::CodecError;
use serde_json::Value;

/// JSON codec backed by `serde_json`. The default codec for a
/// freshly-constructed [`super::CodecRegistry`].
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for JsonCodec {
    fn content_type(&self) -> &str {
        "application/json"
    }

    fn name(&self) -> &str {
        "JSON"
    }

    fn extension(&self) -> &str {
        "json"
    }

    fn marshal(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::MarshalError(e.to_string()))
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(bytes).map_err(|e| CodecError::UnmarshalError(e.to_string()))
    }

    fn detect(&self, bytes: &[u8]) -> bool {
        matches!(
            bytes.iter().find(|b| !b.is_ascii_whitespace()),
            Some(b'{') | Some(b'[') | Some(b'"')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_json_object() {
        let codec = JsonCodec::new();
        let value = serde_json::json!({"hello": "world", "n": 1});
        let bytes = codec.marshal(&value).unwrap();
        assert_eq!(codec.unmarshal(&bytes).unwrap(), value);
    }

    #[test]
    fn empty_body_unmarshals_to_null() {
        let codec = JsonCodec::new();
        assert_eq!(codec.unmarshal(&[]).unwrap(), Value::Null);
    }

    #[test]
    fn invalid_bytes_are_an_unmarshal_error() {
        let codec = JsonCodec::new();
        assert!(codec.unmarshal(b"not json").is_err());
    }

    #[test]
    fn detect_recognizes_object_and_array_prefixes() {
        let codec = JsonCodec::new();
        assert!(codec.detect(b"  {\"a\":1}"));
        assert!(codec.detect(b"[1,2,3]"));
        assert!(!codec.detect(&[0x81, 0x00]));
    }
}
