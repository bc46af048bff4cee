//! Built-in MessagePack codec, backed by `rmp-serde`.

use super::Codec;
use crate::error::CodecError;
use serde_json::Value;

#[derive(Debug, Default, Clone, Copy)]
pub struct MsgPackCodec;

impl MsgPackCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for MsgPackCodec {
    fn content_type(&self) -> &str {
        "application/msgpack"
    }

    fn name(&self) -> &str {
        "MessagePack"
    }

    fn extension(&self) -> &str {
        "msgpack"
    }

    fn marshal(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        rmp_serde::to_vec_named(value).map_err(|e| CodecError::MarshalError(e.to_string()))
    }

    fn unmarshal(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        rmp_serde::from_slice(bytes).map_err(|e| CodecError::UnmarshalError(e.to_string()))
    }

    fn detect(&self, bytes: &[u8]) -> bool {
        match bytes.first() {
            Some(&b) => matches!(b, 0x80..=0x9F | 0xDC..=0xDF),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_map() {
        let codec = MsgPackCodec::new();
        let value = serde_json::json!({"hello": "world", "n": 1});
        let bytes = codec.marshal(&value).unwrap();
        assert_eq!(codec.unmarshal(&bytes).unwrap(), value);
    }

    #[test]
    fn empty_body_unmarshals_to_null() {
        let codec = MsgPackCodec::new();
        assert_eq!(codec.unmarshal(&[]).unwrap(), Value::Null);
    }

    #[test]
    fn detect_recognizes_fixmap_and_map_markers() {
        let codec = MsgPackCodec::new();
        assert!(codec.detect(&[0x81, 0xA1, b'a']));
        assert!(codec.detect(&[0xDE, 0x00, 0x01]));
        assert!(!codec.detect(b"{\"a\":1}"));
    }
}
