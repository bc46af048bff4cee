//! Content negotiation algorithm (§4.1): `Content-Type` header (with alias
//! resolution) → `Accept` header (quality-sorted) → body sniff → registry
//! default.

use super::{Codec, CodecRegistry};
use crate::error::CodecError;
use std::sync::Arc;

/// Strip `; charset=utf-8`-style parameters off a media type header value
/// and lowercase/trim the remainder.
pub fn strip_params(header: &str) -> String {
    header
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Resolve a handful of common media-type aliases to the canonical content
/// type a built-in codec is registered under.
fn resolve_alias(content_type: &str) -> &str {
    match content_type {
        "application/x-json" => "application/json",
        "application/x-msgpack" | "application/vnd.msgpack" | "msgpack" => {
            "application/msgpack"
        }
        other => other,
    }
}

/// Parse an `Accept` header into `(media_type, quality)` pairs, sorted by
/// descending quality (ties keep header order). Entries with an unparsable
/// `q` value default to `1.0`.
pub fn parse_accept(header: &str) -> Vec<(String, f32)> {
    let mut entries: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            let mut segments = part.split(';');
            let media_type = segments.next()?.trim().to_ascii_lowercase();
            let quality = segments
                .filter_map(|param| {
                    let param = param.trim();
                    param.strip_prefix("q=").and_then(|v| v.trim().parse::<f32>().ok())
                })
                .next()
                .unwrap_or(1.0);
            Some((media_type, quality))
        })
        .collect();
    entries.sort_by(|a, b| b.1.total_cmp(&a.1));
    entries
}

/// Byte-sniff `body` against every codec in `registry`, returning the first
/// content type whose codec claims it via [`Codec::detect`].
pub fn detect_content_type(registry: &CodecRegistry, body: &[u8]) -> Option<String> {
    for content_type in ["application/json", "application/msgpack"] {
        if let Some(codec) = registry.get(content_type) {
            if codec.detect(body) {
                return Some(content_type.to_string());
            }
        }
    }
    None
}

/// Full negotiation: exact/alias `Content-Type` match, then quality-sorted
/// `Accept` match (skipping `*/*` and `application/*` wildcards, which defer
/// to the registry default), then a body sniff, then the registry default.
pub fn select_codec(
    registry: &CodecRegistry,
    content_type_header: Option<&str>,
    accept_header: Option<&str>,
    body: &[u8],
) -> Result<Arc<dyn Codec>, CodecError> {
    if let Some(header) = content_type_header {
        let stripped = strip_params(header);
        let resolved = resolve_alias(&stripped);
        if let Some(codec) = registry.get(resolved) {
            return Ok(codec);
        }
        if !stripped.is_empty() && stripped != "*/*" && stripped != "application/*" {
            return Err(CodecError::NotRegistered(stripped));
        }
    }

    if let Some(header) = accept_header {
        for (media_type, _quality) in parse_accept(header) {
            if media_type == "*/*" || media_type == "application/*" {
                continue;
            }
            let resolved = resolve_alias(&media_type);
            if let Some(codec) = registry.get(resolved) {
                return Ok(codec);
            }
        }
    }

    if let Some(content_type) = detect_content_type(registry, body) {
        if let Some(codec) = registry.get(&content_type) {
            return Ok(codec);
        }
    }

    registry
        .default_codec()
        .ok_or_else(|| CodecError::NotRegistered(registry.default_content_type().to_string()))
}
