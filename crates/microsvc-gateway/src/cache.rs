//! Response cache scaffold (§4.9, §9 Open Question: write path scaffolded
//! only, no guaranteed persistence). [`ResponseCache`] is the pluggable
//! back-end interface; [`InMemoryResponseCache`] is the one concrete
//! implementation shipped here, keyed the way `microsvc_registry::memory`
//! keys its service map — one `DashMap` entry per key, read under no lock
//! beyond the map's own sharding.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Pluggable cache back-end (§4.9: "the cache store back-end is a
/// pluggable interface; no guaranteed persistence is required").
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<CachedResponse>;
    async fn set(&self, key: &str, response: CachedResponse, ttl: Duration);
}

/// Process-local, TTL-expiring cache. Entries past their expiry are
/// treated as absent on read and lazily swept on write.
#[derive(Default)]
pub struct InMemoryResponseCache {
    entries: DashMap<String, (CachedResponse, Instant)>,
}

impl InMemoryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResponseCache for InMemoryResponseCache {
    async fn get(&self, key: &str) -> Option<CachedResponse> {
        match self.entries.get(key) {
            Some(entry) if entry.1 > Instant::now() => Some(entry.0.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, response: CachedResponse, ttl: Duration) {
        self.entries.insert(key.to_string(), (response, Instant::now() + ttl));
    }
}

/// Build the cache key (§4.9): namespace prefix + method + path + query +
/// vary-by header values, in that order, `|`-joined. `vary_by` names
/// looked up in `headers` are included in declared order; a name with no
/// matching header contributes an empty segment so the key shape is
/// stable regardless of which requests happen to carry it.
pub fn cache_key(
    namespace: &str,
    method: &str,
    path: &str,
    query: &str,
    vary_by: &[String],
    headers: &HashMap<String, String>,
) -> String {
    let mut parts = vec![namespace.to_string(), method.to_ascii_uppercase(), path.to_string(), query.to_string()];
    for name in vary_by {
        if name == "path" || name == "query" {
            continue;
        }
        parts.push(headers.get(name.as_str()).cloned().unwrap_or_default());
    }
    parts.join("|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_then_hit_after_set() {
        let cache = InMemoryResponseCache::new();
        assert!(cache.get("k").await.is_none());

        let response = CachedResponse { status: 200, headers: HashMap::new(), body: b"hi".to_vec() };
        cache.set("k", response, Duration::from_secs(10)).await;

        let hit = cache.get("k").await.unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.body, b"hi");
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let cache = InMemoryResponseCache::new();
        let response = CachedResponse { status: 200, headers: HashMap::new(), body: Vec::new() };
        cache.set("k", response, Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[test]
    fn cache_key_includes_vary_by_header_values() {
        let mut headers = HashMap::new();
        headers.insert("authorization".to_string(), "token-a".to_string());
        let key = cache_key("users", "get", "/users/1", "", &["path".to_string(), "authorization".to_string()], &headers);
        assert_eq!(key, "users|GET|/users/1||token-a");
    }
}
