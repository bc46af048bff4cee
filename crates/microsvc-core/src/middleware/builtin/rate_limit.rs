//! Per-client rate limiting, fixed-window or token-bucket (§4.3). Grounded
//! in the teacher's `mofa-gateway::filter::rate_limit::RateLimitFilter`
//! token-bucket implementation, generalized with a fixed-window mode and
//! moved onto the `Middleware` chain abstraction.

use crate::context::Context;
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Which algorithm backs a [`RateLimitMiddleware`].
#[derive(Debug, Clone, Copy)]
pub enum RateLimitStrategy {
    /// `limit` requests per fixed `window`; the window resets wholesale
    /// rather than sliding.
    FixedWindow { limit: u32, window: Duration },
    /// Continuous token bucket: `rate_per_second` tokens refill up to
    /// `burst_capacity`.
    TokenBucket { rate_per_second: f64, burst_capacity: f64 },
}

struct WindowState {
    count: u32,
    window_start: Instant,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

enum Store {
    FixedWindow(Mutex<HashMap<String, WindowState>>),
    TokenBucket(Mutex<HashMap<String, BucketState>>),
}

/// Rate-limits by client key, derived from the `principal` attribute set by
/// auth middleware, falling back to `x-forwarded-for`/`x-real-ip`, falling
/// back to `"anonymous"` (mirrors `RateLimitFilter::caller_id`).
pub struct RateLimitMiddleware {
    strategy: RateLimitStrategy,
    store: Store,
}

impl RateLimitMiddleware {
    pub fn new(strategy: RateLimitStrategy) -> Self {
        let store = match strategy {
            RateLimitStrategy::FixedWindow { .. } => Store::FixedWindow(Mutex::new(HashMap::new())),
            RateLimitStrategy::TokenBucket { .. } => Store::TokenBucket(Mutex::new(HashMap::new())),
        };
        Self { strategy, store }
    }

    /// Drop client entries idle for longer than `max_idle` (**[EXPANSION]**,
    /// grounded in `mofa-gateway::filter::rate_limit::RateLimiter::gc`).
    /// Intended to run off a periodic background task so long-lived
    /// gateways don't accumulate one entry per client forever.
    pub fn gc(&self, max_idle: Duration) {
        let now = Instant::now();
        match &self.store {
            Store::FixedWindow(map) => {
                map.lock().retain(|_, state| now.duration_since(state.window_start) < max_idle);
            }
            Store::TokenBucket(map) => {
                map.lock().retain(|_, state| now.duration_since(state.last_refill) < max_idle);
            }
        }
    }

    fn client_key(ctx: &Context) -> String {
        ctx.get::<String>("principal").unwrap_or_else(|| {
            ctx.request
                .header("x-forwarded-for")
                .or_else(|| ctx.request.header("x-real-ip"))
                .map(str::to_string)
                .unwrap_or_else(|| "anonymous".to_string())
        })
    }

    /// Returns `(allowed, limit, remaining, retry_after_secs)`.
    fn check(&self, key: &str) -> (bool, u32, u32, u64) {
        match (&self.strategy, &self.store) {
            (RateLimitStrategy::FixedWindow { limit, window }, Store::FixedWindow(map)) => {
                let mut map = map.lock();
                let now = Instant::now();
                let entry = map.entry(key.to_string()).or_insert_with(|| WindowState {
                    count: 0,
                    window_start: now,
                });
                if now.duration_since(entry.window_start) >= *window {
                    entry.count = 0;
                    entry.window_start = now;
                }
                if entry.count < *limit {
                    entry.count += 1;
                    let remaining = limit - entry.count;
                    (true, *limit, remaining, 0)
                } else {
                    let retry_after = window.saturating_sub(now.duration_since(entry.window_start));
                    (false, *limit, 0, retry_after.as_secs().max(1))
                }
            }
            (
                RateLimitStrategy::TokenBucket { rate_per_second, burst_capacity },
                Store::TokenBucket(map),
            ) => {
                let mut map = map.lock();
                let now = Instant::now();
                let entry = map.entry(key.to_string()).or_insert_with(|| BucketState {
                    tokens: *burst_capacity,
                    last_refill: now,
                });
                let elapsed = now.duration_since(entry.last_refill).as_secs_f64();
                entry.tokens = (entry.tokens + elapsed * rate_per_second).min(*burst_capacity);
                entry.last_refill = now;
                if entry.tokens >= 1.0 {
                    entry.tokens -= 1.0;
                    (true, *burst_capacity as u32, entry.tokens as u32, 0)
                } else {
                    let deficit = 1.0 - entry.tokens;
                    let retry_after = (deficit / rate_per_second).ceil() as u64;
                    (false, *burst_capacity as u32, 0, retry_after.max(1))
                }
            }
            _ => unreachable!("strategy and store are constructed together"),
        }
    }
}

#[async_trait]
impl Middleware for RateLimitMiddleware {
    fn name(&self) -> &str {
        "rate-limit"
    }

    async fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        let key = Self::client_key(ctx);
        let (allowed, limit, remaining, retry_after) = self.check(&key);

        ctx.response
            .headers
            .insert("x-ratelimit-limit".to_string(), limit.to_string());
        ctx.response
            .headers
            .insert("x-ratelimit-remaining".to_string(), remaining.to_string());

        if !allowed {
            ctx.response.status = 429;
            ctx.response
                .headers
                .insert("retry-after".to_string(), retry_after.to_string());
            ctx.response.body = serde_json::json!({
                "error": "rate limit exceeded",
                "code": "RATE_LIMIT",
            })
            .to_string()
            .into_bytes();
            return;
        }

        next.run(ctx).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{MiddlewareChain, MiddlewareEntry, MiddlewareRegistry};
    use crate::transport::TransportRequest;
    use std::sync::Arc;

    async fn run(mw: Arc<RateLimitMiddleware>) -> Context {
        let chain = MiddlewareChain::new().with_middleware(MiddlewareEntry::new(0, mw));
        let registry = MiddlewareRegistry::new();
        let mut ctx = Context::new(TransportRequest::new("GET", "/"));
        chain
            .run(&mut ctx, &registry, |c| Box::pin(async move { c.response.status = 200 }))
            .await;
        ctx
    }

    #[tokio::test]
    async fn fixed_window_rejects_after_limit() {
        let mw = Arc::new(RateLimitMiddleware::new(RateLimitStrategy::FixedWindow {
            limit: 2,
            window: Duration::from_secs(60),
        }));
        assert_eq!(run(mw.clone()).await.response.status, 200);
        assert_eq!(run(mw.clone()).await.response.status, 200);
        let third = run(mw).await;
        assert_eq!(third.response.status, 429);
        assert!(third.response.headers.contains_key("retry-after"));
    }

    #[tokio::test]
    async fn gc_drops_idle_entries() {
        let mw = RateLimitMiddleware::new(RateLimitStrategy::FixedWindow {
            limit: 5,
            window: Duration::from_secs(60),
        });
        assert_eq!(run(Arc::new(mw)).await.response.status, 200);
        // Rebuild with a fresh instance to exercise gc() directly on a
        // known key rather than timing out a 60s window in a test.
        let mw = RateLimitMiddleware::new(RateLimitStrategy::FixedWindow {
            limit: 5,
            window: Duration::from_secs(60),
        });
        mw.check("client-a");
        mw.gc(Duration::from_millis(0));
        if let Store::FixedWindow(map) = &mw.store {
            assert!(map.lock().is_empty());
        }
    }

    #[tokio::test]
    async fn token_bucket_rejects_when_exhausted() {
        let mw = Arc::new(RateLimitMiddleware::new(RateLimitStrategy::TokenBucket {
            rate_per_second: 0.001,
            burst_capacity: 1.0,
        }));
        assert_eq!(run(mw.clone()).await.response.status, 200);
        let second = run(mw).await;
        assert_eq!(second.response.status, 429);
    }
}
