//! Writes `Server-Timing`/`X-Response-Time` headers (§4.3).

use crate::context::Context;
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;
use std::time::Instant;

#[derive(Debug, Default, Clone, Copy)]
pub struct TimingMiddleware;

impl TimingMiddleware {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for TimingMiddleware {
    fn name(&self) -> &str {
        "timing"
    }

    async fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        let start = Instant::now();
        next.run(ctx).await;
        let elapsed = start.elapsed();
        let millis = elapsed.as_secs_f64() * 1000.0;
        ctx.response
            .headers
            .insert("server-timing".to_string(), format!("total;dur={millis:.3}"));
        ctx.response
            .headers
            .insert("x-response-time".to_string(), format!("{millis:.3}ms"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{MiddlewareChain, MiddlewareEntry, MiddlewareRegistry};
    use crate::transport::TransportRequest;
    use std::sync::Arc;

    #[tokio::test]
    async fn writes_timing_headers() {
        let chain = MiddlewareChain::new()
            .with_middleware(MiddlewareEntry::new(0, Arc::new(TimingMiddleware)));
        let registry = MiddlewareRegistry::new();
        let mut ctx = Context::new(TransportRequest::new("GET", "/"));
        chain.run(&mut ctx, &registry, |_| Box::pin(async {})).await;
        assert!(ctx.response.headers.contains_key("server-timing"));
        assert!(ctx.response.headers.contains_key("x-response-time"));
    }
}
