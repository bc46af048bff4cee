//! Structured request logging, scrubbing sensitive headers (§4.3).

use crate::context::Context;
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;
use std::time::Instant;
use tracing::info;

const SCRUBBED_HEADERS: &[&str] = &["authorization", "cookie"];

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    async fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        let method = ctx.request.method.clone();
        let path = ctx.request.path.clone();
        let start = Instant::now();

        next.run(ctx).await;

        let elapsed = start.elapsed();
        info!(
            method = %method,
            path = %path,
            status = ctx.response.status,
            duration_ms = elapsed.as_millis() as u64,
            "request handled"
        );
    }
}

/// Strip headers that should never reach a log sink.
pub fn scrub_headers(
    headers: &std::collections::HashMap<String, String>,
) -> std::collections::HashMap<String, String> {
    headers
        .iter()
        .filter(|(k, _)| !SCRUBBED_HEADERS.contains(&k.to_ascii_lowercase().as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
