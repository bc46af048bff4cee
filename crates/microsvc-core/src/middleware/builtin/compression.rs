//! Gzips responses above a size threshold when the caller accepts it
//! (§4.3). Grounded in the teacher's `flate2`-backed size-threshold
//! compression used for on-disk log rotation, adapted here to a response
//! body.

use crate::context::Context;
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

#[derive(Debug, Clone, Copy)]
pub struct CompressionMiddleware {
    /// Responses smaller than this are left uncompressed.
    pub threshold_bytes: usize,
}

impl Default for CompressionMiddleware {
    fn default() -> Self {
        Self { threshold_bytes: 1024 }
    }
}

impl CompressionMiddleware {
    pub fn new(threshold_bytes: usize) -> Self {
        Self { threshold_bytes }
    }
}

#[async_trait]
impl Middleware for CompressionMiddleware {
    fn name(&self) -> &str {
        "compression"
    }

    async fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        let accepts_gzip = ctx
            .request
            .header("accept-encoding")
            .map(|v| v.to_ascii_lowercase().contains("gzip"))
            .unwrap_or(false);

        next.run(ctx).await;

        if !accepts_gzip || ctx.response.body.len() < self.threshold_bytes {
            return;
        }
        if ctx.response.headers.contains_key("content-encoding") {
            return;
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        if encoder.write_all(&ctx.response.body).is_err() {
            return;
        }
        let Ok(compressed) = encoder.finish() else { return };
        if compressed.len() < ctx.response.body.len() {
            ctx.response.body = compressed;
            ctx.response
                .headers
                .insert("content-encoding".to_string(), "gzip".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{MiddlewareChain, MiddlewareEntry, MiddlewareRegistry};
    use crate::transport::TransportRequest;
    use std::sync::Arc;

    #[tokio::test]
    async fn compresses_large_body_when_accepted() {
        let chain = MiddlewareChain::new().with_middleware(MiddlewareEntry::new(
            0,
            Arc::new(CompressionMiddleware::new(16)),
        ));
        let registry = MiddlewareRegistry::new();
        let request = TransportRequest::new("GET", "/").with_header("accept-encoding", "gzip, deflate");
        let mut ctx = Context::new(request);
        let big_body = "a".repeat(4096);
        chain
            .run(&mut ctx, &registry, move |c| {
                let body = big_body.clone();
                Box::pin(async move { c.response.body = body.into_bytes() })
            })
            .await;
        assert_eq!(ctx.response.headers.get("content-encoding").map(String::as_str), Some("gzip"));
        assert!(ctx.response.body.len() < 4096);
    }

    #[tokio::test]
    async fn leaves_small_body_uncompressed() {
        let chain = MiddlewareChain::new().with_middleware(MiddlewareEntry::new(
            0,
            Arc::new(CompressionMiddleware::default()),
        ));
        let registry = MiddlewareRegistry::new();
        let request = TransportRequest::new("GET", "/").with_header("accept-encoding", "gzip");
        let mut ctx = Context::new(request);
        chain
            .run(&mut ctx, &registry, |c| Box::pin(async move { c.response.body = b"tiny".to_vec() }))
            .await;
        assert!(!ctx.response.headers.contains_key("content-encoding"));
    }

    #[tokio::test]
    async fn skips_when_caller_does_not_accept_gzip() {
        let chain = MiddlewareChain::new().with_middleware(MiddlewareEntry::new(
            0,
            Arc::new(CompressionMiddleware::new(8)),
        ));
        let registry = MiddlewareRegistry::new();
        let mut ctx = Context::new(TransportRequest::new("GET", "/"));
        chain
            .run(&mut ctx, &registry, |c| {
                Box::pin(async move { c.response.body = "x".repeat(2048).into_bytes() })
            })
            .await;
        assert!(!ctx.response.headers.contains_key("content-encoding"));
    }
}
