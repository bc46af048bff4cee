//! Catches a panicking handler/middleware and turns it into a 500 instead
//! of letting it propagate out of the request task (§4.3).

use crate::context::Context;
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::error;

#[derive(Debug, Default, Clone, Copy)]
pub struct RecoveryMiddleware;

impl RecoveryMiddleware {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for RecoveryMiddleware {
    fn name(&self) -> &str {
        "recovery"
    }

    async fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        let result = AssertUnwindSafe(next.run(ctx)).catch_unwind().await;
        if let Err(panic) = result {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(panic = %message, "recovered from panic in request pipeline");
            ctx.response.status = 500;
            ctx.response.body =
                serde_json::json!({"error": "internal server error", "code": "INTERNAL"})
                    .to_string()
                    .into_bytes();
            ctx.response
                .headers
                .insert("content-type".to_string(), "application/json".to_string());
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
    async fn turns_a_panicking_handler_into_a_500() {
        let chain = MiddlewareChain::new()
            .with_middleware(MiddlewareEntry::new(0, Arc::new(RecoveryMiddleware)));
        let registry = MiddlewareRegistry::new();
        let mut ctx = Context::new(TransportRequest::new("GET", "/"));
        chain
            .run(&mut ctx, &registry, |_| Box::pin(async { panic!("boom") }))
            .await;
        assert_eq!(ctx.response.status, 500);
        assert!(!ctx.response.body.is_empty());
    }

    #[tokio::test]
    async fn passes_through_a_normal_response_untouched() {
        let chain = MiddlewareChain::new()
            .with_middleware(MiddlewareEntry::new(0, Arc::new(RecoveryMiddleware)));
        let registry = MiddlewareRegistry::new();
        let mut ctx = Context::new(TransportRequest::new("GET", "/"));
        chain
            .run(&mut ctx, &registry, |c| Box::pin(async move { c.response.status = 200 }))
            .await;
        assert_eq!(ctx.response.status, 200);
    }
}
