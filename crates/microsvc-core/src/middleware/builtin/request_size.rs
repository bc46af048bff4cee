//! Rejects request bodies over a configured byte ceiling with 413 (§4.3).

use crate::context::Context;
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;

#[derive(Debug, Clone, Copy)]
pub struct RequestSizeMiddleware {
    pub max_bytes: usize,
}

impl RequestSizeMiddleware {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

#[async_trait]
impl Middleware for RequestSizeMiddleware {
    fn name(&self) -> &str {
        "request-size"
    }

    async fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        if ctx.request.body.len() > self.max_bytes {
            ctx.response.status = 413;
            ctx.response.body = serde_json::json!({
                "error": format!("request body exceeds {} bytes", self.max_bytes),
                "code": "BAD_REQUEST",
            })
            .to_string()
            .into_bytes();
            return;
        }
        next.run(ctx).await;
    }
}
