//! Cancels the downstream chain once the elapsed time exceeds the budget,
//! returning 504 (§4.3, §5's cooperative cancellation).

use crate::context::Context;
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct TimeoutMiddleware {
    pub budget: Duration,
}

impl TimeoutMiddleware {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }
}

#[async_trait]
impl Middleware for TimeoutMiddleware {
    fn name(&self) -> &str {
        "timeout"
    }

    async fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        if tokio::time::timeout(self.budget, next.run(ctx)).await.is_err() {
            ctx.response.status = 504;
            ctx.response.body = serde_json::json!({
                "error": "request timed out",
                "code": "TIMEOUT",
            })
            .to_string()
            .into_bytes();
        }
    }
}
