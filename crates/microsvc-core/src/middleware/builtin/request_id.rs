//! Request ID middleware: ensures a UUID is present on the inbound
//! request and mirrors it to the response header (§4.3).

use crate::context::Context;
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;
use uuid::Uuid;

const HEADER: &str = "x-request-id";

#[derive(Debug, Default, Clone, Copy)]
pub struct RequestIdMiddleware;

impl RequestIdMiddleware {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &str {
        "request-id"
    }

    async fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        let id = ctx
            .request
            .header(HEADER)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        ctx.request.headers.insert(HEADER.to_string(), id.clone());
        ctx.metadata.insert("request_id".to_string(), id.clone());

        next.run(ctx).await;

        ctx.response.headers.insert(HEADER.to_string(), id);
    }
}
