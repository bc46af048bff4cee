//! Catches a [`ServiceError`] captured on the context and renders it as a
//! status code plus a `{error, code?, details?}` body via the negotiated
//! codec (§4.3, §7's propagation policy).

use crate::codec::CodecRegistry;
use crate::context::Context;
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;
use std::sync::Arc;

pub struct ErrorHandlerMiddleware {
    codecs: Arc<CodecRegistry>,
}

impl ErrorHandlerMiddleware {
    pub fn new(codecs: Arc<CodecRegistry>) -> Self {
        Self { codecs }
    }
}

#[async_trait]
impl Middleware for ErrorHandlerMiddleware {
    fn name(&self) -> &str {
        "error-handler"
    }

    async fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        next.run(ctx).await;

        let Some(error) = ctx.take_error() else { return };

        let body = serde_json::json!({
            "error": error.to_string(),
            "code": error.code(),
        });

        let content_type = ctx
            .request
            .header("accept")
            .map(str::to_string)
            .unwrap_or_else(|| self.codecs.default_content_type().to_string());
        let codec = self
            .codecs
            .negotiate(None, Some(&content_type), &[])
            .ok()
            .or_else(|| self.codecs.default_codec());

        ctx.response.status = error.status_code();
        if let Some(codec) = codec {
            if let Ok(bytes) = codec.marshal(&body) {
                ctx.response.body = bytes;
                ctx.response
                    .headers
                    .insert("content-type".to_string(), codec.content_type().to_string());
                return;
            }
        }
        ctx.response.body = body.to_string().into_bytes();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::middleware::{MiddlewareChain, MiddlewareEntry, MiddlewareRegistry};
    use crate::transport::TransportRequest;

    #[tokio::test]
    async fn renders_captured_error_as_json_body_and_status() {
        let codecs = Arc::new(CodecRegistry::with_defaults());
        let chain = MiddlewareChain::new().with_middleware(MiddlewareEntry::new(
            0,
            Arc::new(ErrorHandlerMiddleware::new(codecs)),
        ));
        let registry = MiddlewareRegistry::new();
        let mut ctx = Context::new(TransportRequest::new("GET", "/"));
        chain
            .run(&mut ctx, &registry, |c| {
                Box::pin(async move { c.set_error(ServiceError::NotFound("user".into())) })
            })
            .await;

        assert_eq!(ctx.response.status, 404);
        let body: serde_json::Value = serde_json::from_slice(&ctx.response.body).unwrap();
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn leaves_response_untouched_when_no_error_captured() {
        let codecs = Arc::new(CodecRegistry::with_defaults());
        let chain = MiddlewareChain::new().with_middleware(MiddlewareEntry::new(
            0,
            Arc::new(ErrorHandlerMiddleware::new(codecs)),
        ));
        let registry = MiddlewareRegistry::new();
        let mut ctx = Context::new(TransportRequest::new("GET", "/"));
        chain
            .run(&mut ctx, &registry, |c| Box::pin(async move { c.response.status = 200 }))
            .await;
        assert_eq!(ctx.response.status, 200);
    }
}
