//! The per-method handler contract (§4.7): a decoded body plus the request
//! context in, a decoded body or [`ServiceError`] out. Async-trait rather
//! than a boxed-closure type alias, matching `Transport`/`Handler` in
//! `microsvc-core` and `mofa-gateway`'s handler traits.

use async_trait::async_trait;
use microsvc_core::{Context, ServiceError};
use serde_json::Value;

#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn call(&self, body: Value, ctx: &mut Context) -> Result<Value, ServiceError>;
}

/// Adapts any `Fn(Value, &mut Context) -> Future<Output = Result<Value, ServiceError>>`
/// closure into a [`MethodHandler`], so callers can register an `async move`
/// closure with [`crate::Service::handle`] instead of writing a struct.
pub struct FnHandler<F, Fut>
where
    F: Fn(Value, &mut Context) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, ServiceError>> + Send,
{
    f: F,
}

impl<F, Fut> FnHandler<F, Fut>
where
    F: Fn(Value, &mut Context) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, ServiceError>> + Send,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> MethodHandler for FnHandler<F, Fut>
where
    F: Fn(Value, &mut Context) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, ServiceError>> + Send,
{
    async fn call(&self, body: Value, ctx: &mut Context) -> Result<Value, ServiceError> {
        (self.f)(body, ctx).await
    }
}
