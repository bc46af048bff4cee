//! Base for bearer/basic/API-key/JWT validators (§4.3). Concrete JWT/OAuth
//! schemes are an external collaborator (§1 Non-goals); this module
//! supplies the extension point plus a minimal static API-key scheme that
//! exercises it end to end.

use crate::context::Context;
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;
use std::collections::HashSet;

/// An authentication scheme validates a request and returns a principal
/// identifier on success. `AuthMiddleware` is generic over this trait so
/// bearer, basic, API-key, and JWT validators share one chain entry point.
#[async_trait]
pub trait AuthScheme: Send + Sync {
    /// `Some(principal)` on success, `None` to reject with 401.
    async fn authenticate(&self, ctx: &Context) -> Option<String>;
}

/// Validates `X-Api-Key` against a static allow-list, mapping each key to
/// its principal name. A stand-in for a real key store; production
/// deployments would swap this scheme for one backed by JWT or OAuth
/// token introspection behind the same [`AuthScheme`] trait.
pub struct ApiKeyScheme {
    keys: HashSet<(String, String)>,
}

impl ApiKeyScheme {
    pub fn new(keys: impl IntoIterator<Item = (String, String)>) -> Self {
        Self { keys: keys.into_iter().collect() }
    }
}

#[async_trait]
impl AuthScheme for ApiKeyScheme {
    async fn authenticate(&self, ctx: &Context) -> Option<String> {
        let key = ctx.request.header("x-api-key")?;
        self.keys
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, principal)| principal.clone())
    }
}

/// Runs `scheme` against the request; on success writes the `principal`
/// attribute and continues, on failure short-circuits with 401.
pub struct AuthMiddleware<S: AuthScheme> {
    scheme: S,
}

impl<S: AuthScheme> AuthMiddleware<S> {
    pub fn new(scheme: S) -> Self {
        Self { scheme }
    }
}

#[async_trait]
impl<S: AuthScheme> Middleware for AuthMiddleware<S> {
    fn name(&self) -> &str {
        "auth"
    }

    async fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        match self.scheme.authenticate(ctx).await {
            Some(principal) => {
                ctx.set("principal", &principal);
                next.run(ctx).await;
            }
            None => {
                ctx.response.status = 401;
                ctx.response.body = serde_json::json!({
                    "error": "unauthorized",
                    "code": "UNAUTHORIZED",
                })
                .to_string()
                .into_bytes();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{MiddlewareChain, MiddlewareEntry, MiddlewareRegistry};
    use crate::transport::TransportRequest;
    use std::sync::Arc;

    fn scheme() -> ApiKeyScheme {
        ApiKeyScheme::new([("k1".to_string(), "alice".to_string())])
    }

    #[tokio::test]
    async fn valid_key_sets_principal_and_continues() {
        let chain = MiddlewareChain::new().with_middleware(MiddlewareEntry::new(
            0,
            Arc::new(AuthMiddleware::new(scheme())),
        ));
        let registry = MiddlewareRegistry::new();
        let request = TransportRequest::new("GET", "/").with_header("x-api-key", "k1");
        let mut ctx = Context::new(request);
        chain
            .run(&mut ctx, &registry, |c| Box::pin(async move { c.response.status = 200 }))
            .await;
        assert_eq!(ctx.response.status, 200);
        assert_eq!(ctx.get::<String>("principal"), Some("alice".to_string()));
    }

    #[tokio::test]
    async fn missing_or_unknown_key_is_401() {
        let chain = MiddlewareChain::new().with_middleware(MiddlewareEntry::new(
            0,
            Arc::new(AuthMiddleware::new(scheme())),
        ));
        let registry = MiddlewareRegistry::new();
        let mut ctx = Context::new(TransportRequest::new("GET", "/"));
        chain
            .run(&mut ctx, &registry, |c| Box::pin(async move { c.response.status = 200 }))
            .await;
        assert_eq!(ctx.response.status, 401);
    }
}
