//! CORS middleware: preflight handling plus configurable origin/method/
//! header/credentials/max-age (§4.3).

use crate::context::Context;
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;

/// CORS policy. `allowed_origins` containing `"*"` allows any origin
/// (mutually exclusive with `allow_credentials`, per the CORS spec — the
/// middleware echoes back the request `Origin` instead of sending a literal
/// `*` whenever `allow_credentials` is set).
#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec![
                "GET".to_string(),
                "POST".to_string(),
                "PUT".to_string(),
                "PATCH".to_string(),
                "DELETE".to_string(),
                "OPTIONS".to_string(),
            ],
            allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
            allow_credentials: false,
            max_age_seconds: 600,
        }
    }
}

impl CorsConfig {
    fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == "*" || o == origin)
    }

    fn origin_header(&self, origin: &str) -> String {
        if self.allow_credentials || !self.allowed_origins.iter().any(|o| o == "*") {
            origin.to_string()
        } else {
            "*".to_string()
        }
    }
}

pub struct CorsMiddleware {
    config: CorsConfig,
}

impl CorsMiddleware {
    pub fn new(config: CorsConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Middleware for CorsMiddleware {
    fn name(&self) -> &str {
        "cors"
    }

    async fn handle(&self, ctx: &mut Context, next: Next<'_>) {
        let Some(origin) = ctx.request.header("origin").map(str::to_string) else {
            next.run(ctx).await;
            return;
        };

        if !self.config.is_allowed(&origin) {
            next.run(ctx).await;
            return;
        }

        let is_preflight = ctx.request.method.eq_ignore_ascii_case("OPTIONS")
            && ctx.request.header("access-control-request-method").is_some();

        if is_preflight {
            ctx.response.status = 204;
            ctx.response
                .headers
                .insert("access-control-allow-methods".to_string(), self.config.allowed_methods.join(", "));
            ctx.response
                .headers
                .insert("access-control-allow-headers".to_string(), self.config.allowed_headers.join(", "));
            ctx.response.headers.insert(
                "access-control-max-age".to_string(),
                self.config.max_age_seconds.to_string(),
            );
        } else {
            next.run(ctx).await;
        }

        ctx.response
            .headers
            .insert("access-control-allow-origin".to_string(), self.config.origin_header(&origin));
        if self.config.allow_credentials {
            ctx.response
                .headers
                .insert("access-control-allow-credentials".to_string(), "true".to_string());
        }
        ctx.response
            .headers
            .insert("vary".to_string(), "Origin".to_string());
    }
}
