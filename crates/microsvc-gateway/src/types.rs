//! Gateway-level data model (§3 "Gateway entities", §4.9): routes, the
//! per-backend service configuration that owns them, and the circuit
//! breaker / retry / cache knobs that hang off a service.

use crate::aggregate::AggregationHandler;
use crate::transform::ResponseTransform;
use microsvc_core::middleware::MiddlewareChain;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A single routing rule. Path patterns use `:param` segments (§4.9),
/// e.g. `/orders/:id`. `method` of `None` accepts any HTTP method.
#[derive(Clone)]
pub struct RouteConfig {
    pub id: String,
    pub method: Option<String>,
    pub path_pattern: String,
    /// Method invoked on the target service via the discovery client.
    pub target_method: String,
    pub requires_auth: bool,
    pub cache_ttl: Option<Duration>,
    pub vary_by: Vec<String>,
    pub aggregate: Option<Arc<dyn AggregationHandler>>,
    /// Response transformations applied in order after the backend call
    /// decodes, before the body is written back to the client (§4.9 step
    /// 7). Request transformation has no DSL hook (§9 open question).
    pub transforms: Vec<Arc<dyn ResponseTransform>>,
}

impl RouteConfig {
    pub fn new(id: impl Into<String>, path_pattern: impl Into<String>, target_method: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method: None,
            path_pattern: path_pattern.into(),
            target_method: target_method.into(),
            requires_auth: false,
            cache_ttl: None,
            vary_by: vec!["path".to_string(), "query".to_string()],
            aggregate: None,
            transforms: Vec::new(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into().to_ascii_uppercase());
        self
    }

    pub fn with_auth_required(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn with_vary_by(mut self, vary_by: Vec<String>) -> Self {
        self.vary_by = vary_by;
        self
    }

    pub fn with_aggregation(mut self, handler: Arc<dyn AggregationHandler>) -> Self {
        self.aggregate = Some(handler);
        self
    }

    pub fn with_transform(mut self, transform: Arc<dyn ResponseTransform>) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Route patterns with no `:param` segment are resolved before any
    /// parameterized pattern (§4.9 "literal first").
    pub fn is_literal(&self) -> bool {
        !self.path_pattern.split('/').any(|segment| segment.starts_with(':'))
    }
}

/// Independent gateway-level retry policy (§4.9), distinct from the
/// discovery client's own retry loop.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff, unjittered (the discovery client's `Backoff`
    /// already covers the jittered case the spec quantifies in §8
    /// scenario 6; this policy only needs to stay under `max_backoff`).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_millis().saturating_mul(1u128 << attempt.saturating_sub(1).min(32));
        Duration::from_millis(exp.min(self.max_backoff.as_millis()) as u64)
    }
}

/// Circuit breaker tuning (§4.9), grounded on
/// `mofa-foundation::circuit_breaker::CircuitBreakerConfig` but trimmed to
/// the consecutive-failure/success model the spec actually calls for —
/// no failure-rate window.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
    pub half_open_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
            half_open_requests: 1,
        }
    }
}

/// Response cache tuning, attached at the service level as a fallback for
/// routes that don't set their own `cache_ttl`.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    pub default_ttl: Option<Duration>,
    pub namespace: String,
}

/// Configuration for one backend service fronted by the gateway (§3
/// "ServiceConfig"). Owns the routes that target it plus the per-service
/// middleware, retry, circuit breaker, and method allow/deny lists.
pub struct ServiceConfig {
    pub name: String,
    pub version: Option<String>,
    pub url_prefix: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub circuit_breaker: CircuitBreakerConfig,
    pub exposed_methods: Vec<String>,
    pub blocked_methods: Vec<String>,
    pub middleware: MiddlewareChain,
    pub routes: Vec<RouteConfig>,
    pub cache: CacheConfig,
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>, url_prefix: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            cache: CacheConfig { default_ttl: None, namespace: name.clone() },
            name,
            version: None,
            url_prefix: url_prefix.into(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            exposed_methods: Vec::new(),
            blocked_methods: Vec::new(),
            middleware: MiddlewareChain::new(),
            routes: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = config;
        self
    }

    pub fn with_exposed_methods(mut self, methods: Vec<String>) -> Self {
        self.exposed_methods = methods;
        self
    }

    pub fn with_blocked_methods(mut self, methods: Vec<String>) -> Self {
        self.blocked_methods = methods;
        self
    }

    pub fn with_middleware(mut self, middleware: MiddlewareChain) -> Self {
        self.middleware = middleware;
        self
    }

    pub fn with_route(mut self, route: RouteConfig) -> Self {
        self.routes.push(route);
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// §4.9 step 2's `exposed_methods`/`blocked_methods` gate: empty
    /// `exposed_methods` means every non-blocked method is allowed.
    pub fn method_allowed(&self, method: &str) -> bool {
        if self.blocked_methods.iter().any(|m| m == method) {
            return false;
        }
        self.exposed_methods.is_empty() || self.exposed_methods.iter().any(|m| m == method)
    }
}

/// Path parameters extracted from a matched `:param` pattern, merged into
/// the outgoing request body (§4.9 step 5).
pub type PathParams = HashMap<String, String>;
