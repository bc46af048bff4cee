//! `microsvc-gateway`: the API gateway (§4.9) — route resolution, a
//! per-(service, method) circuit breaker, a pluggable response cache,
//! request aggregation fan-out, response transformation, and the health
//! and metrics surfaces, all wired into one axum application by
//! [`Gateway`].

pub mod aggregate;
pub mod cache;
pub mod circuit_breaker;
pub mod error;
pub mod gateway;
pub mod health;
pub mod metrics;
pub mod router;
pub mod transform;
pub mod types;

pub use aggregate::{AggregationCall, AggregationHandler};
pub use cache::{cache_key, CachedResponse, InMemoryResponseCache, ResponseCache};
pub use circuit_breaker::{CircuitBreaker, State as CircuitState};
pub use error::GatewayError;
pub use gateway::{Gateway, GatewayBuilder};
pub use health::{circuit_state_label, HealthSnapshot, ServiceHealth};
pub use metrics::GatewayMetrics;
pub use router::{Router, RouteMatch};
pub use transform::{FnTransform, ResponseTransform};
pub use types::{CacheConfig, CircuitBreakerConfig, PathParams, RetryPolicy, RouteConfig, ServiceConfig};
