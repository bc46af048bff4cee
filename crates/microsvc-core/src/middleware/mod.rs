//! Priority-ordered middleware chain (§4.3): skip/require/anonymous
//! filtering, short-circuit semantics, and the built-in middleware set.

mod builtin;
mod chain;
mod registry;

pub use builtin::{
    AuthMiddleware, CompressionMiddleware, CorsConfig, CorsMiddleware, ErrorHandlerMiddleware,
    LoggingMiddleware, RateLimitMiddleware, RateLimitStrategy, RecoveryMiddleware,
    RequestIdMiddleware, RequestSizeMiddleware, TimeoutMiddleware, TimingMiddleware,
};
pub use chain::{Middleware, MiddlewareChain, MiddlewareEntry, Next};
pub use registry::MiddlewareRegistry;
