//! Built-in middleware (§4.3 "Built-in middleware (behavioral contracts)").

mod auth;
mod compression;
mod cors;
mod error_handler;
mod logging;
mod rate_limit;
mod recovery;
mod request_id;
mod request_size;
mod timeout;
mod timing;

pub use auth::{ApiKeyScheme, AuthMiddleware, AuthScheme};
pub use compression::CompressionMiddleware;
pub use cors::{CorsConfig, CorsMiddleware};
pub use error_handler::ErrorHandlerMiddleware;
pub use logging::LoggingMiddleware;
pub use rate_limit::{RateLimitMiddleware, RateLimitStrategy};
pub use recovery::RecoveryMiddleware;
pub use request_id::RequestIdMiddleware;
pub use request_size::RequestSizeMiddleware;
pub use timeout::TimeoutMiddleware;
pub use timing::TimingMiddleware;
