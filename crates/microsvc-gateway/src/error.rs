//! Gateway error taxonomy. Definition-time failures (empty ids, duplicate
//! routes) and request-time failures (no route, breaker open, upstream
//! error) share one enum — unlike `mofa-kernel::gateway::GatewayError`,
//! which only covers the former and leaves runtime failures to the
//! implementation crate. Keeping both here avoids a second error type for
//! what is, in this crate, one proxy path.

use microsvc_client::ClientError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("route id cannot be empty")]
    EmptyRouteId,

    #[error("route '{0}' is already registered")]
    DuplicateRoute(String),

    #[error("route '{0}' is not registered")]
    RouteNotFound(String),

    #[error("no route matched '{0}'")]
    NoMatch(String),

    #[error("method '{0}' is not permitted on this route")]
    MethodNotAllowed(String),

    #[error("service '{0}' is not registered with the gateway")]
    UnknownService(String),

    #[error("circuit breaker open for '{0}'")]
    CircuitOpen(String),

    /// `retryable` carries through `ClientError::is_retryable()` so the
    /// gateway's own retry loop (§4.9) doesn't treat every upstream failure
    /// alike: a backend 400/401/validation error stays permanent.
    #[error("upstream call failed: {message}")]
    Upstream { message: String, retryable: bool },

    #[error("retries exhausted after {0} attempts")]
    RetriesExhausted(u32),

    #[error("aggregation route has no handler")]
    MissingAggregationHandler,
}

impl GatewayError {
    /// HTTP status this error renders as when written to the client.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::EmptyRouteId | GatewayError::DuplicateRoute(_) => 500,
            GatewayError::RouteNotFound(_) | GatewayError::NoMatch(_) => 404,
            GatewayError::MethodNotAllowed(_) => 403,
            GatewayError::UnknownService(_) => 404,
            GatewayError::CircuitOpen(_) => 503,
            GatewayError::Upstream { .. } => 502,
            GatewayError::RetriesExhausted(_) => 504,
            GatewayError::MissingAggregationHandler => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::EmptyRouteId | GatewayError::DuplicateRoute(_) => "INTERNAL",
            GatewayError::RouteNotFound(_) | GatewayError::NoMatch(_) => "NOT_FOUND",
            GatewayError::MethodNotAllowed(_) => "FORBIDDEN",
            GatewayError::UnknownService(_) => "NOT_FOUND",
            GatewayError::CircuitOpen(_) => "UNAVAILABLE",
            GatewayError::Upstream { .. } => "BAD_GATEWAY",
            GatewayError::RetriesExhausted(_) => "TIMEOUT",
            GatewayError::MissingAggregationHandler => "INTERNAL",
        }
    }

    /// §4.9 retry policy: 503 produced by an open breaker is excluded from
    /// the gateway's own retry loop (the breaker already short-circuited).
    /// `Upstream`'s own `retryable` flag, carried through from
    /// `ClientError::is_retryable()`, decides whether that case is retried;
    /// a permanent upstream failure (4xx except 408/429) is never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Upstream { retryable, .. } => *retryable,
            GatewayError::RetriesExhausted(_) => true,
            _ => false,
        }
    }
}

impl From<ClientError> for GatewayError {
    fn from(err: ClientError) -> Self {
        match &err {
            ClientError::RetriesExhausted { attempts, .. } => GatewayError::RetriesExhausted(*attempts),
            _ => {
                let retryable = err.is_retryable();
                GatewayError::Upstream { message: err.to_string(), retryable }
            }
        }
    }
}

impl From<GatewayError> for microsvc_core::ServiceError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::EmptyRouteId | GatewayError::DuplicateRoute(_) => {
                microsvc_core::ServiceError::Internal(err.to_string())
            }
            GatewayError::RouteNotFound(_) | GatewayError::NoMatch(_) => {
                microsvc_core::ServiceError::NotFound(err.to_string())
            }
            GatewayError::MethodNotAllowed(_) => microsvc_core::ServiceError::Forbidden,
            GatewayError::UnknownService(_) => microsvc_core::ServiceError::NotFound(err.to_string()),
            GatewayError::CircuitOpen(_) => microsvc_core::ServiceError::Unavailable(err.to_string()),
            GatewayError::Upstream { .. } => microsvc_core::ServiceError::Unavailable(err.to_string()),
            GatewayError::RetriesExhausted(_) => microsvc_core::ServiceError::Timeout,
            GatewayError::MissingAggregationHandler => microsvc_core::ServiceError::Internal(err.to_string()),
        }
    }
}
