//! Crate-level error taxonomy for `microsvc-core`.
//!
//! Mirrors §7 of the design: transport errors are a closed machine-readable
//! enum, codec errors are a separate enum, and [`retryable`] is the single
//! place that classifies an error as safe to retry.

use thiserror::Error;

/// Errors surfaced by a [`crate::transport::Transport`] implementation.
///
/// Every variant maps to a `retryable?` verdict in [`TransportError::is_retryable`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    #[error("operation timed out")]
    Timeout,

    #[error("connection refused")]
    ConnectionRefused,

    #[error("connection reset")]
    ConnectionReset,

    #[error("network unreachable")]
    NetworkUnreachable,

    #[error("service unavailable")]
    ServiceUnavailable,

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("unknown transport error: {0}")]
    Unknown(String),
}

impl TransportError {
    /// §4.2: `Timeout`, `ConnectionRefused`, `ConnectionReset`, and
    /// `NetworkUnreachable` are retryable; everything else is permanent.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout
                | TransportError::ConnectionRefused
                | TransportError::ConnectionReset
                | TransportError::NetworkUnreachable
        )
    }
}

/// Errors surfaced by [`crate::codec::Codec`] and [`crate::codec::CodecRegistry`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    #[error("no codec registered for content type '{0}'")]
    NotRegistered(String),

    #[error("marshal error: {0}")]
    MarshalError(String),

    #[error("unmarshal error: {0}")]
    UnmarshalError(String),

    #[error("invalid data")]
    InvalidData,

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("unsupported type: {0}")]
    UnsupportedType(String),
}

/// Pool errors (§7), surfaced by connection-pooling transports.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PoolError {
    #[error("pool is closed")]
    PoolClosed,
    #[error("pool exhausted")]
    PoolExhausted,
    #[error("timed out waiting for a pooled connection")]
    PoolTimeout,
}

/// HTTP status code an error taxonomy maps to, per §7's propagation policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ServiceError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("rate limit exceeded")]
    RateLimit,
    #[error("internal error: {0}")]
    Internal(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("timeout")]
    Timeout,
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl ServiceError {
    /// Stable mapping from error kind to HTTP status, per §7.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::BadRequest(_) => 400,
            ServiceError::Unauthorized => 401,
            ServiceError::Forbidden => 403,
            ServiceError::NotFound(_) => 404,
            ServiceError::Conflict(_) => 409,
            ServiceError::Validation(_) => 422,
            ServiceError::RateLimit => 429,
            ServiceError::Internal(_) => 500,
            ServiceError::Unavailable(_) => 503,
            ServiceError::Timeout => 504,
            ServiceError::Unknown(_) => 500,
        }
    }

    /// §7 retryable classification for client/server errors: HTTP 408, 429,
    /// 502, 503, 504, and `RateLimit` are retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::RateLimit | ServiceError::Unavailable(_) | ServiceError::Timeout
        ) || matches!(self.status_code(), 408 | 429 | 502 | 503 | 504)
    }

    /// A stable machine-readable error code for the `{error, code, details}`
    /// body shape used by the Error handler middleware (§4.3) and the
    /// gateway's JSON error responses.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::BadRequest(_) => "BAD_REQUEST",
            ServiceError::Unauthorized => "UNAUTHORIZED",
            ServiceError::Forbidden => "FORBIDDEN",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::Validation(_) => "VALIDATION",
            ServiceError::RateLimit => "RATE_LIMIT",
            ServiceError::Internal(_) => "INTERNAL",
            ServiceError::Unavailable(_) => "UNAVAILABLE",
            ServiceError::Timeout => "TIMEOUT",
            ServiceError::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<TransportError> for ServiceError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => ServiceError::Timeout,
            TransportError::ConnectionRefused
            | TransportError::ConnectionReset
            | TransportError::NetworkUnreachable
            | TransportError::ServiceUnavailable => ServiceError::Unavailable(err.to_string()),
            TransportError::Unauthorized => ServiceError::Unauthorized,
            TransportError::Forbidden => ServiceError::Forbidden,
            TransportError::NotFound(msg) => ServiceError::NotFound(msg),
            TransportError::InvalidMessage(msg) => ServiceError::BadRequest(msg),
            TransportError::InternalError(msg) | TransportError::Unknown(msg) => {
                ServiceError::Internal(msg)
            }
        }
    }
}

impl From<CodecError> for ServiceError {
    // Codec errors are never retryable (§7) and always indicate a bad request
    // body or a server-side marshal bug; both surface as 400/500.
    fn from(err: CodecError) -> Self {
        match &err {
            CodecError::InvalidData
            | CodecError::UnmarshalError(_)
            | CodecError::TypeMismatch { .. } => ServiceError::BadRequest(err.to_string()),
            CodecError::NotRegistered(_) | CodecError::UnsupportedType(_) => {
                ServiceError::BadRequest(err.to_string())
            }
            CodecError::MarshalError(_) => ServiceError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_retryable_matches_spec_set() {
        assert!(TransportError::Timeout.is_retryable());
        assert!(TransportError::ConnectionRefused.is_retryable());
        assert!(TransportError::ConnectionReset.is_retryable());
        assert!(TransportError::NetworkUnreachable.is_retryable());
        assert!(!TransportError::Unauthorized.is_retryable());
        assert!(!TransportError::NotFound("x".into()).is_retryable());
    }

    #[test]
    fn service_error_status_mapping() {
        assert_eq!(ServiceError::NotFound("x".into()).status_code(), 404);
        assert_eq!(ServiceError::Unauthorized.status_code(), 401);
        assert_eq!(ServiceError::Validation("x".into()).status_code(), 422);
        assert_eq!(ServiceError::RateLimit.status_code(), 429);
        assert_eq!(ServiceError::Timeout.status_code(), 504);
    }

    #[test]
    fn service_error_retryable_classification() {
        assert!(ServiceError::RateLimit.is_retryable());
        assert!(ServiceError::Timeout.is_retryable());
        assert!(ServiceError::Unavailable("x".into()).is_retryable());
        assert!(!ServiceError::Validation("x".into()).is_retryable());
        assert!(!ServiceError::NotFound("x".into()).is_retryable());
    }

    #[test]
    fn codec_error_never_retryable_via_service_error() {
        let svc: ServiceError = CodecError::InvalidData.into();
        assert!(!svc.is_retryable());
    }
}
