//! Client-side error taxonomy (§7): wraps the lower layers it drives
//! (registry, selector, transport, codec) and adds the client's own
//! permanent-argument case.

use microsvc_core::{CodecError, TransportError};
use microsvc_registry::{RegistryError, SelectorError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClientError {
    #[error("argument error: {0}")]
    Argument(String),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("selector error: {0}")]
    Selector(#[from] SelectorError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    /// Retries of `source` were exhausted without success. `source` keeps
    /// the last attempt's error reachable through the cause chain (§7
    /// wrap-vs-replace) so callers can still match on, say, `Transport(Timeout)`.
    #[error("call failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// §7's retryable classification, restricted to the errors a client
    /// call can actually surface. `ArgumentError` is always permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Argument(_) => false,
            ClientError::Registry(e) => e.is_retryable(),
            ClientError::Selector(_) => false,
            ClientError::Transport(e) => e.is_retryable(),
            ClientError::Codec(_) => false,
            ClientError::RetriesExhausted { .. } => false,
        }
    }
}
