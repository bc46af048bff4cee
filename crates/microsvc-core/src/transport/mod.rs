//! Transport abstraction (§4.2): `start`/`stop`/`listen`/`dial`, with HTTP,
//! WebSocket, and in-process Loopback implementations.

mod http;
mod loopback;
mod message;
mod websocket;

pub use http::HttpTransport;
pub use loopback::LoopbackTransport;
pub use message::{TransportRequest, TransportResponse};
pub use websocket::WebSocketTransport;

use crate::error::TransportError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Invoked by a transport for every inbound request it accepts.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: TransportRequest) -> TransportResponse;
}

/// Tuning knobs common to every transport, per §4.2.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Address the transport binds its listening socket to.
    pub bind_address: String,
    /// Address advertised to the registry/peers, which may differ from
    /// `bind_address` behind NAT or a reverse proxy (§5's bind-vs-advertise
    /// distinction).
    pub advertise_address: Option<String>,
    pub max_connections: usize,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl TransportOptions {
    pub fn new(bind_address: impl Into<String>) -> Self {
        Self {
            bind_address: bind_address.into(),
            advertise_address: None,
            max_connections: 1024,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_advertise_address(mut self, address: impl Into<String>) -> Self {
        self.advertise_address = Some(address.into());
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// The address to register with discovery: `advertise_address` if set,
    /// else `bind_address`.
    pub fn public_address(&self) -> &str {
        self.advertise_address.as_deref().unwrap_or(&self.bind_address)
    }
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::new("127.0.0.1:0")
    }
}

/// Start/stop/listen/dial contract every transport implements (§4.2).
///
/// `listen` and `stop` are idempotent: calling `stop` on a transport that
/// was never started, or `listen` twice, is not an error.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Bind and begin serving inbound requests to `handler`. Returns once
    /// the socket is bound; serving happens on a background task.
    async fn listen(&self, handler: Arc<dyn Handler>) -> Result<(), TransportError>;

    /// Stop serving and release the listening socket.
    async fn stop(&self) -> Result<(), TransportError>;

    /// Issue an outbound request to `address` (a bind-or-advertise address
    /// produced by another node's `public_address()`).
    async fn dial(
        &self,
        address: &str,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError>;

    /// The address actually bound once [`Transport::listen`] has succeeded.
    fn bound_address(&self) -> Option<String>;
}
