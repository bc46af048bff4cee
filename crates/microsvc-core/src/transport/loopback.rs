//! In-process transport for tests and same-process service/client pairs.
//! No sockets: `dial` looks a handler up by address in a process-wide
//! registry and calls it directly.

use super::{Handler, TransportOptions, TransportRequest, TransportResponse};
use crate::error::TransportError;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};

fn registry() -> &'static DashMap<String, Arc<dyn Handler>> {
    static REGISTRY: OnceLock<DashMap<String, Arc<dyn Handler>>> = OnceLock::new();
    REGISTRY.get_or_init(DashMap::new)
}

/// Loopback transport: `listen` registers a handler under `bind_address` in
/// a process-wide table; `dial` looks the address up and invokes the
/// handler in-line, with no serialization or network round trip.
pub struct LoopbackTransport {
    options: TransportOptions,
    registered: Mutex<Option<String>>,
}

impl LoopbackTransport {
    pub fn new(options: TransportOptions) -> Self {
        Self {
            options,
            registered: Mutex::new(None),
        }
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        if let Some(address) = self.registered.lock().take() {
            registry().remove(&address);
        }
    }
}

#[async_trait]
impl super::Transport for LoopbackTransport {
    async fn listen(&self, handler: Arc<dyn Handler>) -> Result<(), TransportError> {
        let mut registered = self.registered.lock();
        if registered.is_some() {
            return Ok(());
        }
        let address = self.options.public_address().to_string();
        registry().insert(address.clone(), handler);
        *registered = Some(address);
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        if let Some(address) = self.registered.lock().take() {
            registry().remove(&address);
        }
        Ok(())
    }

    async fn dial(
        &self,
        address: &str,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        let handler = registry()
            .get(address)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::NotFound(address.to_string()))?;
        Ok(handler.handle(request).await)
    }

    fn bound_address(&self) -> Option<String> {
        self.registered.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::Transport;

    struct EchoHandler;

    #[async_trait]
    impl Handler for EchoHandler {
        async fn handle(&self, request: TransportRequest) -> TransportResponse {
            TransportResponse::ok(request.body)
        }
    }

    #[tokio::test]
    async fn dial_invokes_registered_handler_directly() {
        let transport = LoopbackTransport::new(TransportOptions::new("loopback:test-a"));
        transport.listen(Arc::new(EchoHandler)).await.unwrap();

        let request = TransportRequest::new("GET", "/").with_body(b"ping".to_vec());
        let response = transport.dial("loopback:test-a", request).await.unwrap();
        assert_eq!(response.body, b"ping");

        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn dial_unknown_address_is_not_found() {
        let transport = LoopbackTransport::new(TransportOptions::new("loopback:test-b"));
        let err = transport
            .dial("loopback:does-not-exist", TransportRequest::new("GET", "/"))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::NotFound("loopback:does-not-exist".to_string()));
    }

    #[tokio::test]
    async fn stop_deregisters_the_handler() {
        let transport = LoopbackTransport::new(TransportOptions::new("loopback:test-c"));
        transport.listen(Arc::new(EchoHandler)).await.unwrap();
        transport.stop().await.unwrap();

        let err = transport
            .dial("loopback:test-c", TransportRequest::new("GET", "/"))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::NotFound("loopback:test-c".to_string()));
    }
}
