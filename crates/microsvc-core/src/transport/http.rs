//! HTTP transport: an axum server for inbound requests, a pooled `reqwest`
//! client for outbound dials.

use super::{Handler, TransportOptions, TransportRequest, TransportResponse};
use crate::error::TransportError;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request},
    response::Response,
    Router,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Clone)]
struct HttpState {
    handler: Arc<dyn Handler>,
}

/// HTTP transport backed by `axum`/`hyper` for serving and `reqwest` for
/// dialing (§4.2).
pub struct HttpTransport {
    options: TransportOptions,
    client: reqwest::Client,
    server: Mutex<Option<(JoinHandle<()>, oneshot::Sender<()>, String)>>,
}

impl HttpTransport {
    pub fn new(options: TransportOptions) -> Self {
        let client = reqwest::Client::builder()
            .timeout(options.read_timeout)
            .pool_max_idle_per_host(options.max_connections)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            options,
            client,
            server: Mutex::new(None),
        }
    }
}

async fn serve_request(State(state): State<HttpState>, request: Request<Body>) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let headers: std::collections::HashMap<String, String> = request
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect();
    let body = match to_bytes(request.into_body(), usize::MAX).await {
        Ok(bytes) => bytes.to_vec(),
        Err(_) => Vec::new(),
    };

    let mut transport_request = TransportRequest::new(method, path);
    transport_request.headers = headers;
    transport_request.body = body;

    let transport_response = state.handler.handle(transport_request).await;
    transport_response_to_axum(transport_response)
}

fn transport_response_to_axum(response: TransportResponse) -> Response {
    let status = axum::http::StatusCode::from_u16(response.status)
        .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);
    for (key, value) in &response.headers {
        if let (Ok(name), Ok(val)) = (
            HeaderName::try_from(key.as_str()),
            HeaderValue::from_str(value),
        ) {
            builder = builder.header(name, val);
        }
    }
    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

#[async_trait]
impl super::Transport for HttpTransport {
    async fn listen(&self, handler: Arc<dyn Handler>) -> Result<(), TransportError> {
        {
            let existing = self.server.lock();
            if existing.is_some() {
                return Ok(());
            }
        }

        let state = HttpState { handler };
        let app = Router::new().fallback(serve_request).with_state(state);

        let listener = tokio::net::TcpListener::bind(&self.options.bind_address)
            .await
            .map_err(|e| TransportError::InternalError(e.to_string()))?;
        let bound = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| self.options.bind_address.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        info!(addr = %bound, "http transport listening");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        *self.server.lock() = Some((handle, shutdown_tx, bound));
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        let entry = self.server.lock().take();
        if let Some((handle, shutdown_tx, _)) = entry {
            let _ = shutdown_tx.send(());
            let _ = handle.await;
        }
        Ok(())
    }

    async fn dial(
        &self,
        address: &str,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        let url = if address.starts_with("http://") || address.starts_with("https://") {
            format!("{}{}", address.trim_end_matches('/'), request.path)
        } else {
            format!("http://{}{}", address, request.path)
        };

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| TransportError::InvalidMessage(format!("bad method {}", request.method)))?;

        let mut headers = HeaderMap::new();
        for (key, value) in &request.headers {
            if let (Ok(name), Ok(val)) = (
                HeaderName::try_from(key.as_str()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, val);
            }
        }

        let response = self
            .client
            .request(method, &url)
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else if e.is_connect() {
                    TransportError::ConnectionRefused
                } else {
                    TransportError::Unknown(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let response_headers: std::collections::HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Unknown(e.to_string()))?
            .to_vec();

        let mut transport_response = TransportResponse::new(status);
        transport_response.headers = response_headers;
        transport_response.body = body;
        Ok(transport_response)
    }

    fn bound_address(&self) -> Option<String> {
        self.server.lock().as_ref().map(|(_, _, addr)| addr.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait as at;

    struct EchoHandler;

    #[at]
    impl Handler for EchoHandler {
        async fn handle(&self, request: TransportRequest) -> TransportResponse {
            TransportResponse::ok(request.body)
        }
    }

    #[tokio::test]
    async fn listen_then_dial_round_trips_body() {
        use super::super::Transport;

        let transport = HttpTransport::new(TransportOptions::new("127.0.0.1:0"));
        transport.listen(Arc::new(EchoHandler)).await.unwrap();
        let addr = transport.bound_address().unwrap();

        let request = TransportRequest::new("POST", "/echo").with_body(b"hello".to_vec());
        let response = transport.dial(&addr, request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"hello");

        transport.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        use super::super::Transport;
        let transport = HttpTransport::new(TransportOptions::new("127.0.0.1:0"));
        transport.stop().await.unwrap();
        transport.stop().await.unwrap();
    }
}
