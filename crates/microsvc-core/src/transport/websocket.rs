//! WebSocket transport: one message per frame (§6). Each inbound frame is
//! treated as a complete request body; the handler's response is written
//! back as a single frame on the same socket.

use super::{Handler, TransportOptions, TransportRequest, TransportResponse};
use crate::error::TransportError;
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Clone)]
struct WsState {
    handler: Arc<dyn Handler>,
}

/// WebSocket transport, grounded in the axum `ws::WebSocketUpgrade` pattern.
pub struct WebSocketTransport {
    options: TransportOptions,
    server: Mutex<Option<(JoinHandle<()>, oneshot::Sender<()>, String)>>,
}

impl WebSocketTransport {
    pub fn new(options: TransportOptions) -> Self {
        Self {
            options,
            server: Mutex::new(None),
        }
    }
}

async fn upgrade_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.handler))
}

async fn handle_socket(socket: WebSocket, handler: Arc<dyn Handler>) {
    let (mut sender, mut receiver) = socket.split();

    while let Some(Ok(message)) = receiver.next().await {
        let body = match message {
            Message::Binary(bytes) => bytes.to_vec(),
            Message::Text(text) => text.into_bytes(),
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        let request = TransportRequest::new("WS", "/").with_body(body);
        let response = handler.handle(request).await;

        if sender
            .send(Message::Binary(response.body.into()))
            .await
            .is_err()
        {
            break;
        }
    }
    debug!("websocket connection closed");
}

#[async_trait]
impl super::Transport for WebSocketTransport {
    async fn listen(&self, handler: Arc<dyn Handler>) -> Result<(), TransportError> {
        {
            if self.server.lock().is_some() {
                return Ok(());
            }
        }

        let state = WsState { handler };
        let app = Router::new().route("/", get(upgrade_handler)).with_state(state);

        let listener = tokio::net::TcpListener::bind(&self.options.bind_address)
            .await
            .map_err(|e| TransportError::InternalError(e.to_string()))?;
        let bound = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| self.options.bind_address.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        info!(addr = %bound, "websocket transport listening");
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
        let url = if address.starts_with("ws://") || address.starts_with("wss://") {
            address.to_string()
        } else {
            format!("ws://{}/", address)
        };

        let (mut stream, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|_| TransportError::ConnectionRefused)?;

        stream
            .send(tokio_tungstenite::tungstenite::Message::Binary(
                request.body.into(),
            ))
            .await
            .map_err(|e| TransportError::Unknown(e.to_string()))?;

        match stream.next().await {
            Some(Ok(tokio_tungstenite::tungstenite::Message::Binary(bytes))) => {
                Ok(TransportResponse::ok(bytes.to_vec()))
            }
            Some(Ok(tokio_tungstenite::tungstenite::Message::Text(text))) => {
                Ok(TransportResponse::ok(text.into_bytes()))
            }
            Some(Ok(_)) | None => Err(TransportError::ConnectionReset),
            Some(Err(e)) => Err(TransportError::Unknown(e.to_string())),
        }
    }

    fn bound_address(&self) -> Option<String> {
        self.server.lock().as_ref().map(|(_, _, addr)| addr.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::Transport;

    struct UppercaseHandler;

    #[async_trait]
    impl Handler for UppercaseHandler {
        async fn handle(&self, request: TransportRequest) -> TransportResponse {
            TransportResponse::ok(request.body.to_ascii_uppercase())
        }
    }

    #[tokio::test]
    async fn listen_then_dial_round_trips_one_frame() {
        let transport = WebSocketTransport::new(TransportOptions::new("127.0.0.1:0"));
        transport.listen(Arc::new(UppercaseHandler)).await.unwrap();
        let addr = transport.bound_address().unwrap();

        let request = TransportRequest::new("WS", "/").with_body(b"hi".to_vec());
        let response = transport.dial(&addr, request).await.unwrap();
        assert_eq!(response.body, b"HI");

        transport.stop().await.unwrap();
    }
}
