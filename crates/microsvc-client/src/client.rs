//! The discovery client (§4.8): resolve a service through the registry,
//! pick a node, dial it, retrying retryable failures with backoff.

use crate::backoff::Backoff;
use crate::error::ClientError;
use microsvc_core::codec::CodecRegistry;
use microsvc_core::transport::{Transport, TransportRequest, TransportResponse};
use microsvc_registry::{Registry, Selector, ANY_VERSION};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::Stream;
use tracing::{debug, warn};

/// Per-call tuning, defaulted per §4.8.
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub version: String,
    pub content_type: String,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub headers: Vec<(String, String)>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            version: ANY_VERSION.to_string(),
            content_type: "application/json".to_string(),
            timeout: Duration::from_secs(30),
            max_attempts: 1,
            backoff: Backoff::default(),
            headers: Vec::new(),
        }
    }
}

/// Discovery-aware RPC client (§6's `NewClient`/`Client.{Call,Stream}`):
/// embeds a registry, selector, transport, and codec registry rather than
/// subclassing any of them (§9's inheritance-to-composition mapping).
pub struct Client {
    registry: Arc<dyn Registry>,
    selector: Arc<dyn Selector>,
    transport: Arc<dyn Transport>,
    codecs: Arc<CodecRegistry>,
}

impl Client {
    pub fn new(
        registry: Arc<dyn Registry>,
        selector: Arc<dyn Selector>,
        transport: Arc<dyn Transport>,
        codecs: Arc<CodecRegistry>,
    ) -> Self {
        Self { registry, selector, transport, codecs }
    }

    /// Resolve `service`, select a node, and issue `method` with `body`,
    /// retrying retryable failures per the options' backoff (§4.8).
    pub async fn call(
        &self,
        service: &str,
        method: &str,
        body: Value,
        options: Option<CallOptions>,
    ) -> Result<Value, ClientError> {
        let options = options.unwrap_or_default();
        let codec = self
            .codecs
            .get(&options.content_type)
            .ok_or_else(|| ClientError::Argument(format!("no codec for '{}'", options.content_type)))?;
        let encoded = codec.marshal(&body)?;

        let max_attempts = options.max_attempts.max(1);
        let mut last_error: Option<ClientError> = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = options.backoff.delay(attempt - 1);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying call");
                tokio::time::sleep(delay).await;
            }

            match self
                .dial_once(service, method, &options, &encoded)
                .await
            {
                Ok(response) => {
                    return codec.unmarshal(&response.body).map_err(ClientError::from);
                }
                Err(error) => {
                    let retryable = error.is_retryable();
                    if !retryable {
                        return Err(error);
                    }
                    if attempt == max_attempts {
                        return Err(ClientError::RetriesExhausted {
                            attempts: attempt,
                            source: Box::new(error),
                        });
                    }
                    warn!(attempt, max_attempts, %error, "call failed, will retry");
                    last_error = Some(error);
                }
            }
        }

        Err(match last_error {
            Some(error) => ClientError::RetriesExhausted { attempts: max_attempts, source: Box::new(error) },
            None => ClientError::Argument("no attempts were made".to_string()),
        })
    }

    async fn dial_once(
        &self,
        service: &str,
        method: &str,
        options: &CallOptions,
        encoded_body: &[u8],
    ) -> Result<TransportResponse, ClientError> {
        let buckets = self.registry.get_service(service, &options.version).await?;
        let nodes: Vec<_> = buckets.into_iter().flat_map(|bucket| bucket.nodes).collect();
        if nodes.is_empty() {
            return Err(ClientError::Argument(format!("service '{service}' has no nodes")));
        }
        let node = self.selector.select(&nodes)?;
        let address = node.socket_address();

        let mut request = TransportRequest::new("POST", format!("/{service}/{method}"))
            .with_header("content-type", &options.content_type)
            .with_header("accept", &options.content_type)
            .with_body(encoded_body.to_vec());
        for (key, value) in &options.headers {
            request = request.with_header(key, value);
        }

        let response = tokio::time::timeout(options.timeout, self.transport.dial(&address, request))
            .await
            .map_err(|_| ClientError::from(microsvc_core::TransportError::Timeout))??;
        Ok(response)
    }

    /// Streaming variant of [`Client::call`] (§4.8, §6). No transport
    /// bundled with this workspace implements true server streaming (§9
    /// open questions: "streaming not required of every transport"), so
    /// this resolves and dials exactly like `call` and yields the single
    /// decoded response as a one-item stream — callers written against a
    /// genuinely streaming transport can drive `Transport::dial` directly.
    pub async fn stream(
        &self,
        service: &str,
        method: &str,
        options: Option<CallOptions>,
    ) -> Result<impl Stream<Item = Result<Value, ClientError>>, ClientError> {
        let result = self.call(service, method, Value::Null, options).await;
        Ok(tokio_stream::once(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use microsvc_core::transport::Handler;
    use microsvc_core::TransportError;
    use microsvc_registry::{MemoryRegistry, Node, RoundRobinSelector, Service};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_stream::StreamExt;

    struct FlakyTransport {
        failures_remaining: AtomicUsize,
        failure_kind: TransportError,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn listen(&self, _handler: Arc<dyn Handler>) -> Result<(), TransportError> {
            Ok(())
        }
        async fn stop(&self) -> Result<(), TransportError> {
            Ok(())
        }
        async fn dial(&self, _address: &str, request: TransportRequest) -> Result<TransportResponse, TransportError> {
            if self.failures_remaining.load(Ordering::SeqCst) > 0 {
                self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
                return Err(self.failure_kind.clone());
            }
            Ok(TransportResponse::ok(request.body))
        }
        fn bound_address(&self) -> Option<String> {
            None
        }
    }

    async fn registry_with_one_node() -> Arc<MemoryRegistry> {
        let registry = MemoryRegistry::new();
        registry
            .register(Service::new("users", "1.0.0", vec![Node::new("n1", "127.0.0.1", 9000)]), None)
            .await
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn call_round_trips_through_codec_and_transport() {
        let registry = registry_with_one_node().await;
        let transport = Arc::new(FlakyTransport { failures_remaining: AtomicUsize::new(0), failure_kind: TransportError::Timeout });
        let client = Client::new(registry, Arc::new(RoundRobinSelector::new()), transport, Arc::new(CodecRegistry::with_defaults()));

        let body = serde_json::json!({"name": "Alice"});
        let response = client.call("users", "create", body.clone(), None).await.unwrap();
        assert_eq!(response, body);
    }

    #[tokio::test]
    async fn retryable_error_retries_until_success() {
        let registry = registry_with_one_node().await;
        let transport = Arc::new(FlakyTransport { failures_remaining: AtomicUsize::new(2), failure_kind: TransportError::Timeout });
        let client = Client::new(registry, Arc::new(RoundRobinSelector::new()), transport, Arc::new(CodecRegistry::with_defaults()));

        let options = CallOptions::new().with_max_attempts(3).with_backoff(Backoff::new(
            Duration::from_millis(1),
            Duration::from_millis(5),
            2.0,
        ));
        let response = client.call("users", "create", serde_json::json!({}), Some(options)).await.unwrap();
        assert_eq!(response, serde_json::json!({}));
    }

    #[tokio::test]
    async fn permanent_error_short_circuits_without_retry() {
        let registry = registry_with_one_node().await;
        let transport = Arc::new(FlakyTransport {
            failures_remaining: AtomicUsize::new(99),
            failure_kind: TransportError::Unauthorized,
        });
        let client = Client::new(registry, Arc::new(RoundRobinSelector::new()), transport, Arc::new(CodecRegistry::with_defaults()));

        let options = CallOptions::new().with_max_attempts(5);
        let err = client.call("users", "create", serde_json::json!({}), Some(options)).await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn retries_exhausted_preserves_the_underlying_error_kind() {
        let registry = registry_with_one_node().await;
        let transport = Arc::new(FlakyTransport { failures_remaining: AtomicUsize::new(99), failure_kind: TransportError::Timeout });
        let client = Client::new(registry, Arc::new(RoundRobinSelector::new()), transport, Arc::new(CodecRegistry::with_defaults()));

        let options = CallOptions::new().with_max_attempts(3).with_backoff(Backoff::new(
            Duration::from_millis(1),
            Duration::from_millis(2),
            2.0,
        ));
        let err = client.call("users", "create", serde_json::json!({}), Some(options)).await.unwrap_err();
        match &err {
            ClientError::RetriesExhausted { attempts, source } => {
                assert_eq!(*attempts, 3);
                assert!(matches!(**source, ClientError::Transport(TransportError::Timeout)));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert!(std::error::Error::source(&err).is_some());
    }

    #[tokio::test]
    async fn unknown_service_is_an_argument_error() {
        let registry = MemoryRegistry::new();
        let transport = Arc::new(FlakyTransport { failures_remaining: AtomicUsize::new(0), failure_kind: TransportError::Timeout });
        let client = Client::new(registry, Arc::new(RoundRobinSelector::new()), transport, Arc::new(CodecRegistry::with_defaults()));

        let err = client.call("ghost", "ping", serde_json::json!({}), None).await.unwrap_err();
        assert!(matches!(err, ClientError::Registry(_)));
    }

    #[tokio::test]
    async fn stream_yields_a_single_decoded_item() {
        let registry = registry_with_one_node().await;
        let transport = Arc::new(FlakyTransport { failures_remaining: AtomicUsize::new(0), failure_kind: TransportError::Timeout });
        let client = Client::new(registry, Arc::new(RoundRobinSelector::new()), transport, Arc::new(CodecRegistry::with_defaults()));

        let mut items = Box::pin(client.stream("users", "ping", None).await.unwrap());
        let first = items.next().await.unwrap();
        assert!(first.is_ok());
        assert!(items.next().await.is_none());
    }
}
