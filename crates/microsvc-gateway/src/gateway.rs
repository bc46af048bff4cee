//! The gateway itself (§4.9, §6's `Gateway.{Build,Run}`): an axum
//! application wiring together global middleware, per-service routing,
//! circuit breakers, the response cache, aggregation, and response
//! transformation into one reverse proxy. Grounded on
//! `mofa-gateway::server::GatewayServer` — same split of a builder
//! (`GatewayServerConfig`/`build_app`) from a runner (`start`), same
//! `State`-injected axum handlers, generalized from one hardcoded OpenAI
//! backend to an arbitrary set of discovered backend services.

use crate::aggregate::AggregationCall;
use crate::cache::{cache_key, CachedResponse, InMemoryResponseCache, ResponseCache};
use crate::circuit_breaker::{CircuitBreaker, State as BreakerState};
use crate::error::GatewayError;
use crate::health::{circuit_state_label, HealthSnapshot, ServiceHealth};
use crate::metrics::GatewayMetrics;
use crate::router::Router as ServiceRouter;
use crate::types::{PathParams, RouteConfig, ServiceConfig};

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router as AxumRouter;
use dashmap::DashMap;
use microsvc_client::{CallOptions, Client};
use microsvc_core::middleware::{MiddlewareChain, MiddlewareRegistry};
use microsvc_core::transport::{TransportRequest, TransportResponse};
use microsvc_core::{Context, TaskTracker};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// One backend service the gateway fronts: its configuration, its route
/// table, and a circuit breaker per target method (§4.9: "per (service,
/// method) state machine").
struct GatewayService {
    config: ServiceConfig,
    router: ServiceRouter,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl GatewayService {
    fn breaker_for(&self, method: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(method.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config.circuit_breaker)))
            .clone()
    }
}

/// Builder behind §6's `Gateway.Build(DSL block)`: register backend
/// services (each carrying its own routes) and global middleware, then
/// [`GatewayBuilder::build`] into a runnable [`Gateway`].
pub struct GatewayBuilder {
    bind_address: String,
    health_path: String,
    metrics_path: String,
    global_middleware: MiddlewareChain,
    middleware_registry: MiddlewareRegistry,
    cache: Arc<dyn ResponseCache>,
    services: Vec<ServiceConfig>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            health_path: "/health".to_string(),
            metrics_path: "/metrics".to_string(),
            global_middleware: MiddlewareChain::new(),
            middleware_registry: MiddlewareRegistry::new(),
            cache: Arc::new(InMemoryResponseCache::new()),
            services: Vec::new(),
        }
    }

}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayBuilder {
    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }

    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    pub fn with_metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = path.into();
        self
    }

    pub fn with_global_middleware(mut self, chain: MiddlewareChain) -> Self {
        self.global_middleware = chain;
        self
    }

    pub fn with_middleware_registry(mut self, registry: MiddlewareRegistry) -> Self {
        self.middleware_registry = registry;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_service(mut self, service: ServiceConfig) -> Self {
        self.services.push(service);
        self
    }

    pub fn build(self, client: Arc<Client>) -> Arc<Gateway> {
        let services = self
            .services
            .into_iter()
            .map(|config| {
                let mut router = ServiceRouter::new();
                for route in &config.routes {
                    if let Err(e) = router.register(route.clone()) {
                        warn!(service = %config.name, error = %e, "route registration failed");
                    }
                }
                Arc::new(GatewayService { config, router, breakers: DashMap::new() })
            })
            .collect();

        Arc::new(Gateway {
            client,
            services,
            global_middleware: self.global_middleware,
            middleware_registry: self.middleware_registry,
            cache: self.cache,
            metrics: Arc::new(GatewayMetrics::new()),
            bind_address: self.bind_address,
            health_path: self.health_path,
            metrics_path: self.metrics_path,
            tasks: TaskTracker::new(),
        })
    }
}

/// A running (or not-yet-bound) API gateway (§4.9, §6).
pub struct Gateway {
    client: Arc<Client>,
    services: Vec<Arc<GatewayService>>,
    global_middleware: MiddlewareChain,
    middleware_registry: MiddlewareRegistry,
    cache: Arc<dyn ResponseCache>,
    metrics: Arc<GatewayMetrics>,
    bind_address: String,
    health_path: String,
    metrics_path: String,
    tasks: TaskTracker,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    fn find_service(&self, path: &str) -> Option<(&Arc<GatewayService>, &str)> {
        self.services.iter().find_map(|svc| {
            path.strip_prefix(svc.config.url_prefix.as_str())
                .map(|rest| (svc, if rest.is_empty() { "/" } else { rest }))
        })
    }

    fn axum_router(self: Arc<Self>) -> AxumRouter {
        let health_path = self.health_path.clone();
        let metrics_path = self.metrics_path.clone();
        AxumRouter::new()
            .route(&health_path, get(health_handler))
            .route(&metrics_path, get(metrics_handler))
            .fallback(proxy_handler)
            .with_state(self)
    }

    /// Bind `bind_address` and serve until the process exits (§6
    /// `Gateway.Run`), mirroring `GatewayServer::start`.
    pub async fn run(self: Arc<Self>) -> std::io::Result<()> {
        let addr = self.bind_address.clone();
        let app = self.axum_router();
        info!(addr = %addr, "microsvc gateway starting");
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await
    }

    /// Periodically reap rate-limiter state more than `max_idle` old
    /// (**[EXPANSION]** §5 task tracker). A no-op if no rate-limit
    /// middleware participates in the global chain — callers that want
    /// the sweep wire their own `RateLimitMiddleware::gc` call through a
    /// tracked task instead; this hook just owns the tracker's lifetime.
    pub fn spawn_background_tasks(self: &Arc<Self>, interval: Duration, sweep: impl Fn() + Send + Sync + 'static) {
        let sweep = Arc::new(sweep);
        self.tasks.spawn("gateway-rate-limit-gc", async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                sweep();
            }
        });
    }

    pub async fn shutdown(&self, deadline: Duration) {
        self.tasks.shutdown(deadline).await;
    }

    /// Entry point driven by the axum handlers below: runs the global
    /// middleware chain, then [`Gateway::route_and_proxy`] as its terminal
    /// handler (§4.9 step 1 onward).
    async fn handle(self: Arc<Self>, request: TransportRequest, query: String) -> TransportResponse {
        let mut ctx = Context::new(request);
        let this = self.clone();
        self.global_middleware
            .run(&mut ctx, &self.middleware_registry, move |ctx: &mut Context| {
                let this = this.clone();
                let query = query.clone();
                Box::pin(async move { this.route_and_proxy(ctx, &query).await })
            })
            .await;
        ctx.response
    }

    async fn route_and_proxy(&self, ctx: &mut Context, query: &str) {
        let path = ctx.request.path.clone();
        let method = ctx.request.method.clone();

        let Some((service, rest_path)) = self.find_service(&path) else {
            write_error(ctx, GatewayError::NoMatch(path));
            return;
        };

        let route_match = match service.router.resolve(rest_path, &method) {
            Some(m) => m,
            None if service.router.method_mismatch(rest_path, &method) => {
                write_error(ctx, GatewayError::MethodNotAllowed(method));
                return;
            }
            None => {
                write_error(ctx, GatewayError::NoMatch(path));
                return;
            }
        };
        let route = service.router.route(&route_match.route_id).expect("resolved route exists").clone();

        if !service.config.method_allowed(&route.target_method) {
            write_error(ctx, GatewayError::MethodNotAllowed(route.target_method.clone()));
            return;
        }

        let this_middleware = service.config.middleware.clone();
        let route = Arc::new(route);
        let params = Arc::new(route_match.path_params);
        let query = query.to_string();

        let service_name = service.config.name.clone();
        let service_version = service.config.version.clone();
        let service_timeout = service.config.timeout;
        let service_retry = service.config.retry;
        let cache_namespace = service.config.cache.namespace.clone();
        let breaker = service.breaker_for(&route.target_method);
        let client = self.client.clone();
        let cache = self.cache.clone();
        let metrics = self.metrics.clone();

        let route_for_terminal = route.clone();
        let params_for_terminal = params.clone();

        this_middleware
            .run(ctx, &self.middleware_registry, move |ctx: &mut Context| {
                let route = route_for_terminal.clone();
                let params = params_for_terminal.clone();
                let query = query.clone();
                let service_name = service_name.clone();
                let service_version = service_version.clone();
                let cache_namespace = cache_namespace.clone();
                let breaker = breaker.clone();
                let client = client.clone();
                let cache = cache.clone();
                let metrics = metrics.clone();
                Box::pin(async move {
                    proxy_one(
                        ctx,
                        ProxyRequest {
                            route,
                            params,
                            query,
                            service_name,
                            service_version,
                            service_timeout,
                            service_retry,
                            cache_namespace,
                            breaker,
                            client,
                            cache,
                            metrics,
                        },
                    )
                    .await
                })
            })
            .await;
    }
}

struct ProxyRequest {
    route: Arc<RouteConfig>,
    params: Arc<PathParams>,
    query: String,
    service_name: String,
    service_version: Option<String>,
    service_timeout: Duration,
    service_retry: crate::types::RetryPolicy,
    cache_namespace: String,
    breaker: Arc<CircuitBreaker>,
    client: Arc<Client>,
    cache: Arc<dyn ResponseCache>,
    metrics: Arc<GatewayMetrics>,
}

/// §4.9 steps 4-8 for one resolved route: cache lookup, circuit breaker
/// gate, path-param merge, proxied RPC (with the gateway's own retry loop
/// or a fan-out for aggregation routes), response transforms, and writing
/// the final response onto `ctx`.
async fn proxy_one(ctx: &mut Context, req: ProxyRequest) {
    let start = Instant::now();
    let cache_key_str = req.route.cache_ttl.map(|ttl| {
        let key = cache_key(&req.cache_namespace, &ctx.request.method, &ctx.request.path, &req.query, &req.route.vary_by, &ctx.request.headers);
        (key, ttl)
    });

    if let Some((key, _)) = &cache_key_str {
        if let Some(cached) = req.cache.get(key).await {
            req.metrics.record_cache_hit(&req.route.id);
            ctx.response = TransportResponse::new(cached.status).with_body(cached.body);
            for (k, v) in cached.headers {
                ctx.response.headers.insert(k, v);
            }
            ctx.response.headers.insert("x-cache".to_string(), "HIT".to_string());
            return;
        }
        req.metrics.record_cache_miss(&req.route.id);
    }

    if !req.breaker.can_execute().await {
        req.metrics.record_request(&req.service_name, &req.route.target_method, 503);
        write_error(ctx, GatewayError::CircuitOpen(req.service_name.clone()));
        return;
    }
    req.breaker.note_half_open_attempt().await;

    let body = merge_path_params(parse_body(&ctx.request.body), &req.params);

    let result = if let Some(handler) = req.route.aggregate.clone() {
        run_aggregation(&req, &*handler, &body).await
    } else {
        call_with_retry(&req, body).await
    };

    let elapsed = start.elapsed();
    req.metrics.observe_response_time(elapsed.as_secs_f64());

    match result {
        Ok(mut value) => {
            req.breaker.record_success().await;
            for transform in &req.route.transforms {
                value = transform.apply(value);
            }
            let bytes = serde_json::to_vec(&value).unwrap_or_default();
            req.metrics.record_request(&req.service_name, &req.route.target_method, 200);
            ctx.response = TransportResponse::new(200).with_header("content-type", "application/json").with_body(bytes.clone());
            if let Some((key, ttl)) = cache_key_str {
                let cached = CachedResponse { status: 200, headers: HashMap::new(), body: bytes };
                req.cache.set(&key, cached, ttl).await;
            }
        }
        Err(err) => {
            req.breaker.record_failure().await;
            req.metrics.record_request(&req.service_name, &req.route.target_method, err.status_code());
            write_error(ctx, err);
        }
    }
}

/// §4.9's independent retry policy: retry retryable [`GatewayError`]s up
/// to `service_retry.max_attempts`, excluding breaker-open 503s (those
/// never reach here — the breaker gate runs before this).
async fn call_with_retry(req: &ProxyRequest, body: Value) -> Result<Value, GatewayError> {
    let max_attempts = req.service_retry.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            tokio::time::sleep(req.service_retry.delay(attempt - 1)).await;
        }
        let options = CallOptions::new()
            .with_timeout(req.service_timeout)
            .with_version(req.service_version.clone().unwrap_or_else(|| "*".to_string()));
        match req.client.call(&req.service_name, &req.route.target_method, body.clone(), Some(options)).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let gateway_err: GatewayError = e.into();
                if !gateway_err.is_retryable() || attempt == max_attempts {
                    return Err(gateway_err);
                }
                warn!(attempt, service = %req.service_name, error = %gateway_err, "gateway retry");
                last_error = Some(gateway_err);
            }
        }
    }
    Err(last_error.unwrap_or(GatewayError::RetriesExhausted(max_attempts)))
}

/// Aggregation route fan-out (§4.9): issue every call in parallel with its
/// own timeout, merging successes and per-key errors rather than failing
/// the whole request on a partial failure.
async fn run_aggregation(req: &ProxyRequest, handler: &dyn crate::aggregate::AggregationHandler, body: &Value) -> Result<Value, GatewayError> {
    let calls = handler.calls(&req.params, body);
    if calls.is_empty() {
        return Err(GatewayError::MissingAggregationHandler);
    }

    let futures = calls.into_iter().map(|call: AggregationCall| {
        let client = req.client.clone();
        async move {
            let options = CallOptions::new().with_timeout(call.timeout);
            let result = client.call(&call.service, &call.method, call.body, Some(options)).await;
            (call.key, result)
        }
    });

    let outcomes = futures::future::join_all(futures).await;
    let mut results = HashMap::new();
    let mut errors = HashMap::new();
    for (key, outcome) in outcomes {
        match outcome {
            Ok(value) => {
                results.insert(key, value);
            }
            Err(e) => {
                errors.insert(key, e.to_string());
            }
        }
    }
    Ok(handler.merge(results, errors))
}

fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_slice(bytes).unwrap_or(Value::Object(Map::new()))
}

/// §4.9 step 5: merge path params into the outgoing JSON body as string
/// fields, without overwriting a same-named field already present in the
/// incoming body.
fn merge_path_params(mut body: Value, params: &PathParams) -> Value {
    if params.is_empty() {
        return body;
    }
    let object = body.as_object_mut();
    match object {
        Some(map) => {
            for (key, value) in params.iter() {
                map.entry(key.clone()).or_insert_with(|| Value::String(value.clone()));
            }
            body
        }
        None => {
            let mut map = Map::new();
            for (key, value) in params.iter() {
                map.insert(key.clone(), Value::String(value.clone()));
            }
            Value::Object(map)
        }
    }
}

fn write_error(ctx: &mut Context, error: GatewayError) {
    let status = error.status_code();
    let body = serde_json::json!({ "error": error.to_string(), "code": error.code() });
    ctx.response = TransportResponse::new(status)
        .with_header("content-type", "application/json")
        .with_body(serde_json::to_vec(&body).unwrap_or_default());
}

// ── axum wiring ────────────────────────────────────────────────────────

async fn proxy_handler(State(gateway): State<Arc<Gateway>>, method: Method, uri: Uri, headers: HeaderMap, body: Body) -> Response {
    let body_bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => return (StatusCode::BAD_REQUEST, "invalid request body").into_response(),
    };

    let mut request = TransportRequest::new(method.as_str(), uri.path());
    for (name, value) in headers.iter() {
        if let Ok(v) = value.to_str() {
            request = request.with_header(name.as_str(), v);
        }
    }
    request = request.with_body(body_bytes.to_vec());

    let query = uri.query().unwrap_or("").to_string();
    let response = gateway.handle(request, query).await;
    build_axum_response(response)
}

async fn health_handler(State(gateway): State<Arc<Gateway>>) -> Response {
    let services = futures::future::join_all(gateway.services.iter().map(|svc| async move {
        let state = svc.breakers.iter().next().map(|entry| entry.value().clone());
        let label = match state {
            Some(breaker) => circuit_state_label(breaker.state().await),
            None => circuit_state_label(BreakerState::Closed),
        };
        ServiceHealth { name: svc.config.name.clone(), circuit_state: label }
    }))
    .await;
    axum::Json(HealthSnapshot::new(services)).into_response()
}

async fn metrics_handler(State(gateway): State<Arc<Gateway>>) -> Response {
    gateway.metrics.render().into_response()
}

fn build_axum_response(response: TransportResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);
    for (key, value) in &response.headers {
        builder = builder.header(key, value);
    }
    builder.body(Body::from(response.body)).unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RouteConfig;
    use async_trait::async_trait;
    use microsvc_core::transport::Handler;
    use microsvc_core::TransportError;
    use microsvc_registry::{MemoryRegistry, Node, RoundRobinSelector, Service as RegistryService};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl microsvc_core::transport::Transport for EchoTransport {
        async fn listen(&self, _handler: Arc<dyn Handler>) -> Result<(), TransportError> {
            Ok(())
        }
        async fn stop(&self) -> Result<(), TransportError> {
            Ok(())
        }
        async fn dial(&self, _address: &str, request: microsvc_core::transport::TransportRequest) -> Result<microsvc_core::transport::TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(microsvc_core::transport::TransportResponse::ok(request.body))
        }
        fn bound_address(&self) -> Option<String> {
            None
        }
    }

    async fn gateway_with_echo_backend() -> Arc<Gateway> {
        let registry = MemoryRegistry::new();
        registry
            .register(RegistryService::new("users", "1.0.0", vec![Node::new("n1", "127.0.0.1", 9100)]), None)
            .await
            .unwrap();
        let transport = Arc::new(EchoTransport { calls: AtomicUsize::new(0) });
        let client = Arc::new(Client::new(
            registry,
            Arc::new(RoundRobinSelector::new()),
            transport,
            Arc::new(microsvc_core::codec::CodecRegistry::with_defaults()),
        ));

        let service_config = ServiceConfig::new("users", "/users")
            .with_version("1.0.0")
            .with_route(RouteConfig::new("get-user", "/:id", "get").with_method("GET"));

        Gateway::builder().with_service(service_config).build(client)
    }

    #[tokio::test]
    async fn proxies_a_matched_route_to_the_backend() {
        let gateway = gateway_with_echo_backend().await;
        let request = TransportRequest::new("GET", "/users/42");
        let response = gateway.handle(request, String::new()).await;
        assert_eq!(response.status, 200);
        let body: Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["id"], "42");
    }

    #[tokio::test]
    async fn unmatched_path_is_404() {
        let gateway = gateway_with_echo_backend().await;
        let request = TransportRequest::new("GET", "/ghost");
        let response = gateway.handle(request, String::new()).await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn wrong_method_on_known_path_is_403() {
        let gateway = gateway_with_echo_backend().await;
        let request = TransportRequest::new("POST", "/users/42");
        let response = gateway.handle(request, String::new()).await;
        assert_eq!(response.status, 403);
    }
}
