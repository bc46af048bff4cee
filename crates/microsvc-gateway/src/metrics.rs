//! Gateway metrics (§4.9): request counters, cache hit/miss counters, and a
//! response-time gauge, exported as Prometheus text format. Uses the
//! `prometheus` crate directly rather than hand-rolling the exposition
//! format the way `mofa-monitoring::dashboard::prometheus` does for its
//! own richer histogram — the gateway only needs counters and a gauge, so
//! the crate's own registry and encoder cover it without custom rendering.

use prometheus::{Encoder, Gauge, IntCounterVec, Opts, Registry, TextEncoder};

pub struct GatewayMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    cache_hits_total: IntCounterVec,
    cache_misses_total: IntCounterVec,
    response_time_seconds: Gauge,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("gateway_requests_total", "Total proxied requests"),
            &["service", "method", "status"],
        )
        .expect("valid metric opts");
        let cache_hits_total = IntCounterVec::new(
            Opts::new("gateway_cache_hits_total", "Response cache hits"),
            &["route"],
        )
        .expect("valid metric opts");
        let cache_misses_total = IntCounterVec::new(
            Opts::new("gateway_cache_misses_total", "Response cache misses"),
            &["route"],
        )
        .expect("valid metric opts");
        let response_time_seconds =
            Gauge::new("gateway_response_time_seconds", "Last observed backend response time").expect("valid metric opts");

        registry.register(Box::new(requests_total.clone())).expect("register once");
        registry.register(Box::new(cache_hits_total.clone())).expect("register once");
        registry.register(Box::new(cache_misses_total.clone())).expect("register once");
        registry.register(Box::new(response_time_seconds.clone())).expect("register once");

        Self { registry, requests_total, cache_hits_total, cache_misses_total, response_time_seconds }
    }

    pub fn record_request(&self, service: &str, method: &str, status: u16) {
        self.requests_total.with_label_values(&[service, method, &status.to_string()]).inc();
    }

    pub fn record_cache_hit(&self, route_id: &str) {
        self.cache_hits_total.with_label_values(&[route_id]).inc();
    }

    pub fn record_cache_miss(&self, route_id: &str) {
        self.cache_misses_total.with_label_values(&[route_id]).inc();
    }

    pub fn observe_response_time(&self, seconds: f64) {
        self.response_time_seconds.set(seconds);
    }

    /// Render the current state in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode(&metric_families, &mut buffer).expect("text encoding never fails for valid metrics");
        String::from_utf8(buffer).expect("prometheus text encoding is always valid utf-8")
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_recorded_series() {
        let metrics = GatewayMetrics::new();
        metrics.record_request("users", "GET", 200);
        metrics.record_cache_hit("users-get");
        metrics.observe_response_time(0.042);

        let text = metrics.render();
        assert!(text.contains("gateway_requests_total"));
        assert!(text.contains("gateway_cache_hits_total"));
        assert!(text.contains("gateway_response_time_seconds 0.042"));
    }
}
