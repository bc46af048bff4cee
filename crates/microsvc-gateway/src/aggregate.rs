//! Aggregation routes (§4.9): a route backed by a handler that fans out to
//! several backend calls and merges their results into one JSON body.
//! Modeled after `microsvc-service::handler::MethodHandler` — a small
//! trait invoked by the gateway rather than a closure type alias, so
//! implementations can hold their own state.

use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// One backend call to issue as part of a fan-out.
#[derive(Debug, Clone)]
pub struct AggregationCall {
    /// Key under which this call's result (or error) is reported back to
    /// [`AggregationHandler::merge`].
    pub key: String,
    pub service: String,
    pub method: String,
    pub body: Value,
    pub timeout: Duration,
}

impl AggregationCall {
    pub fn new(key: impl Into<String>, service: impl Into<String>, method: impl Into<String>, body: Value, timeout: Duration) -> Self {
        Self { key: key.into(), service: service.into(), method: method.into(), body, timeout }
    }
}

/// Describes the fan-out for an aggregation route and merges its results.
pub trait AggregationHandler: Send + Sync {
    /// The calls to issue in parallel for this request's path params and
    /// (already path-param-merged) body.
    fn calls(&self, params: &HashMap<String, String>, body: &Value) -> Vec<AggregationCall>;

    /// Combine successful results and per-key errors (§4.9: "partial
    /// failure yields the successful subset plus an error map") into the
    /// response body written back to the client.
    fn merge(&self, results: HashMap<String, Value>, errors: HashMap<String, String>) -> Value;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fanout;

    impl AggregationHandler for Fanout {
        fn calls(&self, params: &HashMap<String, String>, _body: &Value) -> Vec<AggregationCall> {
            let id = params.get("id").cloned().unwrap_or_default();
            vec![
                AggregationCall::new("profile", "users", "get", json!({"id": id}), Duration::from_secs(1)),
                AggregationCall::new("orders", "orders", "list", json!({"user_id": id}), Duration::from_secs(1)),
            ]
        }

        fn merge(&self, mut results: HashMap<String, Value>, errors: HashMap<String, String>) -> Value {
            json!({
                "profile": results.remove("profile"),
                "orders": results.remove("orders"),
                "errors": errors,
            })
        }
    }

    #[test]
    fn merge_reports_partial_failure_alongside_successes() {
        let handler = Fanout;
        let mut results = HashMap::new();
        results.insert("profile".to_string(), json!({"id": "1"}));
        let mut errors = HashMap::new();
        errors.insert("orders".to_string(), "timeout".to_string());

        let merged = handler.merge(results, errors);
        assert_eq!(merged["profile"]["id"], "1");
        assert_eq!(merged["errors"]["orders"], "timeout");
    }
}
