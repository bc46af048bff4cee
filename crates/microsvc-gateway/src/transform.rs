//! Response transformation (§4.9 step 7): a route may attach one of these
//! to reshape the decoded backend body before it's written back to the
//! client. Request transformation is deliberately out of scope (§9 open
//! question): there is no DSL hook for rewriting the outgoing body, only
//! this response-side one.

use serde_json::Value;

pub trait ResponseTransform: Send + Sync {
    fn apply(&self, body: Value) -> Value;
}

/// Lifts a plain function into a [`ResponseTransform`], for routes that
/// don't need a stateful implementation.
pub struct FnTransform<F: Fn(Value) -> Value + Send + Sync>(pub F);

impl<F: Fn(Value) -> Value + Send + Sync> ResponseTransform for FnTransform<F> {
    fn apply(&self, body: Value) -> Value {
        (self.0)(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fn_transform_applies_the_closure() {
        let transform = FnTransform(|mut body: Value| {
            body["wrapped"] = json!(true);
            body
        });
        let out = transform.apply(json!({"id": 1}));
        assert_eq!(out["wrapped"], json!(true));
        assert_eq!(out["id"], 1);
    }
}
