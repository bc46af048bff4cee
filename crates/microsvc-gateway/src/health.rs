//! Health snapshot (§4.9): a JSON summary of each fronted service's
//! circuit breaker state, served at a configurable path alongside the
//! metrics endpoint. A request-local concern, not part of the proxy path.

use crate::circuit_breaker::State;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub name: String,
    pub circuit_state: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub services: Vec<ServiceHealth>,
}

pub fn circuit_state_label(state: State) -> &'static str {
    match state {
        State::Closed => "closed",
        State::Open => "open",
        State::HalfOpen => "half-open",
    }
}

impl HealthSnapshot {
    pub fn new(services: Vec<ServiceHealth>) -> Self {
        let status = if services.iter().any(|s| s.circuit_state == "open") { "degraded" } else { "ok" };
        Self { status, services }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_degraded_when_any_breaker_is_open() {
        let snapshot = HealthSnapshot::new(vec![
            ServiceHealth { name: "users".to_string(), circuit_state: "closed" },
            ServiceHealth { name: "orders".to_string(), circuit_state: "open" },
        ]);
        assert_eq!(snapshot.status, "degraded");
    }

    #[test]
    fn status_is_ok_when_all_breakers_closed() {
        let snapshot = HealthSnapshot::new(vec![ServiceHealth { name: "users".to_string(), circuit_state: "closed" }]);
        assert_eq!(snapshot.status, "ok");
    }
}
