//! Per-(service, method) circuit breaker state machine (§4.9), grounded on
//! `mofa-foundation::circuit_breaker::state::CircuitBreaker` but trimmed to
//! the three transitions the spec actually names — no failure-rate window,
//! no metrics side-channel.

use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::types::CircuitBreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: RwLock<State>,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
    half_open_inflight: AtomicU32,
    opened_at: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(State::Closed),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
            half_open_inflight: AtomicU32::new(0),
            opened_at: RwLock::new(None),
        }
    }

    /// Current state, applying the `Open` → `HalfOpen` timeout transition
    /// lazily (§4.9: "Open → HalfOpen after timeout elapses").
    pub async fn state(&self) -> State {
        let current = *self.state.read().await;
        if current == State::Open {
            let should_half_open = matches!(
                *self.opened_at.read().await,
                Some(opened_at) if opened_at.elapsed() >= self.config.timeout
            );
            if should_half_open {
                self.transition_to_half_open().await;
                return State::HalfOpen;
            }
        }
        current
    }

    /// Whether a request may be dialed right now. `HalfOpen` admits up to
    /// `half_open_requests` concurrent probes.
    pub async fn can_execute(&self) -> bool {
        match self.state().await {
            State::Closed => true,
            State::Open => false,
            State::HalfOpen => {
                self.half_open_inflight.load(Ordering::SeqCst) < self.config.half_open_requests
            }
        }
    }

    pub async fn record_success(&self) {
        match self.state().await {
            State::Closed => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
            }
            State::HalfOpen => {
                self.half_open_inflight.fetch_sub(1, Ordering::SeqCst);
                let successes = self.consecutive_successes.fetch_add(1, Ordering::SeqCst) + 1;
                if successes >= self.config.success_threshold {
                    self.transition_to_closed().await;
                }
            }
            State::Open => {}
        }
    }

    /// Any failure in `HalfOpen` reopens the circuit and resets its timer
    /// (§4.9). In `Closed`, `failure_threshold` consecutive failures open it.
    pub async fn record_failure(&self) {
        match self.state().await {
            State::Closed => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.config.failure_threshold {
                    self.transition_to_open().await;
                }
            }
            State::HalfOpen => {
                self.half_open_inflight.fetch_sub(1, Ordering::SeqCst);
                self.transition_to_open().await;
            }
            State::Open => {}
        }
    }

    /// Reserve one of the `HalfOpen` probe slots; call only after
    /// [`CircuitBreaker::can_execute`] returned true in that state.
    pub async fn note_half_open_attempt(&self) {
        if *self.state.read().await == State::HalfOpen {
            self.half_open_inflight.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn transition_to_open(&self) {
        *self.state.write().await = State::Open;
        *self.opened_at.write().await = Some(Instant::now());
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.consecutive_successes.store(0, Ordering::SeqCst);
        self.half_open_inflight.store(0, Ordering::SeqCst);
    }

    async fn transition_to_half_open(&self) {
        let mut state = self.state.write().await;
        if *state == State::Open {
            *state = State::HalfOpen;
            self.consecutive_successes.store(0, Ordering::SeqCst);
            self.half_open_inflight.store(0, Ordering::SeqCst);
        }
    }

    async fn transition_to_closed(&self) {
        *self.state.write().await = State::Closed;
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.consecutive_successes.store(0, Ordering::SeqCst);
        self.half_open_inflight.store(0, Ordering::SeqCst);
        *self.opened_at.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(failure_threshold: u32, success_threshold: u32, timeout: Duration) -> CircuitBreakerConfig {
        CircuitBreakerConfig { failure_threshold, success_threshold, timeout, half_open_requests: 1 }
    }

    #[tokio::test]
    async fn opens_after_consecutive_failures() {
        let cb = CircuitBreaker::new(config(3, 2, Duration::from_secs(5)));
        cb.record_failure().await;
        cb.record_failure().await;
        assert!(cb.can_execute().await);
        cb.record_failure().await;
        assert!(!cb.can_execute().await);
        assert_eq!(cb.state().await, State::Open);
    }

    #[tokio::test]
    async fn half_opens_after_timeout_then_closes_on_successes() {
        let cb = CircuitBreaker::new(config(1, 2, Duration::from_millis(20)));
        cb.record_failure().await;
        assert_eq!(cb.state().await, State::Open);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cb.state().await, State::HalfOpen);

        cb.note_half_open_attempt().await;
        cb.record_success().await;
        assert_eq!(cb.state().await, State::HalfOpen);

        cb.note_half_open_attempt().await;
        cb.record_success().await;
        assert_eq!(cb.state().await, State::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens_and_resets_timer() {
        let cb = CircuitBreaker::new(config(1, 2, Duration::from_millis(20)));
        cb.record_failure().await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cb.state().await, State::HalfOpen);

        cb.note_half_open_attempt().await;
        cb.record_failure().await;
        assert_eq!(cb.state().await, State::Open);
        assert!(!cb.can_execute().await);
    }

    #[tokio::test]
    async fn half_open_limits_concurrent_probes() {
        let cb = CircuitBreaker::new(config(1, 2, Duration::from_millis(10)));
        cb.record_failure().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cb.can_execute().await);
        cb.note_half_open_attempt().await;
        assert!(!cb.can_execute().await);
    }
}
