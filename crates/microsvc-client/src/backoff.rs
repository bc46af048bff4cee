//! Exponential backoff with jitter (§4.8): `delay_n = min(maxDelay,
//! baseDelay * base^(n-1))` with ±20% jitter, `n` being the retry number
//! (1-indexed). Mirrors the shape of
//! `mofa-foundation::llm::retry::RetryExecutor`'s per-attempt delay, but as
//! a standalone value type rather than baked into the executor.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Backoff {
    pub fn new(base_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self { base_delay, max_delay, multiplier }
    }

    /// Delay before retry attempt `n` (1-indexed: the delay *before* the
    /// second call overall is `delay(1)`).
    pub fn delay(&self, n: u32) -> Duration {
        let exponent = n.saturating_sub(1) as i32;
        let raw_ms = self.base_delay.as_secs_f64() * 1000.0 * self.multiplier.powi(exponent);
        let capped_ms = raw_ms.min(self.max_delay.as_secs_f64() * 1000.0);
        let jitter = rand::thread_rng().gen_range(0.8..=1.2);
        Duration::from_secs_f64((capped_ms * jitter).max(0.0) / 1000.0)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(1), 2.0)
    }
}
