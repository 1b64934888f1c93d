//! Reconnect pacing for the channel task.
//!
//! The server's previous client relied on the transport's built-in retry;
//! this client owns the policy explicitly: exponential growth from a base
//! delay to a cap, with ±50% jitter so a fleet of consoles does not
//! reconnect in lockstep. `reset` is called after a connection is
//! established so a later outage starts from the base again.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            attempt: 0,
        }
    }

    /// Next delay to sleep before another connection attempt.
    pub fn next_delay(&mut self) -> Duration {
        let exp = self.base.saturating_mul(1u32 << self.attempt.min(16));
        let capped = exp.min(self.cap);
        self.attempt = self.attempt.saturating_add(1);
        let jitter: f64 = rand::rng().random_range(0.5..1.5);
        capped.mul_f64(jitter)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_and_respects_cap() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(2));
        let mut previous_max = Duration::ZERO;
        for _ in 0..8 {
            let delay = backoff.next_delay();
            // Jitter is ±50%, so the hard ceiling is 1.5 × cap.
            assert!(delay <= Duration::from_secs(3));
            previous_max = previous_max.max(delay);
        }
        assert!(previous_max >= Duration::from_millis(50));
    }

    #[test]
    fn reset_returns_to_base_range() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(30));
        for _ in 0..6 {
            backoff.next_delay();
        }
        backoff.reset();
        let delay = backoff.next_delay();
        assert!(delay <= Duration::from_millis(150));
    }
}
