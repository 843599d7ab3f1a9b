//! Reconnection Policy
//!
//! Exponential backoff with jitter between attempts to reach the host's
//! console. A dispatch makes a bounded number of attempts; the policy is
//! reset once a connection is established.

use std::time::Duration;

use rand::Rng;

/// Backoff settings.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Growth factor applied after each failure.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = ±10%).
    pub jitter_factor: f64,
    /// Connection attempts per dispatch.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 3,
        }
    }
}

/// Tracks attempts and the delay before the next one.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Create a policy at its initial state.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let current_delay = config.initial_delay;
        Self {
            config,
            current_delay,
            attempts: 0,
        }
    }

    /// Record an attempt.
    ///
    /// Returns `false` once the attempt limit is reached.
    pub const fn begin_attempt(&mut self) -> bool {
        if self.attempts >= self.config.max_attempts {
            return false;
        }
        self.attempts += 1;
        true
    }

    /// Delay to wait after a failed attempt, or `None` if no attempt is left.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.config.max_attempts {
            return None;
        }

        let delay = self.jittered(self.current_delay);

        #[allow(clippy::cast_precision_loss)]
        let scaled = (self.current_delay.as_millis() as f64 * self.config.multiplier).round();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let next_millis = if scaled.is_finite() && scaled > 0.0 {
            scaled as u64
        } else {
            0
        };
        self.current_delay = Duration::from_millis(next_millis).min(self.config.max_delay);

        Some(delay)
    }

    /// Start over after a successful connection.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempts = 0;
    }

    /// Attempts made since the last reset.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return delay;
        }

        #[allow(clippy::cast_precision_loss)]
        let base = delay.as_millis() as f64;
        let spread = base * self.config.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-spread..=spread);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = (base + jitter).max(1.0) as u64;
        Duration::from_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn without_jitter(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy::new(ReconnectConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts,
        })
    }

    #[test]
    fn delays_grow_and_cap() {
        let mut policy = without_jitter(10);
        let delays: Vec<_> = (0..4)
            .map(|_| {
                assert!(policy.begin_attempt());
                policy.next_delay().unwrap()
            })
            .collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(300),
                Duration::from_millis(300),
            ]
        );
    }

    #[test]
    fn attempt_limit_is_enforced() {
        let mut policy = without_jitter(2);

        assert!(policy.begin_attempt());
        assert!(policy.next_delay().is_some());
        assert!(policy.begin_attempt());
        assert_eq!(policy.next_delay(), None);
        assert!(!policy.begin_attempt());
        assert_eq!(policy.attempts(), 2);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut policy = without_jitter(2);
        policy.begin_attempt();
        let _ = policy.next_delay();
        policy.begin_attempt();

        policy.reset();

        assert_eq!(policy.attempts(), 0);
        assert!(policy.begin_attempt());
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for _ in 0..100 {
            let mut policy = ReconnectPolicy::new(ReconnectConfig {
                initial_delay: Duration::from_millis(1000),
                ..ReconnectConfig::default()
            });
            policy.begin_attempt();
            let millis = policy.next_delay().unwrap().as_millis();
            assert!((900..=1100).contains(&millis), "delay {millis}ms out of bounds");
        }
    }
}
