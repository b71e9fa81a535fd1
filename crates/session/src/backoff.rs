//! Reconnect delay policies
//!
//! The connection manager asks its policy for a delay before every reconnect
//! attempt. The default is exponential growth with jitter so a fleet of
//! clients does not hammer a recovering server in lockstep; [`FixedDelay`]
//! reproduces the legacy constant-interval behavior where that is wanted.

use std::time::Duration;

/// Strategy for spacing reconnect attempts.
///
/// `attempt` counts consecutive failures since the last successful
/// connection, starting at 0 for the first retry. Policies are stateless;
/// the manager owns the attempt counter and resets it on connect.
pub trait BackoffPolicy: Send + Sync {
    fn next_delay(&self, attempt: u32) -> Duration;
}

/// Exponential backoff with jitter. The delay for attempt `n` is
/// `initial * multiplier^n`, capped at `max`, then scaled by a random factor
/// in `[1 - jitter, 1 + jitter]` and re-capped.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    multiplier: f64,
    max: Duration,
    jitter: f64,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, multiplier: f64, max: Duration, jitter: f64) -> Self {
        Self {
            initial,
            multiplier,
            max,
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    fn base_delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(63) as i32);
        let millis = (self.initial.as_millis() as f64) * factor;
        Duration::from_millis(millis.min(self.max.as_millis() as f64) as u64)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 2.0, Duration::from_secs(30), 0.5)
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Duration {
        use rand::Rng;
        let base = self.base_delay(attempt);
        if self.jitter == 0.0 {
            return base;
        }
        let factor = rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter);
        let millis = (base.as_millis() as f64) * factor;
        Duration::from_millis(millis as u64).min(self.max)
    }
}

/// Constant delay between attempts.
#[derive(Debug, Clone)]
pub struct FixedDelay(Duration);

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self(delay)
    }
}

impl Default for FixedDelay {
    /// The legacy 5-second retry interval.
    fn default() -> Self {
        Self(Duration::from_secs(5))
    }
}

impl BackoffPolicy for FixedDelay {
    fn next_delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}
