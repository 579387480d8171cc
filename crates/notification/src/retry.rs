//! Attempt budget and exponential backoff schedule for deliveries.

use std::time::Duration;

/// How often and how patiently a delivery is retried.
///
/// Attempt `n` (1-based) waits `initial_backoff * multiplier^(n-2)` before
/// it starts; the first attempt starts immediately. With the defaults
/// (3 attempts, 1s, x2) the waits are 1s and 2s.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), 2.0)
    }
}

impl RetryPolicy {
    /// Creates a policy. At least one attempt is always made and the
    /// multiplier never shrinks the delay.
    pub fn new(max_attempts: u32, initial_backoff: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            multiplier: if multiplier.is_finite() {
                multiplier.max(1.0)
            } else {
                1.0
            },
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after failed attempt `attempt` before the next one.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent);
        Duration::from_millis(millis.round() as u64)
    }

    /// The attempts of one delivery in order, each with the wait that
    /// precedes it.
    pub fn attempts(&self) -> impl Iterator<Item = Attempt> + '_ {
        (1..=self.max_attempts).map(|number| Attempt {
            number,
            wait: (number > 1).then(|| self.delay_after(number - 1)),
            last: number == self.max_attempts,
        })
    }
}

/// One scheduled attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt number.
    pub number: u32,
    /// Backoff to wait before starting, `None` for the first attempt.
    pub wait: Option<Duration>,
    /// No further attempt follows this one.
    pub last: bool,
}
