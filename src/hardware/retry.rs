use std::thread;
use std::time::Duration;

use crate::error::HardwareError;
use crate::hardware::BusFault;

/// Bounded retry with exponential backoff for bus transactions.
///
/// `Transient` faults are retried until `max_attempts` is reached and then
/// escalated as `HardwareTimeout`. `Absent` faults escalate immediately as
/// `HardwareUnavailable`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier: if multiplier.is_finite() && multiplier >= 1.0 {
                multiplier
            } else {
                1.0
            },
        }
    }

    /// Retry without sleeping between attempts.
    pub fn no_backoff(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, 1.0)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = self.multiplier.powi(retry as i32 - 1);
        self.base_delay.mul_f64(factor)
    }

    /// Every delay slept when all attempts fail.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|i| self.delay_for(i)).collect()
    }

    /// Run `op` until it succeeds, fails permanently, or the bound is hit.
    ///
    /// `op` receives the 1-based attempt number.
    pub fn run<T, F>(&self, mut op: F) -> Result<T, HardwareError>
    where
        F: FnMut(u32) -> Result<T, BusFault>,
    {
        let mut last_fault = String::new();

        for attempt in 1..=self.max_attempts {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(BusFault::Absent(details)) => {
                    return Err(HardwareError::HardwareUnavailable { details });
                }
                Err(BusFault::Transient(details)) => {
                    log::warn!(
                        "[RetryPolicy] Transient bus fault (attempt {}/{}): {}",
                        attempt,
                        self.max_attempts,
                        details
                    );
                    last_fault = details;
                    if attempt < self.max_attempts {
                        let delay = self.delay_for(attempt);
                        if !delay.is_zero() {
                            thread::sleep(delay);
                        }
                    }
                }
            }
        }

        Err(HardwareError::HardwareTimeout {
            attempts: self.max_attempts,
            last_fault,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(5), 2.0)
    }
}
