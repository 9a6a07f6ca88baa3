//! Exponential backoff shared by the move queue and the sync queue.

use std::time::Duration;

/// How often and how patiently to retry a failing operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_ms: u64,
    pub multiplier: f64,
    pub max_ms: u64,
    /// Random spread applied around each delay, in milliseconds.
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_ms: 250,
            multiplier: 2.0,
            max_ms: 5000,
            jitter_ms: 0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), without jitter.
    pub fn base_delay_ms(&self, retry: u32) -> u64 {
        let mut delay = self.initial_ms;
        for _ in 1..retry {
            delay = ((delay as f64 * self.multiplier) as u64).min(self.max_ms);
        }
        delay.min(self.max_ms)
    }

    /// Delay before retry number `retry`, with jitter applied.
    pub fn delay(&self, retry: u32) -> Duration {
        compute_jittered_delay(self.base_delay_ms(retry), self.jitter_ms)
    }
}

/// Compute jittered delay for retry.
/// Uses system time nanoseconds for simple jitter without requiring rand crate.
pub fn compute_jittered_delay(base_ms: u64, jitter_ms: u64) -> Duration {
    use std::time::SystemTime;

    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    // Map nanos to range [-jitter_ms, +jitter_ms]
    let jitter_range = (jitter_ms * 2) as i64;
    let jitter = if jitter_range > 0 {
        (nanos as i64 % jitter_range) - (jitter_ms as i64)
    } else {
        0
    };

    Duration::from_millis((base_ms as i64 + jitter).max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_and_cap() {
        let policy = RetryPolicy {
            max_attempts: 6,
            initial_ms: 100,
            multiplier: 3.0,
            max_ms: 1000,
            jitter_ms: 0,
        };
        assert_eq!(policy.base_delay_ms(1), 100);
        assert_eq!(policy.base_delay_ms(2), 300);
        assert_eq!(policy.base_delay_ms(3), 900);
        assert_eq!(policy.base_delay_ms(4), 1000);
        assert_eq!(policy.delay(2), Duration::from_millis(300));
    }

    #[test]
    fn jitter_stays_in_range() {
        for _ in 0..50 {
            let d = compute_jittered_delay(500, 100).as_millis();
            assert!((400..600).contains(&d), "{} out of range", d);
        }
        assert_eq!(compute_jittered_delay(10, 0), Duration::from_millis(10));
    }
}
