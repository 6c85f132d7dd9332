//! Exponential backoff helper used by the alert dispatcher's retry loop (C11,
//! spec §4.11) and anywhere else a transient failure needs bounded retries.
//! Generalized from the teacher's `streamer_core::error_handler::ExponentialBackoff`
//! (seconds-granularity, reconnect-only) to millisecond granularity with
//! jitter-free doubling, since C11's retry cadence is sub-second.

use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug)]
pub struct ExponentialBackoff {
    initial_delay_ms: u64,
    max_delay_ms: u64,
    max_retries: u32,
    current_attempt: u32,
}

#[derive(Debug)]
pub struct MaxRetriesExceeded;

impl std::fmt::Display for MaxRetriesExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "maximum retry attempts exceeded")
    }
}

impl std::error::Error for MaxRetriesExceeded {}

impl ExponentialBackoff {
    pub fn new(initial_delay_ms: u64, max_delay_ms: u64, max_retries: u32) -> Self {
        Self {
            initial_delay_ms,
            max_delay_ms,
            max_retries,
            current_attempt: 0,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.current_attempt
    }

    pub fn exhausted(&self) -> bool {
        self.current_attempt >= self.max_retries
    }

    fn next_delay(&self) -> Duration {
        let delay = self
            .initial_delay_ms
            .saturating_mul(2_u64.saturating_pow(self.current_attempt));
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    /// Sleep for the current backoff interval, then advance the attempt
    /// counter. Returns `Err` once `max_retries` is reached without sleeping.
    pub async fn sleep(&mut self) -> Result<(), MaxRetriesExceeded> {
        if self.exhausted() {
            return Err(MaxRetriesExceeded);
        }
        let delay = self.next_delay();
        log::warn!(
            "⏳ retry attempt {} of {} in {}ms",
            self.current_attempt + 1,
            self.max_retries,
            delay.as_millis()
        );
        sleep(delay).await;
        self.current_attempt += 1;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_until_capped() {
        let mut b = ExponentialBackoff::new(100, 1_000, 10);
        assert_eq!(b.next_delay(), Duration::from_millis(100));
        b.current_attempt = 1;
        assert_eq!(b.next_delay(), Duration::from_millis(200));
        b.current_attempt = 5;
        assert_eq!(b.next_delay(), Duration::from_millis(1_000));
    }

    #[tokio::test]
    async fn exhausts_after_max_retries() {
        let mut b = ExponentialBackoff::new(1, 2, 2);
        assert!(b.sleep().await.is_ok());
        assert!(b.sleep().await.is_ok());
        assert!(b.sleep().await.is_err());
    }

    #[test]
    fn reset_clears_attempt_counter() {
        let mut b = ExponentialBackoff::new(1, 2, 2);
        b.current_attempt = 2;
        b.reset();
        assert_eq!(b.attempt(), 0);
    }
}
