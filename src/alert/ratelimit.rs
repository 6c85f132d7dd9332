//! Per-channel token-bucket rate limiting (C11, spec §4.11). `governor`
//! appears in the retrieval pack's MEV-bot examples for exactly this kind of
//! per-destination throttling; used here the same way, with a manual
//! check-then-sleep loop bounded by `max_wait` instead of relying on an
//! async-wait feature that may not be enabled.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{Quota, RateLimiter};

pub struct ChannelRateLimiter {
    limiter: RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>,
    max_wait: Duration,
}

impl ChannelRateLimiter {
    pub fn new(per_second: u32, max_wait: Duration) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(per_second.max(1)).unwrap());
        Self { limiter: RateLimiter::direct(quota), max_wait }
    }

    /// Waits for a token, up to `max_wait`. Returns `true` if a token was
    /// acquired, `false` if the wait budget was exhausted (spec: "bucket
    /// empty => alert waits up to max_wait then drops").
    pub async fn acquire(&self) -> bool {
        let deadline = tokio::time::Instant::now() + self.max_wait;
        loop {
            match self.limiter.check() {
                Ok(()) => return true,
                Err(not_until) => {
                    let wait = not_until.wait_time_from(governor::clock::DefaultClock::default().now());
                    if tokio::time::Instant::now() + wait > deadline {
                        return false;
                    }
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_call_acquires_immediately() {
        let limiter = ChannelRateLimiter::new(5, Duration::from_millis(500));
        assert!(limiter.acquire().await);
    }

    #[tokio::test]
    async fn exhausted_bucket_eventually_drops_if_max_wait_too_small() {
        let limiter = ChannelRateLimiter::new(1, Duration::from_millis(1));
        assert!(limiter.acquire().await);
        // Second call has no tokens left and max_wait is tiny, so it should drop.
        let acquired = limiter.acquire().await;
        assert!(!acquired);
    }
}
