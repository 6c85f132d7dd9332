//! Alert Dispatcher (C11, spec §4.11). One bounded queue + one worker task
//! per channel; each alert is formatted once and enqueued to every enabled
//! channel. Retries use the shared `util::ExponentialBackoff`, rate limiting
//! uses `ChannelRateLimiter`. Channel task boundary is the only cross-thread
//! contact point (spec §5).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::alert::channel::{AlertChannel, SendOutcome};
use crate::alert::payload::AlertPayload;
use crate::alert::ratelimit::ChannelRateLimiter;
use crate::util::ExponentialBackoff;

pub struct DispatcherConfig {
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub rate_per_second: u32,
    pub rate_max_wait: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1_000,
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 4_000,
            rate_per_second: 10,
            rate_max_wait: Duration::from_secs(5),
        }
    }
}

struct ChannelWorker {
    sender: mpsc::Sender<AlertPayload>,
    handle: JoinHandle<()>,
}

pub struct AlertDispatcher {
    workers: Vec<ChannelWorker>,
}

impl AlertDispatcher {
    pub fn new(channels: Vec<Arc<dyn AlertChannel>>, config: DispatcherConfig) -> Self {
        let workers = channels
            .into_iter()
            .map(|channel| {
                let (tx, rx) = mpsc::channel(config.queue_capacity);
                let rate_limiter =
                    Arc::new(ChannelRateLimiter::new(config.rate_per_second, config.rate_max_wait));
                let max_attempts = config.max_attempts;
                let initial_backoff_ms = config.initial_backoff_ms;
                let max_backoff_ms = config.max_backoff_ms;
                let handle = tokio::spawn(Self::run_worker(
                    channel,
                    rx,
                    rate_limiter,
                    max_attempts,
                    initial_backoff_ms,
                    max_backoff_ms,
                ));
                ChannelWorker { sender: tx, handle }
            })
            .collect();
        Self { workers }
    }

    /// Enqueues `payload` to every channel. A full queue drops the alert for
    /// that channel with a logged warning rather than blocking the pipeline.
    pub fn dispatch(&self, payload: AlertPayload) {
        for worker in &self.workers {
            if let Err(e) = worker.sender.try_send(payload.clone()) {
                log::warn!("⚠️ alert dropped, channel queue full or closed: {e}");
            }
        }
    }

    async fn run_worker(
        channel: Arc<dyn AlertChannel>,
        mut rx: mpsc::Receiver<AlertPayload>,
        rate_limiter: Arc<ChannelRateLimiter>,
        max_attempts: u32,
        initial_backoff_ms: u64,
        max_backoff_ms: u64,
    ) {
        while let Some(payload) = rx.recv().await {
            if !rate_limiter.acquire().await {
                log::warn!("⚠️ alert dropped on {}: rate limit max_wait exceeded", channel.name());
                continue;
            }

            let mut backoff = ExponentialBackoff::new(initial_backoff_ms, max_backoff_ms, max_attempts);
            loop {
                match channel.send(&payload).await {
                    SendOutcome::Delivered => {
                        log::info!("✅ alert delivered on {}", channel.name());
                        break;
                    }
                    SendOutcome::NonRetryable(status) => {
                        log::error!("❌ alert rejected on {} (status {status}), not retrying", channel.name());
                        break;
                    }
                    SendOutcome::RetryAfter(wait) => {
                        // A server-specified retry_after overrides default backoff
                        // (spec §8: 429 + retry_after=5 delays by >=5s) and isn't a
                        // failed attempt, so it doesn't consume max_attempts.
                        log::warn!("⏳ {} rate-limited, retrying after {:?}", channel.name(), wait);
                        tokio::time::sleep(wait).await;
                    }
                    SendOutcome::Retryable => {
                        if backoff.sleep().await.is_err() {
                            log::error!("❌ alert dropped on {}: retries exhausted", channel.name());
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Drains all channel queues within `deadline`, then aborts stragglers.
    /// Called during orchestrated shutdown (spec §4.12).
    pub async fn drain(self, deadline: Duration) {
        // Dropping each worker drops its sender, which closes the channel and
        // lets `run_worker`'s `rx.recv()` loop end once the queue empties.
        let handles: Vec<JoinHandle<()>> = self.workers.into_iter().map(|w| w.handle).collect();
        let wait_all = futures_join_all(handles);
        if tokio::time::timeout(deadline, wait_all).await.is_err() {
            log::warn!("⚠️ alert dispatcher drain deadline exceeded, aborting remaining workers");
        }
    }
}

async fn futures_join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingChannel {
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AlertChannel for CountingChannel {
        fn name(&self) -> &str {
            "test"
        }
        async fn send(&self, _payload: &AlertPayload) -> SendOutcome {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            SendOutcome::Delivered
        }
    }

    fn sample_payload() -> AlertPayload {
        AlertPayload {
            mint: "M".to_string(),
            token_symbol: None,
            token_name: None,
            token_image: None,
            trigger_name: "r1".to_string(),
            venue: None,
            volume_sol_5m: 1.0,
            buy_count_5m: 1,
            sell_count_5m: 0,
            unique_buyers_5m: 1.0,
            buy_sell_ratio_5m: 1.0,
            mcap_sol: None,
            avg_entry_mcap: None,
            cto_score: 0.5,
            cto_components: crate::alert::payload::CtoComponentsPayload {
                cluster: 0.0,
                concentration: 0.0,
                timing: 0.0,
                new_wallet: 0.0,
                ratio: 0.0,
            },
            top_buyers: vec![],
            clusters: vec![],
            created_at: 1_000,
        }
    }

    #[tokio::test]
    async fn dispatch_delivers_to_channel() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let channel = Arc::new(CountingChannel { attempts: attempts.clone() });
        let config = DispatcherConfig { rate_per_second: 100, ..DispatcherConfig::default() };
        let dispatcher = AlertDispatcher::new(vec![channel], config);
        dispatcher.dispatch(sample_payload());
        dispatcher.drain(Duration::from_secs(1)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
