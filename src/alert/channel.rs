//! Alert transport channels (C11, spec §4.11). One `POST` per channel of the
//! structured payload; reqwest is already the teacher's HTTP client of choice
//! (see `streamer_core`/enrichment call sites), reused here for outbound
//! webhook delivery instead of inbound polling.

use async_trait::async_trait;
use std::time::Duration;

use crate::alert::payload::AlertPayload;
use crate::error::DispatchError;

/// Outcome of a single delivery attempt, distinguishing the retry classes
/// from spec §4.11.
pub enum SendOutcome {
    Delivered,
    RetryAfter(Duration),
    Retryable,
    NonRetryable(u16),
}

#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, payload: &AlertPayload) -> SendOutcome;
}

fn classify_status(status: u16, retry_after: Option<Duration>) -> SendOutcome {
    if (200..300).contains(&status) {
        SendOutcome::Delivered
    } else if status == 429 {
        SendOutcome::RetryAfter(retry_after.unwrap_or(Duration::from_secs(1)))
    } else if (500..600).contains(&status) {
        SendOutcome::Retryable
    } else {
        SendOutcome::NonRetryable(status)
    }
}

pub struct DiscordChannel {
    webhook_url: String,
    client: reqwest::Client,
}

impl DiscordChannel {
    pub fn new(webhook_url: String) -> Self {
        Self { webhook_url, client: reqwest::Client::new() }
    }
}

#[async_trait]
impl AlertChannel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    async fn send(&self, payload: &AlertPayload) -> SendOutcome {
        let body = serde_json::json!({
            "content": format!("🚨 {} on {}", payload.trigger_name, payload.mint),
            "embeds": [payload],
        });
        match self.client.post(&self.webhook_url).json(&body).send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);
                classify_status(status, retry_after)
            }
            Err(_) => SendOutcome::Retryable,
        }
    }
}

pub struct TelegramChannel {
    bot_token: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self { bot_token, chat_id, client: reqwest::Client::new() }
    }
}

#[async_trait]
impl AlertChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, payload: &AlertPayload) -> SendOutcome {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let text = format!(
            "🚨 {} | mint={} venue={:?} cto_score={:.2}",
            payload.trigger_name, payload.mint, payload.venue, payload.cto_score
        );
        let body = serde_json::json!({ "chat_id": self.chat_id, "text": text });
        match self.client.post(&url).json(&body).send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                classify_status(status, None)
            }
            Err(_) => SendOutcome::Retryable,
        }
    }
}

/// Surfaces `DispatchError` for callers that need a typed error rather than
/// a send-outcome classification (used by the dispatcher's final drop log).
pub fn outcome_to_error(outcome: SendOutcome, attempts: u32) -> Option<DispatchError> {
    match outcome {
        SendOutcome::Delivered => None,
        SendOutcome::NonRetryable(status) => Some(DispatchError::NonRetryable(status)),
        SendOutcome::Retryable | SendOutcome::RetryAfter(_) => {
            Some(DispatchError::RetriesExhausted(attempts))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_2xx_is_delivered() {
        assert!(matches!(classify_status(204, None), SendOutcome::Delivered));
    }

    #[test]
    fn status_429_carries_retry_after() {
        match classify_status(429, Some(Duration::from_secs(5))) {
            SendOutcome::RetryAfter(d) => assert_eq!(d, Duration::from_secs(5)),
            _ => panic!("expected RetryAfter"),
        }
    }

    #[test]
    fn status_5xx_is_retryable() {
        assert!(matches!(classify_status(503, None), SendOutcome::Retryable));
    }

    #[test]
    fn other_4xx_is_non_retryable() {
        assert!(matches!(classify_status(400, None), SendOutcome::NonRetryable(400)));
    }
}
