//! Append-only sink contract (spec §1, §6): persistent storage of swaps and
//! alerts is an external collaborator; the core only needs admission, not
//! confirmation that the remote side has durably batched the write.

use async_trait::async_trait;

use crate::alert::AlertPayload;
use crate::model::SwapEvent;

#[async_trait]
pub trait AppendSink: Send + Sync {
    async fn append_swap(&self, event: &SwapEvent) -> Result<(), crate::error::SentryError>;
    async fn append_alert(&self, alert: &AlertPayload) -> Result<(), crate::error::SentryError>;
}

pub struct HttpAppendSink {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAppendSink {
    pub fn new(base_url: String) -> Self {
        Self { base_url, client: reqwest::Client::new() }
    }
}

#[async_trait]
impl AppendSink for HttpAppendSink {
    async fn append_swap(&self, event: &SwapEvent) -> Result<(), crate::error::SentryError> {
        let url = format!("{}/swaps", self.base_url);
        self.client
            .post(&url)
            .json(event)
            .send()
            .await
            .map_err(|e| crate::error::SentryError::Other(e.to_string()))?;
        Ok(())
    }

    async fn append_alert(&self, alert: &AlertPayload) -> Result<(), crate::error::SentryError> {
        let url = format!("{}/alerts", self.base_url);
        self.client
            .post(&url)
            .json(alert)
            .send()
            .await
            .map_err(|e| crate::error::SentryError::Other(e.to_string()))?;
        Ok(())
    }
}
