//! External wallet-enrichment and price/metadata service contracts (spec §1,
//! §6 — out of scope as implementations; only the contracts the core depends
//! on appear here). Mirrors the teacher's `pipeline::dexscreener` reqwest
//! client shape (timeout, JSON decode, typed error) generalized to the two
//! services C10's clustering worker and alert formatting call out to.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct TokenMetadata {
    pub mint: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub price_sol: Option<f64>,
    pub mcap_sol: Option<f64>,
}

/// Last-polled metadata per mint, refreshed by a periodic poller (spec §11:
/// grounded on the teacher's `pipeline/dexscreener.rs` rate-limited polling
/// loop) rather than fetched inline on the hot swap/alert path.
#[derive(Default)]
pub struct PriceCache {
    entries: Mutex<HashMap<String, TokenMetadata>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, mint: &str) -> Option<TokenMetadata> {
        self.entries.lock().unwrap().get(mint).cloned()
    }

    pub fn set(&self, metadata: TokenMetadata) {
        self.entries.lock().unwrap().insert(metadata.mint.clone(), metadata);
    }
}

/// Who funded a wallet's first inbound native-token transfer, resolved by the
/// external enrichment service (spec §4.10).
#[async_trait]
pub trait WalletEnrichment: Send + Sync {
    async fn funded_by(&self, wallet: &str) -> Option<String>;
}

#[async_trait]
pub trait PriceMetadataService: Send + Sync {
    async fn fetch(&self, mint: &str) -> Option<TokenMetadata>;
}

#[derive(Debug, Deserialize)]
struct FundedByResponse {
    funded_by: Option<String>,
}

pub struct HttpWalletEnrichment {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    /// Daily credit budget; enforced by the remote service, tracked here only
    /// to log when the local caller is about to exhaust it (spec §6).
    daily_credits: u64,
}

impl HttpWalletEnrichment {
    pub fn new(base_url: String, api_key: String, daily_credits: u64) -> Self {
        Self {
            base_url,
            api_key,
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap_or_default(),
            daily_credits,
        }
    }

    pub fn daily_credits(&self) -> u64 {
        self.daily_credits
    }
}

#[async_trait]
impl WalletEnrichment for HttpWalletEnrichment {
    async fn funded_by(&self, wallet: &str) -> Option<String> {
        let url = format!("{}/wallets/{wallet}/funded-by", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            log::warn!("⚠️ enrichment lookup for {wallet} failed: {}", resp.status());
            return None;
        }
        resp.json::<FundedByResponse>().await.ok()?.funded_by
    }
}

pub struct HttpPriceMetadataService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpPriceMetadataService {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PriceMetadataResponse {
    symbol: Option<String>,
    name: Option<String>,
    image_url: Option<String>,
    price_sol: Option<f64>,
    mcap_sol: Option<f64>,
}

#[async_trait]
impl PriceMetadataService for HttpPriceMetadataService {
    async fn fetch(&self, mint: &str) -> Option<TokenMetadata> {
        let url = format!("{}/tokens/{mint}", self.base_url);
        let resp = self.client.get(&url).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let body: PriceMetadataResponse = resp.json().await.ok()?;
        Some(TokenMetadata {
            mint: mint.to_string(),
            symbol: body.symbol,
            name: body.name,
            image_url: body.image_url,
            price_sol: body.price_sol,
            mcap_sol: body.mcap_sol,
        })
    }
}
