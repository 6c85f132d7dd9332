//! Configuration loaded from environment variables (spec §6).
//!
//! Follows the teacher's `Config::from_env()` / `PipelineConfig::from_env()`
//! pattern: a plain struct, parsed defaults, `.expect(...)` on missing
//! mandatory variables (spec §7 error kind 5 — fatal startup failures exit
//! before any side effect).

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub stream_endpoint: String,
    pub stream_token: String,
    pub stream_consumer_count: usize,
    pub consumer_name: Option<String>,

    pub counter_store_url: String,
    pub append_sink_url: String,

    pub enrichment_api_key: String,
    pub enrichment_daily_credits: u64,
    pub enrichment_base_url: String,
    pub price_service_base_url: String,

    pub discord_webhook_url: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,

    pub hot_token_ttl_seconds: i64,
    pub warm_ttl_seconds: i64,
    pub alert_cooldown_seconds: i64,
    pub min_swap_confidence: f64,

    pub bp_lag_warn_s: i64,
    pub bp_lag_crit_s: i64,
    pub bp_buf_warn: u64,
    pub bp_buf_crit: u64,

    pub claim_idle_min_idle_ms: u64,
    pub dedup_ttl_seconds: i64,

    /// Delta log retention, also used as the HOT-promotion backfill horizon
    /// (spec §4.8: "retention >= HOT backfill horizon, default 60 minutes").
    pub delta_log_retention_seconds: i64,
    pub stream_read_batch_size: usize,
    pub stream_block_ms: u64,
    pub shutdown_drain_deadline_seconds: u64,

    pub db_path: String,
    pub delta_log_dir: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables. Panics (intentionally —
    /// spec §7 kind 5) if a mandatory variable is unset.
    pub fn from_env() -> Self {
        Self {
            stream_endpoint: env::var("STREAM_ENDPOINT")
                .expect("STREAM_ENDPOINT must be set"),
            stream_token: env::var("STREAM_TOKEN").expect("STREAM_TOKEN must be set"),
            stream_consumer_count: env_parsed("STREAM_CONSUMER_COUNT", 1),
            consumer_name: env::var("CONSUMER_NAME").ok(),

            counter_store_url: env::var("COUNTER_STORE_URL")
                .expect("COUNTER_STORE_URL must be set"),
            append_sink_url: env::var("APPEND_SINK_URL").expect("APPEND_SINK_URL must be set"),

            enrichment_api_key: env::var("ENRICHMENT_API_KEY")
                .expect("ENRICHMENT_API_KEY must be set"),
            enrichment_daily_credits: env_parsed("ENRICHMENT_DAILY_CREDITS", 500_000),
            enrichment_base_url: env::var("ENRICHMENT_BASE_URL")
                .expect("ENRICHMENT_BASE_URL must be set"),
            price_service_base_url: env::var("PRICE_SERVICE_BASE_URL")
                .expect("PRICE_SERVICE_BASE_URL must be set"),

            discord_webhook_url: env::var("DISCORD_WEBHOOK_URL").ok(),
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN").ok(),
            telegram_chat_id: env::var("TELEGRAM_CHAT_ID").ok(),

            hot_token_ttl_seconds: env_parsed("HOT_TOKEN_TTL_SECONDS", 3600),
            warm_ttl_seconds: env_parsed("WARM_TTL_SECONDS", 1800),
            alert_cooldown_seconds: env_parsed("ALERT_COOLDOWN_SECONDS", 300),
            min_swap_confidence: env_parsed("MIN_SWAP_CONFIDENCE", 0.7),

            bp_lag_warn_s: env_parsed("BP_LAG_WARN_S", 10),
            bp_lag_crit_s: env_parsed("BP_LAG_CRIT_S", 60),
            bp_buf_warn: env_parsed("BP_BUF_WARN", 5_000),
            bp_buf_crit: env_parsed("BP_BUF_CRIT", 20_000),

            claim_idle_min_idle_ms: env_parsed("CLAIM_IDLE_MIN_IDLE_MS", 30_000),
            dedup_ttl_seconds: env_parsed("DEDUP_TTL_SECONDS", 600),

            delta_log_retention_seconds: env_parsed("DELTA_LOG_RETENTION_SECONDS", 3_600),
            stream_read_batch_size: env_parsed("STREAM_READ_BATCH_SIZE", 100),
            stream_block_ms: env_parsed("STREAM_BLOCK_MS", 1_000),
            shutdown_drain_deadline_seconds: env_parsed("SHUTDOWN_DRAIN_DEADLINE_SECONDS", 10),

            db_path: env_or("SENTRY_DB_PATH", "./sentry.db"),
            delta_log_dir: env_or("DELTA_LOG_DIR", "./delta-log"),
        }
    }
}

/// Which roles this process runs (spec §6 CLI flags). Absence of flags = all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roles {
    pub ingest: bool,
    pub consume: bool,
    pub detect: bool,
}

impl Roles {
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Self {
        let mut ingest_only = false;
        let mut consume_only = false;
        let mut detect_only = false;
        for arg in args {
            match arg.as_str() {
                "--ingest-only" => ingest_only = true,
                "--consume-only" => consume_only = true,
                "--detect-only" => detect_only = true,
                _ => {}
            }
        }
        if !ingest_only && !consume_only && !detect_only {
            return Self { ingest: true, consume: true, detect: true };
        }
        Self { ingest: ingest_only, consume: consume_only, detect: detect_only }
    }
}

impl Default for Roles {
    fn default() -> Self {
        Self { ingest: true, consume: true, detect: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_means_all_roles() {
        let roles = Roles::from_args(Vec::<String>::new());
        assert!(roles.ingest && roles.consume && roles.detect);
    }

    #[test]
    fn ingest_only_disables_other_roles() {
        let roles = Roles::from_args(vec!["--ingest-only".to_string()]);
        assert!(roles.ingest);
        assert!(!roles.consume);
        assert!(!roles.detect);
    }

    #[test]
    fn multiple_flags_combine() {
        let roles =
            Roles::from_args(vec!["--consume-only".to_string(), "--detect-only".to_string()]);
        assert!(!roles.ingest);
        assert!(roles.consume);
        assert!(roles.detect);
    }
}
