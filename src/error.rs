//! Crate-wide error types. Typed enums at module boundaries (generalizing the
//! teacher's hand-rolled `streamer_core::error_handler::ClientError`), composed
//! with `thiserror` rather than the teacher's `Box<dyn std::error::Error>`
//! pattern — spec §7 distinguishes error *kinds* that callers must branch on
//! (transient vs. malformed vs. contract-violation vs. fatal), which a typed
//! enum expresses directly.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("durable stream storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("record {0} not found")]
    NotFound(i64),
    #[error("serialization error: {0}")]
    Codec(String),
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("rule '{rule}' references unknown field '{field}'")]
    UnknownField { rule: String, field: String },
    #[error("rule '{rule}' has invalid operator '{op}'")]
    InvalidOperator { rule: String, op: String },
    #[error("rule list is empty")]
    EmptyRuleList,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("non-retryable response status {0}")]
    NonRetryable(u16),
    #[error("retries exhausted after {0} attempts")]
    RetriesExhausted(u32),
    #[error("rate limiter wait exceeded max_wait")]
    RateLimited,
}

#[derive(Debug, Error)]
pub enum DeltaLogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(String),
}

#[derive(Debug, Error)]
pub enum SentryError {
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Trigger(#[from] TriggerError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    DeltaLog(#[from] DeltaLogError),
    #[error("{0}")]
    Other(String),
}
