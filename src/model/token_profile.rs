//! Per-mint monitoring state (C7 State Manager). See spec §4.7.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenState {
    Cold,
    Warm,
    Hot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenProfile {
    pub mint: String,
    pub first_seen: i64,
    pub state: TokenState,
    pub state_since: i64,
    pub hot_ttl_expires_at: Option<i64>,
    pub last_alert_at: Option<i64>,
}

impl TokenProfile {
    pub fn new_cold(mint: String, now: i64) -> Self {
        Self {
            mint,
            first_seen: now,
            state: TokenState::Cold,
            state_since: now,
            hot_ttl_expires_at: None,
            last_alert_at: None,
        }
    }
}
