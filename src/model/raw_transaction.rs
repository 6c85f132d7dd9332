//! Immutable record emitted by the durable stream (C1) and consumed by the
//! delta extractor (C3). Mirrors spec §3's `RawTransaction`.
//!
//! Deliberately not tied to any on-chain SDK type: the upstream gRPC source is
//! an external collaborator (spec §1), so only its already-decoded contract
//! shape appears here.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenBalance {
    pub account_index: usize,
    pub owner: String,
    pub mint: String,
    pub raw_amount: u64,
    pub decimals: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    pub signature: String,
    pub slot: u64,
    pub ingest_time: i64,
    pub account_keys: Vec<String>,
    pub pre_token_balances: Vec<TokenBalance>,
    pub post_token_balances: Vec<TokenBalance>,
    /// Per-account-index native balances, indexed by position in `account_keys`.
    pub pre_lamports: Vec<u64>,
    pub post_lamports: Vec<u64>,
    pub program_ids_touched: HashSet<String>,
    pub block_time: Option<i64>,
    pub fee_lamports: u64,
    pub fee_payer_index: usize,
}

impl RawTransaction {
    /// Timestamp used for lag/window bucketing. spec §9 open question: assume
    /// `ingest_time` when `block_time` is absent.
    pub fn effective_time(&self) -> i64 {
        self.block_time.unwrap_or(self.ingest_time)
    }

    pub fn owner_at(&self, account_index: usize) -> Option<&str> {
        self.account_keys.get(account_index).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_tx() -> RawTransaction {
        RawTransaction {
            signature: "sig1".into(),
            slot: 1,
            ingest_time: 1000,
            account_keys: vec!["A".into(), "B".into()],
            pre_token_balances: vec![],
            post_token_balances: vec![],
            pre_lamports: vec![],
            post_lamports: vec![],
            program_ids_touched: HashSet::new(),
            block_time: None,
            fee_lamports: 5000,
            fee_payer_index: 0,
        }
    }

    #[test]
    fn effective_time_falls_back_to_ingest_time() {
        let tx = empty_tx();
        assert_eq!(tx.effective_time(), 1000);
    }

    #[test]
    fn effective_time_prefers_block_time() {
        let mut tx = empty_tx();
        tx.block_time = Some(2000);
        assert_eq!(tx.effective_time(), 2000);
    }
}
