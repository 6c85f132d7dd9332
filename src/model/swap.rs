//! SwapEvent / MintTouchEvent — the output of the swap inferencer (C4).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapEvent {
    pub signature: String,
    pub slot: u64,
    pub side: Side,
    pub base_mint: String,
    /// Always the native mint (spec §3: `quote_mint = native`).
    pub quote_mint: String,
    pub base_amount: f64,
    pub quote_amount: f64,
    pub wallet: String,
    pub venue: Option<String>,
    pub confidence: f64,
    pub mcap_at_swap: Option<f64>,
    pub timestamp: i64,
}

/// Emitted instead of a SwapEvent when confidence falls below the floor: a
/// mint was touched by a transaction but no swap could be confidently inferred.
#[derive(Debug, Clone)]
pub struct MintTouchEvent {
    pub signature: String,
    pub mint: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub enum InferenceOutcome {
    Swap(SwapEvent),
    Touch(MintTouchEvent),
    NoActivity,
}
