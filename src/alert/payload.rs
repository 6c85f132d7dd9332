//! Alert payload (spec §6). JSON-serialized and POSTed to each enabled channel.

use serde::Serialize;

/// `+∞` has no JSON representation; the spec calls for "a sentinel large
/// number" at the wire boundary instead of failing serialization.
const INFINITE_RATIO_SENTINEL: f64 = 1.0e9;

#[derive(Debug, Clone, Serialize)]
pub struct CtoComponentsPayload {
    pub cluster: f64,
    pub concentration: f64,
    pub timing: f64,
    pub new_wallet: f64,
    pub ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopBuyer {
    pub wallet: String,
    pub volume_sol: f64,
    /// Resolved by the enrichment worker during HOT backfill (spec §4.10);
    /// absent until that wallet's funding source has been looked up.
    pub funded_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertPayload {
    pub mint: String,
    pub token_symbol: Option<String>,
    pub token_name: Option<String>,
    pub token_image: Option<String>,
    pub trigger_name: String,
    pub venue: Option<String>,
    pub volume_sol_5m: f64,
    pub buy_count_5m: u64,
    pub sell_count_5m: u64,
    pub unique_buyers_5m: f64,
    pub buy_sell_ratio_5m: f64,
    pub mcap_sol: Option<f64>,
    pub avg_entry_mcap: Option<f64>,
    pub cto_score: f64,
    pub cto_components: CtoComponentsPayload,
    pub top_buyers: Vec<TopBuyer>,
    pub clusters: Vec<String>,
    pub created_at: i64,
}

impl AlertPayload {
    /// Replaces `f64::INFINITY` with the JSON-safe sentinel before wire encoding.
    pub fn sanitized_ratio(ratio: f64) -> f64 {
        if ratio.is_infinite() { INFINITE_RATIO_SENTINEL } else { ratio }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinite_ratio_is_replaced_with_sentinel() {
        assert_eq!(AlertPayload::sanitized_ratio(f64::INFINITY), INFINITE_RATIO_SENTINEL);
    }

    #[test]
    fn finite_ratio_passes_through() {
        assert_eq!(AlertPayload::sanitized_ratio(2.5), 2.5);
    }
}
