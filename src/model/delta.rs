//! Per-(owner, mint) balance change, produced by the delta extractor (C3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Delta {
    pub amount_decimal: f64,
    pub decimals: u8,
}

impl Delta {
    pub fn is_inflow(&self) -> bool {
        self.amount_decimal > 0.0
    }

    pub fn is_outflow(&self) -> bool {
        self.amount_decimal < 0.0
    }
}

/// Output of the delta extractor (C3): per-(owner,mint) token deltas, per-owner
/// native deltas (with wrapped-native folded in and the fee subtracted from the
/// fee payer), and a venue hint from the first recognized program id.
#[derive(Debug, Clone, Default)]
pub struct ExtractedDeltas {
    pub token_deltas: std::collections::HashMap<(String, String), Delta>,
    pub native_deltas: std::collections::HashMap<String, f64>,
    pub venue_hint: Option<String>,
}
