//! Delta Extractor (C3, spec §4.3). Builds per-(owner, mint) token deltas and
//! per-owner native deltas from a `RawTransaction`'s pre/post balances.
//!
//! Generalizes the teacher's `streamer_core::balance_extractor::{extract_sol_changes,
//! extract_token_changes}` — same pre/post diffing shape — into the single
//! `(owner, mint) -> decimal` / `owner -> decimal` maps the spec's data model
//! calls for, since the teacher's `BalanceDelta` is indexed by account_index
//! rather than owner and keeps SOL and token deltas in separate lists.

use std::collections::HashMap;

use crate::model::{RawTransaction, NATIVE_MINT};

/// Known swap venue program ids, most-specific first. Mirrors the teacher's
/// `Config::verified_program_ids()` allow-list.
pub const VENUE_PRIORITY: &[&str] = &[
    "pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA", // PumpSwap
    "LanMV9sAd7wArD4vJFi2qDdfnVhFxYSUg6eADduJ3uj", // LetsBonk Launchpad
    "LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo", // Meteora DLMM
];

/// Rent-exempt account-creation transfers are small and one-sided; below this
/// magnitude with no opposing token delta and no recognized venue, a native
/// delta is treated as account-rent noise rather than swap activity.
const RENT_DUST_SOL: f64 = 0.003;

pub fn venue_hint(touched: &std::collections::HashSet<String>) -> Option<String> {
    VENUE_PRIORITY
        .iter()
        .find(|id| touched.contains(**id))
        .map(|s| s.to_string())
}

pub fn extract_deltas(tx: &RawTransaction) -> crate::model::ExtractedDeltas {
    let mut token_deltas: HashMap<(String, String), crate::model::Delta> = HashMap::new();
    let mut native_deltas: HashMap<String, f64> = HashMap::new();

    for post in &tx.post_token_balances {
        let owner = post.owner.clone();
        let pre_amount = tx
            .pre_token_balances
            .iter()
            .find(|p| p.account_index == post.account_index && p.mint == post.mint)
            .map(|p| p.raw_amount)
            .unwrap_or(0);
        let raw_change = post.raw_amount as i128 - pre_amount as i128;
        if raw_change == 0 {
            continue;
        }
        let amount_decimal = raw_change as f64 / 10f64.powi(post.decimals as i32);
        let entry = token_deltas
            .entry((owner, post.mint.clone()))
            .or_insert(crate::model::Delta { amount_decimal: 0.0, decimals: post.decimals });
        entry.amount_decimal += amount_decimal;
    }
    for pre in &tx.pre_token_balances {
        let still_present = tx
            .post_token_balances
            .iter()
            .any(|p| p.account_index == pre.account_index && p.mint == pre.mint);
        if still_present || pre.raw_amount == 0 {
            continue;
        }
        let amount_decimal = -(pre.raw_amount as f64) / 10f64.powi(pre.decimals as i32);
        let entry = token_deltas
            .entry((pre.owner.clone(), pre.mint.clone()))
            .or_insert(crate::model::Delta { amount_decimal: 0.0, decimals: pre.decimals });
        entry.amount_decimal += amount_decimal;
    }

    for (idx, (pre, post)) in tx.pre_lamports.iter().zip(tx.post_lamports.iter()).enumerate() {
        let raw_change = *post as i128 - *pre as i128;
        if raw_change == 0 {
            continue;
        }
        let Some(owner) = tx.account_keys.get(idx).cloned() else { continue };
        let sol_change = raw_change as f64 / 1_000_000_000.0;
        *native_deltas.entry(owner).or_insert(0.0) += sol_change;
    }

    // Fold wrapped-native token deltas into native_deltas for the same owner.
    let wrapped_keys: Vec<(String, String)> =
        token_deltas.keys().filter(|(_, mint)| mint == NATIVE_MINT).cloned().collect();
    for key in wrapped_keys {
        if let Some(delta) = token_deltas.remove(&key) {
            *native_deltas.entry(key.0).or_insert(0.0) += delta.amount_decimal;
        }
    }

    let venue = venue_hint(&tx.program_ids_touched);

    // Fee attribution: the fee payer's native delta already reflects the fee
    // (post_lamports already deducted it), so the fee itself would otherwise
    // read as extra outflow mistaken for swap quote. Add it back before any
    // downstream ratio math treats it as swap value.
    if let Some(fee_payer) = tx.account_keys.get(tx.fee_payer_index) {
        if let Some(delta) = native_deltas.get_mut(fee_payer) {
            *delta += tx.fee_lamports as f64 / 1_000_000_000.0;
        }
    }

    // Rent-exempt account-creation noise: a lone small native delta with no
    // accompanying token delta and no recognized venue is not swap activity.
    native_deltas.retain(|owner, amount| {
        let has_token_delta = token_deltas.keys().any(|(o, _)| o == owner);
        let is_dust = amount.abs() < RENT_DUST_SOL;
        !(is_dust && !has_token_delta && venue.is_none())
    });

    crate::model::ExtractedDeltas { token_deltas, native_deltas, venue_hint: venue }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TokenBalance;
    use std::collections::HashSet;

    fn base_tx() -> RawTransaction {
        RawTransaction {
            signature: "sig".to_string(),
            slot: 1,
            ingest_time: 1_000,
            account_keys: vec!["A".to_string()],
            pre_token_balances: vec![],
            post_token_balances: vec![],
            pre_lamports: vec![0],
            post_lamports: vec![0],
            program_ids_touched: HashSet::new(),
            block_time: None,
            fee_lamports: 5_000,
            fee_payer_index: 0,
        }
    }

    #[test]
    fn simple_buy_produces_matching_token_and_native_deltas() {
        let mut tx = base_tx();
        tx.post_token_balances.push(TokenBalance {
            account_index: 0,
            owner: "A".to_string(),
            mint: "M".to_string(),
            raw_amount: 100_000_000,
            decimals: 6,
        });
        tx.pre_lamports = vec![1_000_000_000];
        tx.post_lamports = vec![500_000_000];
        tx.program_ids_touched.insert("pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA".to_string());

        let deltas = extract_deltas(&tx);
        let token_delta = deltas.token_deltas.get(&("A".to_string(), "M".to_string())).unwrap();
        assert_eq!(token_delta.amount_decimal, 100.0);
        let native = deltas.native_deltas.get("A").unwrap();
        // 500_000_000 - 1_000_000_000 = -0.5 SOL, fee added back: -0.5 + 0.000005
        assert!((native - (-0.499995)).abs() < 1e-9);
        assert_eq!(deltas.venue_hint.as_deref(), Some("pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA"));
    }

    #[test]
    fn rent_only_transfer_without_venue_is_excluded() {
        let mut tx = base_tx();
        tx.pre_lamports = vec![1_000_000_000];
        tx.post_lamports = vec![999_000_000]; // 0.001 SOL, below dust threshold
        let deltas = extract_deltas(&tx);
        assert!(deltas.native_deltas.is_empty());
    }

    #[test]
    fn wrapped_native_token_balance_folds_into_native_deltas() {
        let mut tx = base_tx();
        tx.post_token_balances.push(TokenBalance {
            account_index: 0,
            owner: "A".to_string(),
            mint: crate::model::NATIVE_MINT.to_string(),
            raw_amount: 1_000_000_000,
            decimals: 9,
        });
        let deltas = extract_deltas(&tx);
        assert!(!deltas.token_deltas.contains_key(&("A".to_string(), NATIVE_MINT.to_string())));
        assert!(deltas.native_deltas.contains_key("A"));
    }
}
