//! Counter Store (C5, spec §4.5). Bucketed rolling 5-minute and 1-hour
//! windows per mint, with HLL uniques, top-3 heavy hitters, and a global
//! wallet-first-seen table (7-day TTL).
//!
//! The spec's external-interface key schema (`cnt:{mint}:{window}:...`,
//! `hll:...`, `top:...`, `wallet:first_seen:{wallet}`) describes a remote
//! counter store contract (spec §6); since that store is an out-of-scope
//! external collaborator, this in-process structure implements the same
//! read/write semantics the Orchestrator depends on.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::counters::bucket::{WindowBuckets, WindowKind};
use crate::counters::topk;
use crate::model::{Side, SwapEvent};

const WALLET_FIRST_SEEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowSnapshot {
    pub buy_count: u64,
    pub sell_count: u64,
    pub unique_buyers: f64,
    pub unique_sellers: f64,
    pub buy_volume_sol: f64,
    pub sell_volume_sol: f64,
    pub avg_buy_size: f64,
    pub buy_sell_ratio: f64,
    pub top_3_buyers_volume_share: f64,
    pub new_wallet_pct: f64,
    /// Average market cap at the moment of each buy in the window, when
    /// known (spec §11: price/metadata enrichment polling).
    pub avg_entry_mcap: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct AggregateSnapshot {
    pub mint: String,
    pub five_min: WindowSnapshot,
    pub one_hour: WindowSnapshot,
}

struct WalletFirstSeen {
    first_seen: i64,
    expires_at: i64,
}

pub struct CounterStore {
    windows: Mutex<HashMap<(String, WindowKind), WindowBuckets>>,
    wallet_first_seen: Mutex<HashMap<String, WalletFirstSeen>>,
}

impl Default for CounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterStore {
    pub fn new() -> Self {
        Self { windows: Mutex::new(HashMap::new()), wallet_first_seen: Mutex::new(HashMap::new()) }
    }

    /// Record a new wallet's first-seen timestamp if absent. Spec §4.5: "this
    /// write is inside the per-wallet loop, never conditioned on a later
    /// write succeeding" — called unconditionally before any early return.
    fn touch_wallet_first_seen(&self, wallet: &str, now: i64) {
        let mut seen = self.wallet_first_seen.lock().unwrap();
        seen.entry(wallet.to_string())
            .or_insert_with(|| WalletFirstSeen { first_seen: now, expires_at: now + WALLET_FIRST_SEEN_TTL_SECONDS });
    }

    fn wallet_first_seen_at(&self, wallet: &str, now: i64) -> Option<i64> {
        let seen = self.wallet_first_seen.lock().unwrap();
        seen.get(wallet).filter(|w| w.expires_at > now).map(|w| w.first_seen)
    }

    pub fn record_swap(&self, event: &SwapEvent, now: i64) {
        self.touch_wallet_first_seen(&event.wallet, now);
        let mut windows = self.windows.lock().unwrap();
        for kind in WindowKind::all() {
            let buckets = windows
                .entry((event.base_mint.clone(), kind))
                .or_insert_with(|| WindowBuckets::new(kind));
            match event.side {
                Side::Buy => buckets.record_buy(&event.wallet, event.quote_amount, event.mcap_at_swap, now),
                Side::Sell => buckets.record_sell(&event.wallet, event.quote_amount, now),
            }
        }
    }

    fn window_snapshot(&self, mint: &str, kind: WindowKind, now: i64) -> WindowSnapshot {
        let windows = self.windows.lock().unwrap();
        let Some(buckets) = windows.get(&(mint.to_string(), kind)) else {
            return WindowSnapshot::default();
        };

        let buy_count = buckets.buy_count(now);
        let sell_count = buckets.sell_count(now);
        let buy_volume_sol = buckets.buy_volume(now);
        let sell_volume_sol = buckets.sell_volume(now);
        let unique_buyers = buckets.unique_buyers(now);
        let unique_sellers = buckets.unique_sellers(now);

        let avg_buy_size = buy_volume_sol / (buy_count.max(1) as f64);
        let buy_sell_ratio = if sell_count == 0 {
            if buy_count == 0 { 0.0 } else { f64::INFINITY }
        } else {
            buy_count as f64 / sell_count as f64
        };

        let buyer_volumes = buckets.buyer_volumes_merged(now);
        let top_3_buyers_volume_share = topk::top_k_share(&buyer_volumes);

        let mcaps = buckets.buy_mcaps_merged(now);
        let avg_entry_mcap =
            if mcaps.is_empty() { None } else { Some(mcaps.iter().sum::<f64>() / mcaps.len() as f64) };

        let new_wallet_pct = if buyer_volumes.is_empty() {
            0.0
        } else {
            let window_start = now - kind.bucket_width_secs() * kind.bucket_count() as i64;
            let new_count = buyer_volumes
                .keys()
                .filter(|w| {
                    self.wallet_first_seen_at(w, now).map(|ts| ts >= window_start).unwrap_or(false)
                })
                .count();
            new_count as f64 / buyer_volumes.len() as f64
        };

        WindowSnapshot {
            buy_count,
            sell_count,
            unique_buyers,
            unique_sellers,
            buy_volume_sol,
            sell_volume_sol,
            avg_buy_size,
            buy_sell_ratio,
            top_3_buyers_volume_share,
            new_wallet_pct,
            avg_entry_mcap,
        }
    }

    /// Reads always succeed, even with no prior activity for the mint —
    /// absent keys return zeroed snapshots (spec §4.5).
    pub fn snapshot(&self, mint: &str, now: i64) -> AggregateSnapshot {
        AggregateSnapshot {
            mint: mint.to_string(),
            five_min: self.window_snapshot(mint, WindowKind::FiveMin, now),
            one_hour: self.window_snapshot(mint, WindowKind::OneHour, now),
        }
    }

    /// Buy timestamps over the 5-minute window, for the CTO scorer's
    /// burstiness factor (spec §4.10 "timing").
    pub fn buy_timestamps(&self, mint: &str, now: i64) -> Vec<i64> {
        let windows = self.windows.lock().unwrap();
        let Some(buckets) = windows.get(&(mint.to_string(), WindowKind::FiveMin)) else {
            return Vec::new();
        };
        buckets.buy_timestamps_merged(now)
    }

    pub fn top_buyers(&self, mint: &str, now: i64) -> Vec<(String, f64)> {
        let windows = self.windows.lock().unwrap();
        let Some(buckets) = windows.get(&(mint.to_string(), WindowKind::FiveMin)) else {
            return Vec::new();
        };
        let volumes = buckets.buyer_volumes_merged(now);
        drop(windows);
        topk::top_k_and_total(&volumes).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Side;

    fn swap(mint: &str, wallet: &str, side: Side, quote: f64, ts: i64) -> SwapEvent {
        SwapEvent {
            signature: format!("sig-{wallet}-{ts}"),
            slot: 1,
            side,
            base_mint: mint.to_string(),
            quote_mint: crate::model::NATIVE_MINT.to_string(),
            base_amount: 1.0,
            quote_amount: quote,
            wallet: wallet.to_string(),
            venue: None,
            confidence: 0.9,
            mcap_at_swap: None,
            timestamp: ts,
        }
    }

    #[test]
    fn empty_mint_reads_zeroed_snapshot() {
        let store = CounterStore::new();
        let snap = store.snapshot("unseen-mint", 1_000);
        assert_eq!(snap.five_min.buy_count, 0);
        assert_eq!(snap.five_min.buy_sell_ratio, 0.0);
    }

    #[test]
    fn ratio_is_infinite_when_only_buys_present() {
        let store = CounterStore::new();
        store.record_swap(&swap("M", "A", Side::Buy, 1.0, 100), 100);
        let snap = store.snapshot("M", 100);
        assert!(snap.five_min.buy_sell_ratio.is_infinite());
    }

    #[test]
    fn ten_buys_across_four_wallets_raises_counts() {
        let store = CounterStore::new();
        let wallets = ["A", "B", "C", "D"];
        for i in 0..10 {
            let wallet = wallets[i % wallets.len()];
            store.record_swap(&swap("M", wallet, Side::Buy, 1.0, 100 + i as i64), 100 + i as i64);
        }
        let snap = store.snapshot("M", 110);
        assert_eq!(snap.five_min.buy_count, 10);
        assert!(snap.five_min.unique_buyers >= 3.0);
    }

    #[test]
    fn wallet_first_seen_recorded_for_every_buyer() {
        let store = CounterStore::new();
        store.record_swap(&swap("M", "A", Side::Buy, 1.0, 100), 100);
        store.record_swap(&swap("M", "B", Side::Buy, 1.0, 101), 101);
        assert!(store.wallet_first_seen_at("A", 101).is_some());
        assert!(store.wallet_first_seen_at("B", 101).is_some());
    }
}
