//! Bucketed rolling windows (spec §4.5): a window W is split into B
//! fixed-width buckets. Buckets are lazily reset when a read/write observes
//! a slot whose stored `bucket_start` no longer matches the slot's expected
//! start — this keeps the ring buffer correct without a background sweep.

use std::collections::HashMap;

use crate::counters::hll::Hll;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    FiveMin,
    OneHour,
}

impl WindowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::FiveMin => "5m",
            WindowKind::OneHour => "1h",
        }
    }

    pub fn bucket_width_secs(&self) -> i64 {
        match self {
            WindowKind::FiveMin => 10,
            WindowKind::OneHour => 60,
        }
    }

    pub fn bucket_count(&self) -> usize {
        match self {
            WindowKind::FiveMin => 30,
            WindowKind::OneHour => 60,
        }
    }

    pub fn all() -> [WindowKind; 2] {
        [WindowKind::FiveMin, WindowKind::OneHour]
    }
}

#[derive(Debug, Clone)]
struct Bucket {
    bucket_start: i64,
    buy_count: u64,
    sell_count: u64,
    buy_volume: f64,
    sell_volume: f64,
    hll_buyers: Hll,
    hll_sellers: Hll,
    buyer_volumes: HashMap<String, f64>,
    buy_timestamps: Vec<i64>,
    buy_mcaps: Vec<f64>,
}

impl Bucket {
    fn empty(bucket_start: i64) -> Self {
        Self {
            bucket_start,
            buy_count: 0,
            sell_count: 0,
            buy_volume: 0.0,
            sell_volume: 0.0,
            hll_buyers: Hll::new(),
            hll_sellers: Hll::new(),
            buyer_volumes: HashMap::new(),
            buy_timestamps: Vec::new(),
            buy_mcaps: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WindowBuckets {
    kind: WindowKind,
    buckets: Vec<Bucket>,
}

impl WindowBuckets {
    pub fn new(kind: WindowKind) -> Self {
        let buckets = (0..kind.bucket_count()).map(|_| Bucket::empty(i64::MIN)).collect();
        Self { kind, buckets }
    }

    fn slot_for(&self, now: i64) -> (usize, i64) {
        let width = self.kind.bucket_width_secs();
        let bucket_start = (now / width) * width;
        let slot = ((now / width) as usize) % self.kind.bucket_count();
        (slot, bucket_start)
    }

    fn bucket_mut(&mut self, now: i64) -> &mut Bucket {
        let (slot, bucket_start) = self.slot_for(now);
        let bucket = &mut self.buckets[slot];
        if bucket.bucket_start != bucket_start {
            *bucket = Bucket::empty(bucket_start);
        }
        bucket
    }

    pub fn record_buy(&mut self, wallet: &str, volume: f64, mcap_at_swap: Option<f64>, now: i64) {
        let bucket = self.bucket_mut(now);
        bucket.buy_count += 1;
        bucket.buy_volume += volume;
        bucket.hll_buyers.add(wallet);
        *bucket.buyer_volumes.entry(wallet.to_string()).or_insert(0.0) += volume;
        bucket.buy_timestamps.push(now);
        if let Some(mcap) = mcap_at_swap {
            bucket.buy_mcaps.push(mcap);
        }
    }

    pub fn record_sell(&mut self, wallet: &str, volume: f64, now: i64) {
        let bucket = self.bucket_mut(now);
        bucket.sell_count += 1;
        bucket.sell_volume += volume;
        bucket.hll_sellers.add(wallet);
    }

    fn non_expired<'a>(&'a self, now: i64) -> impl Iterator<Item = &'a Bucket> {
        let width = self.kind.bucket_width_secs();
        let horizon = width * self.kind.bucket_count() as i64;
        self.buckets.iter().filter(move |b| b.bucket_start != i64::MIN && now - b.bucket_start < horizon)
    }

    pub fn buy_count(&self, now: i64) -> u64 {
        self.non_expired(now).map(|b| b.buy_count).sum()
    }

    pub fn sell_count(&self, now: i64) -> u64 {
        self.non_expired(now).map(|b| b.sell_count).sum()
    }

    pub fn buy_volume(&self, now: i64) -> f64 {
        self.non_expired(now).map(|b| b.buy_volume).sum()
    }

    pub fn sell_volume(&self, now: i64) -> f64 {
        self.non_expired(now).map(|b| b.sell_volume).sum()
    }

    pub fn unique_buyers(&self, now: i64) -> f64 {
        let mut merged = Hll::new();
        for b in self.non_expired(now) {
            merged.merge(&b.hll_buyers);
        }
        merged.estimate()
    }

    pub fn unique_sellers(&self, now: i64) -> f64 {
        let mut merged = Hll::new();
        for b in self.non_expired(now) {
            merged.merge(&b.hll_sellers);
        }
        merged.estimate()
    }

    pub fn buyer_volumes_merged(&self, now: i64) -> HashMap<String, f64> {
        let mut merged = HashMap::new();
        for b in self.non_expired(now) {
            for (wallet, vol) in &b.buyer_volumes {
                *merged.entry(wallet.clone()).or_insert(0.0) += vol;
            }
        }
        merged
    }

    /// Buy timestamps across non-expired buckets, for the CTO scorer's
    /// burstiness factor (spec §4.10 "timing").
    pub fn buy_timestamps_merged(&self, now: i64) -> Vec<i64> {
        let mut merged = Vec::new();
        for b in self.non_expired(now) {
            merged.extend_from_slice(&b.buy_timestamps);
        }
        merged
    }

    /// Per-buy market cap at the moment of the swap, for `avg_entry_mcap`.
    /// Only buys whose mcap was known at record time contribute.
    pub fn buy_mcaps_merged(&self, now: i64) -> Vec<f64> {
        let mut merged = Vec::new();
        for b in self.non_expired(now) {
            merged.extend_from_slice(&b.buy_mcaps);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_older_than_window_are_excluded() {
        let mut w = WindowBuckets::new(WindowKind::FiveMin);
        w.record_buy("wallet1", 1.0, None, 0);
        // 5m window horizon = 300s; 400s later the bucket is expired.
        assert_eq!(w.buy_count(400), 0);
        assert_eq!(w.buy_count(10), 1);
    }

    #[test]
    fn current_bucket_is_included() {
        let mut w = WindowBuckets::new(WindowKind::FiveMin);
        w.record_buy("wallet1", 2.5, None, 100);
        assert_eq!(w.buy_count(105), 1);
        assert_eq!(w.buy_volume(105), 2.5);
    }

    #[test]
    fn slot_reuse_resets_stale_bucket() {
        let mut w = WindowBuckets::new(WindowKind::FiveMin);
        w.record_buy("wallet1", 1.0, None, 0);
        // Jump forward exactly one full cycle (30 buckets * 10s = 300s) so the
        // same slot is reused but bucket_start differs.
        w.record_buy("wallet2", 1.0, None, 300);
        assert_eq!(w.buy_count(300), 1);
    }

    #[test]
    fn buy_timestamps_merged_across_buckets_for_burstiness_scoring() {
        let mut w = WindowBuckets::new(WindowKind::FiveMin);
        w.record_buy("wallet1", 1.0, None, 100);
        w.record_buy("wallet2", 1.0, None, 105);
        w.record_buy("wallet1", 1.0, None, 150);
        let mut timestamps = w.buy_timestamps_merged(200);
        timestamps.sort_unstable();
        assert_eq!(timestamps, vec![100, 105, 150]);
    }

    #[test]
    fn buy_mcaps_merged_only_includes_known_values() {
        let mut w = WindowBuckets::new(WindowKind::FiveMin);
        w.record_buy("wallet1", 1.0, Some(50_000.0), 100);
        w.record_buy("wallet2", 1.0, None, 105);
        w.record_buy("wallet1", 1.0, Some(60_000.0), 150);
        assert_eq!(w.buy_mcaps_merged(200), vec![50_000.0, 60_000.0]);
    }
}
