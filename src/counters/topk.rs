//! Top-K heavy hitters (spec §4.5, K=3). Per-bucket per-wallet volume maps are
//! merged at read time and the largest K summed; no crate in the pack offers
//! streaming heavy-hitter sketches (e.g. Count-Min/Space-Saving), and at K=3
//! a linear scan over the merged map is simpler and exact given the bounded
//! number of distinct wallets per window.

pub const TOP_K: usize = 3;

/// Returns the top `TOP_K` (wallet, volume) pairs by volume, descending, plus
/// the sum of all volumes in the map.
pub fn top_k_and_total(volumes: &std::collections::HashMap<String, f64>) -> (Vec<(String, f64)>, f64) {
    let total: f64 = volumes.values().sum();
    let mut entries: Vec<(String, f64)> = volumes.iter().map(|(w, v)| (w.clone(), *v)).collect();
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    entries.truncate(TOP_K);
    (entries, total)
}

/// `top_3_buyers_volume_share_W`: sum of top-3 over total buy volume. 0 when
/// total is 0 (no buyers in window).
pub fn top_k_share(volumes: &std::collections::HashMap<String, f64>) -> f64 {
    let (top, total) = top_k_and_total(volumes);
    if total <= 0.0 {
        return 0.0;
    }
    top.iter().map(|(_, v)| v).sum::<f64>() / total
}
