//! CTO scorer (C10, spec §4.10). Weighted dot-product score generalized from
//! the teacher's `aggregator_core::scorer::SignalScorer::compute_uptrend_score`
//! (same weighted-factor + clamp shape, different factor set). Runs behind a
//! bounded worker pool with a per-call deadline so a slow clustering pass
//! never blocks the main pipeline (spec §4.10 closing line).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

const WEIGHT_CLUSTER: f64 = 0.30;
const WEIGHT_CONCENTRATION: f64 = 0.25;
const WEIGHT_TIMING: f64 = 0.15;
const WEIGHT_NEW_WALLET: f64 = 0.15;
const WEIGHT_RATIO: f64 = 0.15;
const RATIO_CAP: f64 = 10.0;
const DEFAULT_DEADLINE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, Default)]
pub struct CtoComponents {
    pub cluster: f64,
    pub concentration: f64,
    pub timing: f64,
    pub new_wallet: f64,
    pub ratio: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CtoScore {
    pub score: f64,
    pub components: CtoComponents,
    pub timed_out: bool,
}

#[derive(Debug, Clone)]
pub struct ScoreInputs {
    /// Buy volume attributed to the dominant wallet cluster over the window.
    pub max_cluster_buy_volume: f64,
    pub total_buy_volume: f64,
    pub top_3_buyers_volume_share: f64,
    /// Timestamps of buy events in the window, used for burstiness.
    pub buy_timestamps: Vec<i64>,
    pub new_wallet_pct: f64,
    pub buy_sell_ratio: f64,
}

fn ratio_component(buy_sell_ratio: f64) -> f64 {
    (buy_sell_ratio / RATIO_CAP).min(1.0)
}

fn cluster_component(max_cluster_buy_volume: f64, total_buy_volume: f64) -> f64 {
    if total_buy_volume <= 0.0 {
        0.0
    } else {
        (max_cluster_buy_volume / total_buy_volume).clamp(0.0, 1.0)
    }
}

/// Coefficient-of-variation of inter-arrival gaps, squashed into [0, 1].
/// Regular (evenly spaced) arrivals score near 0; bursty/irregular ones near 1.
fn timing_component(buy_timestamps: &[i64]) -> f64 {
    if buy_timestamps.len() < 2 {
        return 0.0;
    }
    let mut sorted = buy_timestamps.to_vec();
    sorted.sort_unstable();
    let gaps: Vec<f64> = sorted.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    if mean <= 0.0 {
        return 1.0; // all buys in the same instant is maximally bursty
    }
    let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;
    let cv = variance.sqrt() / mean;
    (cv / (1.0 + cv)).clamp(0.0, 1.0)
}

fn score_full(inputs: &ScoreInputs) -> CtoScore {
    let components = CtoComponents {
        cluster: cluster_component(inputs.max_cluster_buy_volume, inputs.total_buy_volume),
        concentration: inputs.top_3_buyers_volume_share.clamp(0.0, 1.0),
        timing: timing_component(&inputs.buy_timestamps),
        new_wallet: inputs.new_wallet_pct.clamp(0.0, 1.0),
        ratio: ratio_component(inputs.buy_sell_ratio),
    };
    let score = WEIGHT_CLUSTER * components.cluster
        + WEIGHT_CONCENTRATION * components.concentration
        + WEIGHT_TIMING * components.timing
        + WEIGHT_NEW_WALLET * components.new_wallet
        + WEIGHT_RATIO * components.ratio;
    CtoScore { score: score.clamp(0.0, 1.0), components, timed_out: false }
}

/// Fallback used when the full computation misses its deadline: cluster and
/// timing are dropped to 0 (spec §4.10: "on timeout, score = concentration +
/// new_wallet + ratio components only, cluster = 0").
fn score_fallback(inputs: &ScoreInputs) -> CtoScore {
    let components = CtoComponents {
        cluster: 0.0,
        concentration: inputs.top_3_buyers_volume_share.clamp(0.0, 1.0),
        timing: 0.0,
        new_wallet: inputs.new_wallet_pct.clamp(0.0, 1.0),
        ratio: ratio_component(inputs.buy_sell_ratio),
    };
    let score = WEIGHT_CONCENTRATION * components.concentration
        + WEIGHT_NEW_WALLET * components.new_wallet
        + WEIGHT_RATIO * components.ratio;
    CtoScore { score: score.clamp(0.0, 1.0), components, timed_out: true }
}

pub struct Scorer {
    worker_slots: Arc<Semaphore>,
    deadline: Duration,
}

impl Scorer {
    pub fn new(max_concurrent: usize) -> Self {
        Self { worker_slots: Arc::new(Semaphore::new(max_concurrent.max(1))), deadline: DEFAULT_DEADLINE }
    }

    pub async fn score(&self, inputs: ScoreInputs) -> CtoScore {
        let permit = self.worker_slots.clone().acquire_owned().await.ok();
        let result = tokio::time::timeout(self.deadline, async { score_full(&inputs) }).await;
        drop(permit);
        match result {
            Ok(score) => score,
            Err(_) => {
                log::warn!("⚠️ CTO scorer deadline exceeded, falling back to partial score");
                score_fallback(&inputs)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_inputs() -> ScoreInputs {
        ScoreInputs {
            max_cluster_buy_volume: 60.0,
            total_buy_volume: 100.0,
            top_3_buyers_volume_share: 0.8,
            buy_timestamps: vec![100, 105, 108, 200, 400],
            new_wallet_pct: 0.5,
            buy_sell_ratio: 20.0,
        }
    }

    #[tokio::test]
    async fn full_score_combines_all_weighted_components() {
        let scorer = Scorer::new(4);
        let result = scorer.score(base_inputs()).await;
        assert!(!result.timed_out);
        assert!(result.score > 0.0 && result.score <= 1.0);
        assert_eq!(result.components.cluster, 0.6);
        assert_eq!(result.components.ratio, 1.0); // capped at R_cap=10
    }

    #[test]
    fn missing_total_volume_yields_zero_cluster_component() {
        assert_eq!(cluster_component(10.0, 0.0), 0.0);
    }

    #[test]
    fn uniform_arrivals_are_not_bursty() {
        let timing = timing_component(&[0, 100, 200, 300, 400]);
        assert!(timing < 0.1);
    }

    #[test]
    fn clustered_arrivals_are_bursty() {
        let timing = timing_component(&[0, 1, 2, 500, 501]);
        assert!(timing > 0.5);
    }

    #[test]
    fn fallback_drops_cluster_and_timing_components() {
        let result = score_fallback(&base_inputs());
        assert_eq!(result.components.cluster, 0.0);
        assert_eq!(result.components.timing, 0.0);
        assert!(result.timed_out);
    }
}
