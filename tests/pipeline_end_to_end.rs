//! Integration tests wiring C1-C10 together the way the orchestrator does,
//! covering the end-to-end scenarios a buy should produce, a crash should
//! survive, and a hot mint should trigger and cool down.

use std::collections::HashSet;

use swap_sentry::backpressure::{BackpressureController, Thresholds};
use swap_sentry::counters::CounterStore;
use swap_sentry::deltalog::{self, DeltaLog};
use swap_sentry::infer::{self, InferConfig};
use swap_sentry::ingest::extract_deltas;
use swap_sentry::lifecycle::{StateManager, StateManagerConfig};
use swap_sentry::model::{InferenceOutcome, RawPredicate, RawTransaction, RawTriggerRule, TokenBalance};
use swap_sentry::stream::{DedupFilter, DurableStream, SqliteDurableStream};
use swap_sentry::trigger::TriggerEvaluator;

const PUMPSWAP: &str = "pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA";

fn buy_tx(signature: &str, wallet: &str, mint: &str, ingest_time: i64) -> RawTransaction {
    let mut tx = RawTransaction {
        signature: signature.to_string(),
        slot: 1,
        ingest_time,
        account_keys: vec![wallet.to_string()],
        pre_token_balances: vec![],
        post_token_balances: vec![TokenBalance {
            account_index: 0,
            owner: wallet.to_string(),
            mint: mint.to_string(),
            raw_amount: 100_000_000,
            decimals: 6,
        }],
        pre_lamports: vec![1_000_000_000],
        post_lamports: vec![500_000_000],
        program_ids_touched: HashSet::new(),
        block_time: None,
        fee_lamports: 5_000,
        fee_payer_index: 0,
    };
    tx.program_ids_touched.insert(PUMPSWAP.to_string());
    tx
}

fn high_pressure_rule() -> RawTriggerRule {
    RawTriggerRule {
        name: "buy_pressure".to_string(),
        enabled: true,
        conditions: vec![RawPredicate {
            field: "buy_count_5m".to_string(),
            op: ">=".to_string(),
            literal: 3.0,
        }],
    }
}

#[test]
fn simple_buy_flows_through_extraction_inference_and_counters() {
    let tx = buy_tx("sig1", "wallet-a", "MINT", 1_000);
    let deltas = extract_deltas(&tx);
    let seen = HashSet::new();
    let config = InferConfig::default();

    let outcome = infer::infer(&tx, &deltas, &seen, &config);
    let event = match outcome {
        InferenceOutcome::Swap(e) => e,
        other => panic!("expected a swap, got {other:?}"),
    };
    assert_eq!(event.base_mint, "MINT");
    assert_eq!(event.wallet, "wallet-a");

    let store = CounterStore::new();
    store.record_swap(&event, tx.ingest_time);
    let snapshot = store.snapshot("MINT", tx.ingest_time);
    assert_eq!(snapshot.five_min.buy_count, 1);
    assert!(snapshot.five_min.buy_sell_ratio.is_infinite());
}

#[tokio::test]
async fn duplicate_signature_is_not_double_counted() {
    let stream = SqliteDurableStream::open(":memory:").unwrap();
    let dedup = DedupFilter::new(600);
    let store = CounterStore::new();
    let config = InferConfig::default();

    stream.append(&buy_tx("dup-sig", "wallet-a", "MINT", 1_000)).await.unwrap();
    stream.append(&buy_tx("dup-sig", "wallet-a", "MINT", 1_001)).await.unwrap();

    let batch = stream.read_group("parsers", "c1", 10, 0).await.unwrap();
    assert_eq!(batch.len(), 2);

    let mut accepted = 0;
    for record in &batch {
        if dedup.check_and_set(&record.record.signature, record.id) {
            accepted += 1;
            let deltas = extract_deltas(&record.record);
            if let InferenceOutcome::Swap(event) =
                infer::infer(&record.record, &deltas, &HashSet::new(), &config)
            {
                store.record_swap(&event, record.record.ingest_time);
            }
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(store.snapshot("MINT", 1_001).five_min.buy_count, 1);
}

#[tokio::test]
async fn idle_records_are_claimable_by_a_replacement_consumer_after_a_crash() {
    let stream = SqliteDurableStream::open(":memory:").unwrap();
    stream.append(&buy_tx("sig1", "wallet-a", "MINT", 1_000)).await.unwrap();
    stream.append(&buy_tx("sig2", "wallet-b", "MINT", 1_001)).await.unwrap();

    // Original consumer reads but crashes before acking.
    let batch = stream.read_group("parsers", "parser-host-111-0", 10, 0).await.unwrap();
    assert_eq!(batch.len(), 2);

    // Replacement consumer claims the idle records instead of losing them.
    let reclaimed = stream.claim_idle("parsers", "parser-host-222-0", 0, 0, 10).await.unwrap();
    assert_eq!(reclaimed.len(), 2);
    stream.ack("parsers", &reclaimed.iter().map(|r| r.id).collect::<Vec<_>>()).await.unwrap();
    assert_eq!(stream.length().await.unwrap(), 0);
}

#[test]
fn high_buy_pressure_fires_then_cools_down_and_promotes_to_hot() {
    let store = CounterStore::new();
    let evaluator = TriggerEvaluator::new(&[high_pressure_rule()]).unwrap();
    let state = StateManager::new(StateManagerConfig {
        hot_ttl_seconds: 3600,
        warm_ttl_seconds: 1800,
        alert_cooldown_seconds: 300,
    });
    let config = InferConfig::default();

    for (i, wallet) in ["wallet-a", "wallet-b", "wallet-c"].iter().enumerate() {
        let ts = 1_000 + i as i64;
        let tx = buy_tx(&format!("sig{i}"), wallet, "MINT", ts);
        let deltas = extract_deltas(&tx);
        if let InferenceOutcome::Swap(event) = infer::infer(&tx, &deltas, &HashSet::new(), &config) {
            state.record_activity(&event.base_mint, ts);
            store.record_swap(&event, ts);
        }
    }

    let snapshot = store.snapshot("MINT", 1_010);
    let fired = evaluator.evaluate("MINT", &snapshot, 1_010, 300);
    assert_eq!(fired, vec!["buy_pressure".to_string()]);

    let fresh = state.promote_hot("MINT", 1_010);
    assert!(fresh, "first trigger fire should be a fresh HOT promotion");

    // Same snapshot still satisfies the rule, but cooldown suppresses re-firing.
    let fired_again = evaluator.evaluate("MINT", &snapshot, 1_050, 300);
    assert!(fired_again.is_empty());
}

#[test]
fn hot_promotion_backfill_replays_delta_log_records_into_counter_store() {
    let dir = tempfile::tempdir().unwrap();
    let log = DeltaLog::open(dir.path()).unwrap();
    let store = CounterStore::new();
    let config = InferConfig::default();

    // Three buys land in the delta log before the mint is promoted to HOT.
    for (i, wallet) in ["wallet-a", "wallet-b", "wallet-c"].iter().enumerate() {
        let ts = 1_000 + i as i64;
        let tx = buy_tx(&format!("sig{i}"), wallet, "MINT", ts);
        let deltas = extract_deltas(&tx);
        if let InferenceOutcome::Swap(event) = infer::infer(&tx, &deltas, &HashSet::new(), &config) {
            log.append(&deltalog::summarize(&event), ts).unwrap();
        }
    }

    // HOT promotion triggers a backfill replay, independent of what the
    // counter store already holds (e.g. after a fresh process restart).
    let records = log.range("MINT", 0).unwrap();
    assert_eq!(records.len(), 3);
    for record in &records {
        let event = record.to_swap_event();
        store.record_swap(&event, event.timestamp);
    }

    let snapshot = store.snapshot("MINT", 1_010);
    assert_eq!(snapshot.five_min.buy_count, 3);
    assert!(snapshot.five_min.unique_buyers >= 2.0);
}

#[test]
fn critical_backpressure_mode_is_the_only_mode_that_should_gate_counter_updates() {
    // Mirrors the mode-gated table the orchestrator's consumer loop applies
    // (spec §4.9): NORMAL and DEGRADED both still update counters/delta log,
    // only CRITICAL skips them.
    let bp = BackpressureController::new(Thresholds {
        lag_warn_s: 10,
        lag_crit_s: 60,
        buf_warn: 5_000,
        buf_crit: 20_000,
    });
    assert_eq!(bp.sample(0, 0), swap_sentry::model::Mode::Normal);
    assert_eq!(bp.sample(30, 0), swap_sentry::model::Mode::Degraded);
    assert_eq!(bp.sample(120, 0), swap_sentry::model::Mode::Critical);
}
