//! Orchestrator (C12, spec §4.12). Wires C1–C11, owns one instance each of
//! C3–C11 (spec §3 "Ownership"), and runs the fixed set of long-lived worker
//! tasks the spec's design notes call for in place of the original's
//! coroutine/event-loop control flow: consumer(s), detector tick, delta log
//! flusher, backpressure sampler. The alert dispatcher's per-channel workers
//! are started by `AlertDispatcher::new` itself and run for the process
//! lifetime, satisfying the "alert dispatcher drain" loop continuously rather
//! than as a separate polling task.
//!
//! Grounded on the teacher's `bin/pipeline_runtime.rs`: config load, spawn a
//! background task per concern, CTRL+C graceful shutdown with a bounded
//! drain. Generalized to also catch SIGTERM (spec §4.12) and to track join
//! handles so shutdown can wait on them instead of a fixed sleep.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use crate::alert::{
    AlertDispatcher, AlertPayload, CtoComponentsPayload, DispatcherConfig, DiscordChannel,
    TelegramChannel, TopBuyer,
};
use crate::backpressure::{BackpressureController, Thresholds};
use crate::cluster::{ScoreInputs, Scorer, UnionFind, WalletRegistry};
use crate::config::{Config, Roles};
use crate::counters::CounterStore;
use crate::deltalog::{self, DeltaLog};
use crate::error::SentryError;
use crate::external::{
    AppendSink, HttpAppendSink, HttpPriceMetadataService, HttpWalletEnrichment, PriceCache,
    PriceMetadataService, WalletEnrichment,
};
use crate::infer::{self, InferConfig};
use crate::ingest::extract_deltas;
use crate::lifecycle::{StateManager, StateManagerConfig};
use crate::model::{InferenceOutcome, Mode, RawPredicate, RawTriggerRule};
use crate::stream::{DedupFilter, DurableStream, SqliteDurableStream};
use crate::trigger::TriggerEvaluator;
use crate::util::now_unix;

const CONSUMER_GROUP: &str = "parsers";

/// Bootstrap rule set. The config pub/sub channel described in spec §6
/// (`cfg:reload`) is the real source of truth for rule updates; its broker is
/// an external collaborator not in scope here (spec §1), so `Orchestrator`
/// exposes `reload_rules` for whatever process subscribes to that channel to
/// call, and starts with a sensible built-in default.
fn default_rules() -> Vec<RawTriggerRule> {
    vec![RawTriggerRule {
        name: "high_buy_pressure_5m".to_string(),
        enabled: true,
        conditions: vec![
            RawPredicate { field: "buy_count_5m".to_string(), op: ">=".to_string(), literal: 10.0 },
            RawPredicate { field: "unique_buyers_5m".to_string(), op: ">=".to_string(), literal: 3.0 },
            RawPredicate { field: "sell_count_5m".to_string(), op: "==".to_string(), literal: 0.0 },
        ],
    }]
}

fn consumer_name(config: &Config, index: usize) -> String {
    if let Some(name) = &config.consumer_name {
        return format!("{name}-{index}");
    }
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    format!("parser-{host}-{}-{index}", std::process::id())
}

pub struct Orchestrator {
    config: Config,
    stream: Arc<dyn DurableStream>,
    dedup: Arc<DedupFilter>,
    counter_store: Arc<CounterStore>,
    trigger_evaluator: Arc<TriggerEvaluator>,
    state_manager: Arc<StateManager>,
    delta_log: Arc<DeltaLog>,
    backpressure: Arc<BackpressureController>,
    union_find: Arc<UnionFind>,
    wallet_registry: Arc<WalletRegistry>,
    scorer: Arc<Scorer>,
    append_sink: Arc<dyn AppendSink>,
    enrichment: Arc<dyn WalletEnrichment>,
    price_service: Arc<dyn PriceMetadataService>,
    price_cache: Arc<PriceCache>,
    dispatcher: Arc<AlertDispatcher>,
    known_mints: Arc<Mutex<HashSet<String>>>,
    infer_config: InferConfig,
    shutting_down: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(config: Config) -> Result<Self, SentryError> {
        let stream: Arc<dyn DurableStream> =
            Arc::new(SqliteDurableStream::open(&config.db_path).map_err(SentryError::from)?);
        let dedup = Arc::new(DedupFilter::new(config.dedup_ttl_seconds));
        let counter_store = Arc::new(CounterStore::new());
        let trigger_evaluator =
            Arc::new(TriggerEvaluator::new(&default_rules()).map_err(SentryError::from)?);
        let state_manager = Arc::new(StateManager::new(StateManagerConfig {
            hot_ttl_seconds: config.hot_token_ttl_seconds,
            warm_ttl_seconds: config.warm_ttl_seconds,
            alert_cooldown_seconds: config.alert_cooldown_seconds,
        }));
        let delta_log = Arc::new(DeltaLog::open(&config.delta_log_dir).map_err(SentryError::from)?);
        let backpressure = Arc::new(BackpressureController::new(Thresholds {
            lag_warn_s: config.bp_lag_warn_s,
            lag_crit_s: config.bp_lag_crit_s,
            buf_warn: config.bp_buf_warn,
            buf_crit: config.bp_buf_crit,
        }));
        let union_find = Arc::new(UnionFind::new());
        let wallet_registry = Arc::new(WalletRegistry::new());
        let scorer = Arc::new(Scorer::new(4));
        let append_sink: Arc<dyn AppendSink> =
            Arc::new(HttpAppendSink::new(config.append_sink_url.clone()));
        let enrichment: Arc<dyn WalletEnrichment> = Arc::new(HttpWalletEnrichment::new(
            config.enrichment_base_url.clone(),
            config.enrichment_api_key.clone(),
            config.enrichment_daily_credits,
        ));
        let price_service: Arc<dyn PriceMetadataService> =
            Arc::new(HttpPriceMetadataService::new(config.price_service_base_url.clone()));
        let price_cache = Arc::new(PriceCache::new());

        let mut channels: Vec<Arc<dyn crate::alert::AlertChannel>> = Vec::new();
        if let Some(url) = &config.discord_webhook_url {
            channels.push(Arc::new(DiscordChannel::new(url.clone())));
        }
        if let (Some(token), Some(chat_id)) = (&config.telegram_bot_token, &config.telegram_chat_id) {
            channels.push(Arc::new(TelegramChannel::new(token.clone(), chat_id.clone())));
        }
        let dispatcher = Arc::new(AlertDispatcher::new(channels, DispatcherConfig::default()));

        let infer_config =
            InferConfig { min_confidence: config.min_swap_confidence, ..InferConfig::default() };

        Ok(Self {
            config,
            stream,
            dedup,
            counter_store,
            trigger_evaluator,
            state_manager,
            delta_log,
            backpressure,
            union_find,
            wallet_registry,
            scorer,
            append_sink,
            enrichment,
            price_service,
            price_cache,
            dispatcher,
            known_mints: Arc::new(Mutex::new(HashSet::new())),
            infer_config,
            shutting_down: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Validates and swaps the live trigger rule list. Called by whatever
    /// subscribes to the `cfg:reload` channel (spec §6); a bad payload leaves
    /// existing rules untouched (spec §4.6).
    pub fn reload_rules(&self, raw: &[RawTriggerRule]) -> Result<(), SentryError> {
        self.trigger_evaluator.reload(raw).map_err(SentryError::from)
    }

    /// Starts every background loop this process's `roles` call for, then
    /// blocks until SIGINT/SIGTERM, then drains within the configured
    /// deadline (spec §4.12).
    pub async fn run(self, roles: Roles) -> Result<(), SentryError> {
        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        if roles.ingest {
            log::info!(
                "📘 ingest role active: upstream relay is an external collaborator (spec §1), nothing to run in-process"
            );
        }

        if roles.consume {
            for idx in 0..self.config.stream_consumer_count.max(1) {
                let name = consumer_name(&self.config, idx);
                log::info!("🚀 starting consumer task {name}");
                let claimed = self
                    .stream
                    .claim_idle(CONSUMER_GROUP, &name, self.config.claim_idle_min_idle_ms, 0, 10_000)
                    .await
                    .map_err(SentryError::from)?;
                if !claimed.is_empty() {
                    log::warn!("⚠️ {name} claimed {} idle record(s) on startup", claimed.len());
                }
                handles.push(self.spawn_consumer(name, claimed));
            }
            handles.push(self.spawn_delta_log_flusher());
            handles.push(self.spawn_backpressure_sampler());
            handles.push(self.spawn_dedup_sweeper());
        }

        if roles.detect {
            handles.push(self.spawn_detector_tick());
        }

        if roles.consume || roles.detect {
            handles.push(self.spawn_price_poller());
        }

        wait_for_shutdown_signal().await;
        log::warn!("⚠️ shutdown signal received, draining");
        self.shutting_down.store(true, Ordering::Relaxed);

        let deadline = std::time::Duration::from_secs(self.config.shutdown_drain_deadline_seconds);
        if tokio::time::timeout(deadline, join_all(handles)).await.is_err() {
            log::warn!("⚠️ worker drain deadline exceeded, proceeding to shutdown anyway");
        }

        match Arc::try_unwrap(self.dispatcher) {
            Ok(dispatcher) => dispatcher.drain(deadline).await,
            Err(_) => log::warn!("⚠️ alert dispatcher still has outstanding references at shutdown"),
        }
        log::info!("✅ orchestrator stopped");
        Ok(())
    }

    fn spawn_consumer(&self, name: String, claimed_on_startup: Vec<crate::stream::StreamRecord>) -> JoinHandle<()> {
        let stream = self.stream.clone();
        let dedup = self.dedup.clone();
        let counter_store = self.counter_store.clone();
        let delta_log = self.delta_log.clone();
        let state_manager = self.state_manager.clone();
        let append_sink = self.append_sink.clone();
        let backpressure = self.backpressure.clone();
        let known_mints = self.known_mints.clone();
        let price_cache = self.price_cache.clone();
        let infer_config = self.infer_config.clone();
        let shutting_down = self.shutting_down.clone();
        let batch_size = self.config.stream_read_batch_size;
        let block_ms = self.config.stream_block_ms;

        tokio::spawn(async move {
            if !claimed_on_startup.is_empty() {
                process_and_ack(
                    &name,
                    claimed_on_startup,
                    &stream,
                    &dedup,
                    &counter_store,
                    &delta_log,
                    &state_manager,
                    &append_sink,
                    &backpressure,
                    &known_mints,
                    &price_cache,
                    &infer_config,
                )
                .await;
            }
            while !shutting_down.load(Ordering::Relaxed) {
                let records = match stream.read_group(CONSUMER_GROUP, &name, batch_size, block_ms).await {
                    Ok(r) => r,
                    Err(e) => {
                        log::error!("❌ {name}: read_group failed: {e}");
                        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                        continue;
                    }
                };
                if records.is_empty() {
                    tokio::time::sleep(std::time::Duration::from_millis(block_ms)).await;
                    continue;
                }
                process_and_ack(
                    &name,
                    records,
                    &stream,
                    &dedup,
                    &counter_store,
                    &delta_log,
                    &state_manager,
                    &append_sink,
                    &backpressure,
                    &known_mints,
                    &price_cache,
                    &infer_config,
                )
                .await;
            }
            log::info!("📘 {name}: consumer task exiting");
        })
    }

    fn spawn_delta_log_flusher(&self) -> JoinHandle<()> {
        let delta_log = self.delta_log.clone();
        let retention = self.config.delta_log_retention_seconds;
        let shutting_down = self.shutting_down.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
            while !shutting_down.load(Ordering::Relaxed) {
                interval.tick().await;
                let now = now_unix();
                if let Err(e) = delta_log.prune(now, retention) {
                    log::error!("❌ delta log prune failed: {e}");
                }
            }
        })
    }

    fn spawn_backpressure_sampler(&self) -> JoinHandle<()> {
        let stream = self.stream.clone();
        let backpressure = self.backpressure.clone();
        let shutting_down = self.shutting_down.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
            while !shutting_down.load(Ordering::Relaxed) {
                interval.tick().await;
                let now = now_unix();
                let oldest = stream.oldest_unacked_ingest_time().await.ok().flatten();
                let lag = oldest.map(|ts| (now - ts).max(0)).unwrap_or(0);
                let buffer_len = stream.length().await.unwrap_or(0);
                backpressure.sample(lag, buffer_len);
            }
        })
    }

    /// Reclaims expired dedup entries (spec §4.2). `check_and_set` re-validates
    /// expiry on every lookup, so this only bounds memory in a long-running
    /// process rather than affecting correctness.
    fn spawn_dedup_sweeper(&self) -> JoinHandle<()> {
        let dedup = self.dedup.clone();
        let shutting_down = self.shutting_down.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            while !shutting_down.load(Ordering::Relaxed) {
                interval.tick().await;
                dedup.sweep_expired();
            }
        })
    }

    /// Polls price/metadata for every known mint (spec §11: grounded on the
    /// teacher's `pipeline/dexscreener.rs` rate-limited polling loop), keeping
    /// `price_cache` fresh for per-swap mcap tagging and alert formatting.
    fn spawn_price_poller(&self) -> JoinHandle<()> {
        let price_service = self.price_service.clone();
        let price_cache = self.price_cache.clone();
        let known_mints = self.known_mints.clone();
        let shutting_down = self.shutting_down.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(20));
            while !shutting_down.load(Ordering::Relaxed) {
                interval.tick().await;
                let mints: Vec<String> = known_mints.lock().unwrap().iter().cloned().collect();
                for mint in mints {
                    if let Some(metadata) = price_service.fetch(&mint).await {
                        price_cache.set(metadata);
                    }
                }
            }
        })
    }

    fn spawn_detector_tick(&self) -> JoinHandle<()> {
        let state_manager = self.state_manager.clone();
        let counter_store = self.counter_store.clone();
        let trigger_evaluator = self.trigger_evaluator.clone();
        let delta_log = self.delta_log.clone();
        let union_find = self.union_find.clone();
        let wallet_registry = self.wallet_registry.clone();
        let scorer = self.scorer.clone();
        let enrichment = self.enrichment.clone();
        let append_sink = self.append_sink.clone();
        let dispatcher = self.dispatcher.clone();
        let known_mints = self.known_mints.clone();
        let price_cache = self.price_cache.clone();
        let backpressure = self.backpressure.clone();
        let cooldown_seconds = self.config.alert_cooldown_seconds;
        let retention = self.config.delta_log_retention_seconds;
        let shutting_down = self.shutting_down.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
            while !shutting_down.load(Ordering::Relaxed) {
                interval.tick().await;
                let now = now_unix();
                state_manager.tick(now);

                let mints: Vec<String> = known_mints.lock().unwrap().iter().cloned().collect();
                for mint in mints {
                    let snapshot = counter_store.snapshot(&mint, now);
                    let fired = trigger_evaluator.evaluate(&mint, &snapshot, now, cooldown_seconds);
                    if fired.is_empty() {
                        continue;
                    }

                    let fresh_promotion = state_manager.promote_hot(&mint, now);
                    if fresh_promotion {
                        backfill_mint(
                            &mint,
                            now,
                            retention,
                            &delta_log,
                            &counter_store,
                            &enrichment,
                            &union_find,
                            &wallet_registry,
                        )
                        .await;
                    }

                    if !state_manager.gate_alert(&mint, now) {
                        log::info!("📘 alert for {mint} suppressed by cooldown");
                        continue;
                    }
                    if backpressure.mode() == Mode::Critical {
                        log::warn!("⚠️ CRITICAL mode: enrichment paused, alert skipped for {mint}");
                        continue;
                    }

                    let top_buyers = counter_store.top_buyers(&mint, now);
                    let total_buy_volume: f64 = top_buyers.iter().map(|(_, v)| v).sum();
                    let max_cluster_volume = max_cluster_buy_volume(&top_buyers, &union_find);

                    let cto = scorer
                        .score(ScoreInputs {
                            max_cluster_buy_volume: max_cluster_volume,
                            total_buy_volume,
                            top_3_buyers_volume_share: snapshot.five_min.top_3_buyers_volume_share,
                            buy_timestamps: counter_store.buy_timestamps(&mint, now),
                            new_wallet_pct: snapshot.five_min.new_wallet_pct,
                            buy_sell_ratio: snapshot.five_min.buy_sell_ratio,
                        })
                        .await;

                    let clusters: Vec<String> =
                        top_buyers.iter().map(|(wallet, _)| union_find.find(wallet)).collect();
                    let metadata = price_cache.get(&mint);

                    let payload = AlertPayload {
                        mint: mint.clone(),
                        token_symbol: metadata.as_ref().and_then(|m| m.symbol.clone()),
                        token_name: metadata.as_ref().and_then(|m| m.name.clone()),
                        token_image: metadata.as_ref().and_then(|m| m.image_url.clone()),
                        trigger_name: fired.join(","),
                        venue: None,
                        volume_sol_5m: snapshot.five_min.buy_volume_sol,
                        buy_count_5m: snapshot.five_min.buy_count,
                        sell_count_5m: snapshot.five_min.sell_count,
                        unique_buyers_5m: snapshot.five_min.unique_buyers,
                        buy_sell_ratio_5m: AlertPayload::sanitized_ratio(snapshot.five_min.buy_sell_ratio),
                        mcap_sol: metadata.as_ref().and_then(|m| m.mcap_sol),
                        avg_entry_mcap: snapshot.five_min.avg_entry_mcap,
                        cto_score: cto.score,
                        cto_components: CtoComponentsPayload {
                            cluster: cto.components.cluster,
                            concentration: cto.components.concentration,
                            timing: cto.components.timing,
                            new_wallet: cto.components.new_wallet,
                            ratio: cto.components.ratio,
                        },
                        top_buyers: top_buyers
                            .iter()
                            .map(|(w, v)| TopBuyer {
                                wallet: w.clone(),
                                volume_sol: *v,
                                funded_by: wallet_registry.get(w).and_then(|p| p.funded_by),
                            })
                            .collect(),
                        clusters,
                        created_at: now,
                    };

                    if let Err(e) = append_sink.append_alert(&payload).await {
                        log::error!("❌ append_sink.append_alert failed for {mint}: {e}");
                    }
                    dispatcher.dispatch(payload);
                }
            }
        })
    }
}

fn max_cluster_buy_volume(top_buyers: &[(String, f64)], union_find: &UnionFind) -> f64 {
    use std::collections::HashMap;
    let mut by_root: HashMap<String, f64> = HashMap::new();
    for (wallet, volume) in top_buyers {
        let root = union_find.find(wallet);
        *by_root.entry(root).or_insert(0.0) += volume;
    }
    by_root.values().cloned().fold(0.0, f64::max)
}

async fn backfill_mint(
    mint: &str,
    now: i64,
    retention_seconds: i64,
    delta_log: &DeltaLog,
    counter_store: &CounterStore,
    enrichment: &Arc<dyn WalletEnrichment>,
    union_find: &UnionFind,
    wallet_registry: &WalletRegistry,
) {
    let since = now - retention_seconds;
    let records = match delta_log.range(mint, since) {
        Ok(r) => r,
        Err(e) => {
            log::error!("❌ backfill range query failed for {mint}: {e}");
            return;
        }
    };
    log::info!("📘 backfilling {} delta log record(s) for {mint}", records.len());
    for record in &records {
        let event = record.to_swap_event();
        counter_store.record_swap(&event, event.timestamp);
        let mut funder = None;
        if union_find.find(&event.wallet) == event.wallet {
            funder = enrichment.funded_by(&event.wallet).await;
            if let Some(funder) = &funder {
                union_find.union(&event.wallet, funder);
            }
        }
        let cluster_id = union_find.find(&event.wallet);
        wallet_registry.upsert(&event.wallet, event.timestamp, funder, cluster_id);
    }
}

#[allow(clippy::too_many_arguments)]
async fn process_and_ack(
    consumer_name: &str,
    records: Vec<crate::stream::StreamRecord>,
    stream: &Arc<dyn DurableStream>,
    dedup: &DedupFilter,
    counter_store: &CounterStore,
    delta_log: &DeltaLog,
    state_manager: &StateManager,
    append_sink: &Arc<dyn AppendSink>,
    backpressure: &BackpressureController,
    known_mints: &Mutex<HashSet<String>>,
    price_cache: &PriceCache,
    infer_config: &InferConfig,
) {
    let mut acked_ids = Vec::with_capacity(records.len());
    for crate::stream::StreamRecord { id, record } in records {
        acked_ids.push(id);

        if !dedup.check_and_set(&record.signature, id) {
            continue;
        }

        let deltas = extract_deltas(&record);
        let seen_mints: HashSet<String> = known_mints.lock().unwrap().clone();
        let outcome = infer::infer(&record, &deltas, &seen_mints, infer_config);
        let mode = backpressure.mode();
        let now = record.effective_time();

        match outcome {
            InferenceOutcome::Swap(mut event) => {
                state_manager.record_activity(&event.base_mint, now);
                known_mints.lock().unwrap().insert(event.base_mint.clone());
                event.mcap_at_swap = price_cache.get(&event.base_mint).and_then(|m| m.mcap_sol);

                if mode != Mode::Critical {
                    counter_store.record_swap(&event, now);
                    if let Err(e) = delta_log.append(&deltalog::summarize(&event), now) {
                        log::error!("❌ {consumer_name}: delta log append failed: {e}");
                    }
                } else {
                    log::warn!("⚠️ CRITICAL mode: counter update skipped for {}", event.base_mint);
                }

                if mode == Mode::Normal {
                    if let Err(e) = append_sink.append_swap(&event).await {
                        log::error!("❌ {consumer_name}: append_sink.append_swap failed: {e}");
                    }
                } else {
                    log::warn!("⚠️ {mode:?} mode: swap persistence skipped for {}", event.base_mint);
                }
            }
            InferenceOutcome::Touch(touch) => {
                state_manager.record_activity(&touch.mint, now);
                known_mints.lock().unwrap().insert(touch.mint.clone());
            }
            InferenceOutcome::NoActivity => {}
        }
    }

    if let Err(e) = stream.ack(CONSUMER_GROUP, &acked_ids).await {
        log::error!("❌ {consumer_name}: ack failed: {e}");
    }
}

async fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
