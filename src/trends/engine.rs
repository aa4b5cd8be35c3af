//! Population scoring passes and ingestion-time rescoring

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::ScoringConfig;
use crate::db::{ItemStore, StoreError};
use crate::metrics::Metrics;
use crate::models::{Item, ItemDetail, NewListing, PopulationStatistics, RawMetrics, Snapshot};
use crate::trends::classification::{classify_trend, grade_viability, viability_summary};
use crate::trends::components::compute_components;
use crate::trends::confidence::compute_confidence;
use crate::trends::derivation::{sold_count_anomalies, DerivationWindows};
use crate::trends::population::{aggregate, aggregate_items};
use crate::trends::scoring::trend_score;

/// Outcome of one population scoring pass
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub sampled: usize,
    pub scored: usize,
    pub persist_failures: usize,
    pub sold_count_anomalies: usize,
    pub pruned_snapshots: u64,
    pub statistics: PopulationStatistics,
    pub duration_ms: u64,
}

/// Items of a population after scoring against their shared statistics
#[derive(Debug, Clone)]
pub struct ScoredPopulation {
    pub items: Vec<Item>,
    pub statistics: PopulationStatistics,
    pub sold_count_anomalies: usize,
}

#[derive(Debug)]
pub enum IngestError {
    /// The snapshot failed validation
    Invalid(String),
    Store(StoreError),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Invalid(reason) => write!(f, "invalid snapshot: {}", reason),
            IngestError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<StoreError> for IngestError {
    fn from(e: StoreError) -> Self {
        IngestError::Store(e)
    }
}

/// Write derived metrics and every computed field onto an item.
pub fn apply_scores(
    item: &mut Item,
    metrics: &RawMetrics,
    stats: &PopulationStatistics,
    now: DateTime<Utc>,
) {
    item.orders_3d_delta = metrics.orders_3d_delta;
    item.orders_7d_delta = metrics.orders_7d_delta;
    item.reviews_3d_delta = metrics.reviews_3d_delta;
    item.velocity_3d = metrics.velocity_3d;
    item.acceleration = metrics.acceleration;
    item.price_discount_rate = metrics.price_discount_rate;
    item.stock_stability = metrics.stock_stability;

    item.trend_score = trend_score(metrics, stats);
    item.trend_category = Some(classify_trend(metrics));
    item.confidence_score = compute_confidence(item.snapshot_count, item.days_tracked(now));
    item.viability_grade = Some(grade_viability(
        item.trend_score,
        item.rating,
        item.review_count,
        item.confidence_score,
    ));
    item.viability_summary = viability_summary(item);
}

/// Score a fixed population of items with their histories.
///
/// Metrics are derived for every item first, then aggregated once; every
/// item is scored against that single statistics snapshot.
pub fn score_population(
    population: Vec<(Item, Vec<Snapshot>)>,
    windows: DerivationWindows,
    now: DateTime<Utc>,
) -> ScoredPopulation {
    let derived: Vec<(RawMetrics, usize)> = population
        .par_iter()
        .map(|(item, history)| {
            let metrics = RawMetrics::derive(
                history,
                item.current_price,
                item.original_price,
                windows,
                now,
            );
            (metrics, sold_count_anomalies(history))
        })
        .collect();

    let raw: Vec<RawMetrics> = derived.iter().map(|(metrics, _)| *metrics).collect();
    let anomalies = derived.iter().map(|(_, count)| count).sum();
    let statistics = aggregate(&raw);

    let mut items: Vec<Item> = population
        .into_par_iter()
        .zip(raw.par_iter())
        .map(|((mut item, _), metrics)| {
            apply_scores(&mut item, metrics, &statistics, now);
            item
        })
        .collect();

    let components = compute_components(&items);
    for (item, pvs) in items.iter_mut().zip(components) {
        item.pvs = pvs;
        item.viability_summary = viability_summary(item);
    }

    ScoredPopulation {
        items,
        statistics,
        sold_count_anomalies: anomalies,
    }
}

struct CachedStatistics {
    statistics: PopulationStatistics,
    computed_at: DateTime<Utc>,
}

pub struct TrendEngine {
    store: Arc<dyn ItemStore>,
    config: ScoringConfig,
    metrics: Option<Arc<Metrics>>,
    cached: RwLock<Option<CachedStatistics>>,
}

impl TrendEngine {
    pub fn new(store: Arc<dyn ItemStore>, config: ScoringConfig) -> Self {
        Self {
            store,
            config,
            metrics: None,
            cached: RwLock::new(None),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn store(&self) -> &Arc<dyn ItemStore> {
        &self.store
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    fn history_since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.config.windows.long_days))
    }

    /// Run a full scoring pass over the sampled population.
    ///
    /// Any read failure aborts the pass before scoring; no statistics from a
    /// partial scan are used.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> Result<PassReport, StoreError> {
        let started = Instant::now();
        let result = self.execute_pass(now, started).await;

        match &result {
            Ok(report) => {
                if let Some(ref metrics) = self.metrics {
                    metrics.scoring_passes_total.inc();
                    metrics.items_scored_total.inc_by(report.scored as u64);
                    metrics
                        .scoring_pass_duration_seconds
                        .observe(started.elapsed().as_secs_f64());
                }
                info!(
                    sampled = report.sampled,
                    scored = report.scored,
                    persist_failures = report.persist_failures,
                    pruned = report.pruned_snapshots,
                    duration_ms = report.duration_ms,
                    "Scoring pass complete: {} items scored",
                    report.scored
                );
            }
            Err(e) => {
                if let Some(ref metrics) = self.metrics {
                    metrics.scoring_pass_failures_total.inc();
                }
                error!(error = %e, "Scoring pass aborted");
            }
        }

        result
    }

    async fn execute_pass(
        &self,
        now: DateTime<Utc>,
        started: Instant,
    ) -> Result<PassReport, StoreError> {
        let sample = self
            .store
            .sample_items(self.config.population_sample_limit)
            .await?;
        let sampled = sample.len();
        debug!(sampled = sampled, "Scoring pass: sampled population");

        // History slice is fixed here for the whole pass
        let since = self.history_since(now);
        let mut population = Vec::with_capacity(sampled);
        for item in sample {
            let history = self.store.get_snapshots(&item.id, since).await?;
            population.push((item, history));
        }

        let windows = self.config.windows;
        let scored = tokio::task::spawn_blocking(move || score_population(population, windows, now))
            .await
            .map_err(|e| {
                Box::new(std::io::Error::other(format!("Scoring task failed: {}", e))) as StoreError
            })?;

        if scored.sold_count_anomalies > 0 {
            warn!(
                anomalies = scored.sold_count_anomalies,
                "Scoring pass: sold count decreased between snapshots"
            );
        }

        *self.cached.write().await = Some(CachedStatistics {
            statistics: scored.statistics,
            computed_at: now,
        });

        let mut persist_failures = 0;
        for item in &scored.items {
            if let Err(e) = self.persist_scored(item).await {
                persist_failures += 1;
                error!(item_id = %item.id, error = %e, "Scoring pass: failed to store scored item");
            }
        }

        let retention_cutoff = now - Duration::days(i64::from(self.config.snapshot_retention_days));
        let pruned_snapshots = match self.store.prune_snapshots(retention_cutoff).await {
            Ok(pruned) => pruned,
            Err(e) => {
                warn!(error = %e, "Scoring pass: snapshot pruning failed");
                0
            }
        };

        Ok(PassReport {
            started_at: now,
            sampled,
            scored: scored.items.len(),
            persist_failures,
            sold_count_anomalies: scored.sold_count_anomalies,
            pruned_snapshots,
            statistics: scored.statistics,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Store computed fields without clobbering observations ingested mid-pass.
    async fn persist_scored(&self, scored: &Item) -> Result<(), StoreError> {
        if self.store.store_computed(scored).await?.is_none() {
            debug!(item_id = %scored.id, "Scoring pass: item vanished before write-back");
        }
        Ok(())
    }

    /// Population statistics for rescoring, reusing the last pass while it is fresh.
    pub async fn statistics(&self, now: DateTime<Utc>) -> Result<PopulationStatistics, StoreError> {
        let refresh = Duration::seconds(self.config.stats_refresh_interval_seconds as i64);
        if let Some(cached) = self.cached.read().await.as_ref() {
            let age = now - cached.computed_at;
            if age >= Duration::zero() && age < refresh {
                return Ok(cached.statistics);
            }
        }

        let sample = self
            .store
            .sample_items(self.config.population_sample_limit)
            .await?;
        let statistics = aggregate_items(&sample);
        *self.cached.write().await = Some(CachedStatistics {
            statistics,
            computed_at: now,
        });

        Ok(statistics)
    }

    async fn rescore(&self, mut item: Item, now: DateTime<Utc>) -> Result<Item, StoreError> {
        let history = self.store.get_snapshots(&item.id, self.history_since(now)).await?;
        let anomalies = sold_count_anomalies(&history);
        if anomalies > 0 {
            warn!(item_id = %item.id, anomalies = anomalies, "Sold count decreased between snapshots");
        }

        let metrics = RawMetrics::derive(
            &history,
            item.current_price,
            item.original_price,
            self.config.windows,
            now,
        );
        let statistics = self.statistics(now).await?;
        apply_scores(&mut item, &metrics, &statistics, now);

        // Observations recorded while scoring are kept; only computed fields land
        let stored = self.store.store_computed(&item).await?;
        Ok(stored.unwrap_or(item))
    }

    /// Recompute one item's computed fields. Unknown ids yield `None`.
    pub async fn rescore_item(
        &self,
        item_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Item>, StoreError> {
        match self.store.get_item(item_id).await? {
            Some(item) => Ok(Some(self.rescore(item, now).await?)),
            None => Ok(None),
        }
    }

    /// Record an observation and rescore.
    ///
    /// The append and the state fold happen atomically in the store; the
    /// rescore then writes back computed fields only.
    pub async fn ingest_snapshot(
        &self,
        item_id: &str,
        snapshot: Snapshot,
        now: DateTime<Utc>,
    ) -> Result<Option<Item>, IngestError> {
        snapshot.validate().map_err(IngestError::Invalid)?;

        let Some(item) = self.store.record_snapshot(item_id, &snapshot).await? else {
            return Ok(None);
        };

        if snapshot.timestamp < item.last_updated {
            debug!(
                item_id = %item_id,
                timestamp = %snapshot.timestamp,
                "Out-of-order snapshot appended to history only"
            );
        }
        if let Some(ref metrics) = self.metrics {
            metrics.snapshots_ingested_total.inc();
        }

        Ok(Some(self.rescore(item, now).await?))
    }

    /// Create a listing or refresh the descriptive fields of an existing one.
    pub async fn register_item(
        &self,
        listing: NewListing,
        now: DateTime<Utc>,
    ) -> Result<Item, StoreError> {
        self.store.register_listing(listing, now).await
    }

    /// Item with its recent history for detail views.
    pub async fn item_detail(
        &self,
        item_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ItemDetail>, StoreError> {
        let Some(item) = self.store.get_item(item_id).await? else {
            return Ok(None);
        };
        let since = now - Duration::days(i64::from(self.config.detail_history_days));
        let snapshots = self.store.get_snapshots(item_id, since).await?;
        Ok(Some(ItemDetail::new(item, snapshots)))
    }
}
