use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use shoptrend::config::ScoringConfig;
use shoptrend::db::{ItemStore, MemoryStore, StoreError, TrendingFilter};
use shoptrend::metrics::Metrics;
use shoptrend::models::{Item, NewListing, Snapshot, TrendCategory};
use shoptrend::trends::derivation::DerivationWindows;
use shoptrend::trends::engine::{score_population, IngestError, TrendEngine};

use crate::common::{fixed_now, history, item, listing};

/// Store whose every call fails
struct UnavailableStore;

fn unavailable() -> StoreError {
    Box::new(std::io::Error::other("store unavailable"))
}

#[async_trait]
impl ItemStore for UnavailableStore {
    async fn upsert_item(&self, _item: &Item) -> Result<(), StoreError> {
        Err(unavailable())
    }
    async fn register_listing(
        &self,
        _listing: NewListing,
        _now: DateTime<Utc>,
    ) -> Result<Item, StoreError> {
        Err(unavailable())
    }
    async fn record_snapshot(
        &self,
        _item_id: &str,
        _snapshot: &Snapshot,
    ) -> Result<Option<Item>, StoreError> {
        Err(unavailable())
    }
    async fn store_computed(&self, _scored: &Item) -> Result<Option<Item>, StoreError> {
        Err(unavailable())
    }
    async fn get_item(&self, _id: &str) -> Result<Option<Item>, StoreError> {
        Err(unavailable())
    }
    async fn sample_items(&self, _limit: usize) -> Result<Vec<Item>, StoreError> {
        Err(unavailable())
    }
    async fn trending_items(&self, _filter: &TrendingFilter) -> Result<Vec<Item>, StoreError> {
        Err(unavailable())
    }
    async fn append_snapshot(&self, _item_id: &str, _snapshot: &Snapshot) -> Result<(), StoreError> {
        Err(unavailable())
    }
    async fn get_snapshots(
        &self,
        _item_id: &str,
        _since: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>, StoreError> {
        Err(unavailable())
    }
    async fn prune_snapshots(&self, _before: DateTime<Utc>) -> Result<u64, StoreError> {
        Err(unavailable())
    }
    async fn categories(&self) -> Result<Vec<String>, StoreError> {
        Err(unavailable())
    }
}

/// In-memory store that yields to the scheduler before every call, so
/// concurrent callers interleave between separate store operations
struct YieldingStore {
    inner: MemoryStore,
}

#[async_trait]
impl ItemStore for YieldingStore {
    async fn upsert_item(&self, item: &Item) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.inner.upsert_item(item).await
    }
    async fn register_listing(
        &self,
        listing: NewListing,
        now: DateTime<Utc>,
    ) -> Result<Item, StoreError> {
        tokio::task::yield_now().await;
        self.inner.register_listing(listing, now).await
    }
    async fn record_snapshot(
        &self,
        item_id: &str,
        snapshot: &Snapshot,
    ) -> Result<Option<Item>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.record_snapshot(item_id, snapshot).await
    }
    async fn store_computed(&self, scored: &Item) -> Result<Option<Item>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.store_computed(scored).await
    }
    async fn get_item(&self, id: &str) -> Result<Option<Item>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.get_item(id).await
    }
    async fn sample_items(&self, limit: usize) -> Result<Vec<Item>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.sample_items(limit).await
    }
    async fn trending_items(&self, filter: &TrendingFilter) -> Result<Vec<Item>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.trending_items(filter).await
    }
    async fn append_snapshot(&self, item_id: &str, snapshot: &Snapshot) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        self.inner.append_snapshot(item_id, snapshot).await
    }
    async fn get_snapshots(
        &self,
        item_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.get_snapshots(item_id, since).await
    }
    async fn prune_snapshots(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        tokio::task::yield_now().await;
        self.inner.prune_snapshots(before).await
    }
    async fn categories(&self) -> Result<Vec<String>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.categories().await
    }
}

/// Store that records one extra snapshot for `item_id` just before the
/// first computed write-back lands
struct LateObservationStore {
    inner: Arc<MemoryStore>,
    item_id: &'static str,
    late: Snapshot,
    fired: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl ItemStore for LateObservationStore {
    async fn upsert_item(&self, item: &Item) -> Result<(), StoreError> {
        self.inner.upsert_item(item).await
    }
    async fn register_listing(
        &self,
        listing: NewListing,
        now: DateTime<Utc>,
    ) -> Result<Item, StoreError> {
        self.inner.register_listing(listing, now).await
    }
    async fn record_snapshot(
        &self,
        item_id: &str,
        snapshot: &Snapshot,
    ) -> Result<Option<Item>, StoreError> {
        self.inner.record_snapshot(item_id, snapshot).await
    }
    async fn store_computed(&self, scored: &Item) -> Result<Option<Item>, StoreError> {
        use std::sync::atomic::Ordering;
        if scored.id == self.item_id && !self.fired.swap(true, Ordering::SeqCst) {
            self.inner.record_snapshot(self.item_id, &self.late).await?;
        }
        self.inner.store_computed(scored).await
    }
    async fn get_item(&self, id: &str) -> Result<Option<Item>, StoreError> {
        self.inner.get_item(id).await
    }
    async fn sample_items(&self, limit: usize) -> Result<Vec<Item>, StoreError> {
        self.inner.sample_items(limit).await
    }
    async fn trending_items(&self, filter: &TrendingFilter) -> Result<Vec<Item>, StoreError> {
        self.inner.trending_items(filter).await
    }
    async fn append_snapshot(&self, item_id: &str, snapshot: &Snapshot) -> Result<(), StoreError> {
        self.inner.append_snapshot(item_id, snapshot).await
    }
    async fn get_snapshots(
        &self,
        item_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>, StoreError> {
        self.inner.get_snapshots(item_id, since).await
    }
    async fn prune_snapshots(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        self.inner.prune_snapshots(before).await
    }
    async fn categories(&self) -> Result<Vec<String>, StoreError> {
        self.inner.categories().await
    }
}

/// Store an item together with its history, folding snapshots into its state
async fn seed(store: &MemoryStore, mut tracked: Item, snapshots: Vec<Snapshot>) {
    for snapshot in &snapshots {
        tracked.observe(snapshot);
        store.append_snapshot(&tracked.id, snapshot).await.unwrap();
    }
    store.upsert_item(&tracked).await.unwrap();
}

/// Three items: a breakout, a steady seller and a flat listing
async fn seeded_store(now: DateTime<Utc>) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    seed(
        &store,
        item("hot", "gadgets", now, 10),
        history(now, &[(6, 100), (2, 200), (1, 700), (0, 1200)]),
    )
    .await;
    seed(
        &store,
        item("steady", "gadgets", now, 10),
        history(now, &[(6, 0), (2, 100), (1, 150), (0, 200)]),
    )
    .await;
    seed(
        &store,
        item("flat", "garden", now, 10),
        history(now, &[(6, 50), (2, 50), (1, 50), (0, 50)]),
    )
    .await;
    store
}

fn engine(store: Arc<MemoryStore>) -> TrendEngine {
    engine_over(store)
}

fn engine_over(store: Arc<dyn ItemStore>) -> TrendEngine {
    TrendEngine::new(store, ScoringConfig::default())
}

#[tokio::test]
async fn pass_scores_and_persists_population() {
    let now = fixed_now();
    let store = seeded_store(now).await;
    let engine = engine(store.clone());

    let report = engine.run_pass(now).await.unwrap();

    assert_eq!(report.sampled, 3);
    assert_eq!(report.scored, 3);
    assert_eq!(report.persist_failures, 0);
    assert_eq!(report.statistics.sample_size, 3);

    let hot = store.get_item("hot").await.unwrap().unwrap();
    let flat = store.get_item("flat").await.unwrap().unwrap();
    assert_eq!(hot.orders_3d_delta, 1000);
    assert_eq!(hot.trend_category, Some(TrendCategory::Breakout));
    assert!(hot.trend_score > flat.trend_score);
    assert!(hot.pvs.demand_momentum > flat.pvs.demand_momentum);
    assert!(hot.viability_summary.contains("strong 3d momentum"));

    for id in ["hot", "steady", "flat"] {
        let scored = store.get_item(id).await.unwrap().unwrap();
        assert!((0.0..=100.0).contains(&scored.trend_score));
        assert!(scored.trend_category.is_some());
        assert!(scored.viability_grade.is_some());
        assert!(!scored.viability_summary.is_empty());
        assert!(scored.confidence_score > 0.0);
    }
}

#[tokio::test]
async fn pass_ranks_trending_items() {
    let now = fixed_now();
    let store = seeded_store(now).await;
    engine(store.clone()).run_pass(now).await.unwrap();

    let trending = store.trending_items(&TrendingFilter::default()).await.unwrap();

    let ids: Vec<&str> = trending.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids.first(), Some(&"hot"));
    assert_eq!(ids.last(), Some(&"flat"));
}

#[tokio::test]
async fn pass_over_empty_store_uses_neutral_statistics() {
    let engine = engine(Arc::new(MemoryStore::new()));

    let report = engine.run_pass(fixed_now()).await.unwrap();

    assert_eq!(report.scored, 0);
    assert_eq!(report.statistics.orders_3d.mean, 0.0);
    assert_eq!(report.statistics.orders_3d.std_dev, 1.0);
}

#[tokio::test]
async fn pass_aborts_when_store_fails() {
    let metrics = Arc::new(Metrics::new().unwrap());
    let engine = TrendEngine::new(Arc::new(UnavailableStore), ScoringConfig::default())
        .with_metrics(metrics.clone());

    assert!(engine.run_pass(fixed_now()).await.is_err());
    assert_eq!(metrics.scoring_pass_failures_total.get(), 1);
    assert_eq!(metrics.scoring_passes_total.get(), 0);
}

#[tokio::test]
async fn pass_records_metrics() {
    let now = fixed_now();
    let metrics = Arc::new(Metrics::new().unwrap());
    let engine = engine(seeded_store(now).await).with_metrics(metrics.clone());

    engine.run_pass(now).await.unwrap();

    assert_eq!(metrics.scoring_passes_total.get(), 1);
    assert_eq!(metrics.items_scored_total.get(), 3);
}

#[tokio::test]
async fn pass_prunes_expired_snapshots() {
    let now = fixed_now();
    let store = seeded_store(now).await;
    store
        .append_snapshot("flat", &Snapshot::new(now - Duration::days(45), 20.0, 10))
        .await
        .unwrap();
    assert_eq!(store.snapshot_total().await, 13);

    let report = engine(store.clone()).run_pass(now).await.unwrap();

    assert_eq!(report.pruned_snapshots, 1);
    assert_eq!(store.snapshot_total().await, 12);
}

#[tokio::test]
async fn statistics_are_cached_between_passes() {
    let now = fixed_now();
    let store = seeded_store(now).await;
    let engine = engine(store.clone());
    let report = engine.run_pass(now).await.unwrap();

    // New items do not shift the cached baseline until it expires
    seed(&store, item("late", "garden", now, 1), Vec::new()).await;
    let cached = engine.statistics(now + Duration::minutes(5)).await.unwrap();
    assert_eq!(cached, report.statistics);

    let refreshed = engine.statistics(now + Duration::hours(2)).await.unwrap();
    assert_eq!(refreshed.sample_size, 4);
}

#[tokio::test]
async fn ingest_updates_state_and_rescores() {
    let now = fixed_now();
    let store = Arc::new(MemoryStore::new());
    let engine = engine(store.clone());
    engine
        .register_item(listing("new", "books"), now - Duration::days(1))
        .await
        .unwrap();

    let snapshot = Snapshot::new(now - Duration::hours(1), 12.5, 40)
        .with_original_price(25.0)
        .with_reviews(4.7, 12);
    let updated = engine
        .ingest_snapshot("new", snapshot, now)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.snapshot_count, 1);
    assert_eq!(updated.current_price, 12.5);
    assert_eq!(updated.sold_count, 40);
    assert_eq!(updated.price_discount_rate, 0.5);
    assert!(updated.trend_category.is_some());
    assert!(updated.viability_grade.is_some());
    assert_eq!(store.get_item("new").await.unwrap().unwrap(), updated);
}

#[tokio::test]
async fn out_of_order_snapshot_only_extends_history() {
    let now = fixed_now();
    let store = Arc::new(MemoryStore::new());
    let engine = engine(store.clone());
    engine
        .register_item(listing("late", "books"), now - Duration::days(1))
        .await
        .unwrap();

    engine
        .ingest_snapshot("late", Snapshot::new(now - Duration::hours(2), 10.0, 30), now)
        .await
        .unwrap();
    let updated = engine
        .ingest_snapshot("late", Snapshot::new(now - Duration::hours(6), 99.0, 5), now)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.snapshot_count, 2);
    assert_eq!(updated.current_price, 10.0);
    assert_eq!(updated.sold_count, 30);
    assert_eq!(updated.last_updated, now - Duration::hours(2));

    let history = store
        .get_snapshots("late", now - Duration::days(1))
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].timestamp < history[1].timestamp);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ingests_keep_every_observation() {
    let now = fixed_now();
    let store = Arc::new(YieldingStore {
        inner: MemoryStore::new(),
    });
    let engine = Arc::new(TrendEngine::new(store.clone(), ScoringConfig::default()));
    engine
        .register_item(listing("busy", "books"), now - Duration::days(2))
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for i in 0..32i64 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            let snapshot = Snapshot::new(now - Duration::hours(40 - i), 10.0, i * 10);
            engine.ingest_snapshot("busy", snapshot, now).await
        }));
    }
    let pass = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run_pass(now).await })
    };
    for task in tasks {
        assert!(task.await.unwrap().unwrap().is_some());
    }
    pass.await.unwrap().unwrap();

    let stored = store.get_item("busy").await.unwrap().unwrap();
    assert_eq!(stored.snapshot_count, 32);
    assert_eq!(stored.sold_count, 310);
    assert_eq!(stored.last_updated, now - Duration::hours(9));

    let history = store
        .get_snapshots("busy", now - Duration::days(2))
        .await
        .unwrap();
    assert_eq!(history.len(), 32);
}

#[tokio::test]
async fn pass_write_back_keeps_observations_recorded_mid_pass() {
    let now = fixed_now();
    let inner = seeded_store(now).await;
    let store = Arc::new(LateObservationStore {
        inner: inner.clone(),
        item_id: "steady",
        late: Snapshot::new(now + Duration::minutes(5), 18.0, 260),
        fired: std::sync::atomic::AtomicBool::new(false),
    });

    engine_over(store).run_pass(now).await.unwrap();

    let steady = inner.get_item("steady").await.unwrap().unwrap();
    assert_eq!(steady.snapshot_count, 5);
    assert_eq!(steady.sold_count, 260);
    assert_eq!(steady.current_price, 18.0);
    assert!(steady.trend_category.is_some());
    assert!(steady.viability_grade.is_some());
}

#[tokio::test]
async fn ingest_rejects_invalid_snapshot() {
    let now = fixed_now();
    let store = Arc::new(MemoryStore::new());
    let engine = engine(store.clone());
    engine.register_item(listing("x", "books"), now).await.unwrap();

    let result = engine
        .ingest_snapshot("x", Snapshot::new(now, -1.0, 10), now)
        .await;

    assert!(matches!(result, Err(IngestError::Invalid(_))));
    assert_eq!(store.snapshot_total().await, 0);
}

#[tokio::test]
async fn unknown_items_are_absent() {
    let now = fixed_now();
    let engine = engine(Arc::new(MemoryStore::new()));

    let ingested = engine
        .ingest_snapshot("missing", Snapshot::new(now, 10.0, 1), now)
        .await
        .unwrap();
    assert!(ingested.is_none());
    assert!(engine.rescore_item("missing", now).await.unwrap().is_none());
    assert!(engine.item_detail("missing", now).await.unwrap().is_none());
}

#[tokio::test]
async fn reregistering_keeps_tracked_state() {
    let now = fixed_now();
    let store = Arc::new(MemoryStore::new());
    let engine = engine(store.clone());
    engine
        .register_item(listing("r", "books"), now - Duration::days(2))
        .await
        .unwrap();
    engine
        .ingest_snapshot("r", Snapshot::new(now - Duration::hours(3), 15.0, 7), now)
        .await
        .unwrap();

    let mut renamed = listing("r", "stationery");
    renamed.title = "Renamed".to_string();
    let item = engine.register_item(renamed, now).await.unwrap();

    assert_eq!(item.title, "Renamed");
    assert_eq!(item.category, "stationery");
    assert_eq!(item.snapshot_count, 1);
    assert_eq!(item.sold_count, 7);
    assert_eq!(item.first_seen, now - Duration::days(2));
}

#[tokio::test]
async fn detail_carries_recent_history() {
    let now = fixed_now();
    let store = seeded_store(now).await;
    let engine = engine(store);

    let detail = engine.item_detail("hot", now).await.unwrap().unwrap();

    assert_eq!(detail.item.id, "hot");
    assert_eq!(detail.snapshots.len(), 4);
    assert_eq!(detail.price_history.len(), 4);
    assert_eq!(detail.sales_history.last().map(|p| p.sold_count), Some(1200));
}

#[tokio::test]
async fn rescore_uses_stored_history() {
    let now = fixed_now();
    let store = seeded_store(now).await;
    let engine = engine(store);

    let rescored = engine.rescore_item("hot", now).await.unwrap().unwrap();

    assert_eq!(rescored.orders_3d_delta, 1000);
    assert_eq!(rescored.orders_7d_delta, 1100);
}

#[test]
fn scoring_a_frozen_population_is_idempotent() {
    let now = fixed_now();
    let population = vec![
        (item("a", "x", now, 8), history(now, &[(6, 10), (2, 60), (0, 400)])),
        (item("b", "x", now, 8), history(now, &[(6, 5), (2, 9), (0, 13)])),
        (item("c", "y", now, 8), history(now, &[(5, 70), (1, 90), (0, 95)])),
    ];

    let first = score_population(population.clone(), DerivationWindows::default(), now);
    let second = score_population(population, DerivationWindows::default(), now);

    assert_eq!(first.statistics, second.statistics);
    for (a, b) in first.items.iter().zip(&second.items) {
        assert_eq!(a.trend_score.to_bits(), b.trend_score.to_bits());
        assert_eq!(a.trend_category, b.trend_category);
        assert_eq!(a.viability_grade, b.viability_grade);
        assert_eq!(a, b);
    }
}
