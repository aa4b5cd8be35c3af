//! In-process item store for tests and database-less runs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

use crate::db::{ItemStore, StoreError, TrendingFilter};
use crate::models::{Item, NewListing, Snapshot};

#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, Item>>,
    snapshots: RwLock<HashMap<String, Vec<Snapshot>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total snapshots held across all items
    pub async fn snapshot_total(&self) -> usize {
        self.snapshots.read().await.values().map(Vec::len).sum()
    }
}

fn by_score_desc(a: &Item, b: &Item) -> std::cmp::Ordering {
    b.trend_score
        .partial_cmp(&a.trend_score)
        .unwrap_or(std::cmp::Ordering::Equal)
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn upsert_item(&self, item: &Item) -> Result<(), StoreError> {
        self.items
            .write()
            .await
            .insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn register_listing(
        &self,
        listing: NewListing,
        now: DateTime<Utc>,
    ) -> Result<Item, StoreError> {
        let mut items = self.items.write().await;
        let item = match items.get_mut(&listing.id) {
            Some(existing) => {
                existing.update_listing(listing);
                existing.clone()
            }
            None => {
                let item = Item::new(listing, now);
                items.insert(item.id.clone(), item.clone());
                item
            }
        };
        Ok(item)
    }

    async fn record_snapshot(
        &self,
        item_id: &str,
        snapshot: &Snapshot,
    ) -> Result<Option<Item>, StoreError> {
        // Item lock is held across the append so the fold and history agree
        let mut items = self.items.write().await;
        let Some(item) = items.get_mut(item_id) else {
            return Ok(None);
        };

        let mut snapshots = self.snapshots.write().await;
        let history = snapshots.entry(item_id.to_string()).or_default();
        history.push(snapshot.clone());
        history.sort_by_key(|s| s.timestamp);

        item.observe(snapshot);
        Ok(Some(item.clone()))
    }

    async fn store_computed(&self, scored: &Item) -> Result<Option<Item>, StoreError> {
        let mut items = self.items.write().await;
        Ok(items.get_mut(&scored.id).map(|current| {
            current.merge_computed(scored);
            current.clone()
        }))
    }

    async fn get_item(&self, id: &str) -> Result<Option<Item>, StoreError> {
        Ok(self.items.read().await.get(id).cloned())
    }

    async fn sample_items(&self, limit: usize) -> Result<Vec<Item>, StoreError> {
        let items = self.items.read().await;
        let mut sample: Vec<Item> = items.values().cloned().collect();
        sample.sort_by(|a, b| b.last_updated.cmp(&a.last_updated).then(a.id.cmp(&b.id)));
        sample.truncate(limit);
        Ok(sample)
    }

    async fn trending_items(&self, filter: &TrendingFilter) -> Result<Vec<Item>, StoreError> {
        let items = self.items.read().await;
        let mut matching: Vec<Item> = items
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect();
        matching.sort_by(by_score_desc);
        matching.truncate(filter.limit);
        Ok(matching)
    }

    async fn append_snapshot(&self, item_id: &str, snapshot: &Snapshot) -> Result<(), StoreError> {
        let mut snapshots = self.snapshots.write().await;
        let history = snapshots.entry(item_id.to_string()).or_default();
        history.push(snapshot.clone());
        history.sort_by_key(|s| s.timestamp);
        Ok(())
    }

    async fn get_snapshots(
        &self,
        item_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>, StoreError> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .get(item_id)
            .map(|history| {
                history
                    .iter()
                    .filter(|s| s.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn prune_snapshots(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut snapshots = self.snapshots.write().await;
        let mut removed = 0u64;
        for history in snapshots.values_mut() {
            let len = history.len();
            history.retain(|s| s.timestamp >= before);
            removed += (len - history.len()) as u64;
        }
        Ok(removed)
    }

    async fn categories(&self) -> Result<Vec<String>, StoreError> {
        let items = self.items.read().await;
        let distinct: BTreeSet<String> = items.values().map(|i| i.category.clone()).collect();
        Ok(distinct.into_iter().collect())
    }
}
