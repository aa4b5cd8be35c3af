//! Persistence collaborator for items and their snapshot history

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::{Item, NewListing, Snapshot, TrendCategory, ViabilityGrade};

pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Filters for the trending listing query
#[derive(Debug, Clone, Deserialize)]
pub struct TrendingFilter {
    #[serde(default = "TrendingFilter::default_limit")]
    pub limit: usize,
    pub category: Option<String>,
    pub country: Option<String>,
    pub trend_category: Option<TrendCategory>,
    pub viability_grade: Option<ViabilityGrade>,
    #[serde(default)]
    pub min_score: f64,
}

impl TrendingFilter {
    pub const MAX_LIMIT: usize = 100;

    fn default_limit() -> usize {
        50
    }

    /// Clamp the limit into the supported 1..=100 range.
    pub fn normalized(mut self) -> Self {
        self.limit = self.limit.clamp(1, Self::MAX_LIMIT);
        self
    }

    pub fn matches(&self, item: &Item) -> bool {
        if let Some(ref category) = self.category {
            if &item.category != category {
                return false;
            }
        }
        if let Some(ref country) = self.country {
            if item.country.as_ref() != Some(country) {
                return false;
            }
        }
        if self.trend_category.is_some() && item.trend_category != self.trend_category {
            return false;
        }
        if self.viability_grade.is_some() && item.viability_grade != self.viability_grade {
            return false;
        }
        item.trend_score >= self.min_score
    }
}

impl Default for TrendingFilter {
    fn default() -> Self {
        Self {
            limit: Self::default_limit(),
            category: None,
            country: None,
            trend_category: None,
            viability_grade: None,
            min_score: 0.0,
        }
    }
}

/// Storage of tracked items and their append-only snapshot history.
///
/// Implementations must return snapshots oldest first. `record_snapshot`,
/// `store_computed` and `register_listing` each read and write one item
/// atomically, so concurrent writers to the same id never lose updates.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert or replace an item by id
    async fn upsert_item(&self, item: &Item) -> Result<(), StoreError>;

    /// Create the item, or refresh the listing fields of an existing one
    async fn register_listing(
        &self,
        listing: NewListing,
        now: DateTime<Utc>,
    ) -> Result<Item, StoreError>;

    /// Append a snapshot and fold it into the item's state in one step.
    /// Unknown ids yield `None` and nothing is appended.
    async fn record_snapshot(
        &self,
        item_id: &str,
        snapshot: &Snapshot,
    ) -> Result<Option<Item>, StoreError>;

    /// Merge the computed fields of `scored` onto the stored item, returning
    /// the merged item or `None` when it no longer exists
    async fn store_computed(&self, scored: &Item) -> Result<Option<Item>, StoreError>;

    async fn get_item(&self, id: &str) -> Result<Option<Item>, StoreError>;

    /// Most recently updated items, bounded by `limit`
    async fn sample_items(&self, limit: usize) -> Result<Vec<Item>, StoreError>;

    /// Items matching the filter, highest trend score first
    async fn trending_items(&self, filter: &TrendingFilter) -> Result<Vec<Item>, StoreError>;

    async fn append_snapshot(&self, item_id: &str, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// Snapshots of one item at or after `since`, oldest first
    async fn get_snapshots(
        &self,
        item_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>, StoreError>;

    /// Drop snapshots older than `before`, returning how many were removed
    async fn prune_snapshots(&self, before: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Distinct item categories, sorted
    async fn categories(&self) -> Result<Vec<String>, StoreError>;
}
