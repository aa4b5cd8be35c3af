//! PostgreSQL storage for items and snapshot history

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_postgres::{Client, GenericClient, NoTls, Row};

use crate::db::{ItemStore, StoreError, TrendingFilter};
use crate::models::{Item, NewListing, Snapshot};

const CONNECT_ATTEMPTS: usize = 5;

const UPSERT_ITEM: &str = "INSERT INTO items (id, category, country, trend_category, viability_grade, trend_score, last_updated, document)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
     ON CONFLICT (id) DO UPDATE SET
        category = EXCLUDED.category,
        country = EXCLUDED.country,
        trend_category = EXCLUDED.trend_category,
        viability_grade = EXCLUDED.viability_grade,
        trend_score = EXCLUDED.trend_score,
        last_updated = EXCLUDED.last_updated,
        document = EXCLUDED.document";

const INSERT_ITEM_IF_ABSENT: &str = "INSERT INTO items (id, category, country, trend_category, viability_grade, trend_score, last_updated, document)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
     ON CONFLICT (id) DO NOTHING";

const LOCK_ITEM: &str = "SELECT document FROM items WHERE id = $1 FOR UPDATE";

fn db_error(context: &'static str) -> impl FnOnce(tokio_postgres::Error) -> StoreError {
    move |e| Box::new(std::io::Error::other(format!("{}: {}", context, e))) as StoreError
}

/// Shared reads pipeline over one connection; transactions hold it exclusively
/// so no other statement lands inside them.
pub struct PgStore {
    client: RwLock<Client>,
}

impl PgStore {
    /// Connect with exponential backoff and make sure the schema exists.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let (client, connection) = (|| tokio_postgres::connect(url, NoTls))
            .retry(ExponentialBuilder::default().with_max_times(CONNECT_ATTEMPTS))
            .notify(|err: &tokio_postgres::Error, dur: Duration| {
                tracing::warn!(error = %err, retry_in_ms = dur.as_millis() as u64, "Database connection attempt failed");
            })
            .await
            .map_err(|e| {
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    format!("Failed to connect to database: {}", e),
                )) as StoreError
            })?;

        // Spawn connection task
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "Database connection error");
            }
        });

        let store = Self {
            client: RwLock::new(client),
        };
        store.init_schema().await?;

        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        // Filterable columns are kept alongside the full JSON document
        self.client
            .read()
            .await
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS items (
                    id TEXT PRIMARY KEY,
                    category TEXT NOT NULL,
                    country TEXT,
                    trend_category TEXT,
                    viability_grade TEXT,
                    trend_score DOUBLE PRECISION NOT NULL DEFAULT 0,
                    last_updated TIMESTAMPTZ NOT NULL,
                    document TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS items_trend_score_idx ON items (trend_score DESC);
                CREATE INDEX IF NOT EXISTS items_last_updated_idx ON items (last_updated DESC);

                CREATE TABLE IF NOT EXISTS snapshots (
                    item_id TEXT NOT NULL,
                    timestamp TIMESTAMPTZ NOT NULL,
                    price DOUBLE PRECISION NOT NULL,
                    original_price DOUBLE PRECISION,
                    sold_count BIGINT NOT NULL,
                    rating DOUBLE PRECISION NOT NULL,
                    review_count BIGINT NOT NULL,
                    in_stock BOOLEAN NOT NULL
                );
                CREATE INDEX IF NOT EXISTS snapshots_item_time_idx ON snapshots (item_id, timestamp);",
            )
            .await
            .map_err(db_error("Failed to create schema"))
    }

    fn item_from_row(row: &Row) -> Result<Item, StoreError> {
        let document: String = row.try_get(0).map_err(db_error("Failed to read item row"))?;
        serde_json::from_str(&document).map_err(|e| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Failed to deserialize item: {}", e),
            )) as StoreError
        })
    }

    fn items_from_rows(rows: &[Row]) -> Result<Vec<Item>, StoreError> {
        rows.iter().map(Self::item_from_row).collect()
    }

    /// Write an item row with `statement`, returning the affected row count.
    async fn write_item<C>(client: &C, statement: &str, item: &Item) -> Result<u64, StoreError>
    where
        C: GenericClient + Sync,
    {
        let document = serde_json::to_string(item).map_err(|e| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Failed to serialize item: {}", e),
            )) as StoreError
        })?;
        let trend_category = item.trend_category.map(|c| c.as_str());
        let viability_grade = item.viability_grade.map(|g| g.as_str());

        client
            .execute(
                statement,
                &[
                    &item.id,
                    &item.category,
                    &item.country,
                    &trend_category,
                    &viability_grade,
                    &item.trend_score,
                    &item.last_updated,
                    &document,
                ],
            )
            .await
            .map_err(db_error("Failed to store item"))
    }

    async fn insert_snapshot<C>(
        client: &C,
        item_id: &str,
        snapshot: &Snapshot,
    ) -> Result<(), StoreError>
    where
        C: GenericClient + Sync,
    {
        client
            .execute(
                "INSERT INTO snapshots (item_id, timestamp, price, original_price, sold_count, rating, review_count, in_stock)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                &[
                    &item_id,
                    &snapshot.timestamp,
                    &snapshot.price,
                    &snapshot.original_price,
                    &snapshot.sold_count,
                    &snapshot.rating,
                    &snapshot.review_count,
                    &snapshot.in_stock,
                ],
            )
            .await
            .map_err(db_error("Failed to store snapshot"))?;

        Ok(())
    }

    /// Lock one item row for the rest of the transaction.
    async fn lock_item<C>(client: &C, id: &str) -> Result<Option<Item>, StoreError>
    where
        C: GenericClient + Sync,
    {
        let row = client
            .query_opt(LOCK_ITEM, &[&id])
            .await
            .map_err(db_error("Failed to lock item"))?;

        row.as_ref().map(Self::item_from_row).transpose()
    }
}

#[async_trait]
impl ItemStore for PgStore {
    async fn upsert_item(&self, item: &Item) -> Result<(), StoreError> {
        let client = self.client.read().await;
        Self::write_item(&*client, UPSERT_ITEM, item).await?;
        Ok(())
    }

    async fn register_listing(
        &self,
        listing: NewListing,
        now: DateTime<Utc>,
    ) -> Result<Item, StoreError> {
        let mut client = self.client.write().await;
        let tx = client
            .transaction()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let fresh = Item::new(listing.clone(), now);
        let item = if Self::write_item(&tx, INSERT_ITEM_IF_ABSENT, &fresh).await? == 1 {
            fresh
        } else {
            let mut existing = Self::lock_item(&tx, &listing.id)
                .await?
                .ok_or_else(|| format!("Item {} vanished during registration", listing.id))?;
            existing.update_listing(listing);
            Self::write_item(&tx, UPSERT_ITEM, &existing).await?;
            existing
        };

        tx.commit()
            .await
            .map_err(db_error("Failed to commit registration"))?;
        Ok(item)
    }

    async fn record_snapshot(
        &self,
        item_id: &str,
        snapshot: &Snapshot,
    ) -> Result<Option<Item>, StoreError> {
        let mut client = self.client.write().await;
        let tx = client
            .transaction()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        // Dropping the transaction on an early return rolls it back
        let Some(mut item) = Self::lock_item(&tx, item_id).await? else {
            return Ok(None);
        };
        Self::insert_snapshot(&tx, item_id, snapshot).await?;
        item.observe(snapshot);
        Self::write_item(&tx, UPSERT_ITEM, &item).await?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit snapshot"))?;
        Ok(Some(item))
    }

    async fn store_computed(&self, scored: &Item) -> Result<Option<Item>, StoreError> {
        let mut client = self.client.write().await;
        let tx = client
            .transaction()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let Some(mut current) = Self::lock_item(&tx, &scored.id).await? else {
            return Ok(None);
        };
        current.merge_computed(scored);
        Self::write_item(&tx, UPSERT_ITEM, &current).await?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit scores"))?;
        Ok(Some(current))
    }

    async fn get_item(&self, id: &str) -> Result<Option<Item>, StoreError> {
        let row = self
            .client
            .read()
            .await
            .query_opt("SELECT document FROM items WHERE id = $1", &[&id])
            .await
            .map_err(db_error("Failed to query item"))?;

        row.as_ref().map(Self::item_from_row).transpose()
    }

    async fn sample_items(&self, limit: usize) -> Result<Vec<Item>, StoreError> {
        let limit = limit as i64;
        let rows = self
            .client
            .read()
            .await
            .query(
                "SELECT document FROM items ORDER BY last_updated DESC, id LIMIT $1",
                &[&limit],
            )
            .await
            .map_err(db_error("Failed to sample items"))?;

        Self::items_from_rows(&rows)
    }

    async fn trending_items(&self, filter: &TrendingFilter) -> Result<Vec<Item>, StoreError> {
        let trend_category = filter.trend_category.map(|c| c.as_str());
        let viability_grade = filter.viability_grade.map(|g| g.as_str());
        let limit = filter.limit as i64;

        let rows = self
            .client
            .read()
            .await
            .query(
                "SELECT document FROM items
                 WHERE ($1::TEXT IS NULL OR category = $1)
                   AND ($2::TEXT IS NULL OR country = $2)
                   AND ($3::TEXT IS NULL OR trend_category = $3)
                   AND ($4::TEXT IS NULL OR viability_grade = $4)
                   AND trend_score >= $5
                 ORDER BY trend_score DESC
                 LIMIT $6",
                &[
                    &filter.category,
                    &filter.country,
                    &trend_category,
                    &viability_grade,
                    &filter.min_score,
                    &limit,
                ],
            )
            .await
            .map_err(db_error("Failed to query trending items"))?;

        Self::items_from_rows(&rows)
    }

    async fn append_snapshot(&self, item_id: &str, snapshot: &Snapshot) -> Result<(), StoreError> {
        let client = self.client.read().await;
        Self::insert_snapshot(&*client, item_id, snapshot).await
    }

    async fn get_snapshots(
        &self,
        item_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>, StoreError> {
        let rows = self
            .client
            .read()
            .await
            .query(
                "SELECT timestamp, price, original_price, sold_count, rating, review_count, in_stock
                 FROM snapshots
                 WHERE item_id = $1 AND timestamp >= $2
                 ORDER BY timestamp ASC",
                &[&item_id, &since],
            )
            .await
            .map_err(db_error("Failed to query snapshots"))?;

        let snapshots = rows
            .iter()
            .map(|row| Snapshot {
                timestamp: row.get(0),
                price: row.get(1),
                original_price: row.get(2),
                sold_count: row.get(3),
                rating: row.get(4),
                review_count: row.get(5),
                in_stock: row.get(6),
            })
            .collect();

        Ok(snapshots)
    }

    async fn prune_snapshots(&self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        self.client
            .read()
            .await
            .execute("DELETE FROM snapshots WHERE timestamp < $1", &[&before])
            .await
            .map_err(db_error("Failed to prune snapshots"))
    }

    async fn categories(&self) -> Result<Vec<String>, StoreError> {
        let rows = self
            .client
            .read()
            .await
            .query("SELECT DISTINCT category FROM items ORDER BY category", &[])
            .await
            .map_err(db_error("Failed to query categories"))?;

        Ok(rows.iter().map(|row| row.get(0)).collect())
    }
}
