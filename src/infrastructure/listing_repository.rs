//! SQLite-backed listing store
//!
//! Implements the `ListingStore` trait over sqlx. Every statement commits
//! independently; a mid-batch abort leaves already-applied writes in place,
//! which is the pipeline's documented consistency tradeoff.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::domain::listing::{
    CanonicalListing, DeletionHistoryEntry, PriceHistoryEntry, StoredListingSnapshot, TradeType,
};
use crate::domain::repositories::ListingStore;

#[derive(Clone)]
pub struct SqliteListingStore {
    pool: Arc<SqlitePool>,
}

impl SqliteListingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open (creating if missing) a database file and initialize the schema.
    pub async fn connect(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self::new(pool);
        store.init_schema().await?;
        info!("🗄️ listing store ready at {}", path.display());
        Ok(store)
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS listings (
                listing_id TEXT PRIMARY KEY,
                region_code TEXT NOT NULL,
                trade_type TEXT NOT NULL,
                sale_price INTEGER,
                deposit_price INTEGER,
                monthly_rent INTEGER,
                exclusive_area REAL,
                supply_area REAL,
                floor_current INTEGER,
                floor_total INTEGER,
                building_name TEXT,
                address TEXT,
                direction TEXT,
                elevator_count INTEGER,
                realtor_name TEXT,
                description TEXT,
                tags TEXT,
                first_seen_date TEXT NOT NULL,
                last_seen_date TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                deleted_date TEXT,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&*self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_listings_region_active ON listings(region_code, is_active)",
        )
        .execute(&*self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                listing_id TEXT NOT NULL,
                trade_type TEXT NOT NULL,
                prev_sale_price INTEGER,
                new_sale_price INTEGER,
                prev_deposit_price INTEGER,
                new_deposit_price INTEGER,
                prev_monthly_rent INTEGER,
                new_monthly_rent INTEGER,
                change_amount INTEGER,
                change_percent REAL,
                changed_date TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&*self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS deletion_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                listing_id TEXT NOT NULL,
                region_code TEXT NOT NULL,
                deleted_date TEXT NOT NULL,
                deletion_reason TEXT NOT NULL,
                days_active INTEGER,
                last_sale_price INTEGER,
                last_monthly_rent INTEGER,
                trade_type TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ListingStore for SqliteListingStore {
    async fn active_snapshots(&self, region_code: &str) -> Result<Vec<StoredListingSnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT listing_id, trade_type, sale_price, deposit_price, monthly_rent,
                   first_seen_date, last_seen_date, is_active
            FROM listings
            WHERE region_code = ? AND is_active = 1
            "#,
        )
        .bind(region_code)
        .fetch_all(&*self.pool)
        .await?;

        let snapshots = rows
            .into_iter()
            .map(|row| StoredListingSnapshot {
                listing_id: row.get("listing_id"),
                trade_type: TradeType::from_str_stored(row.get::<String, _>("trade_type").as_str()),
                sale_price: row.get("sale_price"),
                deposit_price: row.get("deposit_price"),
                monthly_rent: row.get("monthly_rent"),
                first_seen_date: row.get("first_seen_date"),
                last_seen_date: row.get("last_seen_date"),
                is_active: row.get::<i64, _>("is_active") != 0,
            })
            .collect();

        Ok(snapshots)
    }

    async fn upsert_listing(&self, listing: &CanonicalListing) -> Result<bool> {
        if !listing.is_persistable() {
            anyhow::bail!(
                "listing not persistable (id='{}', region='{}')",
                listing.listing_id,
                listing.region_code
            );
        }

        let existing: Option<String> =
            sqlx::query_scalar("SELECT listing_id FROM listings WHERE listing_id = ?")
                .bind(&listing.listing_id)
                .fetch_optional(&*self.pool)
                .await?;
        let is_new = existing.is_none();

        let tags = serde_json::to_string(&listing.tags)?;
        let now = Utc::now();

        // first_seen_date is written once and preserved on conflict; a
        // re-sighted inactive listing is revived.
        sqlx::query(
            r#"
            INSERT INTO listings
            (listing_id, region_code, trade_type, sale_price, deposit_price, monthly_rent,
             exclusive_area, supply_area, floor_current, floor_total,
             building_name, address, direction, elevator_count, realtor_name, description, tags,
             first_seen_date, last_seen_date, is_active, deleted_date, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, NULL, ?)
            ON CONFLICT(listing_id) DO UPDATE SET
                region_code = excluded.region_code,
                trade_type = excluded.trade_type,
                sale_price = excluded.sale_price,
                deposit_price = excluded.deposit_price,
                monthly_rent = excluded.monthly_rent,
                exclusive_area = excluded.exclusive_area,
                supply_area = excluded.supply_area,
                floor_current = excluded.floor_current,
                floor_total = excluded.floor_total,
                building_name = excluded.building_name,
                address = excluded.address,
                direction = excluded.direction,
                elevator_count = excluded.elevator_count,
                realtor_name = excluded.realtor_name,
                description = excluded.description,
                tags = excluded.tags,
                last_seen_date = excluded.last_seen_date,
                is_active = 1,
                deleted_date = NULL,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&listing.listing_id)
        .bind(&listing.region_code)
        .bind(listing.trade_type.as_str())
        .bind(listing.sale_price)
        .bind(listing.deposit_price)
        .bind(listing.monthly_rent)
        .bind(listing.exclusive_area)
        .bind(listing.supply_area)
        .bind(listing.floor_current)
        .bind(listing.floor_total)
        .bind(&listing.building_name)
        .bind(&listing.address)
        .bind(&listing.direction)
        .bind(listing.elevator_count)
        .bind(&listing.realtor_name)
        .bind(&listing.description)
        .bind(tags)
        .bind(listing.collected_date)
        .bind(listing.last_seen_date)
        .bind(now)
        .execute(&*self.pool)
        .await?;

        Ok(is_new)
    }

    async fn update_prices(&self, listing: &CanonicalListing, seen: NaiveDate) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE listings
            SET trade_type = ?, sale_price = ?, deposit_price = ?, monthly_rent = ?,
                last_seen_date = ?, updated_at = ?
            WHERE listing_id = ?
            "#,
        )
        .bind(listing.trade_type.as_str())
        .bind(listing.sale_price)
        .bind(listing.deposit_price)
        .bind(listing.monthly_rent)
        .bind(seen)
        .bind(Utc::now())
        .bind(&listing.listing_id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    async fn touch_last_seen(&self, listing_id: &str, seen: NaiveDate) -> Result<()> {
        sqlx::query("UPDATE listings SET last_seen_date = ?, updated_at = ? WHERE listing_id = ?")
            .bind(seen)
            .bind(Utc::now())
            .bind(listing_id)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    async fn deactivate(&self, listing_id: &str, deleted: NaiveDate) -> Result<()> {
        sqlx::query(
            "UPDATE listings SET is_active = 0, deleted_date = ?, updated_at = ? WHERE listing_id = ?",
        )
        .bind(deleted)
        .bind(Utc::now())
        .bind(listing_id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    async fn insert_price_history(&self, entry: &PriceHistoryEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO price_history
            (listing_id, trade_type, prev_sale_price, new_sale_price,
             prev_deposit_price, new_deposit_price, prev_monthly_rent, new_monthly_rent,
             change_amount, change_percent, changed_date, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.listing_id)
        .bind(entry.trade_type.as_str())
        .bind(entry.prev_sale_price)
        .bind(entry.new_sale_price)
        .bind(entry.prev_deposit_price)
        .bind(entry.new_deposit_price)
        .bind(entry.prev_monthly_rent)
        .bind(entry.new_monthly_rent)
        .bind(entry.change_amount)
        .bind(entry.change_percent)
        .bind(entry.changed_date)
        .bind(Utc::now())
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    async fn insert_deletion_history(&self, entry: &DeletionHistoryEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO deletion_history
            (listing_id, region_code, deleted_date, deletion_reason, days_active,
             last_sale_price, last_monthly_rent, trade_type, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.listing_id)
        .bind(&entry.region_code)
        .bind(entry.deleted_date)
        .bind(&entry.deletion_reason)
        .bind(entry.days_active)
        .bind(entry.last_sale_price)
        .bind(entry.last_monthly_rent)
        .bind(entry.trade_type.as_str())
        .bind(Utc::now())
        .execute(&*self.pool)
        .await?;
        Ok(())
    }
}
