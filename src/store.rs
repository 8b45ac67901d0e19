//! SQLite へのスナップショット保存と集計クエリ

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{info, warn};

use crate::error::ScraperError;
use crate::listing::{Batch, ListingRecord};
use crate::traits::SnapshotStore;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS listings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    rank INTEGER,
    name TEXT NOT NULL,
    price TEXT NOT NULL,
    change_1h TEXT NOT NULL,
    change_24h TEXT NOT NULL,
    change_7d TEXT NOT NULL,
    market_cap TEXT NOT NULL,
    volume_24h TEXT NOT NULL,
    circulating_supply TEXT NOT NULL,
    scraped_at TEXT NOT NULL
)
"#;

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_listings_name ON listings (name)",
    "CREATE INDEX IF NOT EXISTS idx_listings_rank ON listings (rank)",
    "CREATE INDEX IF NOT EXISTS idx_listings_scraped_at ON listings (scraped_at)",
];

const SELECT_COLUMNS: &str = "SELECT rank, name, price, change_1h, change_24h, change_7d, \
     market_cap, volume_24h, circulating_supply, scraped_at FROM listings";

/// 保存済みの1行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredListing {
    pub record: ListingRecord,
    pub scraped_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ListingRow {
    rank: Option<i64>,
    name: String,
    price: String,
    change_1h: String,
    change_24h: String,
    change_7d: String,
    market_cap: String,
    volume_24h: String,
    circulating_supply: String,
    scraped_at: DateTime<Utc>,
}

impl From<ListingRow> for StoredListing {
    fn from(row: ListingRow) -> Self {
        Self {
            record: ListingRecord {
                rank: row.rank.and_then(|r| u32::try_from(r).ok()),
                name: row.name,
                price: row.price,
                change_1h: row.change_1h,
                change_24h: row.change_24h,
                change_7d: row.change_7d,
                market_cap: row.market_cap,
                volume_24h: row.volume_24h,
                circulating_supply: row.circulating_supply,
            },
            scraped_at: row.scraped_at,
        }
    }
}

/// 保存データの統計
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotStats {
    pub total_records: i64,
    pub unique_names: i64,
    pub first_scrape: Option<DateTime<Utc>>,
    pub last_scrape: Option<DateTime<Utc>>,
    pub total_scrapes: i64,
}

#[derive(Debug, Clone)]
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    /// データベースに接続（`sqlite::memory:` も可）
    pub async fn connect(url: &str) -> Result<Self, ScraperError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // インメモリDBは接続ごとに別DBになるため1本に絞る
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        info!("Snapshot database connected: {}", url);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 最新の取得分から順に返す
    pub async fn recent(&self, limit: u32) -> Result<Vec<StoredListing>, ScraperError> {
        let rows: Vec<ListingRow> = sqlx::query_as(&format!(
            "{} ORDER BY scraped_at DESC, rank LIMIT ?",
            SELECT_COLUMNS
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StoredListing::from).collect())
    }

    pub async fn statistics(&self) -> Result<SnapshotStats, ScraperError> {
        let (total_records, unique_names, first_scrape, last_scrape, total_scrapes): (
            i64,
            i64,
            Option<DateTime<Utc>>,
            Option<DateTime<Utc>>,
            i64,
        ) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(DISTINCT name), MIN(scraped_at), MAX(scraped_at), \
             COUNT(DISTINCT scraped_at) FROM listings",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(SnapshotStats {
            total_records,
            unique_names,
            first_scrape,
            last_scrape,
            total_scrapes,
        })
    }

    /// 名前の部分一致検索
    pub async fn search_by_name(&self, fragment: &str) -> Result<Vec<StoredListing>, ScraperError> {
        let rows: Vec<ListingRow> = sqlx::query_as(&format!(
            "{} WHERE name LIKE ? ORDER BY scraped_at, rank",
            SELECT_COLUMNS
        ))
        .bind(format!("%{}%", fragment))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StoredListing::from).collect())
    }

    pub async fn by_rank(&self, rank: u32) -> Result<Vec<StoredListing>, ScraperError> {
        if rank == 0 {
            return Err(ScraperError::InvalidArgument(
                "rank は1以上の整数が必要です".into(),
            ));
        }

        let rows: Vec<ListingRow> = sqlx::query_as(&format!(
            "{} WHERE rank = ? ORDER BY scraped_at",
            SELECT_COLUMNS
        ))
        .bind(i64::from(rank))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StoredListing::from).collect())
    }

    /// 指定日数より古い行を削除
    pub async fn delete_older_than(&self, days: u32) -> Result<u64, ScraperError> {
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(days));
        let result = sqlx::query("DELETE FROM listings WHERE scraped_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected();
        info!("Deleted {} listings older than {} days", deleted, days);
        Ok(deleted)
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn ensure_schema(&self) -> Result<(), ScraperError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        for statement in CREATE_INDEXES {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Table 'listings' created or already exists");
        Ok(())
    }

    async fn append_batch(&self, batch: &Batch) -> Result<u64, ScraperError> {
        if batch.is_empty() {
            warn!("No data to save");
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for record in &batch.records {
            let result = sqlx::query(
                "INSERT INTO listings (rank, name, price, change_1h, change_24h, change_7d, \
                 market_cap, volume_24h, circulating_supply, scraped_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(record.rank.map(i64::from))
            .bind(&record.name)
            .bind(&record.price)
            .bind(&record.change_1h)
            .bind(&record.change_24h)
            .bind(&record.change_7d)
            .bind(&record.market_cap)
            .bind(&record.volume_24h)
            .bind(&record.circulating_supply)
            .bind(batch.captured_at)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        // 途中で失敗した場合は tx の Drop でロールバックされる
        tx.commit().await?;

        info!("Successfully inserted {} records", inserted);
        Ok(inserted)
    }
}
