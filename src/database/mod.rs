use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::models::{CoverageSummary, Exchange, HoldingRecord};

/// SQLX-based store for daily holdings ranking rows.
///
/// One table, `holdings`, with the natural key
/// (tday, exchange, product, contract, symbol, rank, member) enforced by a
/// unique index; inserts ignore conflicts on that key.
#[derive(Clone)]
pub struct HoldingsStore {
    pool: SqlitePool,
}

impl HoldingsStore {
    /// Open (creating if missing) the database at the given path
    pub async fn new(database_path: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(database_path)
                    .create_if_missing(true),
            )
            .await
            .with_context(|| format!("failed to open database at {}", database_path))?;

        // WAL for concurrent readers while an ingest run writes
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await?;
        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&pool)
            .await?;

        let store = Self { pool };
        store.create_schema().await?;
        info!("Holdings store ready at {}", database_path);
        Ok(store)
    }

    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS holdings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tday TEXT NOT NULL,
                exchange TEXT NOT NULL,
                code TEXT NOT NULL,
                product TEXT NOT NULL,
                contract TEXT NOT NULL,
                symbol TEXT NOT NULL,
                rank INTEGER NOT NULL,
                member TEXT NOT NULL,
                value INTEGER NOT NULL,
                change INTEGER NOT NULL,
                -- must stay inline (not a separate CREATE UNIQUE INDEX): a pooled
                -- connection that caches the schema between the two statements
                -- fails to resolve the ON CONFLICT target in insert_record
                UNIQUE (tday, exchange, product, contract, symbol, rank, member)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_holdings_day_exchange ON holdings (tday, exchange)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Drop and recreate the table. Destroys all prior data, irreversibly;
    /// safe to call when the table does not yet exist.
    pub async fn reset(&self) -> Result<()> {
        sqlx::query("DROP TABLE IF EXISTS holdings")
            .execute(&self.pool)
            .await?;
        self.create_schema().await?;
        info!("Holdings table dropped and recreated");
        Ok(())
    }

    /// Coarse existence probe: any row at all for this (day, exchange)?
    pub async fn has_day(&self, exchange: Exchange, tday: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM holdings WHERE tday = ? AND exchange = ? LIMIT 1")
            .bind(tday)
            .bind(exchange.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Insert a single record unless its (day, exchange) already has data.
    /// Returns whether a row was written.
    pub async fn insert_if_absent(&self, record: &HoldingRecord) -> Result<bool> {
        if self.has_day(record.exchange, &record.tday).await? {
            debug!(
                "Skipping insert: {} already has data for {}",
                record.exchange, record.tday
            );
            return Ok(false);
        }
        let affected = Self::insert_record(&self.pool, record).await?;
        Ok(affected > 0)
    }

    /// Insert one trading day's records as a single transaction (the batch
    /// unit of the ingestion driver). Rows conflicting on the natural key
    /// are ignored. Returns the number of rows actually written.
    pub async fn insert_day(&self, records: &[HoldingRecord]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for record in records {
            inserted += Self::insert_record(&mut tx, record).await?;
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn insert_record<'e, E>(executor: E, record: &HoldingRecord) -> Result<u64>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO holdings (tday, exchange, code, product, contract, symbol, rank, member, value, change)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (tday, exchange, product, contract, symbol, rank, member) DO NOTHING
            "#,
        )
        .bind(&record.tday)
        .bind(record.exchange.as_str())
        .bind(&record.code)
        .bind(&record.product)
        .bind(&record.contract)
        .bind(&record.symbol)
        .bind(record.rank)
        .bind(&record.member)
        .bind(record.value)
        .bind(record.change)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete one exchange's rows inside a closed date interval, leaving
    /// every other partition untouched. Returns the number of rows removed.
    pub async fn delete_range(&self, exchange: Exchange, start: &str, end: &str) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM holdings WHERE exchange = ? AND tday BETWEEN ? AND ?")
                .bind(exchange.as_str())
                .bind(start)
                .bind(end)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Every row, natural storage order
    pub async fn list_all(&self) -> Result<Vec<HoldingRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, tday, exchange, code, product, contract, symbol, rank, member, value, change
            FROM holdings
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let exchange: String = r.get("exchange");
                Ok(HoldingRecord {
                    id: Some(r.get::<i64, _>("id")),
                    tday: r.get::<String, _>("tday"),
                    exchange: exchange.parse()?,
                    code: r.get::<String, _>("code"),
                    product: r.get::<String, _>("product"),
                    contract: r.get::<String, _>("contract"),
                    symbol: r.get::<String, _>("symbol"),
                    rank: r.get::<i64, _>("rank"),
                    member: r.get::<String, _>("member"),
                    value: r.get::<i64, _>("value"),
                    change: r.get::<i64, _>("change"),
                })
            })
            .collect()
    }

    /// Distinct `exchange` values present in the store
    pub async fn distinct_exchanges(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT exchange FROM holdings ORDER BY exchange")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| r.get::<String, _>("exchange"))
            .collect())
    }

    /// Earliest trading day in the store (lexicographic = chronological
    /// for zero-padded YYYYMMDD)
    pub async fn min_date(&self) -> Result<Option<String>> {
        let row = sqlx::query("SELECT MIN(tday) AS tday FROM holdings")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<Option<String>, _>("tday"))
    }

    /// Latest trading day in the store
    pub async fn max_date(&self) -> Result<Option<String>> {
        let row = sqlx::query("SELECT MAX(tday) AS tday FROM holdings")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<Option<String>, _>("tday"))
    }

    /// Metadata payload for the query endpoint
    pub async fn coverage(&self) -> Result<CoverageSummary> {
        Ok(CoverageSummary {
            exchanges: self.distinct_exchanges().await?,
            start_date: self.min_date().await?,
            end_date: self.max_date().await?,
        })
    }

    /// Total row count
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM holdings")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("count"))
    }
}
