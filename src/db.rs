use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::source::{SourceError, TickerSource};
use crate::ticker::{validate_rows, RawTickerRow, TickerEntry};

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Every connection to an in-memory database gets its own copy
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stock_tickers (
                id INTEGER PRIMARY KEY,
                symbol TEXT NOT NULL,
                name TEXT,
                change_pct REAL NOT NULL,
                type TEXT NOT NULL DEFAULT 'stock',
                updated_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts `entries` only when the table has no rows yet.
    pub async fn seed_if_empty(&self, entries: &[TickerEntry]) -> anyhow::Result<bool> {
        if self.get_ticker_count().await? > 0 {
            return Ok(false);
        }
        for entry in entries {
            self.upsert_ticker(entry).await?;
        }
        Ok(true)
    }

    pub async fn upsert_ticker(&self, entry: &TickerEntry) -> anyhow::Result<()> {
        let updated_at = entry.updated_at.map(|t| t.to_rfc3339());

        sqlx::query(
            r#"
            INSERT INTO stock_tickers (id, symbol, name, change_pct, type, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                symbol = excluded.symbol,
                name = excluded.name,
                change_pct = excluded.change_pct,
                type = excluded.type,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(entry.id)
        .bind(&entry.symbol)
        .bind(entry.name.as_deref())
        .bind(entry.change_percent)
        .bind(entry.kind.as_str())
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a new quote for an existing row. Returns false if the id is unknown.
    pub async fn update_change(
        &self,
        id: i64,
        change_pct: f64,
        updated_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE stock_tickers
            SET change_pct = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(change_pct)
        .bind(updated_at.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_all_tickers(&self) -> Result<Vec<RawTickerRow>, sqlx::Error> {
        sqlx::query_as::<_, RawTickerRow>(
            "SELECT id, symbol, name, change_pct, type, updated_at FROM stock_tickers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get_ticker_count(&self) -> anyhow::Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stock_tickers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}

#[async_trait]
impl TickerSource for Database {
    async fn fetch_tickers(&self) -> Result<Vec<TickerEntry>, SourceError> {
        let rows = self.get_all_tickers().await?;
        Ok(validate_rows(rows))
    }
}
