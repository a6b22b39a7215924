use chrono::{DateTime, Utc};
use market_core::{MarketResult, WatchlistEntry};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, FromRow)]
struct WatchlistRow {
    symbol: String,
    name: String,
    added_at: String,
    news_notify_count: i64,
}

impl From<WatchlistRow> for WatchlistEntry {
    fn from(row: WatchlistRow) -> Self {
        let added_at = match DateTime::parse_from_rfc3339(&row.added_at) {
            Ok(dt) => Some(dt.with_timezone(&Utc)),
            Err(e) => {
                tracing::warn!("Unreadable added_at '{}' for {}: {}", row.added_at, row.symbol, e);
                None
            }
        };

        WatchlistEntry {
            symbol: row.symbol,
            name: row.name,
            added_at,
            news_notify_count: row.news_notify_count,
        }
    }
}

#[derive(Clone)]
pub struct WatchlistStore {
    pool: SqlitePool,
}

impl WatchlistStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All watched symbols, oldest first
    pub async fn list(&self) -> MarketResult<Vec<WatchlistEntry>> {
        let rows: Vec<WatchlistRow> = sqlx::query_as(
            "SELECT symbol, name, added_at, news_notify_count FROM watchlist ORDER BY added_at ASC, symbol ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(WatchlistEntry::from).collect())
    }

    pub async fn get(&self, symbol: &str) -> MarketResult<Option<WatchlistEntry>> {
        let row: Option<WatchlistRow> = sqlx::query_as(
            "SELECT symbol, name, added_at, news_notify_count FROM watchlist WHERE symbol = ?",
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(WatchlistEntry::from))
    }

    /// Add a symbol. Re-adding only refreshes the display name; `added_at` is kept.
    /// Returns true when the symbol was newly added.
    pub async fn add(&self, symbol: &str, name: &str, added_at: DateTime<Utc>) -> MarketResult<bool> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO watchlist (symbol, name, added_at, news_notify_count)
            VALUES (?, ?, ?, 0)
            ON CONFLICT(symbol) DO NOTHING
            "#,
        )
        .bind(symbol)
        .bind(name)
        .bind(added_at.to_rfc3339())
        .execute(&self.pool)
        .await?
        .rows_affected()
            == 1;

        if !inserted {
            sqlx::query("UPDATE watchlist SET name = ? WHERE symbol = ?")
                .bind(name)
                .bind(symbol)
                .execute(&self.pool)
                .await?;
        }

        Ok(inserted)
    }

    /// Returns true when a row was removed
    pub async fn remove(&self, symbol: &str) -> MarketResult<bool> {
        let result = sqlx::query("DELETE FROM watchlist WHERE symbol = ?")
            .bind(symbol)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set the briefing counter, clamped to 0-3. Returns false for unknown symbols.
    pub async fn set_news_notify_count(&self, symbol: &str, count: i64) -> MarketResult<bool> {
        let count = count.clamp(0, WatchlistEntry::MAX_NEWS_NOTIFY_COUNT);
        let result = sqlx::query("UPDATE watchlist SET news_notify_count = ? WHERE symbol = ?")
            .bind(count)
            .bind(symbol)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
