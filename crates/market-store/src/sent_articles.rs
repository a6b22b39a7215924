use chrono::NaiveDate;
use market_core::MarketResult;
use sqlx::SqlitePool;

/// Articles already delivered in a briefing, keyed by (symbol, url hash)
#[derive(Clone)]
pub struct SentArticleLog {
    pool: SqlitePool,
}

impl SentArticleLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn already_sent(&self, symbol: &str, url_hash: &str) -> MarketResult<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM news_articles_sent WHERE symbol = ? AND url_hash = ?")
                .bind(symbol)
                .bind(url_hash)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.is_some())
    }

    pub async fn record(&self, symbol: &str, url_hash: &str, url: &str, date: NaiveDate) -> MarketResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO news_articles_sent (symbol, url_hash, url, date) VALUES (?, ?, ?, ?)",
        )
        .bind(symbol)
        .bind(url_hash)
        .bind(url)
        .bind(date.format("%Y-%m-%d").to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
