//! Notification ledger with trigger-once persistence.
//!
//! A notification id is written at most once. Dismissal is a separate overlay
//! table and never deletes ledger rows.

use chrono::{DateTime, NaiveDate, Utc};
use market_core::{ArticleSummary, Clock, MarketError, MarketResult, Notification};
use sqlx::{FromRow, SqlitePool};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, FromRow)]
struct NotificationRow {
    id: String,
    #[sqlx(rename = "type")]
    kind: String,
    symbol: String,
    date: String,
    title: String,
    message: String,
    direction: String,
    percent_change: f64,
    created_at: String,
    articles_json: Option<String>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = MarketError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let kind = row.kind.parse()?;
        let direction = row.direction.parse()?;
        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")
            .map_err(|e| MarketError::Parse(format!("bad date '{}' on {}: {}", row.date, row.id, e)))?;

        let created_at = match DateTime::parse_from_rfc3339(&row.created_at) {
            Ok(dt) => Some(dt.with_timezone(&Utc)),
            Err(e) => {
                tracing::warn!("Unreadable created_at on {}: {}", row.id, e);
                None
            }
        };

        let articles = match row.articles_json.as_deref() {
            None => None,
            Some("") => Some(Vec::new()),
            Some(raw) => match serde_json::from_str::<Vec<ArticleSummary>>(raw) {
                Ok(list) => Some(list),
                Err(e) => {
                    tracing::warn!("Unreadable articles on {}: {}", row.id, e);
                    Some(Vec::new())
                }
            },
        };

        Ok(Notification {
            id: row.id,
            kind,
            symbol: row.symbol,
            date,
            title: row.title,
            message: row.message,
            direction,
            percent_change: row.percent_change,
            created_at,
            articles,
        })
    }
}

#[derive(Clone)]
pub struct NotificationLedger {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl NotificationLedger {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub async fn exists(&self, id: &str) -> MarketResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM generated_notifications WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    /// Persist a notification unless its id is already recorded.
    ///
    /// Returns true when this call wrote the row. Existing rows are never modified.
    pub async fn save(&self, notification: &Notification) -> MarketResult<bool> {
        let created_at = notification.created_at.unwrap_or_else(|| self.clock.now());
        let articles_json = notification
            .articles
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"
            INSERT INTO generated_notifications
            (id, type, symbol, date, title, message, direction, percent_change, created_at, articles_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&notification.id)
        .bind(notification.kind.as_str())
        .bind(&notification.symbol)
        .bind(notification.date.format("%Y-%m-%d").to_string())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.direction.as_str())
        .bind(notification.percent_change)
        .bind(created_at.to_rfc3339())
        .bind(articles_json)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() == 1;
        if inserted {
            tracing::info!("Recorded notification {}", notification.id);
        }
        Ok(inserted)
    }

    pub async fn get(&self, id: &str) -> MarketResult<Option<Notification>> {
        let row: Option<NotificationRow> =
            sqlx::query_as("SELECT * FROM generated_notifications WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Notification::try_from).transpose()
    }

    /// All notifications for a calendar date, in no particular order
    pub async fn for_date(&self, date: NaiveDate) -> MarketResult<Vec<Notification>> {
        let rows: Vec<NotificationRow> =
            sqlx::query_as("SELECT * FROM generated_notifications WHERE date = ?")
                .bind(date.format("%Y-%m-%d").to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    pub async fn dismiss(&self, id: &str) -> MarketResult<()> {
        sqlx::query(
            r#"
            INSERT INTO dismissed_notifications (notification_id, dismissed_at)
            VALUES (?, ?)
            ON CONFLICT(notification_id) DO UPDATE SET dismissed_at = excluded.dismissed_at
            "#,
        )
        .bind(id)
        .bind(self.clock.now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn dismissed_ids(&self) -> MarketResult<HashSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT notification_id FROM dismissed_notifications")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Drop every dismissal marker. Returns how many were removed.
    pub async fn clear_all_dismissed(&self) -> MarketResult<u64> {
        let result = sqlx::query("DELETE FROM dismissed_notifications")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MarketDb;
    use chrono::TimeZone;
    use market_core::{Direction, FixedClock, NotificationType};

    fn sample(id: &str, date: NaiveDate, pct: f64) -> Notification {
        Notification {
            id: id.to_string(),
            kind: NotificationType::DailyEod,
            symbol: "AAPL".to_string(),
            date,
            title: "AAPL ↑ 7.0%".to_string(),
            message: "From 9:30 AM to 3:59 PM".to_string(),
            direction: Direction::Up,
            percent_change: pct,
            created_at: None,
            articles: None,
        }
    }

    async fn setup_ledger() -> (MarketDb, NotificationLedger, Arc<FixedClock>) {
        let db = MarketDb::new("sqlite::memory:").await.unwrap();
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 2, 17, 21, 5, 0).unwrap(),
        ));
        let ledger = db.ledger(clock.clone());
        (db, ledger, clock)
    }

    fn feb17() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 17).unwrap()
    }

    #[tokio::test]
    async fn test_save_fills_created_at() {
        let (_db, ledger, clock) = setup_ledger().await;
        assert!(!ledger.exists("AAPL_DAILY_EOD_2026-02-17").await.unwrap());

        assert!(ledger.save(&sample("AAPL_DAILY_EOD_2026-02-17", feb17(), 7.0)).await.unwrap());
        assert!(ledger.exists("AAPL_DAILY_EOD_2026-02-17").await.unwrap());

        let stored = ledger.get("AAPL_DAILY_EOD_2026-02-17").await.unwrap().unwrap();
        assert_eq!(stored.created_at, Some(clock.now()));
        assert_eq!(stored.kind, NotificationType::DailyEod);
        assert_eq!(stored.direction, Direction::Up);
    }

    #[tokio::test]
    async fn test_save_is_trigger_once() {
        let (_db, ledger, clock) = setup_ledger().await;
        let first = sample("AAPL_DAILY_EOD_2026-02-17", feb17(), 7.0);
        assert!(ledger.save(&first).await.unwrap());

        clock.advance(chrono::Duration::minutes(30));
        let second = sample("AAPL_DAILY_EOD_2026-02-17", feb17(), 9.5);
        assert!(!ledger.save(&second).await.unwrap());

        let rows = ledger.for_date(feb17()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].percent_change, 7.0);
    }

    #[tokio::test]
    async fn test_concurrent_saves_same_id() {
        let (_db, ledger, _clock) = setup_ledger().await;
        let n = sample("AAPL_MOMENTUM_2H_2026-02-17_1415", feb17(), 5.5);

        let (a, b) = tokio::join!(ledger.save(&n), ledger.save(&n));
        assert!(a.unwrap() ^ b.unwrap());
        assert_eq!(ledger.for_date(feb17()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_for_date_filters_by_date() {
        let (_db, ledger, _clock) = setup_ledger().await;
        let feb16 = NaiveDate::from_ymd_opt(2026, 2, 16).unwrap();
        ledger.save(&sample("AAPL_DAILY_EOD_2026-02-16", feb16, 1.0)).await.unwrap();
        ledger.save(&sample("AAPL_DAILY_EOD_2026-02-17", feb17(), 2.0)).await.unwrap();

        let today = ledger.for_date(feb17()).await.unwrap();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].id, "AAPL_DAILY_EOD_2026-02-17");
    }

    #[tokio::test]
    async fn test_articles_round_trip() {
        let (_db, ledger, _clock) = setup_ledger().await;
        let mut n = sample("AAPL_NEWS_2026-02-17_10AM", feb17(), 0.0);
        n.kind = NotificationType::NewsBriefing;
        n.direction = Direction::Neutral;
        n.articles = Some(vec![ArticleSummary {
            headline: "Apple ships".to_string(),
            summary: "Shipments rose".to_string(),
            url: "https://example.com/a".to_string(),
            source: "Wire".to_string(),
        }]);
        ledger.save(&n).await.unwrap();

        let stored = ledger.get(&n.id).await.unwrap().unwrap();
        assert_eq!(stored.articles, n.articles);
    }

    #[tokio::test]
    async fn test_unknown_type_fails_fast() {
        let (db, ledger, _clock) = setup_ledger().await;
        sqlx::query(
            "INSERT INTO generated_notifications (id, type, symbol, date, title, message, direction, percent_change, created_at)
             VALUES ('X', 'PRICE_SPIKE', 'AAPL', '2026-02-17', 't', 'm', 'up', 1.0, '2026-02-17T21:05:00+00:00')",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = ledger.for_date(feb17()).await.unwrap_err();
        assert!(matches!(err, MarketError::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_dismiss_overlay() {
        let (_db, ledger, _clock) = setup_ledger().await;
        ledger.save(&sample("AAPL_DAILY_EOD_2026-02-17", feb17(), 7.0)).await.unwrap();

        ledger.dismiss("AAPL_DAILY_EOD_2026-02-17").await.unwrap();
        ledger.dismiss("AAPL_DAILY_EOD_2026-02-17").await.unwrap();

        let dismissed = ledger.dismissed_ids().await.unwrap();
        assert_eq!(dismissed.len(), 1);
        assert!(dismissed.contains("AAPL_DAILY_EOD_2026-02-17"));
        // The ledger row itself survives dismissal
        assert!(ledger.exists("AAPL_DAILY_EOD_2026-02-17").await.unwrap());

        assert_eq!(ledger.clear_all_dismissed().await.unwrap(), 1);
        assert!(ledger.dismissed_ids().await.unwrap().is_empty());
    }
}
