//! OHLCV bar cache, one table per granularity.
//!
//! Timestamps are stored as fixed-width text so lexical order is time order.

use chrono::NaiveDateTime;
use market_core::{Bar, Granularity, MarketResult};
use sqlx::{FromRow, SqlitePool};
use std::ops::Bound;

/// Rows fetched per round trip when looking for a window's first or last bar
const ENDPOINT_PAGE: i64 = 5;

#[derive(Debug, FromRow)]
struct BarRow {
    symbol: String,
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
}

impl BarRow {
    /// Rows with an unreadable timestamp are dropped rather than failing the query
    fn into_bar(self, granularity: Granularity) -> Option<Bar> {
        match granularity.parse_timestamp(&self.timestamp) {
            Ok(timestamp) => Some(Bar {
                symbol: self.symbol,
                timestamp,
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
                volume: self.volume,
            }),
            Err(e) => {
                tracing::warn!("Skipping {} bar for {}: {}", granularity, self.symbol, e);
                None
            }
        }
    }
}

/// Time window over bar timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarWindow {
    pub start: Bound<NaiveDateTime>,
    pub end: Bound<NaiveDateTime>,
}

impl BarWindow {
    pub fn new(start: Bound<NaiveDateTime>, end: Bound<NaiveDateTime>) -> Self {
        Self { start, end }
    }

    /// `[start, end]`
    pub fn closed(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self::new(Bound::Included(start), Bound::Included(end))
    }

    /// `[start, ..)`
    pub fn starting_at(start: NaiveDateTime) -> Self {
        Self::new(Bound::Included(start), Bound::Unbounded)
    }

    /// `[open, close)`
    pub fn session(open: NaiveDateTime, close: NaiveDateTime) -> Self {
        Self::new(Bound::Included(open), Bound::Excluded(close))
    }

    /// `(.., end)`
    pub fn before(end: NaiveDateTime) -> Self {
        Self::new(Bound::Unbounded, Bound::Excluded(end))
    }

    fn sql_conditions(&self, granularity: Granularity) -> (String, Vec<String>) {
        let mut sql = String::from("symbol = ?");
        let mut params = Vec::new();

        match self.start {
            Bound::Included(ts) => {
                sql.push_str(" AND timestamp >= ?");
                params.push(granularity.format_timestamp(ts));
            }
            Bound::Excluded(ts) => {
                sql.push_str(" AND timestamp > ?");
                params.push(granularity.format_timestamp(ts));
            }
            Bound::Unbounded => {}
        }
        match self.end {
            Bound::Included(ts) => {
                sql.push_str(" AND timestamp <= ?");
                params.push(granularity.format_timestamp(ts));
            }
            Bound::Excluded(ts) => {
                sql.push_str(" AND timestamp < ?");
                params.push(granularity.format_timestamp(ts));
            }
            Bound::Unbounded => {}
        }

        (sql, params)
    }
}

#[derive(Clone)]
pub struct BarStore {
    pool: SqlitePool,
}

impl BarStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace bars keyed by (symbol, timestamp). Atomic per call.
    pub async fn upsert_bars(&self, granularity: Granularity, bars: &[Bar]) -> MarketResult<usize> {
        if bars.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            r#"
            INSERT INTO {} (symbol, timestamp, open, high, low, close, volume)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(symbol, timestamp) DO UPDATE SET
                open = excluded.open,
                high = excluded.high,
                low = excluded.low,
                close = excluded.close,
                volume = excluded.volume
            "#,
            granularity.table()
        );

        let mut tx = self.pool.begin().await?;
        for bar in bars {
            sqlx::query(&sql)
                .bind(&bar.symbol)
                .bind(granularity.format_timestamp(bar.timestamp))
                .bind(bar.open)
                .bind(bar.high)
                .bind(bar.low)
                .bind(bar.close)
                .bind(bar.volume)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        tracing::debug!("Upserted {} {} bars", bars.len(), granularity);
        Ok(bars.len())
    }

    /// Timestamp of the newest cached bar
    pub async fn latest_timestamp(
        &self,
        symbol: &str,
        granularity: Granularity,
    ) -> MarketResult<Option<NaiveDateTime>> {
        let sql = format!(
            "SELECT timestamp FROM {} WHERE symbol = ? ORDER BY timestamp DESC LIMIT 1",
            granularity.table()
        );
        let row: Option<(String,)> = sqlx::query_as(&sql)
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|(raw,)| match granularity.parse_timestamp(&raw) {
            Ok(ts) => Some(ts),
            Err(e) => {
                tracing::warn!("Ignoring latest {} timestamp for {}: {}", granularity, symbol, e);
                None
            }
        }))
    }

    /// Bars in `[start, end]` (open-ended when `end` is `None`), ascending
    pub async fn range(
        &self,
        symbol: &str,
        granularity: Granularity,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
    ) -> MarketResult<Vec<Bar>> {
        let window = match end {
            Some(end) => BarWindow::closed(start, end),
            None => BarWindow::starting_at(start),
        };
        self.range_in(symbol, granularity, &window).await
    }

    pub async fn range_in(
        &self,
        symbol: &str,
        granularity: Granularity,
        window: &BarWindow,
    ) -> MarketResult<Vec<Bar>> {
        let (conditions, params) = window.sql_conditions(granularity);
        let sql = format!(
            "SELECT symbol, timestamp, open, high, low, close, volume FROM {} WHERE {} ORDER BY timestamp ASC",
            granularity.table(),
            conditions
        );

        let mut query = sqlx::query_as::<_, BarRow>(&sql).bind(symbol);
        for param in params {
            query = query.bind(param);
        }
        let rows = query.fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_bar(granularity))
            .collect())
    }

    /// First bar inside the window
    pub async fn first_in(
        &self,
        symbol: &str,
        granularity: Granularity,
        window: &BarWindow,
    ) -> MarketResult<Option<Bar>> {
        self.endpoint(symbol, granularity, window, "ASC").await
    }

    /// Last bar inside the window
    pub async fn last_in(
        &self,
        symbol: &str,
        granularity: Granularity,
        window: &BarWindow,
    ) -> MarketResult<Option<Bar>> {
        self.endpoint(symbol, granularity, window, "DESC").await
    }

    /// The two bars bounding a window, without scanning it
    pub async fn earliest_and_latest_in_range(
        &self,
        symbol: &str,
        granularity: Granularity,
        window: &BarWindow,
    ) -> MarketResult<(Option<Bar>, Option<Bar>)> {
        let earliest = self.first_in(symbol, granularity, window).await?;
        if earliest.is_none() {
            return Ok((None, None));
        }
        let latest = self.last_in(symbol, granularity, window).await?;
        Ok((earliest, latest))
    }

    async fn endpoint(
        &self,
        symbol: &str,
        granularity: Granularity,
        window: &BarWindow,
        order: &'static str,
    ) -> MarketResult<Option<Bar>> {
        let (conditions, params) = window.sql_conditions(granularity);
        let sql = format!(
            "SELECT symbol, timestamp, open, high, low, close, volume FROM {} WHERE {} ORDER BY timestamp {} LIMIT ? OFFSET ?",
            granularity.table(),
            conditions,
            order
        );

        // Page past unparseable rows instead of reporting the window empty
        let mut offset: i64 = 0;
        loop {
            let mut query = sqlx::query_as::<_, BarRow>(&sql).bind(symbol);
            for param in &params {
                query = query.bind(param);
            }
            let rows = query
                .bind(ENDPOINT_PAGE)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;

            let fetched = rows.len() as i64;
            if let Some(bar) = rows.into_iter().find_map(|row| row.into_bar(granularity)) {
                return Ok(Some(bar));
            }
            if fetched < ENDPOINT_PAGE {
                return Ok(None);
            }
            offset += fetched;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MarketDb;

    fn ts(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn bar(symbol: &str, at: &str, close: f64) -> Bar {
        Bar {
            symbol: symbol.to_string(),
            timestamp: ts(at),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100,
        }
    }

    async fn setup_store() -> BarStore {
        MarketDb::new("sqlite::memory:").await.unwrap().bars()
    }

    #[tokio::test]
    async fn test_upsert_last_write_wins() {
        let store = setup_store().await;
        store
            .upsert_bars(Granularity::Minute, &[bar("AAPL", "2026-02-17 09:30:00", 100.0)])
            .await
            .unwrap();
        store
            .upsert_bars(Granularity::Minute, &[bar("AAPL", "2026-02-17 09:30:00", 101.5)])
            .await
            .unwrap();

        let bars = store
            .range("AAPL", Granularity::Minute, ts("2026-02-17 00:00:00"), None)
            .await
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 101.5);
    }

    #[tokio::test]
    async fn test_range_is_ascending_and_per_symbol() {
        let store = setup_store().await;
        store
            .upsert_bars(
                Granularity::Minute,
                &[
                    bar("AAPL", "2026-02-17 10:00:00", 102.0),
                    bar("AAPL", "2026-02-17 09:30:00", 100.0),
                    bar("MSFT", "2026-02-17 09:45:00", 400.0),
                    bar("AAPL", "2026-02-17 09:45:00", 101.0),
                ],
            )
            .await
            .unwrap();

        let bars = store
            .range(
                "AAPL",
                Granularity::Minute,
                ts("2026-02-17 09:30:00"),
                Some(ts("2026-02-17 09:45:00")),
            )
            .await
            .unwrap();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![100.0, 101.0]);
    }

    #[tokio::test]
    async fn test_latest_timestamp() {
        let store = setup_store().await;
        assert!(store
            .latest_timestamp("AAPL", Granularity::Minute)
            .await
            .unwrap()
            .is_none());

        store
            .upsert_bars(
                Granularity::Minute,
                &[
                    bar("AAPL", "2026-02-17 09:30:00", 100.0),
                    bar("AAPL", "2026-02-17 15:59:00", 107.0),
                ],
            )
            .await
            .unwrap();
        assert_eq!(
            store.latest_timestamp("AAPL", Granularity::Minute).await.unwrap(),
            Some(ts("2026-02-17 15:59:00"))
        );
        // Other granularities are separate tables
        assert!(store
            .latest_timestamp("AAPL", Granularity::Hour)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_earliest_and_latest_in_range() {
        let store = setup_store().await;
        store
            .upsert_bars(
                Granularity::Minute,
                &[
                    bar("AAPL", "2026-02-16 15:59:00", 98.0),
                    bar("AAPL", "2026-02-17 09:30:00", 100.0),
                    bar("AAPL", "2026-02-17 12:00:00", 103.0),
                    bar("AAPL", "2026-02-17 15:59:00", 107.0),
                ],
            )
            .await
            .unwrap();

        let window = BarWindow::closed(ts("2026-02-17 09:30:00"), ts("2026-02-17 23:59:59"));
        let (earliest, latest) = store
            .earliest_and_latest_in_range("AAPL", Granularity::Minute, &window)
            .await
            .unwrap();
        assert_eq!(earliest.unwrap().close, 100.0);
        assert_eq!(latest.unwrap().close, 107.0);

        let before_open = store
            .last_in("AAPL", Granularity::Minute, &BarWindow::before(ts("2026-02-17 09:30:00")))
            .await
            .unwrap();
        assert_eq!(before_open.unwrap().close, 98.0);

        let empty = BarWindow::closed(ts("2026-02-18 09:30:00"), ts("2026-02-18 09:45:00"));
        let (e, l) = store
            .earliest_and_latest_in_range("AAPL", Granularity::Minute, &empty)
            .await
            .unwrap();
        assert!(e.is_none() && l.is_none());
    }

    #[tokio::test]
    async fn test_malformed_timestamp_rows_are_skipped() {
        let db = MarketDb::new("sqlite::memory:").await.unwrap();
        let store = db.bars();
        sqlx::query(
            "INSERT INTO bars_1m (symbol, timestamp, open, high, low, close, volume) VALUES ('AAPL', '2026-02-17 9:31', 1, 1, 1, 1, 1)",
        )
        .execute(db.pool())
        .await
        .unwrap();
        store
            .upsert_bars(Granularity::Minute, &[bar("AAPL", "2026-02-17 09:30:00", 100.0)])
            .await
            .unwrap();

        let bars = store
            .range("AAPL", Granularity::Minute, ts("2026-02-17 00:00:00"), None)
            .await
            .unwrap();
        assert_eq!(bars.len(), 1);

        // The bad row sorts last but the valid one is still found
        let latest = store
            .last_in("AAPL", Granularity::Minute, &BarWindow::starting_at(ts("2026-02-17 00:00:00")))
            .await
            .unwrap();
        assert_eq!(latest.unwrap().close, 100.0);
    }

    #[tokio::test]
    async fn test_endpoint_pages_past_runs_of_bad_rows() {
        let db = MarketDb::new("sqlite::memory:").await.unwrap();
        let store = db.bars();
        store
            .upsert_bars(Granularity::Minute, &[bar("AAPL", "2026-02-17 09:30:00", 100.0)])
            .await
            .unwrap();
        // Twelve unreadable rows sort after the valid one
        for minute in 10..22 {
            sqlx::query(
                "INSERT INTO bars_1m (symbol, timestamp, open, high, low, close, volume) VALUES ('AAPL', ?, 1, 1, 1, 1, 1)",
            )
            .bind(format!("2026-02-17 9:{}", minute))
            .execute(db.pool())
            .await
            .unwrap();
        }

        let latest = store
            .last_in("AAPL", Granularity::Minute, &BarWindow::starting_at(ts("2026-02-17 00:00:00")))
            .await
            .unwrap();
        assert_eq!(latest.unwrap().close, 100.0);

        let none = store
            .last_in("MSFT", Granularity::Minute, &BarWindow::starting_at(ts("2026-02-17 00:00:00")))
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_session_window_excludes_the_close() {
        let store = setup_store().await;
        store
            .upsert_bars(
                Granularity::Minute,
                &[
                    bar("AAPL", "2026-02-17 09:30:00", 100.0),
                    bar("AAPL", "2026-02-17 15:59:00", 107.0),
                    bar("AAPL", "2026-02-17 16:00:00", 108.0),
                ],
            )
            .await
            .unwrap();

        let window = BarWindow::session(ts("2026-02-17 09:30:00"), ts("2026-02-17 16:00:00"));
        let last = store.last_in("AAPL", Granularity::Minute, &window).await.unwrap();
        assert_eq!(last.unwrap().close, 107.0);
    }

    #[tokio::test]
    async fn test_day_bars_use_date_keys() {
        let store = setup_store().await;
        let day = Bar {
            timestamp: ts("2026-02-17 00:00:00"),
            ..bar("AAPL", "2026-02-17 00:00:00", 107.0)
        };
        store.upsert_bars(Granularity::Day, &[day]).await.unwrap();

        let bars = store
            .range("AAPL", Granularity::Day, ts("2026-02-01 00:00:00"), None)
            .await
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp, ts("2026-02-17 00:00:00"));
    }
}
