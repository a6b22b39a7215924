//! Keeps the bar cache topped up from Polygon aggregates.

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use market_core::{Bar, BarRefresher, Clock, Granularity, MarketCalendar, MarketError};
use market_store::BarStore;
use std::sync::Arc;

use crate::{AggregateBar, PolygonClient};

/// How far back to backfill a symbol with no cached bars
fn backfill_span(granularity: Granularity) -> Duration {
    match granularity {
        Granularity::Minute => Duration::days(7),
        Granularity::Hour => Duration::days(95),
        Granularity::Day => Duration::days(5 * 365 + 20),
    }
}

/// Width of one bar
fn bar_width(granularity: Granularity) -> Duration {
    match granularity {
        Granularity::Minute => Duration::minutes(1),
        Granularity::Hour => Duration::hours(1),
        Granularity::Day => Duration::days(1),
    }
}

/// Maximum age of the newest intraday bar while the market is open
fn max_age(granularity: Granularity) -> Duration {
    match granularity {
        Granularity::Minute => Duration::minutes(5),
        Granularity::Hour => Duration::hours(1),
        Granularity::Day => Duration::days(1),
    }
}

/// Decide where a refresh should start fetching from, or `None` when the cache is fresh.
pub fn fetch_start(
    granularity: Granularity,
    latest: Option<NaiveDateTime>,
    now: NaiveDateTime,
    calendar: &MarketCalendar,
) -> Option<NaiveDateTime> {
    let Some(latest) = latest else {
        return Some(now - backfill_span(granularity));
    };

    let last_close = calendar.last_close_before(now);

    match granularity {
        Granularity::Day => {
            // The newest complete session is the one that closed last
            if latest.date() >= last_close.date() {
                None
            } else {
                Some(latest + bar_width(granularity))
            }
        }
        Granularity::Minute | Granularity::Hour => {
            if now - latest <= max_age(granularity) {
                return None;
            }
            if !calendar.is_open(now) && latest >= last_close - bar_width(granularity) {
                return None;
            }
            Some(latest)
        }
    }
}

/// Convert provider aggregates to market-local bars. Intraday bars outside the
/// regular session (pre-market, after-hours) are dropped.
pub fn to_local_bars(
    symbol: &str,
    granularity: Granularity,
    aggregates: Vec<AggregateBar>,
    calendar: &MarketCalendar,
) -> Vec<Bar> {
    aggregates
        .into_iter()
        .map(|agg| Bar {
            symbol: symbol.to_string(),
            timestamp: calendar.to_local(agg.timestamp),
            open: agg.open,
            high: agg.high,
            low: agg.low,
            close: agg.close,
            volume: agg.volume.round() as i64,
        })
        .filter(|bar| match granularity {
            Granularity::Day => true,
            Granularity::Minute | Granularity::Hour => {
                calendar.bar_in_session(bar.timestamp, bar_width(granularity))
            }
        })
        .collect()
}

pub struct PolygonBarRefresher {
    client: PolygonClient,
    bars: BarStore,
    calendar: MarketCalendar,
    clock: Arc<dyn Clock>,
}

impl PolygonBarRefresher {
    pub fn new(client: PolygonClient, bars: BarStore, calendar: MarketCalendar, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            bars,
            calendar,
            clock,
        }
    }
}

#[async_trait]
impl BarRefresher for PolygonBarRefresher {
    async fn refresh_if_stale(&self, symbol: &str, granularity: Granularity) -> Result<usize, MarketError> {
        let now = self.calendar.to_local(self.clock.now());
        let latest = self.bars.latest_timestamp(symbol, granularity).await?;

        let Some(start) = fetch_start(granularity, latest, now, &self.calendar) else {
            tracing::debug!("{} {} bars are fresh", symbol, granularity);
            return Ok(0);
        };

        tracing::info!("Fetching {} {} bars from {}", symbol, granularity, start.date());
        let aggregates = self
            .client
            .get_aggregates(symbol, 1, granularity.timespan(), start.date(), now.date())
            .await?;

        let bars = to_local_bars(symbol, granularity, aggregates, &self.calendar);
        let written = self.bars.upsert_bars(granularity, &bars).await?;
        tracing::info!("Stored {} {} bars for {}", written, granularity, symbol);
        Ok(written)
    }
}
