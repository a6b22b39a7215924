//! Price History API Routes
//!
//! Serves cached bars after a best-effort refresh; a failed refresh still returns what is cached.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{Datelike, Duration, NaiveDateTime};
use market_core::{Bar, Clock, Granularity, MarketCalendar};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{normalize_symbol, ApiResponse, AppError, AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Timeframe {
    #[serde(rename = "1D")]
    OneDay,
    #[serde(rename = "5D")]
    FiveDays,
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "5Y")]
    FiveYears,
}

impl FromStr for Timeframe {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "1D" => Ok(Timeframe::OneDay),
            "5D" => Ok(Timeframe::FiveDays),
            "1M" => Ok(Timeframe::OneMonth),
            "3M" => Ok(Timeframe::ThreeMonths),
            "1Y" => Ok(Timeframe::OneYear),
            "5Y" => Ok(Timeframe::FiveYears),
            other => Err(AppError::bad_request(format!(
                "Unknown timeframe '{}' (expected 1D, 5D, 1M, 3M, 1Y or 5Y)",
                other
            ))),
        }
    }
}

impl Timeframe {
    pub fn granularity(&self) -> Granularity {
        match self {
            Timeframe::OneDay => Granularity::Minute,
            Timeframe::FiveDays => Granularity::Hour,
            _ => Granularity::Day,
        }
    }

    /// First timestamp to include for a request made at `now` (market-local)
    pub fn start(&self, now: NaiveDateTime, calendar: &MarketCalendar) -> NaiveDateTime {
        match self {
            Timeframe::OneDay => {
                // Today's session once it has opened, otherwise the last completed one
                let today = now.date();
                if calendar.is_trading_day(today) && now >= calendar.open_on(today) {
                    calendar.open_on(today)
                } else {
                    calendar.open_on(calendar.last_close_before(now).date())
                }
            }
            Timeframe::FiveDays => now - Duration::days(7),
            Timeframe::OneMonth => now - Duration::days(31),
            Timeframe::ThreeMonths => now - Duration::days(92),
            Timeframe::OneYear => now - Duration::days(366),
            Timeframe::FiveYears => now - Duration::days(5 * 365 + 20),
        }
    }
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub timeframe: Option<String>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub granularity: Granularity,
    pub bars: Vec<Bar>,
}

pub fn history_routes() -> Router<AppState> {
    Router::new().route("/api/history/:symbol", get(get_history))
}

async fn get_history(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<HistoryResponse>>, AppError> {
    let symbol = normalize_symbol(&symbol)?;
    let timeframe: Timeframe = query.timeframe.as_deref().unwrap_or("1D").parse()?;
    let granularity = timeframe.granularity();

    if let Err(e) = state.refresher.refresh_if_stale(&symbol, granularity).await {
        tracing::warn!("Serving cached {} bars for {}: {}", granularity, symbol, e);
    }

    let now = state.calendar.to_local(state.clock.now());
    let start = timeframe.start(now, &state.calendar);
    let mut bars = state.db.bars().range(&symbol, granularity, start, None).await?;
    if timeframe == Timeframe::FiveYears {
        bars = aggregate_to_weekly(&bars);
    }

    Ok(Json(ApiResponse::success(HistoryResponse {
        symbol,
        timeframe,
        granularity,
        bars,
    })))
}

/// Aggregate daily bars into weekly bars.
///
/// Groups bars by ISO week and produces one bar per week with:
/// - open = first bar's open
/// - high = max high in the week
/// - low = min low in the week
/// - close = last bar's close
/// - volume = sum of all volumes
///
/// Each weekly bar is stamped with the last trading day of its week.
pub fn aggregate_to_weekly(daily_bars: &[Bar]) -> Vec<Bar> {
    let mut weekly: Vec<Bar> = Vec::new();
    let mut current: Option<((i32, u32), Vec<&Bar>)> = None;

    for bar in daily_bars {
        let iso = bar.timestamp.date().iso_week();
        let week = (iso.year(), iso.week());

        match &mut current {
            Some((w, bars)) if *w == week => bars.push(bar),
            _ => {
                // Flush previous week
                if let Some((_, bars)) = current.take() {
                    weekly.extend(make_weekly_bar(&bars));
                }
                current = Some((week, vec![bar]));
            }
        }
    }

    // Flush last week
    if let Some((_, bars)) = current {
        weekly.extend(make_weekly_bar(&bars));
    }

    weekly
}

fn make_weekly_bar(bars: &[&Bar]) -> Option<Bar> {
    let first = bars.first()?;
    let last = bars.last()?;

    Some(Bar {
        symbol: first.symbol.clone(),
        timestamp: last.timestamp,
        open: first.open,
        high: bars.iter().map(|b| b.high).fold(f64::MIN, f64::max),
        low: bars.iter().map(|b| b.low).fold(f64::MAX, f64::min),
        close: last.close,
        volume: bars.iter().map(|b| b.volume).sum(),
    })
}
