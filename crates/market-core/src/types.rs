use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::MarketError;

const INTRADAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Sampling resolution of a bar table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Minute,
    Hour,
    Day,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Granularity::Minute, Granularity::Hour, Granularity::Day];

    /// Backing table name
    pub fn table(&self) -> &'static str {
        match self {
            Granularity::Minute => "bars_1m",
            Granularity::Hour => "bars_1h",
            Granularity::Day => "bars_1d",
        }
    }

    /// Provider timespan name (Polygon aggregates)
    pub fn timespan(&self) -> &'static str {
        match self {
            Granularity::Minute => "minute",
            Granularity::Hour => "hour",
            Granularity::Day => "day",
        }
    }

    /// Storage text for a timestamp. Day bars drop the time part.
    pub fn format_timestamp(&self, ts: NaiveDateTime) -> String {
        match self {
            Granularity::Day => ts.format(DATE_FORMAT).to_string(),
            _ => ts.format(INTRADAY_FORMAT).to_string(),
        }
    }

    pub fn parse_timestamp(&self, raw: &str) -> Result<NaiveDateTime, MarketError> {
        let raw = raw.trim();
        match self {
            Granularity::Day => NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map(|d| d.and_time(NaiveTime::MIN))
                .map_err(|e| MarketError::Parse(format!("bad day timestamp '{}': {}", raw, e))),
            _ => NaiveDateTime::parse_from_str(raw, INTRADAY_FORMAT)
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
                .map_err(|e| MarketError::Parse(format!("bad timestamp '{}': {}", raw, e))),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.timespan())
    }
}

/// OHLCV bar data. `timestamp` is naive market-local time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// A symbol the user is watching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub symbol: String,
    pub name: String,
    /// Absent when the stored value could not be parsed
    pub added_at: Option<DateTime<Utc>>,
    /// Morning news briefings enabled when > 0 (0-3)
    pub news_notify_count: i64,
}

impl WatchlistEntry {
    pub const MAX_NEWS_NOTIFY_COUNT: i64 = 3;

    pub fn news_enabled(&self) -> bool {
        self.news_notify_count > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationType {
    #[serde(rename = "DAILY_EOD")]
    DailyEod,
    #[serde(rename = "MOMENTUM_2H")]
    Momentum2h,
    #[serde(rename = "MORNING_GAP")]
    MorningGap,
    #[serde(rename = "NEWS_BRIEFING")]
    NewsBriefing,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::DailyEod => "DAILY_EOD",
            NotificationType::Momentum2h => "MOMENTUM_2H",
            NotificationType::MorningGap => "MORNING_GAP",
            NotificationType::NewsBriefing => "NEWS_BRIEFING",
        }
    }
}

impl FromStr for NotificationType {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DAILY_EOD" => Ok(NotificationType::DailyEod),
            "MOMENTUM_2H" => Ok(NotificationType::Momentum2h),
            "MORNING_GAP" => Ok(NotificationType::MorningGap),
            "NEWS_BRIEFING" => Ok(NotificationType::NewsBriefing),
            other => Err(MarketError::InvalidData(format!(
                "unknown notification type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Neutral,
}

impl Direction {
    pub fn from_change(pct: f64) -> Self {
        if pct > 0.0 {
            Direction::Up
        } else if pct < 0.0 {
            Direction::Down
        } else {
            Direction::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Neutral => "neutral",
        }
    }
}

impl FromStr for Direction {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "neutral" => Ok(Direction::Neutral),
            other => Err(MarketError::InvalidData(format!(
                "unknown direction '{}'",
                other
            ))),
        }
    }
}

/// One article inside a news briefing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub headline: String,
    pub summary: String,
    pub url: String,
    pub source: String,
}

/// A generated alert. `id` is the only dedup key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub symbol: String,
    pub date: NaiveDate,
    pub title: String,
    pub message: String,
    pub direction: Direction,
    pub percent_change: f64,
    /// Filled by the ledger on save when absent
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub articles: Option<Vec<ArticleSummary>>,
}

/// Overlay marker hiding a notification from the active view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DismissedMarker {
    pub notification_id: String,
    pub dismissed_at: DateTime<Utc>,
}

/// News article as returned by the market-data provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    pub published_utc: DateTime<Utc>,
    pub article_url: String,
    pub description: Option<String>,
    pub publisher: Option<String>,
}
