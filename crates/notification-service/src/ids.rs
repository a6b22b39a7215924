//! Deterministic notification ids. The id is the only dedup key in the ledger.

use chrono::{NaiveDate, NaiveDateTime, Timelike};

fn day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn daily_eod(symbol: &str, date: NaiveDate) -> String {
    format!("{}_DAILY_EOD_{}", symbol, day(date))
}

/// `now` floored to a `bucket_minutes` boundary, as `HHMM`
pub fn momentum_bucket(now: NaiveDateTime, bucket_minutes: u32) -> String {
    let width = bucket_minutes.clamp(1, 60);
    let minute = now.minute() / width * width;
    format!("{:02}{:02}", now.hour(), minute)
}

pub fn momentum_2h(symbol: &str, date: NaiveDate, bucket: &str) -> String {
    format!("{}_MOMENTUM_2H_{}_{}", symbol, day(date), bucket)
}

pub fn morning_gap(symbol: &str, date: NaiveDate) -> String {
    format!("{}_MORNING_GAP_{}", symbol, day(date))
}

pub fn news_briefing(symbol: &str, date: NaiveDate) -> String {
    format!("{}_NEWS_{}_10AM", symbol, day(date))
}
