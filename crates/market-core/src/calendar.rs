//! Regular-session trading calendar.
//!
//! Weekends are the only closures; exchange holidays and half days are not modelled.
//! All instants passed in and out are naive market-local times.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy)]
pub struct MarketCalendar {
    pub tz: Tz,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Default for MarketCalendar {
    fn default() -> Self {
        Self {
            tz: chrono_tz::US::Eastern,
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl MarketCalendar {
    /// Convert an instant to market-local wall time
    pub fn to_local(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.with_timezone(&self.tz).naive_local()
    }

    /// Convert market-local wall time back to an instant. `None` inside a DST gap.
    pub fn to_utc(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.tz
            .from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    pub fn open_on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.open)
    }

    pub fn close_on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.close)
    }

    /// True only on weekdays within `[open, close)`
    pub fn is_open(&self, now: NaiveDateTime) -> bool {
        if !self.is_trading_day(now.date()) {
            return false;
        }
        let t = now.time();
        t >= self.open && t < self.close
    }

    /// True when a bar of `width` starting at `start` overlaps the regular session.
    /// Pre-market and after-hours bars fall outside.
    pub fn bar_in_session(&self, start: NaiveDateTime, width: Duration) -> bool {
        let date = start.date();
        self.is_trading_day(date) && start + width > self.open_on(date) && start < self.close_on(date)
    }

    /// Most recent session close at or before `now`, skipping weekends
    pub fn last_close_before(&self, now: NaiveDateTime) -> NaiveDateTime {
        let mut day = now.date();
        loop {
            if self.is_trading_day(day) {
                let close = self.close_on(day);
                if close <= now {
                    return close;
                }
            }
            match day.pred_opt() {
                Some(prev) => day = prev,
                None => return self.close_on(day),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_is_open_session_bounds() {
        let cal = MarketCalendar::default();
        // 2026-02-17 is a Tuesday
        assert!(!cal.is_open(local("2026-02-17", "09:29:59")));
        assert!(cal.is_open(local("2026-02-17", "09:30:00")));
        assert!(cal.is_open(local("2026-02-17", "15:59:59")));
        assert!(!cal.is_open(local("2026-02-17", "16:00:00")));
    }

    #[test]
    fn test_is_open_weekend() {
        let cal = MarketCalendar::default();
        assert!(!cal.is_open(local("2026-02-14", "11:00:00")));
        assert!(!cal.is_open(local("2026-02-15", "11:00:00")));
    }

    #[test]
    fn test_bar_in_session() {
        let cal = MarketCalendar::default();
        let minute = Duration::minutes(1);
        assert!(!cal.bar_in_session(local("2026-02-16", "08:00:00"), minute));
        assert!(!cal.bar_in_session(local("2026-02-16", "09:29:00"), minute));
        assert!(cal.bar_in_session(local("2026-02-16", "09:30:00"), minute));
        assert!(cal.bar_in_session(local("2026-02-16", "15:59:00"), minute));
        assert!(!cal.bar_in_session(local("2026-02-16", "16:00:00"), minute));
        assert!(!cal.bar_in_session(local("2026-02-14", "11:00:00"), minute));
        // The 09:00 hour bar covers the opening half hour
        assert!(cal.bar_in_session(local("2026-02-16", "09:00:00"), Duration::hours(1)));
        assert!(!cal.bar_in_session(local("2026-02-16", "08:00:00"), Duration::hours(1)));
    }

    #[test]
    fn test_last_close_before_same_day_after_close() {
        let cal = MarketCalendar::default();
        assert_eq!(
            cal.last_close_before(local("2026-02-17", "17:00:00")),
            local("2026-02-17", "16:00:00")
        );
        assert_eq!(
            cal.last_close_before(local("2026-02-17", "16:00:00")),
            local("2026-02-17", "16:00:00")
        );
    }

    #[test]
    fn test_last_close_before_during_session() {
        let cal = MarketCalendar::default();
        assert_eq!(
            cal.last_close_before(local("2026-02-17", "15:00:00")),
            local("2026-02-16", "16:00:00")
        );
    }

    #[test]
    fn test_last_close_before_skips_weekend() {
        let cal = MarketCalendar::default();
        // Monday morning and Sunday both resolve to Friday's close
        assert_eq!(
            cal.last_close_before(local("2026-02-16", "10:00:00")),
            local("2026-02-13", "16:00:00")
        );
        assert_eq!(
            cal.last_close_before(local("2026-02-15", "12:00:00")),
            local("2026-02-13", "16:00:00")
        );
    }

    #[test]
    fn test_local_round_trip_eastern() {
        let cal = MarketCalendar::default();
        let utc = Utc.with_ymd_and_hms(2026, 2, 17, 21, 5, 0).unwrap();
        let l = cal.to_local(utc);
        assert_eq!(l, local("2026-02-17", "16:05:00"));
        assert_eq!(cal.to_utc(l), Some(utc));
    }
}
