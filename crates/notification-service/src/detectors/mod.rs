//! Threshold detectors. Each one looks at the minute-bar cache for a single
//! watchlist entry and proposes at most one notification per call.

mod daily_eod;
mod momentum;
mod morning_gap;

pub use daily_eod::DailyEodDetector;
pub use momentum::MomentumDetector;
pub use morning_gap::MorningGapDetector;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use market_core::{round2, Direction, MarketCalendar, MarketResult, Notification, NotificationType, WatchlistEntry};
use market_store::{BarStore, NotificationLedger};

use crate::templates::{MessageTemplate, PriceMove};

/// Everything a detector reads during one pass
pub struct DetectionContext<'a> {
    pub bars: &'a BarStore,
    pub ledger: &'a NotificationLedger,
    pub calendar: &'a MarketCalendar,
    /// Market-local wall time of this pass
    pub now: NaiveDateTime,
}

impl DetectionContext<'_> {
    pub fn today(&self) -> NaiveDate {
        self.now.date()
    }

    /// True once `trigger` has passed, or when the entry was added after it
    /// (late adds are evaluated right away).
    pub fn gate_passed(&self, trigger: NaiveDateTime, added_at: Option<DateTime<Utc>>) -> bool {
        if self.now >= trigger {
            return true;
        }
        added_at
            .map(|added| self.calendar.to_local(added) > trigger)
            .unwrap_or(false)
    }
}

#[async_trait]
pub trait Detector: Send + Sync {
    fn kind(&self) -> NotificationType;

    /// Propose a notification, or `None` when the rule is not met, the gate has
    /// not opened, bars are missing, or the id is already in the ledger.
    async fn detect(
        &self,
        ctx: &DetectionContext<'_>,
        entry: &WatchlistEntry,
    ) -> MarketResult<Option<Notification>>;
}

/// Assemble a price-move notification. `pct` is stored rounded to two decimals.
fn price_notification(
    id: String,
    kind: NotificationType,
    date: NaiveDate,
    price_move: &PriceMove<'_>,
    message: String,
) -> Notification {
    let pct = round2(price_move.pct);
    Notification {
        id,
        kind,
        symbol: price_move.symbol.to_string(),
        date,
        title: MessageTemplate::title(price_move.symbol, pct),
        message,
        direction: Direction::from_change(pct),
        percent_change: pct,
        created_at: None,
        articles: None,
    }
}
