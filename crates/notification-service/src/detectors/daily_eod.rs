use async_trait::async_trait;
use market_core::{pct_change, Granularity, MarketResult, Notification, NotificationType, WatchlistEntry};
use market_store::BarWindow;

use super::{price_notification, DetectionContext, Detector};
use crate::ids;
use crate::templates::{MessageTemplate, PriceMove};

/// Session open to last in-session close, once per symbol per day after the close
pub struct DailyEodDetector {
    threshold_pct: f64,
}

impl DailyEodDetector {
    pub fn new(threshold_pct: f64) -> Self {
        Self { threshold_pct }
    }
}

#[async_trait]
impl Detector for DailyEodDetector {
    fn kind(&self) -> NotificationType {
        NotificationType::DailyEod
    }

    async fn detect(
        &self,
        ctx: &DetectionContext<'_>,
        entry: &WatchlistEntry,
    ) -> MarketResult<Option<Notification>> {
        let today = ctx.today();
        let id = ids::daily_eod(&entry.symbol, today);
        if ctx.ledger.exists(&id).await? {
            return Ok(None);
        }

        if !ctx.gate_passed(ctx.calendar.close_on(today), entry.added_at) {
            return Ok(None);
        }

        // After-hours bars never count as the close
        let window = BarWindow::session(ctx.calendar.open_on(today), ctx.calendar.close_on(today));
        let (Some(first), Some(last)) = ctx
            .bars
            .earliest_and_latest_in_range(&entry.symbol, Granularity::Minute, &window)
            .await?
        else {
            return Ok(None);
        };

        let pct = pct_change(first.close, last.close);
        if pct.abs() < self.threshold_pct {
            return Ok(None);
        }

        let price_move = PriceMove {
            symbol: &entry.symbol,
            from_price: first.close,
            to_price: last.close,
            from_time: first.timestamp,
            to_time: last.timestamp,
            pct,
        };
        let message = MessageTemplate::price_move(&price_move);
        Ok(Some(price_notification(id, self.kind(), today, &price_move, message)))
    }
}
