use async_trait::async_trait;
use chrono::Duration;
use market_core::{pct_change, Granularity, MarketResult, Notification, NotificationType, WatchlistEntry};
use market_store::BarWindow;

use super::{price_notification, DetectionContext, Detector};
use crate::ids;
use crate::templates::{MessageTemplate, PriceMove};

/// Opening minutes after the bell in which today's open must appear
const OPEN_WINDOW_MINUTES: i64 = 15;

/// Previous session's last close against today's open
pub struct MorningGapDetector {
    threshold_pct: f64,
}

impl MorningGapDetector {
    pub fn new(threshold_pct: f64) -> Self {
        Self { threshold_pct }
    }
}

#[async_trait]
impl Detector for MorningGapDetector {
    fn kind(&self) -> NotificationType {
        NotificationType::MorningGap
    }

    async fn detect(
        &self,
        ctx: &DetectionContext<'_>,
        entry: &WatchlistEntry,
    ) -> MarketResult<Option<Notification>> {
        let today = ctx.today();
        let id = ids::morning_gap(&entry.symbol, today);
        if ctx.ledger.exists(&id).await? {
            return Ok(None);
        }

        let session_open = ctx.calendar.open_on(today);
        let open_window_end = session_open + Duration::minutes(OPEN_WINDOW_MINUTES);
        if !ctx.gate_passed(open_window_end, entry.added_at) {
            return Ok(None);
        }

        let Some(today_open) = ctx
            .bars
            .first_in(
                &entry.symbol,
                Granularity::Minute,
                &BarWindow::closed(session_open, open_window_end),
            )
            .await?
        else {
            return Ok(None);
        };

        // Unbounded backwards so weekends and holidays resolve to the last traded bar.
        // Ending at the previous close keeps extended-hours bars out.
        let prev_session_close = ctx.calendar.last_close_before(session_open);
        let Some(prev_close) = ctx
            .bars
            .last_in(&entry.symbol, Granularity::Minute, &BarWindow::before(prev_session_close))
            .await?
        else {
            return Ok(None);
        };

        let pct = pct_change(prev_close.close, today_open.close);
        if pct.abs() < self.threshold_pct {
            return Ok(None);
        }

        let price_move = PriceMove {
            symbol: &entry.symbol,
            from_price: prev_close.close,
            to_price: today_open.close,
            from_time: prev_close.timestamp,
            to_time: today_open.timestamp,
            pct,
        };
        let message = MessageTemplate::overnight_gap(&price_move);
        Ok(Some(price_notification(id, self.kind(), today, &price_move, message)))
    }
}
