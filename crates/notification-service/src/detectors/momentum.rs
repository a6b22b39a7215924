use async_trait::async_trait;
use chrono::Duration;
use market_core::{pct_change, Granularity, MarketResult, Notification, NotificationType, WatchlistEntry};
use market_store::BarWindow;

use super::{price_notification, DetectionContext, Detector};
use crate::ids;
use crate::templates::{MessageTemplate, PriceMove};

/// Move over a trailing window, re-armed every time bucket
pub struct MomentumDetector {
    threshold_pct: f64,
    lookback: Duration,
    bucket_minutes: u32,
}

impl MomentumDetector {
    pub fn new(threshold_pct: f64, lookback: Duration, bucket_minutes: u32) -> Self {
        Self {
            threshold_pct,
            lookback,
            bucket_minutes,
        }
    }
}

#[async_trait]
impl Detector for MomentumDetector {
    fn kind(&self) -> NotificationType {
        NotificationType::Momentum2h
    }

    async fn detect(
        &self,
        ctx: &DetectionContext<'_>,
        entry: &WatchlistEntry,
    ) -> MarketResult<Option<Notification>> {
        let today = ctx.today();
        let bucket = ids::momentum_bucket(ctx.now, self.bucket_minutes);
        let id = ids::momentum_2h(&entry.symbol, today, &bucket);
        if ctx.ledger.exists(&id).await? {
            return Ok(None);
        }

        let window = BarWindow::closed(ctx.now - self.lookback, ctx.now);
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
