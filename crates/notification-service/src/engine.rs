//! Detector orchestration: refresh bars, run every detector for every watched
//! symbol, then read today's notifications back from the ledger.

use chrono::NaiveDate;
use futures_util::future::join_all;
use market_core::{BarRefresher, Clock, Granularity, MarketCalendar, MarketResult, Notification, WatchlistEntry};
use market_store::{BarStore, MarketDb, NotificationLedger, WatchlistStore};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::detectors::{DailyEodDetector, DetectionContext, Detector, MomentumDetector, MorningGapDetector};

pub struct NotificationEngine {
    watchlist: WatchlistStore,
    bars: BarStore,
    ledger: NotificationLedger,
    refresher: Arc<dyn BarRefresher>,
    detectors: Vec<Box<dyn Detector>>,
    calendar: MarketCalendar,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl NotificationEngine {
    pub fn new(
        db: &MarketDb,
        refresher: Arc<dyn BarRefresher>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let thresholds = config.thresholds;
        let detectors: Vec<Box<dyn Detector>> = vec![
            Box::new(DailyEodDetector::new(thresholds.daily_eod_pct)),
            Box::new(MomentumDetector::new(
                thresholds.momentum_2h_pct,
                config.momentum_lookback,
                config.momentum_bucket_minutes,
            )),
            Box::new(MorningGapDetector::new(thresholds.morning_gap_pct)),
        ];
        Self::with_detectors(db, refresher, clock, config, detectors)
    }

    /// Engine running a custom detector set, in order
    pub fn with_detectors(
        db: &MarketDb,
        refresher: Arc<dyn BarRefresher>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
        detectors: Vec<Box<dyn Detector>>,
    ) -> Self {
        Self {
            watchlist: db.watchlist(),
            bars: db.bars(),
            ledger: db.ledger(clock.clone()),
            refresher,
            detectors,
            calendar: MarketCalendar::default(),
            clock,
            config,
        }
    }

    pub fn with_calendar(mut self, calendar: MarketCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn calendar(&self) -> &MarketCalendar {
        &self.calendar
    }

    pub fn ledger(&self) -> &NotificationLedger {
        &self.ledger
    }

    /// Today's date in market-local time
    pub fn today(&self) -> NaiveDate {
        self.calendar.to_local(self.clock.now()).date()
    }

    /// Run one detection pass and return every notification recorded today,
    /// newest first. Repeated calls within one time bucket add nothing.
    pub async fn generate_and_list_today(&self) -> MarketResult<Vec<Notification>> {
        self.generate().await?;
        let mut notifications = self.ledger.for_date(self.today()).await?;
        sort_newest_first(&mut notifications);
        Ok(notifications)
    }

    /// Detection pass followed by the active (non-dismissed) view
    pub async fn poll(&self) -> MarketResult<Vec<Notification>> {
        let all = self.generate_and_list_today().await?;
        let dismissed = self.ledger.dismissed_ids().await?;
        Ok(all.into_iter().filter(|n| !dismissed.contains(&n.id)).collect())
    }

    /// Today's notifications minus dismissed ones, newest first
    pub async fn active_today(&self) -> MarketResult<Vec<Notification>> {
        let dismissed = self.ledger.dismissed_ids().await?;
        let mut notifications: Vec<Notification> = self
            .ledger
            .for_date(self.today())
            .await?
            .into_iter()
            .filter(|n| !dismissed.contains(&n.id))
            .collect();
        sort_newest_first(&mut notifications);
        Ok(notifications)
    }

    pub async fn dismiss(&self, id: &str) -> MarketResult<()> {
        self.ledger.dismiss(id).await
    }

    /// Dismiss every active notification for today, including any that were due
    /// but not yet generated. Returns how many were dismissed.
    pub async fn clear_all(&self) -> MarketResult<usize> {
        self.generate().await?;
        let active = self.active_today().await?;
        for notification in &active {
            self.ledger.dismiss(&notification.id).await?;
        }
        tracing::info!("Dismissed {} notifications", active.len());
        Ok(active.len())
    }

    /// Forget all dismissals so every notification is active again
    pub async fn clear_dismissed(&self) -> MarketResult<u64> {
        self.ledger.clear_all_dismissed().await
    }

    /// Refresh bars and run all detectors. Returns how many notifications were newly recorded.
    pub async fn generate(&self) -> MarketResult<usize> {
        let watchlist = self.watchlist.list().await?;
        if watchlist.is_empty() {
            return Ok(0);
        }

        self.refresh_all(&watchlist).await;

        let ctx = DetectionContext {
            bars: &self.bars,
            ledger: &self.ledger,
            calendar: &self.calendar,
            now: self.calendar.to_local(self.clock.now()),
        };

        let mut recorded = 0;
        for entry in &watchlist {
            for detector in &self.detectors {
                match self.run_detector(detector.as_ref(), &ctx, entry).await {
                    Ok(true) => recorded += 1,
                    Ok(false) => {}
                    Err(e) => tracing::warn!(
                        "{} detector failed for {}: {}",
                        detector.kind(),
                        entry.symbol,
                        e
                    ),
                }
            }
        }

        if recorded > 0 {
            tracing::info!("Generated {} new notifications", recorded);
        }
        Ok(recorded)
    }

    async fn run_detector(
        &self,
        detector: &dyn Detector,
        ctx: &DetectionContext<'_>,
        entry: &WatchlistEntry,
    ) -> MarketResult<bool> {
        match detector.detect(ctx, entry).await? {
            Some(notification) => self.ledger.save(&notification).await,
            None => Ok(false),
        }
    }

    /// Refresh minute bars for every symbol concurrently. Failures are logged and ignored.
    async fn refresh_all(&self, watchlist: &[WatchlistEntry]) {
        let timeout = self.config.refresh_timeout;
        let refreshes = watchlist.iter().map(|entry| async move {
            let result = tokio::time::timeout(
                timeout,
                self.refresher.refresh_if_stale(&entry.symbol, Granularity::Minute),
            )
            .await;
            (entry.symbol.as_str(), result)
        });

        for (symbol, result) in join_all(refreshes).await {
            match result {
                Ok(Ok(0)) => {}
                Ok(Ok(n)) => tracing::debug!("Refreshed {} minute bars for {}", n, symbol),
                Ok(Err(e)) => tracing::warn!("Could not refresh bars for {}: {}", symbol, e),
                Err(_) => tracing::warn!("Bar refresh for {} timed out after {:?}", symbol, timeout),
            }
        }
    }
}

fn sort_newest_first(notifications: &mut [Notification]) {
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}
