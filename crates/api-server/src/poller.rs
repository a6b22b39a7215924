use notification_service::NotificationEngine;
use std::sync::Arc;
use std::time::Duration;

/// Run detection passes on a fixed interval so alerts are recorded even when
/// no client is polling.
pub fn spawn(engine: Arc<NotificationEngine>, every: Duration) -> tokio::task::JoinHandle<()> {
    tracing::info!("Background notification poller every {}s", every.as_secs());

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match engine.generate().await {
                Ok(0) => tracing::debug!("Poll complete, nothing new"),
                Ok(n) => tracing::info!("Poll recorded {} new notifications", n),
                Err(e) if e.is_retryable() => tracing::warn!("Poll skipped, store busy: {}", e),
                Err(e) => tracing::error!("Poll failed: {}", e),
            }
        }
    })
}
