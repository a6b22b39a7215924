use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{Granularity, MarketError, NewsArticle};

/// Keeps the local bar cache fresh for a symbol
#[async_trait]
pub trait BarRefresher: Send + Sync {
    /// Fetch and store new bars when the cache is stale. Returns the number of bars written.
    async fn refresh_if_stale(&self, symbol: &str, granularity: Granularity) -> Result<usize, MarketError>;
}

/// Source of company news
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch_news(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NewsArticle>, MarketError>;
}

/// Resolves display names for ticker symbols
#[async_trait]
pub trait TickerDirectory: Send + Sync {
    async fn company_name(&self, symbol: &str) -> Result<Option<String>, MarketError>;
}
