use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use market_core::{MarketError, NewsArticle, NewsSource, TickerDirectory};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub mod refresher;

pub use refresher::PolygonBarRefresher;

const BASE_URL: &str = "https://api.polygon.io";

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let sleep_dur = match ts.front() {
                Some(&oldest) => (oldest + self.window).saturating_duration_since(now) + Duration::from_millis(50),
                None => Duration::from_millis(50),
            };
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for Polygon API slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Raw aggregate bar from the provider, timestamped in UTC
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Clone)]
pub struct PolygonClient {
    api_key: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl PolygonClient {
    /// Rate limit comes from `POLYGON_RATE_LIMIT` (requests per minute, default 5 for the free tier)
    pub fn new(api_key: String) -> Self {
        let rate_limit: usize = std::env::var("POLYGON_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);
        Self::with_rate_limit(api_key, rate_limit)
    }

    pub fn with_rate_limit(api_key: String, requests_per_minute: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            client,
            rate_limiter: RateLimiter::new(requests_per_minute, Duration::from_secs(60)),
        }
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, MarketError> {
        let request = builder.build().map_err(|e| MarketError::Api(e.to_string()))?;

        for attempt in 0..3u32 {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| MarketError::Api("Cannot clone request".to_string()))?;
            let response = self
                .client
                .execute(req_clone)
                .await
                .map_err(|e| MarketError::Api(e.to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            let wait_secs = 15u64;
            tracing::warn!("Polygon 429 rate limited, waiting {}s before retry {}/3", wait_secs, attempt + 1);
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }

        Err(MarketError::Api("Rate limited by Polygon after 3 retries".to_string()))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, MarketError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(MarketError::Api(format!("HTTP {}: {}", status.as_u16(), body)))
    }

    /// Get aggregates (bars) for a symbol between two dates, inclusive
    pub async fn get_aggregates(
        &self,
        symbol: &str,
        multiplier: u32,
        timespan: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AggregateBar>, MarketError> {
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/{}/{}/{}/{}",
            BASE_URL,
            symbol,
            multiplier,
            timespan,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );

        let response = self
            .send_request(self.client.get(&url).query(&[
                ("apiKey", self.api_key.as_str()),
                ("adjusted", "true"),
                ("sort", "asc"),
                ("limit", "50000"),
            ]))
            .await?;
        let response = Self::check_status(response).await?;

        let agg_response: AggregateResponse = response
            .json()
            .await
            .map_err(|e| MarketError::Api(e.to_string()))?;

        Ok(agg_response
            .results
            .into_iter()
            .filter_map(|r| match DateTime::from_timestamp_millis(r.t) {
                Some(timestamp) => Some(AggregateBar {
                    timestamp,
                    open: r.o,
                    high: r.h,
                    low: r.l,
                    close: r.c,
                    volume: r.v,
                }),
                None => {
                    tracing::warn!("Dropping {} aggregate with bad timestamp {}", symbol, r.t);
                    None
                }
            })
            .collect())
    }

    /// Get news articles for a symbol published between two dates, inclusive
    pub async fn get_news(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
        limit: u32,
    ) -> Result<Vec<NewsArticle>, MarketError> {
        let url = format!("{}/v2/reference/news", BASE_URL);

        let query = vec![
            ("apiKey", self.api_key.clone()),
            ("ticker", symbol.to_string()),
            ("published_utc.gte", from.format("%Y-%m-%d").to_string()),
            ("published_utc.lte", to.format("%Y-%m-%d").to_string()),
            ("order", "desc".to_string()),
            ("limit", limit.to_string()),
        ];

        let response = self.send_request(self.client.get(&url).query(&query)).await?;
        let response = Self::check_status(response).await?;

        let news_response: NewsResponse = response
            .json()
            .await
            .map_err(|e| MarketError::Api(e.to_string()))?;

        Ok(news_response
            .results
            .into_iter()
            .filter_map(|r| {
                let published_utc = match DateTime::parse_from_rfc3339(&r.published_utc) {
                    Ok(dt) => dt.with_timezone(&Utc),
                    Err(e) => {
                        tracing::debug!("Skipping article {} with bad publish time: {}", r.id, e);
                        return None;
                    }
                };
                Some(NewsArticle {
                    id: r.id,
                    title: r.title,
                    author: r.author,
                    published_utc,
                    article_url: r.article_url,
                    description: r.description,
                    publisher: r.publisher.map(|p| p.name),
                })
            })
            .collect())
    }

    /// Get ticker details
    pub async fn get_ticker_details(&self, symbol: &str) -> Result<TickerDetails, MarketError> {
        let url = format!("{}/v3/reference/tickers/{}", BASE_URL, symbol);

        let response = self
            .send_request(self.client.get(&url).query(&[("apiKey", &self.api_key)]))
            .await?;
        let response = Self::check_status(response).await?;

        let details_response: TickerDetailsResponse = response
            .json()
            .await
            .map_err(|e| MarketError::Api(e.to_string()))?;

        Ok(details_response.results)
    }
}

#[async_trait]
impl NewsSource for PolygonClient {
    async fn fetch_news(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NewsArticle>, MarketError> {
        self.get_news(symbol, from, to, 20).await
    }
}

#[async_trait]
impl TickerDirectory for PolygonClient {
    async fn company_name(&self, symbol: &str) -> Result<Option<String>, MarketError> {
        match self.get_ticker_details(symbol).await {
            Ok(details) => Ok(Some(details.name)),
            Err(MarketError::Api(msg)) if msg.starts_with("HTTP 404") => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// Response types

#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Vec<AggregateResult>,
}

#[derive(Debug, Deserialize)]
struct AggregateResult {
    t: i64, // timestamp
    o: f64, // open
    h: f64, // high
    l: f64, // low
    c: f64, // close
    #[serde(default)]
    v: f64, // volume
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    results: Vec<NewsResult>,
}

#[derive(Debug, Deserialize)]
struct NewsResult {
    id: String,
    title: String,
    author: Option<String>,
    published_utc: String,
    article_url: String,
    description: Option<String>,
    publisher: Option<NewsPublisher>,
}

#[derive(Debug, Deserialize)]
struct NewsPublisher {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TickerDetailsResponse {
    results: TickerDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerDetails {
    pub ticker: String,
    pub name: String,
    pub market: Option<String>,
    pub primary_exchange: Option<String>,
    pub currency_name: Option<String>,
}
