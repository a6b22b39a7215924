//! Morning news briefings for symbols that opted in.

use chrono::NaiveDate;
use market_core::{
    ArticleSummary, Clock, Direction, MarketCalendar, MarketResult, NewsArticle, NewsSource, Notification,
    NotificationType,
};
use market_store::{MarketDb, NotificationLedger, SentArticleLog, WatchlistStore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::ids;
use crate::templates::{truncate_chars, MessageTemplate};

const MAX_ARTICLES: usize = 5;
const MIN_SUMMARY_CHARS: usize = 10;
const FALLBACK_SUMMARY_CHARS: usize = 200;
const MAX_SUMMARY_CHARS: usize = 300;

#[derive(Debug, Clone, Serialize)]
pub struct BriefingFailure {
    pub symbol: String,
    pub error: String,
}

/// Outcome of a briefing run across the watchlist
#[derive(Debug, Clone, Default, Serialize)]
pub struct BriefingReport {
    pub generated: Vec<String>,
    pub errors: Vec<BriefingFailure>,
}

pub struct NewsBriefingGenerator {
    watchlist: WatchlistStore,
    ledger: NotificationLedger,
    sent: SentArticleLog,
    news: Arc<dyn NewsSource>,
    calendar: MarketCalendar,
    clock: Arc<dyn Clock>,
}

impl NewsBriefingGenerator {
    pub fn new(db: &MarketDb, news: Arc<dyn NewsSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            watchlist: db.watchlist(),
            ledger: db.ledger(clock.clone()),
            sent: db.sent_articles(),
            news,
            calendar: MarketCalendar::default(),
            clock,
        }
    }

    fn today(&self) -> NaiveDate {
        self.calendar.to_local(self.clock.now()).date()
    }

    /// Generate briefings for every symbol with briefings enabled
    pub async fn generate_all(&self) -> MarketResult<BriefingReport> {
        let mut report = BriefingReport::default();

        for entry in self.watchlist.list().await? {
            if !entry.news_enabled() {
                continue;
            }
            match self.generate_for_symbol(&entry.symbol).await {
                Ok(Some(_)) => report.generated.push(entry.symbol),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("News briefing failed for {}: {}", entry.symbol, e);
                    report.errors.push(BriefingFailure {
                        symbol: entry.symbol,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!("Generated briefings for {} stock(s)", report.generated.len());
        Ok(report)
    }

    /// Create today's briefing for one symbol. `None` when it already exists or
    /// there is nothing new to report.
    pub async fn generate_for_symbol(&self, symbol: &str) -> MarketResult<Option<Notification>> {
        let today = self.today();
        let id = ids::news_briefing(symbol, today);
        if self.ledger.exists(&id).await? {
            return Ok(None);
        }

        let raw = self.news.fetch_news(symbol, today, today).await?;

        let mut articles = Vec::new();
        let mut picked: Vec<(String, String)> = Vec::new();
        for article in raw {
            if articles.len() >= MAX_ARTICLES {
                break;
            }
            if article.article_url.trim().is_empty() {
                continue;
            }
            let hash = url_hash(&article.article_url);
            if picked.iter().any(|(h, _)| *h == hash) || self.sent.already_sent(symbol, &hash).await? {
                continue;
            }
            picked.push((hash, article.article_url.clone()));
            articles.push(summarize(article));
        }

        if articles.is_empty() {
            return Ok(None);
        }

        let notification = Notification {
            id,
            kind: NotificationType::NewsBriefing,
            symbol: symbol.to_string(),
            date: today,
            title: MessageTemplate::briefing_title(symbol),
            message: MessageTemplate::briefing_preview(&articles),
            direction: Direction::Neutral,
            percent_change: 0.0,
            created_at: None,
            articles: Some(articles),
        };
        // Articles count as sent only once the briefing row exists, so a failed
        // save leaves them available for the retry
        if !self.ledger.save(&notification).await? {
            return Ok(None);
        }
        for (hash, url) in &picked {
            self.sent.record(symbol, hash, url, today).await?;
        }
        Ok(Some(notification))
    }

    /// Enable or disable briefings for a symbol; enabling generates right away.
    /// Returns `None` when the symbol is not on the watchlist.
    pub async fn toggle(&self, symbol: &str, enabled: bool) -> MarketResult<Option<bool>> {
        let count = if enabled { 1 } else { 0 };
        if !self.watchlist.set_news_notify_count(symbol, count).await? {
            return Ok(None);
        }
        if !enabled {
            return Ok(Some(false));
        }
        let generated = self.generate_for_symbol(symbol).await?.is_some();
        Ok(Some(generated))
    }
}

/// SHA-256 of the normalized URL, hex encoded
pub fn url_hash(url: &str) -> String {
    let digest = Sha256::digest(url.trim().to_lowercase().as_bytes());
    hex::encode(digest)
}

fn summarize(article: NewsArticle) -> ArticleSummary {
    let description = article.description.unwrap_or_default();
    let summary = if description.chars().count() >= MIN_SUMMARY_CHARS {
        description
    } else {
        truncate_chars(&article.title, FALLBACK_SUMMARY_CHARS)
    };

    ArticleSummary {
        headline: article.title,
        summary: truncate_chars(&summary, MAX_SUMMARY_CHARS),
        url: article.article_url,
        source: article.publisher.unwrap_or_else(|| "Unknown".to_string()),
    }
}
