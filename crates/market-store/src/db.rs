use market_core::{Clock, MarketResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::{BarStore, NotificationLedger, SentArticleLog, WatchlistStore};

/// How long a writer waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct MarketDb {
    pool: SqlitePool,
}

impl MarketDb {
    /// Open (or create) the database and apply the schema
    pub async fn new(database_url: &str) -> MarketResult<Self> {
        let in_memory = database_url.contains(":memory:");

        let mut options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every in-memory connection is a separate database, so tests get exactly one.
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(BUSY_TIMEOUT)
                .connect_with(options)
                .await?
        };

        let db = Self { pool };
        db.init_schema().await?;

        tracing::debug!("Market database ready at {}", database_url);
        Ok(db)
    }

    /// Initialize database schema
    async fn init_schema(&self) -> MarketResult<()> {
        let schema = include_str!("../../../schema.sql");

        // sqlx runs one statement per query
        for statement in schema.split(';') {
            let stmt = strip_comments(statement);
            if !stmt.is_empty() {
                sqlx::query(&stmt).execute(&self.pool).await?;
            }
        }

        Ok(())
    }

    /// Get the database pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn bars(&self) -> BarStore {
        BarStore::new(self.pool.clone())
    }

    pub fn watchlist(&self) -> WatchlistStore {
        WatchlistStore::new(self.pool.clone())
    }

    pub fn ledger(&self, clock: Arc<dyn Clock>) -> NotificationLedger {
        NotificationLedger::new(self.pool.clone(), clock)
    }

    pub fn sent_articles(&self) -> SentArticleLog {
        SentArticleLog::new(self.pool.clone())
    }

    /// Check if database file exists
    pub fn exists(path: &str) -> bool {
        // Remove "sqlite:" prefix if present
        let file_path = path.strip_prefix("sqlite:").unwrap_or(path);
        Path::new(file_path).exists()
    }
}

fn strip_comments(statement: &str) -> String {
    statement
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
