use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(String),

    /// The store stayed locked past its busy timeout. Safe to retry.
    #[error("Store busy: {0}")]
    StoreBusy(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MarketError {
    /// Whether the caller can retry the same operation later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MarketError::StoreBusy(_))
    }
}

// SQLite primary result codes for a locked database.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

impl From<sqlx::Error> for MarketError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => MarketError::StoreBusy(err.to_string()),
            sqlx::Error::Database(db_err) => {
                // Extended codes keep the primary code in the low byte.
                let primary = db_err
                    .code()
                    .and_then(|c| c.parse::<i32>().ok())
                    .map(|c| c & 0xff);
                if matches!(primary, Some(SQLITE_BUSY) | Some(SQLITE_LOCKED))
                    || db_err.message().contains("database is locked")
                {
                    MarketError::StoreBusy(db_err.message().to_string())
                } else {
                    MarketError::Database(db_err.message().to_string())
                }
            }
            _ => MarketError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        MarketError::Parse(err.to_string())
    }
}

pub type MarketResult<T> = std::result::Result<T, MarketError>;
