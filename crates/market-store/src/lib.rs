//! SQLite persistence for the market watch engine.
//!
//! One database holds the bar cache, the watchlist, the notification ledger
//! and its dismissal overlay.

pub mod bars;
pub mod db;
pub mod ledger;
pub mod sent_articles;
pub mod watchlist;

pub use bars::{BarStore, BarWindow};
pub use db::MarketDb;
pub use ledger::NotificationLedger;
pub use sent_articles::SentArticleLog;
pub use watchlist::WatchlistStore;
