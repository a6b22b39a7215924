//! Watchlist price alerts: threshold detectors, their orchestration, and
//! morning news briefings.

pub mod config;
pub mod detectors;
pub mod engine;
pub mod ids;
pub mod news_briefing;
pub mod templates;

pub use config::{DetectorThresholds, EngineConfig};
pub use detectors::{DailyEodDetector, DetectionContext, Detector, MomentumDetector, MorningGapDetector};
pub use engine::NotificationEngine;
pub use news_briefing::{BriefingFailure, BriefingReport, NewsBriefingGenerator};
