use chrono::Duration;

/// Minimum absolute percent move for each detector to fire
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorThresholds {
    pub daily_eod_pct: f64,
    pub momentum_2h_pct: f64,
    pub morning_gap_pct: f64,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            daily_eod_pct: 0.0,
            momentum_2h_pct: 5.0,
            morning_gap_pct: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub thresholds: DetectorThresholds,
    /// Lookback of the momentum window
    pub momentum_lookback: Duration,
    /// Width of a momentum time bucket in minutes
    pub momentum_bucket_minutes: u32,
    /// Upper bound on one symbol's bar refresh
    pub refresh_timeout: std::time::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: DetectorThresholds::default(),
            momentum_lookback: Duration::hours(2),
            momentum_bucket_minutes: 15,
            refresh_timeout: std::time::Duration::from_secs(20),
        }
    }
}

impl EngineConfig {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            thresholds: DetectorThresholds {
                daily_eod_pct: env_f64("DAILY_EOD_THRESHOLD_PCT", defaults.thresholds.daily_eod_pct),
                momentum_2h_pct: env_f64("MOMENTUM_2H_THRESHOLD_PCT", defaults.thresholds.momentum_2h_pct),
                morning_gap_pct: env_f64("MORNING_GAP_THRESHOLD_PCT", defaults.thresholds.morning_gap_pct),
            },
            refresh_timeout: std::env::var("REFRESH_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(std::time::Duration::from_secs)
                .unwrap_or(defaults.refresh_timeout),
            ..defaults
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => v,
            _ => {
                tracing::warn!("Ignoring invalid {}='{}', using {}", key, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.thresholds.daily_eod_pct, 0.0);
        assert_eq!(config.thresholds.momentum_2h_pct, 5.0);
        assert_eq!(config.momentum_lookback, Duration::hours(2));
        assert_eq!(config.momentum_bucket_minutes, 15);
    }

    #[test]
    fn test_env_f64_rejects_garbage() {
        std::env::set_var("NS_TEST_THRESHOLD_BAD", "lots");
        assert_eq!(env_f64("NS_TEST_THRESHOLD_BAD", 5.0), 5.0);
        std::env::set_var("NS_TEST_THRESHOLD_NEG", "-1");
        assert_eq!(env_f64("NS_TEST_THRESHOLD_NEG", 5.0), 5.0);
        std::env::set_var("NS_TEST_THRESHOLD_OK", "2.5");
        assert_eq!(env_f64("NS_TEST_THRESHOLD_OK", 5.0), 2.5);
    }
}
