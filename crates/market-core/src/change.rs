/// Percent change from `open` to `close`.
///
/// Returns exactly `0.0` when `open` is zero instead of dividing by it.
pub fn pct_change(open: f64, close: f64) -> f64 {
    if open == 0.0 {
        return 0.0;
    }
    (close - open) / open * 100.0
}

/// Round to two decimals for persisted percentages
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pct_change_matches_formula() {
        let cases = [(100.0, 107.0), (250.0, 240.0), (0.5, 0.75), (-10.0, -5.0), (3.0, 3.0)];
        for (open, close) in cases {
            assert_eq!(pct_change(open, close), (close - open) / open * 100.0);
        }
    }

    #[test]
    fn test_pct_change_zero_open() {
        assert_eq!(pct_change(0.0, 107.0), 0.0);
        assert_eq!(pct_change(0.0, 0.0), 0.0);
        assert_eq!(pct_change(-0.0, 5.0), 0.0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(pct_change(100.0, 107.0)), 7.0);
        assert_eq!(round2(-2.345678), -2.35);
        assert_eq!(round2(0.0), 0.0);
    }
}
