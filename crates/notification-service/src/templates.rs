use chrono::NaiveDateTime;
use market_core::{ArticleSummary, Direction};

/// A priced move between two bars, in market-local time
#[derive(Debug, Clone, Copy)]
pub struct PriceMove<'a> {
    pub symbol: &'a str,
    pub from_price: f64,
    pub to_price: f64,
    pub from_time: NaiveDateTime,
    pub to_time: NaiveDateTime,
    pub pct: f64,
}

impl PriceMove<'_> {
    fn summary(&self) -> String {
        let action = match Direction::from_change(self.pct) {
            Direction::Up => "rose",
            Direction::Down => "fell",
            Direction::Neutral => "was flat at",
        };
        format!(
            "{} {} {:.1}% (${:.2} → ${:.2})",
            self.symbol,
            action,
            self.pct.abs(),
            self.from_price,
            self.to_price
        )
    }
}

pub struct MessageTemplate;

impl MessageTemplate {
    /// `AAPL ↑ 7.0%`
    pub fn title(symbol: &str, pct: f64) -> String {
        let arrow = match Direction::from_change(pct) {
            Direction::Up => "↑",
            Direction::Down => "↓",
            Direction::Neutral => "→",
        };
        format!("{} {} {:.1}%", symbol, arrow, pct.abs())
    }

    /// `From 9:30 AM to 3:59 PM on Tuesday, 17-02-2026, AAPL rose 7.0% ($100.00 → $107.00)`
    pub fn price_move(m: &PriceMove<'_>) -> String {
        format!(
            "From {} to {} on {}, {}",
            clock_time(m.from_time),
            clock_time(m.to_time),
            long_date(m.to_time),
            m.summary()
        )
    }

    pub fn overnight_gap(m: &PriceMove<'_>) -> String {
        format!(
            "Overnight gap from {} (prev close) to {} (open) on {}: {}",
            clock_time(m.from_time),
            clock_time(m.to_time),
            long_date(m.to_time),
            m.summary()
        )
    }

    pub fn briefing_title(symbol: &str) -> String {
        format!("{} Morning News Briefing", symbol)
    }

    /// Up to three bullet headlines plus a count of the rest
    pub fn briefing_preview(articles: &[ArticleSummary]) -> String {
        let mut lines: Vec<String> = articles
            .iter()
            .take(3)
            .map(|a| format!("• {}", truncate_chars(&a.headline, 80)))
            .collect();
        if articles.len() > 3 {
            lines.push(format!("  +{} more", articles.len() - 3));
        }
        lines.join("\n")
    }

    /// `Tuesday, 02-17-2026 04:05 PM`
    pub fn display_timestamp(local: NaiveDateTime) -> String {
        local.format("%A, %m-%d-%Y %I:%M %p").to_string()
    }
}

fn clock_time(ts: NaiveDateTime) -> String {
    ts.format("%-I:%M %p").to_string()
}

fn long_date(ts: NaiveDateTime) -> String {
    ts.format("%A, %d-%m-%Y").to_string()
}

/// Truncate on a char boundary
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn aapl_move(from: f64, to: f64, pct: f64) -> PriceMove<'static> {
        PriceMove {
            symbol: "AAPL",
            from_price: from,
            to_price: to,
            from_time: at("2026-02-17 09:30:00"),
            to_time: at("2026-02-17 15:59:00"),
            pct,
        }
    }

    #[test]
    fn test_titles() {
        assert_eq!(MessageTemplate::title("AAPL", 7.0), "AAPL ↑ 7.0%");
        assert_eq!(MessageTemplate::title("AAPL", -2.04), "AAPL ↓ 2.0%");
        assert_eq!(MessageTemplate::title("AAPL", 0.0), "AAPL → 0.0%");
    }

    #[test]
    fn test_price_move_message() {
        let msg = MessageTemplate::price_move(&aapl_move(100.0, 107.0, 7.0));
        assert_eq!(
            msg,
            "From 9:30 AM to 3:59 PM on Tuesday, 17-02-2026, AAPL rose 7.0% ($100.00 → $107.00)"
        );
    }

    #[test]
    fn test_overnight_gap_message() {
        let m = PriceMove {
            from_time: at("2026-02-13 15:59:00"),
            to_time: at("2026-02-16 09:30:00"),
            ..aapl_move(100.0, 98.0, -2.0)
        };
        assert_eq!(
            MessageTemplate::overnight_gap(&m),
            "Overnight gap from 3:59 PM (prev close) to 9:30 AM (open) on Monday, 16-02-2026: AAPL fell 2.0% ($100.00 → $98.00)"
        );
    }

    #[test]
    fn test_display_timestamp() {
        assert_eq!(
            MessageTemplate::display_timestamp(at("2026-02-16 16:05:00")),
            "Monday, 02-16-2026 04:05 PM"
        );
    }

    #[test]
    fn test_briefing_preview() {
        let article = |h: &str| ArticleSummary {
            headline: h.to_string(),
            summary: String::new(),
            url: String::new(),
            source: String::new(),
        };
        let long = "é".repeat(100);
        let articles = vec![article(&long), article("B"), article("C"), article("D"), article("E")];

        let preview = MessageTemplate::briefing_preview(&articles);
        let lines: Vec<&str> = preview.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].chars().count(), 2 + 80);
        assert_eq!(lines[3], "  +2 more");
    }
}
