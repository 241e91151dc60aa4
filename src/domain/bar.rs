//! Price bar with raw entry/exit signals.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use super::action::{PriceAction, SigType};

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub ticker: String,
    pub date: NaiveDateTime,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub entry_signal: PriceAction,
    pub exit_signal: PriceAction,
    /// Caller-supplied stop level, only read by the fixed-exit bracket.
    pub stop: Option<Decimal>,
}

impl Bar {
    /// The raw signal an evaluator of `sig_type` reacts to.
    pub fn signal(&self, sig_type: SigType) -> PriceAction {
        match sig_type {
            SigType::Entry => self.entry_signal,
            SigType::Exit => self.exit_signal,
        }
    }
}

/// Which way a level has to be crossed to take a position out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    /// Stop or trailing level: below the market for a long position.
    Adverse,
    /// Profit target: above the market for a long position.
    Favourable,
}

impl Bar {
    /// Execution price if this bar takes a `side` position out through `level`.
    ///
    /// A gap through the level at the open fills at the open. Otherwise the
    /// close (when `monitor_close`) or the bar extreme is compared, filling at
    /// the close or at the level respectively.
    pub fn crossing_price(
        &self,
        side: PriceAction,
        level: Decimal,
        crossing: Crossing,
        monitor_close: bool,
    ) -> Option<Decimal> {
        let below = (side == PriceAction::Buy) == (crossing == Crossing::Adverse);
        let reached = |price: Decimal| if below { price <= level } else { price >= level };

        if reached(self.open) {
            return Some(self.open);
        }
        if monitor_close {
            return reached(self.close).then_some(self.close);
        }
        let extreme = if below { self.low } else { self.high };
        reached(extreme).then_some(level)
    }
}

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d_%H%M"];

/// Parse a bar timestamp. Plain dates are taken at midnight.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_bar() -> Bar {
        Bar {
            ticker: "AAPL".into(),
            date: parse_datetime("2025-04-07").unwrap(),
            open: dec!(180.00),
            high: dec!(184.10),
            low: dec!(179.50),
            close: dec!(181.46),
            entry_signal: PriceAction::Buy,
            exit_signal: PriceAction::Wait,
            stop: None,
        }
    }

    #[test]
    fn signal_selects_column() {
        let bar = sample_bar();
        assert_eq!(bar.signal(SigType::Entry), PriceAction::Buy);
        assert_eq!(bar.signal(SigType::Exit), PriceAction::Wait);
    }

    #[test]
    fn adverse_crossing_gap_fills_at_open() {
        let bar = sample_bar();
        // long stop above the open
        let price = bar.crossing_price(PriceAction::Buy, dec!(180.50), Crossing::Adverse, false);
        assert_eq!(price, Some(dec!(180.00)));
    }

    #[test]
    fn adverse_crossing_intrabar_fills_at_level() {
        let bar = sample_bar();
        let price = bar.crossing_price(PriceAction::Buy, dec!(179.80), Crossing::Adverse, false);
        assert_eq!(price, Some(dec!(179.80)));
        let miss = bar.crossing_price(PriceAction::Buy, dec!(179.00), Crossing::Adverse, false);
        assert_eq!(miss, None);
    }

    #[test]
    fn adverse_crossing_monitors_close() {
        let bar = Bar {
            open: dec!(182.00),
            ..sample_bar()
        };
        // low breaches but close does not
        let price = bar.crossing_price(PriceAction::Buy, dec!(179.80), Crossing::Adverse, true);
        assert_eq!(price, None);
        let price = bar.crossing_price(PriceAction::Buy, dec!(181.50), Crossing::Adverse, true);
        assert_eq!(price, Some(dec!(181.46)));
    }

    #[test]
    fn short_positions_mirror_levels() {
        let bar = sample_bar();
        let stop = bar.crossing_price(PriceAction::Sell, dec!(184.00), Crossing::Adverse, false);
        assert_eq!(stop, Some(dec!(184.00)));
        let target = bar.crossing_price(PriceAction::Sell, dec!(179.60), Crossing::Favourable, false);
        assert_eq!(target, Some(dec!(179.60)));
        let gap = bar.crossing_price(PriceAction::Sell, dec!(181.00), Crossing::Favourable, false);
        assert_eq!(gap, Some(dec!(180.00)));
    }

    #[test]
    fn favourable_crossing_for_long_uses_high() {
        let bar = sample_bar();
        let target = bar.crossing_price(PriceAction::Buy, dec!(184.00), Crossing::Favourable, false);
        assert_eq!(target, Some(dec!(184.00)));
        let miss = bar.crossing_price(PriceAction::Buy, dec!(185.00), Crossing::Favourable, false);
        assert_eq!(miss, None);
    }

    #[test]
    fn parse_plain_date_at_midnight() {
        let dt = parse_datetime("2025-04-07").unwrap();
        assert_eq!(dt.to_string(), "2025-04-07 00:00:00");
    }

    #[test]
    fn parse_intraday_formats() {
        assert_eq!(
            parse_datetime("2025-04-07 09:30:00").unwrap().to_string(),
            "2025-04-07 09:30:00"
        );
        assert_eq!(
            parse_datetime("2025-04-07_1545").unwrap().to_string(),
            "2025-04-07 15:45:00"
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_datetime("07/04/2025").is_none());
        assert!(parse_datetime("").is_none());
    }
}
