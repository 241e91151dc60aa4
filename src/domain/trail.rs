//! Trailing-profit calculator.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

use super::action::PriceAction;
use super::bar::Bar;
use super::error::TradeGenError;
use super::ledger::Ledger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailMethod {
    NoTrail,
    FirstTrail,
}

impl fmt::Display for TrailMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrailMethod::NoTrail => "no_trail",
            TrailMethod::FirstTrail => "FirstTrail",
        })
    }
}

impl FromStr for TrailMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "no_trail" => Ok(TrailMethod::NoTrail),
            "FirstTrail" => Ok(TrailMethod::FirstTrail),
            other => Err(format!("unknown trail_method '{other}'")),
        }
    }
}

/// Trailing level anchored on the entry price of the first open trade.
///
/// Once the bar extreme moves `trigger_trail` beyond the reference price the
/// trailing level is set to the reference plus the excess beyond the trigger
/// (optionally floored to multiples of `step`), and from then on only
/// ratchets in the position's favour.
#[derive(Debug, Clone)]
pub struct FirstTrail {
    trigger_trail: Decimal,
    step: Option<Decimal>,
    ref_price: Option<Decimal>,
    trigger_level: Decimal,
    step_level: Option<Decimal>,
    trailing_profit: Option<Decimal>,
}

impl FirstTrail {
    pub fn new(trigger_trail: Decimal, step: Option<Decimal>) -> Self {
        Self {
            trigger_trail,
            step,
            ref_price: None,
            trigger_level: Decimal::ZERO,
            step_level: None,
            trailing_profit: None,
        }
    }

    pub fn trailing_profit(&self) -> Option<Decimal> {
        self.trailing_profit
    }

    /// Forget the reference price and any trailing level.
    pub fn reset_price_levels(&mut self) {
        self.ref_price = None;
        self.trigger_level = Decimal::ZERO;
        self.step_level = None;
        self.trailing_profit = None;
    }

    /// Update the trailing level with `bar` and return it once triggered.
    pub fn cal_trail_price(
        &mut self,
        ledger: &Ledger,
        bar: &Bar,
    ) -> Result<Option<Decimal>, TradeGenError> {
        let side = ledger.side()?;
        let first = ledger.first().ok_or(TradeGenError::EmptyLedger)?;
        let ref_price = first.entry_price();

        if self.ref_price != Some(ref_price) {
            self.reset_price_levels();
            self.ref_price = Some(ref_price);
            self.trigger_level = match side {
                PriceAction::Sell => ref_price * (Decimal::ONE - self.trigger_trail),
                _ => ref_price * (Decimal::ONE + self.trigger_trail),
            };
            self.step_level = self.step.map(|step| ref_price * step);
        }

        let excess = match side {
            PriceAction::Sell => self.trigger_level - bar.low,
            _ => bar.high - self.trigger_level,
        };
        if excess < Decimal::ZERO {
            return Ok(self.trailing_profit);
        }

        let gained = match self.step_level {
            Some(step_level) if step_level > Decimal::ZERO => {
                (excess / step_level).floor() * step_level
            }
            _ => excess,
        };
        let candidate = match side {
            PriceAction::Sell => ref_price - gained,
            _ => ref_price + gained,
        };
        self.trailing_profit = Some(match (self.trailing_profit, side) {
            (None, _) => candidate,
            (Some(current), PriceAction::Sell) => current.min(candidate),
            (Some(current), _) => current.max(candidate),
        });
        Ok(self.trailing_profit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade::Trade;
    use chrono::{NaiveDate, NaiveDateTime};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn dt(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn ledger(action: PriceAction, price: Decimal) -> Ledger {
        let mut ledger = Ledger::new();
        ledger
            .append(Trade::new("AAPL", dt(1), action, dec!(10), price).unwrap())
            .unwrap();
        ledger
    }

    fn bar(high: i64, low: i64) -> Bar {
        let (high, low) = (Decimal::from(high), Decimal::from(low));
        Bar {
            ticker: "AAPL".into(),
            date: dt(2),
            open: low,
            high,
            low,
            close: low,
            entry_signal: PriceAction::Wait,
            exit_signal: PriceAction::Wait,
            stop: None,
        }
    }

    #[test]
    fn parse_method_names() {
        assert_eq!("FirstTrail".parse::<TrailMethod>().unwrap(), TrailMethod::FirstTrail);
        assert_eq!("no_trail".parse::<TrailMethod>().unwrap(), TrailMethod::NoTrail);
        assert!("LatestTrail".parse::<TrailMethod>().is_err());
    }

    #[test]
    fn none_until_triggered() {
        let ledger = ledger(PriceAction::Buy, dec!(100));
        let mut trail = FirstTrail::new(dec!(0.2), None);
        // trigger level 120
        assert_eq!(trail.cal_trail_price(&ledger, &bar(119, 95)).unwrap(), None);
    }

    #[test]
    fn long_trails_excess_beyond_trigger() {
        let ledger = ledger(PriceAction::Buy, dec!(100));
        let mut trail = FirstTrail::new(dec!(0.2), None);
        assert_eq!(trail.cal_trail_price(&ledger, &bar(120, 110)).unwrap(), Some(dec!(100)));
        assert_eq!(trail.cal_trail_price(&ledger, &bar(125, 110)).unwrap(), Some(dec!(105)));
        // pull back: level holds
        assert_eq!(trail.cal_trail_price(&ledger, &bar(122, 110)).unwrap(), Some(dec!(105)));
        assert_eq!(trail.cal_trail_price(&ledger, &bar(118, 110)).unwrap(), Some(dec!(105)));
    }

    #[test]
    fn short_trails_below_reference() {
        let ledger = ledger(PriceAction::Sell, dec!(100));
        let mut trail = FirstTrail::new(dec!(0.2), None);
        // trigger level 80
        assert_eq!(trail.cal_trail_price(&ledger, &bar(90, 81)).unwrap(), None);
        assert_eq!(trail.cal_trail_price(&ledger, &bar(90, 76)).unwrap(), Some(dec!(96)));
        assert_eq!(trail.cal_trail_price(&ledger, &bar(90, 78)).unwrap(), Some(dec!(96)));
        assert_eq!(trail.cal_trail_price(&ledger, &bar(90, 70)).unwrap(), Some(dec!(90)));
    }

    #[test]
    fn step_floors_the_excess() {
        let ledger = ledger(PriceAction::Buy, dec!(100));
        // step level = 100 * 0.05 = 5
        let mut trail = FirstTrail::new(dec!(0.2), Some(dec!(0.05)));
        assert_eq!(trail.cal_trail_price(&ledger, &bar(124, 110)).unwrap(), Some(dec!(100)));
        assert_eq!(trail.cal_trail_price(&ledger, &bar(127, 110)).unwrap(), Some(dec!(105)));
        assert_eq!(trail.cal_trail_price(&ledger, &bar(131, 110)).unwrap(), Some(dec!(110)));
    }

    #[test]
    fn new_reference_resets_state() {
        let mut trail = FirstTrail::new(dec!(0.2), None);
        let first = ledger(PriceAction::Buy, dec!(100));
        trail.cal_trail_price(&first, &bar(130, 110)).unwrap();
        assert_eq!(trail.trailing_profit(), Some(dec!(110)));

        let second = ledger(PriceAction::Buy, dec!(200));
        assert_eq!(trail.cal_trail_price(&second, &bar(230, 200)).unwrap(), None);
    }

    #[test]
    fn empty_ledger_is_error() {
        let mut trail = FirstTrail::new(dec!(0.2), None);
        assert!(matches!(
            trail.cal_trail_price(&Ledger::new(), &bar(1, 1)),
            Err(TradeGenError::EmptyLedger)
        ));
    }

    proptest! {
        #[test]
        fn trailing_level_never_regresses(
            highs in prop::collection::vec(80u32..200, 1..40),
            short in any::<bool>(),
        ) {
            let side = if short { PriceAction::Sell } else { PriceAction::Buy };
            let ledger = ledger(side, dec!(100));
            let mut trail = FirstTrail::new(dec!(0.1), Some(dec!(0.02)));
            let mut previous: Option<Decimal> = None;

            for h in highs {
                let level = trail.cal_trail_price(&ledger, &bar(h as i64, h as i64)).unwrap();
                if let (Some(prev), Some(now)) = (previous, level) {
                    if short {
                        prop_assert!(now <= prev);
                    } else {
                        prop_assert!(now >= prev);
                    }
                }
                if previous.is_some() {
                    prop_assert!(level.is_some());
                }
                previous = level;
            }
        }
    }
}
