//! Open-position ledger for a single ticker.

use std::collections::VecDeque;

use rust_decimal::Decimal;

use super::action::PriceAction;
use super::error::TradeGenError;
use super::trade::Trade;

/// Chronologically ordered open trades sharing one ticker and one side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    trades: VecDeque<Trade>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Trade> {
        self.trades.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Trade> {
        self.trades.get(index)
    }

    pub fn first(&self) -> Option<&Trade> {
        self.trades.front()
    }

    pub fn last(&self) -> Option<&Trade> {
        self.trades.back()
    }

    /// Add `trade` after checking ticker, side, chronology and that no held
    /// trade is already completed.
    pub fn append(&mut self, trade: Trade) -> Result<(), TradeGenError> {
        if let Some(last) = self.trades.back() {
            if last.ticker() != trade.ticker() {
                return Err(TradeGenError::InconsistentTicker {
                    expected: last.ticker().to_string(),
                    found: trade.ticker().to_string(),
                });
            }
            if last.entry_action() != trade.entry_action() {
                return Err(TradeGenError::InconsistentSide {
                    expected: last.entry_action(),
                    found: trade.entry_action(),
                });
            }
            if trade.entry_datetime() < last.entry_datetime() {
                return Err(TradeGenError::NonChronologicalEntry {
                    latest: last.entry_datetime(),
                    entry: trade.entry_datetime(),
                });
            }
        }
        if trade.is_completed() {
            return Err(TradeGenError::CompletedInLedger {
                entry_datetime: trade.entry_datetime(),
            });
        }
        self.trades.push_back(trade);
        self.validate()
    }

    /// Re-check the invariants over every held trade.
    pub fn validate(&self) -> Result<(), TradeGenError> {
        self.ticker()?;
        self.side()?;
        for (prev, next) in self.trades.iter().zip(self.trades.iter().skip(1)) {
            if next.entry_datetime() < prev.entry_datetime() {
                return Err(TradeGenError::NonChronologicalEntry {
                    latest: prev.entry_datetime(),
                    entry: next.entry_datetime(),
                });
            }
        }
        if let Some(done) = self.trades.iter().find(|t| t.is_completed()) {
            return Err(TradeGenError::CompletedInLedger {
                entry_datetime: done.entry_datetime(),
            });
        }
        Ok(())
    }

    /// Signed sum of open lots: positive for long, negative for short.
    pub fn net_position(&self) -> Decimal {
        self.trades
            .iter()
            .map(|t| match t.entry_action() {
                PriceAction::Sell => -t.open_lots(),
                _ => t.open_lots(),
            })
            .sum()
    }

    /// The ledger's ticker, or an empty string when nothing is held.
    pub fn ticker(&self) -> Result<String, TradeGenError> {
        Ok(self
            .standard_value("ticker", |t| t.ticker().to_string())?
            .unwrap_or_default())
    }

    /// The ledger's side, or `Wait` when nothing is held.
    pub fn side(&self) -> Result<PriceAction, TradeGenError> {
        Ok(self
            .standard_value("entry_action", |t| t.entry_action())?
            .unwrap_or_default())
    }

    fn standard_value<T: PartialEq>(
        &self,
        field: &'static str,
        value: impl Fn(&Trade) -> T,
    ) -> Result<Option<T>, TradeGenError> {
        let mut values = self.trades.iter().map(value);
        let Some(first) = values.next() else {
            return Ok(None);
        };
        if values.any(|v| v != first) {
            return Err(TradeGenError::InconsistentField { field });
        }
        Ok(Some(first))
    }

    /// Index of the trade entered at `entry_datetime`.
    pub fn position_by_entry(&self, entry_datetime: chrono::NaiveDateTime) -> Option<usize> {
        self.trades
            .iter()
            .position(|t| t.entry_datetime() == entry_datetime)
    }

    /// Swap in an updated trade, dropping it when it is fully closed.
    pub(crate) fn replace(&mut self, index: usize, trade: Trade) {
        if trade.open_lots() > Decimal::ZERO {
            self.trades[index] = trade;
        } else {
            self.trades.remove(index);
        }
    }

    pub(crate) fn set_trades(&mut self, trades: VecDeque<Trade>) {
        self.trades = trades;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use rust_decimal_macros::dec;

    fn dt(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn trade(ticker: &str, day: u32, action: PriceAction, lots: Decimal) -> Trade {
        Trade::new(ticker, dt(day), action, lots, dec!(100)).unwrap()
    }

    fn long_ledger() -> Ledger {
        let mut ledger = Ledger::new();
        ledger.append(trade("AAPL", 1, PriceAction::Buy, dec!(5))).unwrap();
        ledger.append(trade("AAPL", 2, PriceAction::Buy, dec!(3))).unwrap();
        ledger
    }

    #[test]
    fn empty_ledger_defaults() {
        let ledger = Ledger::new();
        assert!(ledger.is_empty());
        assert_eq!(ledger.net_position(), Decimal::ZERO);
        assert_eq!(ledger.ticker().unwrap(), "");
        assert_eq!(ledger.side().unwrap(), PriceAction::Wait);
    }

    #[test]
    fn net_position_long_is_positive() {
        let ledger = long_ledger();
        assert_eq!(ledger.net_position(), dec!(8));
        assert_eq!(ledger.ticker().unwrap(), "AAPL");
        assert_eq!(ledger.side().unwrap(), PriceAction::Buy);
    }

    #[test]
    fn net_position_short_is_negative() {
        let mut ledger = Ledger::new();
        ledger.append(trade("AAPL", 1, PriceAction::Sell, dec!(4))).unwrap();
        ledger.append(trade("AAPL", 2, PriceAction::Sell, dec!(2))).unwrap();
        assert_eq!(ledger.net_position(), dec!(-6));
    }

    #[test]
    fn net_position_counts_only_open_lots() {
        let mut ledger = long_ledger();
        let (partial, _) = ledger.get(0).unwrap().close(dt(3), dec!(110), dec!(2)).unwrap();
        ledger.replace(0, partial);
        assert_eq!(ledger.net_position(), dec!(6));
    }

    #[test]
    fn append_rejects_other_ticker() {
        let mut ledger = long_ledger();
        let err = ledger.append(trade("MSFT", 3, PriceAction::Buy, dec!(1))).unwrap_err();
        assert!(matches!(err, TradeGenError::InconsistentTicker { .. }));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn append_rejects_other_side() {
        let mut ledger = long_ledger();
        let err = ledger.append(trade("AAPL", 3, PriceAction::Sell, dec!(1))).unwrap_err();
        assert!(matches!(
            err,
            TradeGenError::InconsistentSide {
                expected: PriceAction::Buy,
                found: PriceAction::Sell
            }
        ));
    }

    #[test]
    fn append_rejects_earlier_entry() {
        let mut ledger = long_ledger();
        let err = ledger.append(trade("AAPL", 1, PriceAction::Buy, dec!(1))).unwrap_err();
        assert!(matches!(err, TradeGenError::NonChronologicalEntry { .. }));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn append_allows_equal_timestamps() {
        let mut ledger = long_ledger();
        ledger.append(trade("AAPL", 2, PriceAction::Buy, dec!(1))).unwrap();
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn append_rejects_completed_trade() {
        let mut ledger = Ledger::new();
        let (done, _) = trade("AAPL", 1, PriceAction::Buy, dec!(1))
            .close(dt(2), dec!(101), dec!(1))
            .unwrap();
        let err = ledger.append(done).unwrap_err();
        assert!(matches!(err, TradeGenError::CompletedInLedger { .. }));
    }

    #[test]
    fn replace_drops_closed_trade() {
        let mut ledger = long_ledger();
        let (closed, _) = ledger.get(0).unwrap().close(dt(3), dec!(110), dec!(5)).unwrap();
        ledger.replace(0, closed);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.first().unwrap().entry_datetime(), dt(2));
    }

    #[test]
    fn position_by_entry_finds_trade() {
        let ledger = long_ledger();
        assert_eq!(ledger.position_by_entry(dt(2)), Some(1));
        assert_eq!(ledger.position_by_entry(dt(9)), None);
    }
}
