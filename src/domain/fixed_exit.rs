//! Fixed per-position profit/stop brackets.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use super::action::PriceAction;
use super::bar::{Bar, Crossing};
use super::error::TradeGenError;
use super::exit::close_at;
use super::ledger::Ledger;
use super::trade::{CompletedTrade, Trade};

/// Exit levels attached to one open trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub action: PriceAction,
    pub entry_price: Decimal,
    pub stop_level: Decimal,
    pub profit_level: Decimal,
}

/// Tracks one bracket per open trade, keyed by entry timestamp.
#[derive(Debug, Clone, Default)]
pub struct FixedExit {
    monitor_close: bool,
    brackets: BTreeMap<NaiveDateTime, Bracket>,
}

impl FixedExit {
    pub fn new(monitor_close: bool) -> Self {
        Self {
            monitor_close,
            brackets: BTreeMap::new(),
        }
    }

    pub fn brackets(&self) -> &BTreeMap<NaiveDateTime, Bracket> {
        &self.brackets
    }

    /// Register the bracket for `trade`.
    ///
    /// The profit target mirrors the stop around the entry price (1:1
    /// risk/reward). The stop must sit on the losing side of the entry.
    pub fn update_exit_levels(&mut self, trade: &Trade, stop: Decimal) -> Result<(), TradeGenError> {
        let action = trade.entry_action();
        let entry_price = trade.entry_price();
        let valid = match action {
            PriceAction::Buy => entry_price > stop,
            PriceAction::Sell => entry_price < stop,
            PriceAction::Wait => false,
        };
        if !valid || stop <= Decimal::ZERO {
            return Err(TradeGenError::InvalidStopLevel {
                action,
                entry_price,
                stop,
            });
        }

        let bracket = Bracket {
            action,
            entry_price,
            stop_level: stop,
            profit_level: Decimal::TWO * entry_price - stop,
        };
        tracing::debug!(entry = %trade.entry_datetime(), stop = %bracket.stop_level, profit = %bracket.profit_level, "registered bracket");
        self.brackets.insert(trade.entry_datetime(), bracket);
        Ok(())
    }

    /// Close every position whose stop level is breached on `bar`.
    pub fn check_all_stop(
        &mut self,
        ledger: &mut Ledger,
        bar: &Bar,
    ) -> Result<Vec<CompletedTrade>, TradeGenError> {
        self.check_all(ledger, bar, Crossing::Adverse)
    }

    /// Close every position whose profit target is reached on `bar`.
    pub fn check_all_profit(
        &mut self,
        ledger: &mut Ledger,
        bar: &Bar,
    ) -> Result<Vec<CompletedTrade>, TradeGenError> {
        self.check_all(ledger, bar, Crossing::Favourable)
    }

    fn check_all(
        &mut self,
        ledger: &mut Ledger,
        bar: &Bar,
        crossing: Crossing,
    ) -> Result<Vec<CompletedTrade>, TradeGenError> {
        let hits: Vec<(NaiveDateTime, Decimal)> = self
            .brackets
            .iter()
            .filter_map(|(entry_dt, b)| {
                let level = match crossing {
                    Crossing::Adverse => b.stop_level,
                    Crossing::Favourable => b.profit_level,
                };
                bar.crossing_price(b.action, level, crossing, self.monitor_close)
                    .map(|price| (*entry_dt, price))
            })
            .collect();

        let mut completed = Vec::with_capacity(hits.len());
        for (entry_dt, price) in hits {
            completed.push(self.close_pos(ledger, entry_dt, bar.date, price)?);
        }
        Ok(completed)
    }

    /// Close the position entered at `entry_dt` and drop its bracket.
    pub fn close_pos(
        &mut self,
        ledger: &mut Ledger,
        entry_dt: NaiveDateTime,
        dt: NaiveDateTime,
        price: Decimal,
    ) -> Result<CompletedTrade, TradeGenError> {
        let index = ledger
            .position_by_entry(entry_dt)
            .ok_or(TradeGenError::PositionNotFound {
                entry_datetime: entry_dt,
            })?;
        let record = close_at(ledger, index, dt, price)?;
        self.brackets.remove(&entry_dt);
        Ok(record)
    }

    /// Drop brackets whose trade has left the ledger by another route.
    pub fn retain_open(&mut self, ledger: &Ledger) {
        self.brackets
            .retain(|entry_dt, _| ledger.position_by_entry(*entry_dt).is_some());
    }

    /// Forget every bracket, e.g. after the ledger was force-closed.
    pub fn clear(&mut self) {
        self.brackets.clear();
    }
}
