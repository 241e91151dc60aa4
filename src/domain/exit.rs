//! Exit strategies: which open lots a confirmed exit signal closes.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use super::error::TradeGenError;
use super::ledger::Ledger;
use super::trade::{CompletedTrade, Trade};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitMethod {
    Fifo,
    Lifo,
    HalfFifo,
    HalfLifo,
    TakeAll,
    /// Per-position profit/stop brackets, see [`FixedExit`](super::fixed_exit::FixedExit).
    Fixed,
    FixedTime,
}

impl fmt::Display for ExitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExitMethod::Fifo => "FIFOExit",
            ExitMethod::Lifo => "LIFOExit",
            ExitMethod::HalfFifo => "HalfFIFOExit",
            ExitMethod::HalfLifo => "HalfLIFOExit",
            ExitMethod::TakeAll => "TakeAllExit",
            ExitMethod::Fixed => "FixedExit",
            ExitMethod::FixedTime => "FixedTimeExit",
        })
    }
}

impl FromStr for ExitMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "FIFOExit" => Ok(ExitMethod::Fifo),
            "LIFOExit" => Ok(ExitMethod::Lifo),
            "HalfFIFOExit" => Ok(ExitMethod::HalfFifo),
            "HalfLIFOExit" => Ok(ExitMethod::HalfLifo),
            "TakeAllExit" => Ok(ExitMethod::TakeAll),
            "FixedExit" => Ok(ExitMethod::Fixed),
            "FixedTimeExit" => Ok(ExitMethod::FixedTime),
            other => Err(format!("unknown exit_struct '{other}'")),
        }
    }
}

/// Default holding period for `FixedTimeExit` when none is configured.
pub const DEFAULT_TIME_PERIOD: i64 = 5;

#[derive(Debug, Clone)]
pub struct ExitStruct {
    pub method: ExitMethod,
    /// Minimum whole days held before `FixedTimeExit` closes a trade.
    pub time_period: i64,
}

impl ExitStruct {
    pub fn new(method: ExitMethod) -> Self {
        Self {
            method,
            time_period: DEFAULT_TIME_PERIOD,
        }
    }

    pub fn with_time_period(mut self, time_period: i64) -> Self {
        self.time_period = time_period;
        self
    }

    /// Close positions at `price` according to the configured method.
    ///
    /// `Fixed` is a no-op here: its brackets are checked every bar by the
    /// fixed-exit tracker rather than on exit signals.
    pub fn close_pos(
        &self,
        ledger: &mut Ledger,
        dt: NaiveDateTime,
        price: Decimal,
    ) -> Result<Vec<CompletedTrade>, TradeGenError> {
        if ledger.is_empty() {
            return Ok(Vec::new());
        }
        let completed = match self.method {
            ExitMethod::Fifo => vec![close_at(ledger, 0, dt, price)?],
            ExitMethod::Lifo => {
                let newest = ledger.len() - 1;
                vec![close_at(ledger, newest, dt, price)?]
            }
            ExitMethod::HalfFifo => close_half(ledger, dt, price, false)?,
            ExitMethod::HalfLifo => close_half(ledger, dt, price, true)?,
            ExitMethod::TakeAll => take_all(ledger, dt, price)?,
            ExitMethod::FixedTime => close_aged(ledger, dt, price, self.time_period)?,
            ExitMethod::Fixed => Vec::new(),
        };
        ledger.validate()?;
        Ok(completed)
    }
}

/// Close every open lot in `ledger` at `price`.
///
/// Fails with `IncompleteClosure` when anything is left afterwards.
pub fn take_all(
    ledger: &mut Ledger,
    dt: NaiveDateTime,
    price: Decimal,
) -> Result<Vec<CompletedTrade>, TradeGenError> {
    let mut completed = Vec::with_capacity(ledger.len());
    let mut remaining = VecDeque::new();
    for trade in ledger.iter() {
        let (updated, record) = trade.close(dt, price, trade.open_lots())?;
        completed.push(record);
        if !updated.is_completed() {
            remaining.push_back(updated);
        }
    }
    ledger.set_trades(remaining);
    if !ledger.is_empty() {
        return Err(TradeGenError::IncompleteClosure {
            remaining: ledger.len(),
        });
    }
    Ok(completed)
}

/// Close the remaining open lots of the trade at `index`.
pub(crate) fn close_at(
    ledger: &mut Ledger,
    index: usize,
    dt: NaiveDateTime,
    price: Decimal,
) -> Result<CompletedTrade, TradeGenError> {
    let trade = ledger.get(index).ok_or(TradeGenError::EmptyLedger)?;
    let (updated, record) = trade.close(dt, price, trade.open_lots())?;
    ledger.replace(index, updated);
    Ok(record)
}

/// Close `ceil(|net| / 2)` lots walking from the oldest (or newest) trade.
fn close_half(
    ledger: &mut Ledger,
    dt: NaiveDateTime,
    price: Decimal,
    newest_first: bool,
) -> Result<Vec<CompletedTrade>, TradeGenError> {
    let mut required = (ledger.net_position().abs() / Decimal::TWO).ceil();
    let mut completed = Vec::new();
    let mut kept: VecDeque<Trade> = VecDeque::with_capacity(ledger.len());

    let walk: Vec<&Trade> = if newest_first {
        ledger.iter().rev().collect()
    } else {
        ledger.iter().collect()
    };
    for trade in walk {
        if required <= Decimal::ZERO {
            kept.push_back(trade.clone());
            continue;
        }
        let lots = trade.open_lots().min(required);
        let (updated, record) = trade.close(dt, price, lots)?;
        required -= lots;
        completed.push(record);
        if !updated.is_completed() {
            kept.push_back(updated);
        }
    }

    if newest_first {
        kept.make_contiguous().reverse();
    }
    ledger.set_trades(kept);
    Ok(completed)
}

/// Close every trade held for at least `time_period` whole days.
fn close_aged(
    ledger: &mut Ledger,
    dt: NaiveDateTime,
    price: Decimal,
    time_period: i64,
) -> Result<Vec<CompletedTrade>, TradeGenError> {
    let mut completed = Vec::new();
    let mut kept = VecDeque::with_capacity(ledger.len());
    for trade in ledger.iter() {
        if (dt - trade.entry_datetime()).num_days() >= time_period {
            let (_, record) = trade.close(dt, price, trade.open_lots())?;
            completed.push(record);
        } else {
            kept.push_back(trade.clone());
        }
    }
    ledger.set_trades(kept);
    Ok(completed)
}
