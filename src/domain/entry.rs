//! Entry strategies: how many lots to add on a confirmed entry signal.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use super::action::PriceAction;
use super::error::TradeGenError;
use super::ledger::Ledger;
use super::trade::Trade;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMethod {
    /// Always add `num_lots`.
    Multi,
    /// Add half of the latest trade's open lots, rounded up.
    MultiHalf,
    /// Add `num_lots` only when nothing is held.
    Single,
}

impl fmt::Display for EntryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntryMethod::Multi => "MultiEntry",
            EntryMethod::MultiHalf => "MultiHalfEntry",
            EntryMethod::Single => "SingleEntry",
        })
    }
}

impl FromStr for EntryMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "MultiEntry" => Ok(EntryMethod::Multi),
            "MultiHalfEntry" => Ok(EntryMethod::MultiHalf),
            "SingleEntry" => Ok(EntryMethod::Single),
            other => Err(format!(
                "unknown entry_struct '{other}' (expected MultiEntry, MultiHalfEntry or SingleEntry)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntryStruct {
    pub method: EntryMethod,
    pub num_lots: u32,
}

impl EntryStruct {
    pub fn new(method: EntryMethod, num_lots: u32) -> Self {
        Self { method, num_lots }
    }

    /// Open a new position in `ledger` and return the number of lots added.
    ///
    /// A trade that fails validation (e.g. non-positive price) is logged and
    /// skipped, leaving the ledger unchanged. Ledger invariant violations are
    /// returned as errors.
    pub fn open_new_pos(
        &self,
        ledger: &mut Ledger,
        ticker: &str,
        dt: NaiveDateTime,
        action: PriceAction,
        price: Decimal,
    ) -> Result<Decimal, TradeGenError> {
        let lots = match self.method {
            EntryMethod::Multi => Decimal::from(self.num_lots),
            EntryMethod::MultiHalf => self.half_lots(ledger),
            EntryMethod::Single => {
                if !ledger.is_empty() {
                    return Ok(Decimal::ZERO);
                }
                Decimal::from(self.num_lots)
            }
        };
        create_new(ledger, ticker, dt, action, price, lots)
    }

    fn half_lots(&self, ledger: &Ledger) -> Decimal {
        match ledger.last() {
            Some(last) => (last.open_lots() / Decimal::TWO).ceil().max(Decimal::ONE),
            None => Decimal::from(self.num_lots),
        }
    }
}

fn create_new(
    ledger: &mut Ledger,
    ticker: &str,
    dt: NaiveDateTime,
    action: PriceAction,
    price: Decimal,
    lots: Decimal,
) -> Result<Decimal, TradeGenError> {
    let trade = match Trade::new(ticker, dt, action, lots, price) {
        Ok(trade) => trade,
        Err(err) => {
            tracing::warn!(%ticker, %dt, %err, "skipping invalid entry");
            return Ok(Decimal::ZERO);
        }
    };
    ledger.append(trade)?;
    tracing::debug!(%ticker, %dt, %action, %lots, %price, "opened position");
    Ok(lots)
}
