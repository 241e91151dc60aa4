//! Stop-loss calculators.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

use super::action::PriceAction;
use super::error::TradeGenError;
use super::ledger::Ledger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMethod {
    NoStop,
    /// Cap the loss of the whole ledger at `percent_loss` of invested capital.
    PercentLoss,
    /// Stop relative to the most recent entry price.
    LatestLoss,
    /// Per-trade stops; the one closest to the market wins.
    NearestLoss,
}

impl fmt::Display for StopMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopMethod::NoStop => "no_stop",
            StopMethod::PercentLoss => "PercentLoss",
            StopMethod::LatestLoss => "LatestLoss",
            StopMethod::NearestLoss => "NearestLoss",
        })
    }
}

impl FromStr for StopMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "no_stop" => Ok(StopMethod::NoStop),
            "PercentLoss" => Ok(StopMethod::PercentLoss),
            "LatestLoss" => Ok(StopMethod::LatestLoss),
            "NearestLoss" => Ok(StopMethod::NearestLoss),
            other => Err(format!("unknown stop_method '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StopLoss {
    pub method: StopMethod,
    pub percent_loss: Decimal,
}

impl StopLoss {
    pub fn new(method: StopMethod, percent_loss: Decimal) -> Self {
        Self {
            method,
            percent_loss,
        }
    }

    /// Stop price for the open positions in `ledger`, rounded to 2 dp.
    ///
    /// Returns `None` for `NoStop`.
    pub fn cal_exit_price(&self, ledger: &Ledger) -> Result<Option<Decimal>, TradeGenError> {
        if self.method == StopMethod::NoStop {
            return Ok(None);
        }
        let side = ledger.side()?;
        let last = ledger.last().ok_or(TradeGenError::EmptyLedger)?;

        let price = match self.method {
            StopMethod::PercentLoss => {
                let invested: Decimal = ledger
                    .iter()
                    .map(|t| t.open_lots() * t.entry_price())
                    .sum();
                let lots = ledger.net_position().abs();
                if lots.is_zero() {
                    return Err(TradeGenError::EmptyLedger);
                }
                self.adjust(side, invested) / lots
            }
            StopMethod::LatestLoss => self.adjust(side, last.entry_price()),
            StopMethod::NearestLoss => {
                let stops = ledger.iter().map(|t| self.adjust(side, t.entry_price()));
                let nearest = match side {
                    PriceAction::Sell => stops.min(),
                    _ => stops.max(),
                };
                nearest.ok_or(TradeGenError::EmptyLedger)?
            }
            StopMethod::NoStop => return Ok(None),
        };
        Ok(Some(price.round_dp(2)))
    }

    fn adjust(&self, side: PriceAction, value: Decimal) -> Decimal {
        match side {
            PriceAction::Sell => value * (Decimal::ONE + self.percent_loss),
            _ => value * (Decimal::ONE - self.percent_loss),
        }
    }
}
