//! Trade lot-group and the completed-trade record.

use chrono::NaiveDateTime;
use rust_decimal::{Decimal, MathematicalOps};

use super::action::PriceAction;
use super::error::ValidationError;

/// One group of lots opened at a single timestamp and price.
///
/// Fields are private so every instance satisfies the lot, price and
/// chronology invariants; exits produce a new value via [`Trade::close`].
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    ticker: String,
    entry_datetime: NaiveDateTime,
    entry_action: PriceAction,
    entry_lots: Decimal,
    entry_price: Decimal,
    exit_datetime: Option<NaiveDateTime>,
    exit_action: Option<PriceAction>,
    exit_lots: Decimal,
    exit_price: Option<Decimal>,
}

impl Trade {
    pub fn new(
        ticker: impl Into<String>,
        entry_datetime: NaiveDateTime,
        entry_action: PriceAction,
        entry_lots: Decimal,
        entry_price: Decimal,
    ) -> Result<Self, ValidationError> {
        if entry_lots <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveLots { lots: entry_lots });
        }
        if entry_price <= Decimal::ZERO {
            return Err(ValidationError::NonPositivePrice {
                field: "entry_price",
                price: entry_price,
            });
        }
        Ok(Self {
            ticker: entry_ticker(ticker),
            entry_datetime,
            entry_action,
            entry_lots,
            entry_price,
            exit_datetime: None,
            exit_action: None,
            exit_lots: Decimal::ZERO,
            exit_price: None,
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn entry_datetime(&self) -> NaiveDateTime {
        self.entry_datetime
    }

    pub fn entry_action(&self) -> PriceAction {
        self.entry_action
    }

    pub fn entry_lots(&self) -> Decimal {
        self.entry_lots
    }

    pub fn entry_price(&self) -> Decimal {
        self.entry_price
    }

    pub fn exit_datetime(&self) -> Option<NaiveDateTime> {
        self.exit_datetime
    }

    pub fn exit_action(&self) -> Option<PriceAction> {
        self.exit_action
    }

    pub fn exit_lots(&self) -> Decimal {
        self.exit_lots
    }

    pub fn exit_price(&self) -> Option<Decimal> {
        self.exit_price
    }

    /// Lots still held.
    pub fn open_lots(&self) -> Decimal {
        self.entry_lots - self.exit_lots
    }

    pub fn is_completed(&self) -> bool {
        self.exit_lots == self.entry_lots && self.exit_datetime.is_some() && self.exit_price.is_some()
    }

    /// Close `lots` of this trade at `exit_price`.
    ///
    /// Returns the updated trade (still in the ledger while it has open
    /// lots) and the completed record covering exactly the closed lots.
    pub fn close(
        &self,
        exit_datetime: NaiveDateTime,
        exit_price: Decimal,
        lots: Decimal,
    ) -> Result<(Trade, CompletedTrade), ValidationError> {
        if exit_price <= Decimal::ZERO {
            return Err(ValidationError::NonPositivePrice {
                field: "exit_price",
                price: exit_price,
            });
        }
        if exit_datetime < self.entry_datetime {
            return Err(ValidationError::ExitBeforeEntry {
                entry: self.entry_datetime,
                exit: exit_datetime,
            });
        }
        let exit_lots = self.exit_lots + lots;
        if lots < Decimal::ZERO || exit_lots < Decimal::ZERO {
            return Err(ValidationError::NegativeExitLots { exit_lots });
        }
        if exit_lots > self.entry_lots {
            return Err(ValidationError::ExcessExitLots {
                entry_lots: self.entry_lots,
                exit_lots,
            });
        }

        let updated = Trade {
            exit_datetime: Some(exit_datetime),
            exit_action: Some(self.entry_action.opposite()),
            exit_lots,
            exit_price: Some(exit_price),
            ..self.clone()
        };
        let record = CompletedTrade::new(self, exit_datetime, exit_price, lots);
        Ok((updated, record))
    }
}

fn entry_ticker(ticker: impl Into<String>) -> String {
    ticker.into().trim().to_string()
}

/// Flat record of a fully reconciled trade.
///
/// `entry_lots` always equals `exit_lots`: a partial close of a larger
/// trade is reported as its own record covering only the closed lots.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTrade {
    pub ticker: String,
    pub entry_datetime: NaiveDateTime,
    pub entry_action: PriceAction,
    pub entry_lots: Decimal,
    pub entry_price: Decimal,
    pub exit_datetime: NaiveDateTime,
    pub exit_action: PriceAction,
    pub exit_lots: Decimal,
    pub exit_price: Decimal,
    pub days_held: i64,
    pub profit_loss: Decimal,
    pub percent_ret: Decimal,
    pub daily_ret: Decimal,
    pub win: bool,
}

impl CompletedTrade {
    fn new(trade: &Trade, exit_datetime: NaiveDateTime, exit_price: Decimal, lots: Decimal) -> Self {
        let days_held = (exit_datetime - trade.entry_datetime).num_days();
        let profit_loss = profit_loss(trade.entry_action, trade.entry_price, exit_price);
        let percent_ret = (profit_loss / trade.entry_price).round_dp(6);
        let daily_ret = daily_ret(percent_ret, days_held);

        Self {
            ticker: trade.ticker.clone(),
            entry_datetime: trade.entry_datetime,
            entry_action: trade.entry_action,
            entry_lots: lots,
            entry_price: trade.entry_price,
            exit_datetime,
            exit_action: trade.entry_action.opposite(),
            exit_lots: lots,
            exit_price,
            days_held,
            profit_loss,
            percent_ret,
            daily_ret,
            win: percent_ret > Decimal::ZERO,
        }
    }
}

/// Per-unit price delta, positive when the trade made money.
fn profit_loss(action: PriceAction, entry_price: Decimal, exit_price: Decimal) -> Decimal {
    match action {
        PriceAction::Buy => exit_price - entry_price,
        _ => entry_price - exit_price,
    }
}

/// Compounded per-day return: (1 + percent_ret)^(1/days) - 1.
fn daily_ret(percent_ret: Decimal, days_held: i64) -> Decimal {
    if days_held <= 0 {
        return percent_ret;
    }
    let base = Decimal::ONE + percent_ret;
    if base <= Decimal::ZERO {
        // Total loss: no real root, report it as a full loss per day.
        return Decimal::NEGATIVE_ONE;
    }
    let exponent = Decimal::ONE / Decimal::from(days_held);
    match base.checked_powd(exponent) {
        Some(growth) => (growth - Decimal::ONE).round_dp(6),
        None => percent_ret,
    }
}
