//! Signal confirmation: turning raw per-bar signals into executable actions.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use super::action::{PriceAction, SigType};
use super::bar::Bar;
use super::error::TradeGenError;
use super::ledger::Ledger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigEvalMethod {
    /// Execute at the next bar's open.
    Open,
    /// Execute at the signal bar's close.
    Close,
    /// Execute when a later bar breaks the signal bar's high or low.
    Breakout,
}

impl fmt::Display for SigEvalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SigEvalMethod::Open => "OpenEvaluator",
            SigEvalMethod::Close => "CloseEvaluator",
            SigEvalMethod::Breakout => "BreakoutEvaluator",
        })
    }
}

impl FromStr for SigEvalMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "OpenEvaluator" => Ok(SigEvalMethod::Open),
            "CloseEvaluator" => Ok(SigEvalMethod::Close),
            "BreakoutEvaluator" => Ok(SigEvalMethod::Breakout),
            other => Err(format!("unknown sig_eval_method '{other}'")),
        }
    }
}

/// A confirmed, executable signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Confirmation {
    pub dt: NaiveDateTime,
    pub action: PriceAction,
    pub price: Decimal,
}

#[derive(Debug, Clone)]
pub struct SignalEvaluator {
    method: SigEvalMethod,
    sig_type: SigType,
    trigger_percent: Option<Decimal>,
    /// Bars seen since the pending signal first appeared.
    records: Vec<Bar>,
}

impl SignalEvaluator {
    pub fn new(method: SigEvalMethod, sig_type: SigType) -> Self {
        Self {
            method,
            sig_type,
            trigger_percent: None,
            records: Vec::new(),
        }
    }

    /// Breakout offset as a fraction of the broken level.
    pub fn with_trigger_percent(mut self, trigger_percent: Option<Decimal>) -> Self {
        self.trigger_percent = trigger_percent;
        self
    }

    pub fn records(&self) -> &[Bar] {
        &self.records
    }

    /// The buffered side waiting for confirmation, if any.
    pub fn pending_side(&self) -> Result<Option<PriceAction>, TradeGenError> {
        let mut pending = None;
        for record in &self.records {
            let sig = record.signal(self.sig_type);
            if sig.is_wait() {
                continue;
            }
            match pending {
                None => pending = Some(sig),
                Some(p) if p != sig => {
                    return Err(TradeGenError::InconsistentSignal {
                        pending: p,
                        found: sig,
                    });
                }
                Some(_) => {}
            }
        }
        Ok(pending)
    }

    /// Drop buffered bars once nothing is held.
    pub fn reset_records(&mut self, ledger: &Ledger) {
        if ledger.is_empty() {
            self.records.clear();
        }
    }

    /// Replace the buffer with a single pending `action` seen on `bar`.
    pub(crate) fn seed(&mut self, bar: &Bar, action: PriceAction) {
        let mut record = bar.clone();
        match self.sig_type {
            SigType::Entry => record.entry_signal = action,
            SigType::Exit => record.exit_signal = action,
        }
        self.records = vec![record];
    }

    /// Feed one bar and return a confirmation if one is due.
    ///
    /// An open-price confirmation executes before the bar's own signal is
    /// known, so only a breakout buffer can be contradicted while pending.
    pub fn evaluate(&mut self, bar: &Bar) -> Result<Option<Confirmation>, TradeGenError> {
        let sig = bar.signal(self.sig_type);
        match self.method {
            SigEvalMethod::Close => Ok(self.eval_close(bar, sig)),
            SigEvalMethod::Open => self.eval_open(bar, sig),
            SigEvalMethod::Breakout => self.eval_breakout(bar, sig),
        }
    }

    fn eval_close(&mut self, bar: &Bar, sig: PriceAction) -> Option<Confirmation> {
        self.records.clear();
        (!sig.is_wait()).then(|| Confirmation {
            dt: bar.date,
            action: sig,
            price: bar.close,
        })
    }

    fn eval_open(&mut self, bar: &Bar, sig: PriceAction) -> Result<Option<Confirmation>, TradeGenError> {
        let Some(pending) = self.pending_side()? else {
            self.buffer_fresh(bar, sig);
            return Ok(None);
        };
        self.buffer_fresh(bar, sig);
        Ok(Some(Confirmation {
            dt: bar.date,
            action: pending,
            price: bar.open,
        }))
    }

    fn eval_breakout(&mut self, bar: &Bar, sig: PriceAction) -> Result<Option<Confirmation>, TradeGenError> {
        let pending = self.pending_side()?;
        if let Some(pending) = pending {
            if !sig.is_wait() && sig != pending {
                return Err(TradeGenError::InconsistentSignal {
                    pending,
                    found: sig,
                });
            }
        }
        let (Some(pending), Some(prev)) = (pending, self.records.last()) else {
            self.buffer_fresh(bar, sig);
            return Ok(None);
        };

        let broken = match pending {
            PriceAction::Buy => bar.high > prev.high,
            PriceAction::Sell => bar.low < prev.low,
            PriceAction::Wait => false,
        };
        if !broken {
            self.records.push(bar.clone());
            return Ok(None);
        }

        let price = self.breakout_price(pending, prev, bar);
        self.buffer_fresh(bar, sig);
        Ok(Some(Confirmation {
            dt: bar.date,
            action: pending,
            price,
        }))
    }

    /// Level one tick (or `trigger_percent`) beyond the previous extreme,
    /// or the open when the bar gaps straight through it.
    fn breakout_price(&self, action: PriceAction, prev: &Bar, bar: &Bar) -> Decimal {
        let tick = Decimal::new(1, 2);
        let price = match action {
            PriceAction::Sell => {
                let level = match self.trigger_percent {
                    Some(pct) => prev.low * (Decimal::ONE - pct),
                    None => prev.low - tick,
                };
                if bar.open < level { bar.open } else { level }
            }
            _ => {
                let level = match self.trigger_percent {
                    Some(pct) => prev.high * (Decimal::ONE + pct),
                    None => prev.high + tick,
                };
                if bar.open > level { bar.open } else { level }
            }
        };
        price.round_dp(2)
    }

    /// Restart the buffer from `bar` when it carries a fresh signal.
    fn buffer_fresh(&mut self, bar: &Bar, sig: PriceAction) {
        self.records.clear();
        if !sig.is_wait() {
            self.records.push(bar.clone());
        }
    }
}
