//! Per-ticker trade generation loop.
//!
//! Walks the bars once, in order. The last bar force-closes everything;
//! every other bar runs, in this order:
//!
//! 1. stop-loss check
//! 2. profit check (exit signal, or fixed brackets)
//! 3. time-based exit, when a holding period is configured
//! 4. trailing-profit check
//! 5. new-position check (entry signal)

use std::collections::HashMap;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use super::action::{PriceAction, SigType};
use super::bar::{Bar, Crossing};
use super::config::{RiskConfig, TradingConfig, effective_time_period};
use super::entry::EntryStruct;
use super::error::TradeGenError;
use super::exit::{ExitMethod, ExitStruct, take_all};
use super::fixed_exit::FixedExit;
use super::ledger::Ledger;
use super::signal_eval::{Confirmation, SigEvalMethod, SignalEvaluator};
use super::stop::{StopLoss, StopMethod};
use super::trade::CompletedTrade;
use super::trail::{FirstTrail, TrailMethod};

/// One stop or trailing-level evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerInfo {
    pub date: NaiveDateTime,
    pub price: Decimal,
    pub triggered: bool,
}

/// Input bar annotated with the stop and trailing levels checked on it.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRow {
    pub bar: Bar,
    pub stop_price: Option<Decimal>,
    pub stop_triggered: Option<bool>,
    pub trail_price: Option<Decimal>,
    pub trail_triggered: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeRun {
    pub trades: Vec<CompletedTrade>,
    pub signals: Vec<SignalRow>,
}

#[derive(Debug, Clone, Copy)]
enum TriggerKind {
    Stop,
    Trail,
}

/// Trade generator for a single ticker.
///
/// Strategy objects are built on first use and reused for the rest of the
/// run.
#[derive(Debug)]
pub struct GenTrades {
    trading: TradingConfig,
    risk: RiskConfig,
    ledger: Ledger,
    completed: Vec<CompletedTrade>,
    stop_info: Vec<TriggerInfo>,
    trail_info: Vec<TriggerInfo>,
    entry_eval: SignalEvaluator,
    exit_eval: SignalEvaluator,
    flip_eval: Option<SignalEvaluator>,
    entry: Option<EntryStruct>,
    exit: Option<ExitStruct>,
    time_exit: Option<ExitStruct>,
    stop_loss: Option<StopLoss>,
    trail: Option<FirstTrail>,
    fixed_exit: Option<FixedExit>,
    /// Bar on which a reversal closed the ledger; the reversed position
    /// opens at the next bar's open.
    flip: Option<NaiveDateTime>,
}

impl GenTrades {
    pub fn new(trading: TradingConfig, risk: RiskConfig) -> Self {
        let entry_eval = evaluator(&risk, SigType::Entry);
        let exit_eval = evaluator(&risk, SigType::Exit);
        Self {
            trading,
            risk,
            ledger: Ledger::new(),
            completed: Vec::new(),
            stop_info: Vec::new(),
            trail_info: Vec::new(),
            entry_eval,
            exit_eval,
            flip_eval: None,
            entry: None,
            exit: None,
            time_exit: None,
            stop_loss: None,
            trail: None,
            fixed_exit: None,
            flip: None,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn is_flipping(&self) -> bool {
        self.flip.is_some()
    }

    /// Run the whole bar series and return completed trades plus the
    /// annotated bars.
    pub fn gen_trades(&mut self, bars: &[Bar]) -> Result<TradeRun, TradeGenError> {
        *self = Self::new(self.trading.clone(), self.risk.clone());
        validate_bars(bars)?;
        let Some((last, body)) = bars.split_last() else {
            return Ok(TradeRun::default());
        };

        for bar in body {
            self.check_stop_loss(bar)?;
            self.check_profit(bar)?;
            self.check_time_exit(bar)?;
            self.check_trailing_profit(bar)?;
            self.check_new_pos(&bar.ticker, bar)?;
            tracing::debug!(
                date = %bar.date,
                net_position = %self.ledger.net_position(),
                completed = self.completed.len(),
                "bar processed"
            );
        }
        self.exit_all_end(last)?;

        Ok(TradeRun {
            trades: std::mem::take(&mut self.completed),
            signals: self.annotate(bars),
        })
    }

    /// Close whatever is still open at the final bar's close.
    pub fn exit_all_end(&mut self, bar: &Bar) -> Result<(), TradeGenError> {
        if self.ledger.is_empty() {
            return Ok(());
        }
        self.exit_all(bar.date, bar.close)
    }

    /// Stop-loss check: closes the whole ledger when the stop is breached,
    /// or each fixed bracket whose stop is breached.
    pub fn check_stop_loss(&mut self, bar: &Bar) -> Result<(), TradeGenError> {
        if self.ledger.is_empty() {
            return Ok(());
        }
        if self.trading.exit_struct == ExitMethod::Fixed {
            let monitor_close = self.trading.monitor_close;
            let fixed = self
                .fixed_exit
                .get_or_insert_with(|| FixedExit::new(monitor_close));
            let done = fixed.check_all_stop(&mut self.ledger, bar)?;
            return self.settle(done);
        }
        if self.risk.stop_method == StopMethod::NoStop {
            return Ok(());
        }

        let risk = &self.risk;
        let stop = self
            .stop_loss
            .get_or_insert_with(|| StopLoss::new(risk.stop_method, risk.percent_loss));
        let Some(level) = stop.cal_exit_price(&self.ledger)? else {
            return Ok(());
        };
        self.update_trigger_status(bar, level, TriggerKind::Stop)
    }

    /// Profit check driven by the exit signal (or fixed profit targets).
    ///
    /// An exit confirmed on the side of a pending entry is a reversal: the
    /// whole ledger is closed and the opposite position is opened at the
    /// next bar's open.
    pub fn check_profit(&mut self, bar: &Bar) -> Result<(), TradeGenError> {
        if self.ledger.is_empty() {
            return Ok(());
        }
        if self.trading.exit_struct == ExitMethod::Fixed {
            let monitor_close = self.trading.monitor_close;
            let fixed = self
                .fixed_exit
                .get_or_insert_with(|| FixedExit::new(monitor_close));
            let done = fixed.check_all_profit(&mut self.ledger, bar)?;
            return self.settle(done);
        }

        let Some(confirmed) = self.exit_eval.evaluate(bar)? else {
            return Ok(());
        };
        let side = self.ledger.side()?;
        if confirmed.action != side.opposite() {
            tracing::debug!(date = %bar.date, action = %confirmed.action, "ignoring exit on the open side");
            return Ok(());
        }

        if self.is_reversal(bar, confirmed.action)? {
            self.exit_all(confirmed.dt, confirmed.price)?;
            self.arm_flip(bar, confirmed.action);
            return Ok(());
        }
        self.take_profit(confirmed)
    }

    /// Apply the configured exit strategy at the confirmed price.
    pub fn take_profit(&mut self, confirmed: Confirmation) -> Result<(), TradeGenError> {
        let side = self.ledger.side()?;
        if confirmed.action.is_wait() || confirmed.action == side {
            return Ok(());
        }
        let trading = &self.trading;
        let time_period = effective_time_period(trading, &self.risk);
        let exit = self.exit.get_or_insert_with(|| {
            let exit = ExitStruct::new(trading.exit_struct);
            match time_period {
                Some(period) => exit.with_time_period(period),
                None => exit,
            }
        });
        let done = exit.close_pos(&mut self.ledger, confirmed.dt, confirmed.price)?;
        self.settle(done)
    }

    /// Close trades held for the configured number of days at the close.
    pub fn check_time_exit(&mut self, bar: &Bar) -> Result<(), TradeGenError> {
        let Some(period) = effective_time_period(&self.trading, &self.risk) else {
            return Ok(());
        };
        if self.ledger.is_empty() {
            return Ok(());
        }
        let time_exit = self
            .time_exit
            .get_or_insert_with(|| ExitStruct::new(ExitMethod::FixedTime).with_time_period(period));
        let done = time_exit.close_pos(&mut self.ledger, bar.date, bar.close)?;
        self.settle(done)
    }

    /// Trailing-profit check: closes the whole ledger once price falls back
    /// through the trailing level.
    pub fn check_trailing_profit(&mut self, bar: &Bar) -> Result<(), TradeGenError> {
        if self.ledger.is_empty() || self.risk.trail_method == TrailMethod::NoTrail {
            return Ok(());
        }
        let risk = &self.risk;
        let trail = self
            .trail
            .get_or_insert_with(|| FirstTrail::new(risk.trigger_trail, risk.step));
        let Some(level) = trail.cal_trail_price(&self.ledger, bar)? else {
            return Ok(());
        };
        self.update_trigger_status(bar, level, TriggerKind::Trail)
    }

    /// Entry check: opens a position on a confirmed entry signal.
    pub fn check_new_pos(&mut self, ticker: &str, bar: &Bar) -> Result<(), TradeGenError> {
        if let Some(armed) = self.flip {
            if armed == bar.date {
                return Ok(());
            }
            // signals on the re-entry bar are not acted upon
            self.flip = None;
            let Some(flip_eval) = self.flip_eval.as_mut() else {
                return Ok(());
            };
            return match flip_eval.evaluate(bar)? {
                Some(confirmed) => self.open_position(ticker, bar, confirmed),
                None => Ok(()),
            };
        }

        let Some(confirmed) = self.entry_eval.evaluate(bar)? else {
            return Ok(());
        };
        self.open_position(ticker, bar, confirmed)
    }

    fn open_position(
        &mut self,
        ticker: &str,
        bar: &Bar,
        confirmed: Confirmation,
    ) -> Result<(), TradeGenError> {
        if let Some(last) = self.ledger.last() {
            if last.entry_action() != confirmed.action {
                tracing::debug!(date = %bar.date, action = %confirmed.action, "ignoring entry against the open side");
                return Ok(());
            }
        }
        let trading = &self.trading;
        let entry = self
            .entry
            .get_or_insert_with(|| EntryStruct::new(trading.entry_struct, trading.num_lots));
        let lots = entry.open_new_pos(
            &mut self.ledger,
            ticker,
            confirmed.dt,
            confirmed.action,
            confirmed.price,
        )?;

        if lots > Decimal::ZERO && self.trading.exit_struct == ExitMethod::Fixed {
            let stop = bar.stop.ok_or(TradeGenError::MissingStop { date: bar.date })?;
            let trade = self.ledger.last().ok_or(TradeGenError::EmptyLedger)?;
            let monitor_close = self.trading.monitor_close;
            self.fixed_exit
                .get_or_insert_with(|| FixedExit::new(monitor_close))
                .update_exit_levels(trade, stop)?;
        }
        Ok(())
    }

    /// Force-close the whole ledger and reset per-position state.
    fn exit_all(&mut self, dt: NaiveDateTime, price: Decimal) -> Result<(), TradeGenError> {
        let done = take_all(&mut self.ledger, dt, price)?;
        tracing::debug!(%dt, %price, closed = done.len(), "closed all positions");
        self.completed.extend(done);
        if let Some(fixed) = self.fixed_exit.as_mut() {
            fixed.clear();
        }
        self.flip = None;
        self.reset_flat_state();
        Ok(())
    }

    /// Record closed trades and drop state tied to trades no longer held.
    fn settle(&mut self, done: Vec<CompletedTrade>) -> Result<(), TradeGenError> {
        if done.is_empty() {
            return Ok(());
        }
        self.completed.extend(done);
        if let Some(fixed) = self.fixed_exit.as_mut() {
            fixed.retain_open(&self.ledger);
        }
        if self.ledger.is_empty() {
            self.reset_flat_state();
        }
        Ok(())
    }

    /// A flat ledger invalidates every buffered confirmation, so nothing
    /// fills later on the bar that closed the position.
    fn reset_flat_state(&mut self) {
        self.entry_eval.reset_records(&self.ledger);
        self.exit_eval.reset_records(&self.ledger);
        if let Some(trail) = self.trail.as_mut() {
            trail.reset_price_levels();
        }
    }

    fn update_trigger_status(
        &mut self,
        bar: &Bar,
        level: Decimal,
        kind: TriggerKind,
    ) -> Result<(), TradeGenError> {
        let side = self.ledger.side()?;
        let exit_price = bar.crossing_price(side, level, Crossing::Adverse, self.trading.monitor_close);
        let info = TriggerInfo {
            date: bar.date,
            price: level,
            triggered: exit_price.is_some(),
        };
        match kind {
            TriggerKind::Stop => self.stop_info.push(info),
            TriggerKind::Trail => self.trail_info.push(info),
        }
        match exit_price {
            Some(price) => {
                tracing::debug!(date = %bar.date, ?kind, %level, %price, "level breached");
                self.exit_all(bar.date, price)
            }
            None => Ok(()),
        }
    }

    /// A confirmed exit matching the entry side that is about to be taken.
    fn is_reversal(&self, bar: &Bar, exit_action: PriceAction) -> Result<bool, TradeGenError> {
        if bar.entry_signal == exit_action {
            return Ok(true);
        }
        Ok(self.entry_eval.pending_side()? == Some(exit_action))
    }

    fn arm_flip(&mut self, bar: &Bar, action: PriceAction) {
        let flip_eval = self
            .flip_eval
            .get_or_insert_with(|| SignalEvaluator::new(SigEvalMethod::Open, SigType::Entry));
        flip_eval.seed(bar, action);
        self.flip = Some(bar.date);
        tracing::debug!(date = %bar.date, %action, "reversal armed");
    }

    fn annotate(&self, bars: &[Bar]) -> Vec<SignalRow> {
        let stops: HashMap<NaiveDateTime, &TriggerInfo> =
            self.stop_info.iter().map(|i| (i.date, i)).collect();
        let trails: HashMap<NaiveDateTime, &TriggerInfo> =
            self.trail_info.iter().map(|i| (i.date, i)).collect();

        bars.iter()
            .map(|bar| {
                let stop = stops.get(&bar.date);
                let trail = trails.get(&bar.date);
                SignalRow {
                    bar: bar.clone(),
                    stop_price: stop.map(|i| i.price),
                    stop_triggered: stop.map(|i| i.triggered),
                    trail_price: trail.map(|i| i.price),
                    trail_triggered: trail.map(|i| i.triggered),
                }
            })
            .collect()
    }
}

fn evaluator(risk: &RiskConfig, sig_type: SigType) -> SignalEvaluator {
    SignalEvaluator::new(risk.sig_eval_method, sig_type).with_trigger_percent(risk.trigger_percent)
}

/// Bars must belong to one ticker and be in strictly increasing date order.
pub fn validate_bars(bars: &[Bar]) -> Result<(), TradeGenError> {
    let Some(first) = bars.first() else {
        return Ok(());
    };
    for (prev, bar) in bars.iter().zip(bars.iter().skip(1)) {
        if bar.ticker != first.ticker {
            return Err(TradeGenError::MultipleTickers {
                first: first.ticker.clone(),
                other: bar.ticker.clone(),
            });
        }
        if bar.date <= prev.date {
            return Err(TradeGenError::UnsortedBars { date: bar.date });
        }
    }
    Ok(())
}
