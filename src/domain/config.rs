//! Trading and risk parameters for one trade-generation run.

use rust_decimal::Decimal;

use super::entry::EntryMethod;
use super::exit::{DEFAULT_TIME_PERIOD, ExitMethod};
use super::signal_eval::SigEvalMethod;
use super::stop::StopMethod;
use super::trail::TrailMethod;

#[derive(Debug, Clone, PartialEq)]
pub struct TradingConfig {
    pub entry_struct: EntryMethod,
    pub exit_struct: ExitMethod,
    pub num_lots: u32,
    /// Compare stop/trail levels against the close instead of the bar range.
    pub monitor_close: bool,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            entry_struct: EntryMethod::Multi,
            exit_struct: ExitMethod::Fifo,
            num_lots: 10,
            monitor_close: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub sig_eval_method: SigEvalMethod,
    pub trigger_percent: Option<Decimal>,
    pub percent_loss: Decimal,
    pub stop_method: StopMethod,
    pub trail_method: TrailMethod,
    pub trigger_trail: Decimal,
    pub step: Option<Decimal>,
    pub time_period: Option<i64>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            sig_eval_method: SigEvalMethod::Open,
            trigger_percent: None,
            percent_loss: Decimal::new(5, 2),
            stop_method: StopMethod::NoStop,
            trail_method: TrailMethod::NoTrail,
            trigger_trail: Decimal::new(2, 1),
            step: None,
            time_period: None,
        }
    }
}

/// Holding period enforced each bar, if any.
///
/// `FixedTimeExit` implies the default period when none is configured.
pub fn effective_time_period(trading: &TradingConfig, risk: &RiskConfig) -> Option<i64> {
    match (risk.time_period, trading.exit_struct) {
        (Some(period), _) => Some(period),
        (None, ExitMethod::FixedTime) => Some(DEFAULT_TIME_PERIOD),
        (None, _) => None,
    }
}
