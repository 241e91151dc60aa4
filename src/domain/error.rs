//! Domain error types.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use super::action::PriceAction;

/// Rejection raised while building or mutating a single [`Trade`](super::trade::Trade).
///
/// Entry strategies treat these as recoverable: the offending trade is
/// dropped and the ledger is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("entry lots must be positive, got {lots}")]
    NonPositiveLots { lots: Decimal },

    #[error("{field} must be positive, got {price}")]
    NonPositivePrice { field: &'static str, price: Decimal },

    #[error("exit at {exit} precedes entry at {entry}")]
    ExitBeforeEntry {
        entry: NaiveDateTime,
        exit: NaiveDateTime,
    },

    #[error("exit lots {exit_lots} exceed entry lots {entry_lots}")]
    ExcessExitLots {
        entry_lots: Decimal,
        exit_lots: Decimal,
    },

    #[error("exit lots must not be negative, got {exit_lots}")]
    NegativeExitLots { exit_lots: Decimal },
}

/// Top-level error type for tradegen.
#[derive(Debug, thiserror::Error)]
pub enum TradeGenError {
    #[error("ticker '{found}' does not match ledger ticker '{expected}'")]
    InconsistentTicker { expected: String, found: String },

    #[error("entry action '{found}' does not match ledger action '{expected}'")]
    InconsistentSide {
        expected: PriceAction,
        found: PriceAction,
    },

    #[error("entry at {entry} is earlier than latest open entry at {latest}")]
    NonChronologicalEntry {
        latest: NaiveDateTime,
        entry: NaiveDateTime,
    },

    #[error("trade entered at {entry_datetime} is completed but still held in the ledger")]
    CompletedInLedger { entry_datetime: NaiveDateTime },

    #[error("ledger holds more than one distinct value for '{field}'")]
    InconsistentField { field: &'static str },

    #[error("no open positions available")]
    EmptyLedger,

    #[error("{remaining} open positions left after closing all positions")]
    IncompleteClosure { remaining: usize },

    #[error("no open position entered at {entry_datetime}")]
    PositionNotFound { entry_datetime: NaiveDateTime },

    #[error("signal '{found}' contradicts pending '{pending}' signal")]
    InconsistentSignal {
        pending: PriceAction,
        found: PriceAction,
    },

    #[error("stop level {stop} is invalid for '{action}' entry at {entry_price}")]
    InvalidStopLevel {
        action: PriceAction,
        entry_price: Decimal,
        stop: Decimal,
    },

    #[error("bar at {date} has no stop level for a fixed-exit entry")]
    MissingStop { date: NaiveDateTime },

    #[error("bars contain more than one ticker: '{first}' and '{other}'")]
    MultipleTickers { first: String, other: String },

    #[error("bars are not in strictly increasing date order at {date}")]
    UnsortedBars { date: NaiveDateTime },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {ticker}")]
    NoData { ticker: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TradeGenError> for std::process::ExitCode {
    fn from(err: &TradeGenError) -> Self {
        let code: u8 = match err {
            TradeGenError::Io(_) => 1,
            TradeGenError::ConfigParse { .. }
            | TradeGenError::ConfigMissing { .. }
            | TradeGenError::ConfigInvalid { .. } => 2,
            TradeGenError::Data { .. }
            | TradeGenError::NoData { .. }
            | TradeGenError::MultipleTickers { .. }
            | TradeGenError::UnsortedBars { .. }
            | TradeGenError::MissingStop { .. } => 3,
            _ => 4,
        };
        std::process::ExitCode::from(code)
    }
}
