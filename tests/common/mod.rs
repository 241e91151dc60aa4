#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::collections::HashMap;
use tradegen::domain::action::PriceAction;
use tradegen::domain::backtest::BacktestConfig;
use tradegen::domain::bar::Bar;
use tradegen::domain::config::{RiskConfig, TradingConfig};
use tradegen::domain::error::TradeGenError;
use tradegen::domain::gen_trades::SignalRow;
use tradegen::domain::signal_eval::SigEvalMethod;
use tradegen::domain::trade::CompletedTrade;
use tradegen::ports::data_port::DataPort;
use tradegen::ports::report_port::ReportPort;

pub use tradegen::domain::action::PriceAction::{Buy, Sell, Wait};

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(&self, ticker: &str) -> Result<Vec<Bar>, TradeGenError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(TradeGenError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(ticker).cloned().unwrap_or_default())
    }

    fn list_tickers(&self) -> Result<Vec<String>, TradeGenError> {
        let mut tickers: Vec<String> = self.data.keys().cloned().collect();
        tickers.sort();
        Ok(tickers)
    }
}

/// Records every write instead of touching the filesystem.
#[derive(Default)]
pub struct MockReportPort {
    pub trades: RefCell<Vec<(String, Vec<CompletedTrade>)>>,
    pub signals: RefCell<Vec<(String, usize)>>,
}

impl ReportPort for MockReportPort {
    fn write_trades(&self, ticker: &str, trades: &[CompletedTrade]) -> Result<(), TradeGenError> {
        self.trades
            .borrow_mut()
            .push((ticker.to_string(), trades.to_vec()));
        Ok(())
    }

    fn write_signals(&self, ticker: &str, signals: &[SignalRow]) -> Result<(), TradeGenError> {
        self.signals
            .borrow_mut()
            .push((ticker.to_string(), signals.len()));
        Ok(())
    }
}

/// Midnight of the `n`th day after 2025-01-01.
pub fn day(n: i64) -> NaiveDateTime {
    let start = NaiveDate::from_ymd_opt(2025, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    start + Duration::days(n)
}

pub fn make_bar(
    ticker: &str,
    n: i64,
    ohlc: [Decimal; 4],
    entry: PriceAction,
    exit: PriceAction,
) -> Bar {
    Bar {
        ticker: ticker.to_string(),
        date: day(n),
        open: ohlc[0],
        high: ohlc[1],
        low: ohlc[2],
        close: ohlc[3],
        entry_signal: entry,
        exit_signal: exit,
        stop: None,
    }
}

/// Bar opening and closing at `price` with a one-point range either side.
pub fn flat_bar(ticker: &str, n: i64, price: Decimal, entry: PriceAction, exit: PriceAction) -> Bar {
    make_bar(
        ticker,
        n,
        [price, price + Decimal::ONE, price - Decimal::ONE, price],
        entry,
        exit,
    )
}

/// Consecutive daily flat bars from `(price, entry, exit)` rows.
pub fn script(ticker: &str, rows: &[(Decimal, PriceAction, PriceAction)]) -> Vec<Bar> {
    rows.iter()
        .enumerate()
        .map(|(i, &(price, entry, exit))| flat_bar(ticker, i as i64, price, entry, exit))
        .collect()
}

pub fn config_with(sig_eval_method: SigEvalMethod) -> BacktestConfig {
    BacktestConfig {
        trading: TradingConfig::default(),
        risk: RiskConfig {
            sig_eval_method,
            ..RiskConfig::default()
        },
    }
}

pub fn lots_closed(trades: &[CompletedTrade]) -> Decimal {
    trades.iter().map(|t| t.exit_lots).sum()
}
