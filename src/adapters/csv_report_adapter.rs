//! CSV report adapter: `<TICKER>_trades.csv` and `<TICKER>_signals.csv`.

use crate::domain::error::TradeGenError;
use crate::domain::gen_trades::SignalRow;
use crate::domain::trade::CompletedTrade;
use crate::ports::report_port::ReportPort;
use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TRADE_COLUMNS: [&str; 14] = [
    "ticker",
    "entry_datetime",
    "entry_action",
    "entry_lots",
    "entry_price",
    "exit_datetime",
    "exit_action",
    "exit_lots",
    "exit_price",
    "days_held",
    "profit_loss",
    "percent_ret",
    "daily_ret",
    "win",
];

const SIGNAL_COLUMNS: [&str; 13] = [
    "ticker",
    "date",
    "open",
    "high",
    "low",
    "close",
    "entry_signal",
    "exit_signal",
    "stop",
    "stop_price",
    "stop_triggered",
    "trail_price",
    "trail_triggered",
];

pub struct CsvReportAdapter {
    output_dir: PathBuf,
}

impl CsvReportAdapter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    pub fn trades_path(&self, ticker: &str) -> PathBuf {
        self.output_dir.join(format!("{ticker}_trades.csv"))
    }

    pub fn signals_path(&self, ticker: &str) -> PathBuf {
        self.output_dir.join(format!("{ticker}_signals.csv"))
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<(), TradeGenError> {
        fs::create_dir_all(&self.output_dir)?;
        fs::write(path, content)?;
        tracing::info!(path = %path.display(), "report written");
        Ok(())
    }
}

fn fmt_dt(dt: NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

fn fmt_opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn csv_error(e: impl std::fmt::Display) -> TradeGenError {
    TradeGenError::Data {
        reason: format!("CSV write error: {e}"),
    }
}

/// Render completed trades, one row per record.
pub fn trades_csv(trades: &[CompletedTrade]) -> Result<String, TradeGenError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(TRADE_COLUMNS).map_err(csv_error)?;

    for t in trades {
        wtr.write_record([
            t.ticker.clone(),
            fmt_dt(t.entry_datetime),
            t.entry_action.to_string(),
            t.entry_lots.to_string(),
            t.entry_price.to_string(),
            fmt_dt(t.exit_datetime),
            t.exit_action.to_string(),
            t.exit_lots.to_string(),
            t.exit_price.to_string(),
            t.days_held.to_string(),
            t.profit_loss.to_string(),
            t.percent_ret.to_string(),
            t.daily_ret.to_string(),
            u8::from(t.win).to_string(),
        ])
        .map_err(csv_error)?;
    }

    let data = wtr.into_inner().map_err(csv_error)?;
    String::from_utf8(data).map_err(csv_error)
}

/// Render the annotated bar stream.
pub fn signals_csv(signals: &[SignalRow]) -> Result<String, TradeGenError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(SIGNAL_COLUMNS).map_err(csv_error)?;

    for row in signals {
        let bar = &row.bar;
        wtr.write_record([
            bar.ticker.clone(),
            fmt_dt(bar.date),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.entry_signal.to_string(),
            bar.exit_signal.to_string(),
            fmt_opt(bar.stop),
            fmt_opt(row.stop_price),
            fmt_opt(row.stop_triggered),
            fmt_opt(row.trail_price),
            fmt_opt(row.trail_triggered),
        ])
        .map_err(csv_error)?;
    }

    let data = wtr.into_inner().map_err(csv_error)?;
    String::from_utf8(data).map_err(csv_error)
}

impl ReportPort for CsvReportAdapter {
    fn write_trades(&self, ticker: &str, trades: &[CompletedTrade]) -> Result<(), TradeGenError> {
        self.write_file(&self.trades_path(ticker), &trades_csv(trades)?)
    }

    fn write_signals(&self, ticker: &str, signals: &[SignalRow]) -> Result<(), TradeGenError> {
        self.write_file(&self.signals_path(ticker), &signals_csv(signals)?)
    }
}
