//! CSV file data adapter.
//!
//! One file per ticker, `<data_dir>/<TICKER>.csv`, located by header name:
//! `date, open, high, low, close, entry_signal, exit_signal`, plus optional
//! `ticker` and `stop` columns.

use crate::domain::action::PriceAction;
use crate::domain::bar::{Bar, parse_datetime};
use crate::domain::error::TradeGenError;
use crate::ports::data_port::DataPort;
use rust_decimal::Decimal;
use std::fs;
use std::path::PathBuf;

const REQUIRED_COLUMNS: [&str; 7] = [
    "date",
    "open",
    "high",
    "low",
    "close",
    "entry_signal",
    "exit_signal",
];

/// File suffixes written by the report adapter, never treated as inputs.
const REPORT_SUFFIXES: [&str; 2] = ["_trades.csv", "_signals.csv"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

/// Column positions resolved from the header row.
struct Columns {
    required: [usize; 7],
    ticker: Option<usize>,
    stop: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, TradeGenError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let mut required = [0; 7];
        for (slot, name) in required.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = find(name).ok_or_else(|| TradeGenError::Data {
                reason: format!("missing {name} column"),
            })?;
        }
        Ok(Self {
            required,
            ticker: find("ticker"),
            stop: find("stop"),
        })
    }
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}.csv"))
    }

    fn parse_record(
        record: &csv::StringRecord,
        cols: &Columns,
        ticker: &str,
        line: usize,
    ) -> Result<Bar, TradeGenError> {
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();
        let [date_col, open, high, low, close, entry, exit] = cols.required;

        let date = parse_datetime(field(date_col)).ok_or_else(|| TradeGenError::Data {
            reason: format!("line {line}: invalid date '{}'", field(date_col)),
        })?;
        let price = |idx: usize, name: &str| -> Result<Decimal, TradeGenError> {
            field(idx).parse().map_err(|e| TradeGenError::Data {
                reason: format!("line {line}: invalid {name} value: {e}"),
            })
        };
        let action = |idx: usize, name: &str| -> Result<PriceAction, TradeGenError> {
            field(idx).parse().map_err(|e| TradeGenError::Data {
                reason: format!("line {line}: invalid {name}: {e}"),
            })
        };
        let stop = match cols.stop.map(field).filter(|s| !s.is_empty()) {
            Some(raw) => Some(raw.parse().map_err(|e| TradeGenError::Data {
                reason: format!("line {line}: invalid stop value: {e}"),
            })?),
            None => None,
        };
        let ticker = cols
            .ticker
            .map(field)
            .filter(|s| !s.is_empty())
            .unwrap_or(ticker);

        Ok(Bar {
            ticker: ticker.to_string(),
            date,
            open: price(open, "open")?,
            high: price(high, "high")?,
            low: price(low, "low")?,
            close: price(close, "close")?,
            entry_signal: action(entry, "entry_signal")?,
            exit_signal: action(exit, "exit_signal")?,
            stop,
        })
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self, ticker: &str) -> Result<Vec<Bar>, TradeGenError> {
        let path = self.csv_path(ticker);
        let content = fs::read_to_string(&path).map_err(|e| TradeGenError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| TradeGenError::Data {
            reason: format!("CSV header error: {}", e),
        })?;
        let cols = Columns::from_headers(headers)?;

        let mut bars = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| TradeGenError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;
            // header is line 1
            bars.push(Self::parse_record(&record, &cols, ticker, i + 2)?);
        }

        bars.sort_by_key(|b| b.date);
        tracing::debug!(%ticker, bars = bars.len(), path = %path.display(), "loaded bars");
        Ok(bars)
    }

    fn list_tickers(&self) -> Result<Vec<String>, TradeGenError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| TradeGenError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut tickers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TradeGenError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if REPORT_SUFFIXES.iter().any(|s| name_str.ends_with(s)) {
                continue;
            }
            if let Some(ticker) = name_str.strip_suffix(".csv") {
                tickers.push(ticker.to_string());
            }
        }

        tickers.sort();
        Ok(tickers)
    }
}
