//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig};
use crate::domain::bar::Bar;
use crate::domain::config::{RiskConfig, TradingConfig};
use crate::domain::config_validation::{
    parse_value, validate_data_config, validate_risk_config, validate_trading_config,
};
use crate::domain::error::TradeGenError;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "tradegen", about = "Signal-driven trade generation backtester")]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate trades for every configured ticker
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Run a single ticker instead of the configured list
        #[arg(short, long)]
        ticker: Option<String>,
        /// Directory for the trades and signals CSV files
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List tickers with bar files in a data directory
    ListTickers {
        #[arg(short, long)]
        data_dir: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.verbose);
    match cli.command {
        Command::Backtest {
            config,
            ticker,
            output,
            dry_run,
        } => run_backtest(&config, ticker.as_deref(), output.as_ref(), dry_run),
        Command::Validate { config } => run_validate(&config),
        Command::ListTickers { data_dir } => run_list_tickers(&data_dir),
    }
}

/// Install the stderr subscriber. A second call (e.g. from tests) is a no-op.
pub fn init_logging(verbose: bool) {
    let fallback = if verbose { "tradegen=debug" } else { "tradegen=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = TradeGenError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

pub fn validate_config(adapter: &dyn ConfigPort) -> Result<(), TradeGenError> {
    validate_data_config(adapter)?;
    validate_trading_config(adapter)?;
    validate_risk_config(adapter)?;
    Ok(())
}

fn run_backtest(
    config_path: &Path,
    ticker_override: Option<&str>,
    output_path: Option<&PathBuf>,
    dry_run: bool,
) -> ExitCode {
    // Stage 1: Load config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    // Stage 2: Validate
    if let Err(e) = validate_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    // Stage 3: Build BacktestConfig
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 4: Resolve tickers against the data directory
    let data_dir = adapter
        .get_string("data", "data_dir")
        .map(PathBuf::from)
        .unwrap_or_default();
    let data_port = CsvAdapter::new(data_dir);
    let tickers = match resolve_tickers(ticker_override, &adapter, &data_port) {
        Ok(t) if !t.is_empty() => t,
        Ok(_) => {
            eprintln!("error: no tickers configured or found in data directory");
            return ExitCode::from(3);
        }
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if dry_run {
        print_config(&bt_config);
        eprintln!("  tickers: {}", tickers.join(", "));
        eprintln!("\nDry run complete: configuration is valid");
        return ExitCode::SUCCESS;
    }

    // Stages 5-8: Data port dependent pipeline
    let output_dir = output_path
        .cloned()
        .or_else(|| adapter.get_string("output", "dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    let report_port = CsvReportAdapter::new(output_dir);

    run_backtest_pipeline(&data_port, &report_port, &bt_config, &tickers)
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, TradeGenError> {
    let trading_defaults = TradingConfig::default();
    let num_lots = adapter.get_int("trading", "num_lots", i64::from(trading_defaults.num_lots));
    let num_lots = u32::try_from(num_lots).map_err(|_| TradeGenError::ConfigInvalid {
        section: "trading".into(),
        key: "num_lots".into(),
        reason: format!("num_lots out of range: {num_lots}"),
    })?;

    let trading = TradingConfig {
        entry_struct: parse_value(adapter, "trading", "entry_struct")?
            .unwrap_or(trading_defaults.entry_struct),
        exit_struct: parse_value(adapter, "trading", "exit_struct")?
            .unwrap_or(trading_defaults.exit_struct),
        num_lots,
        monitor_close: adapter.get_bool("trading", "monitor_close", trading_defaults.monitor_close),
    };

    let risk_defaults = RiskConfig::default();
    let risk = RiskConfig {
        sig_eval_method: parse_value(adapter, "risk", "sig_eval_method")?
            .unwrap_or(risk_defaults.sig_eval_method),
        trigger_percent: parse_value(adapter, "risk", "trigger_percent")?,
        percent_loss: adapter.get_decimal("risk", "percent_loss", risk_defaults.percent_loss),
        stop_method: parse_value(adapter, "risk", "stop_method")?
            .unwrap_or(risk_defaults.stop_method),
        trail_method: parse_value(adapter, "risk", "trail_method")?
            .unwrap_or(risk_defaults.trail_method),
        trigger_trail: adapter.get_decimal("risk", "trigger_trail", risk_defaults.trigger_trail),
        step: parse_value(adapter, "risk", "step")?,
        time_period: parse_value(adapter, "risk", "time_period")?,
    };

    Ok(BacktestConfig { trading, risk })
}

/// `--ticker` wins, then `[data] tickers`, then every bar file on disk.
pub fn resolve_tickers(
    ticker_override: Option<&str>,
    config: &dyn ConfigPort,
    data_port: &dyn DataPort,
) -> Result<Vec<String>, TradeGenError> {
    if let Some(t) = ticker_override {
        let t = t.trim();
        return Ok(if t.is_empty() { vec![] } else { vec![t.to_string()] });
    }

    if let Some(list) = config.get_string("data", "tickers") {
        let tickers: Vec<String> = list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !tickers.is_empty() {
            return Ok(tickers);
        }
    }

    data_port.list_tickers()
}

pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    report_port: &dyn ReportPort,
    bt_config: &BacktestConfig,
    tickers: &[String],
) -> ExitCode {
    // Stage 5: Fetch bars
    let mut series: Vec<(String, Vec<Bar>)> = Vec::with_capacity(tickers.len());
    for ticker in tickers {
        match data_port.fetch_bars(ticker) {
            Ok(bars) if bars.is_empty() => {
                eprintln!("warning: skipping {} (no bars)", ticker);
            }
            Ok(bars) => series.push((ticker.clone(), bars)),
            Err(e) => {
                eprintln!("warning: skipping {} ({})", ticker, e);
            }
        }
    }

    if series.is_empty() {
        let err = TradeGenError::NoData {
            ticker: tickers.join(","),
        };
        eprintln!("error: {err}");
        return (&err).into();
    }

    // Stage 6: Generate trades
    eprintln!("Generating trades: {} tickers", series.len());
    let results = match backtest_engine::run_backtest(&series, bt_config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 7: Print console summary to stderr
    eprintln!("\n=== Per-Ticker Summary ===");
    for result in &results {
        let summary = result.summary();
        let sign = if summary.total_profit_loss.is_sign_negative() { "" } else { "+" };
        eprintln!(
            "  {}:  {} trades, {} wins, {}{}",
            result.ticker, summary.trades, summary.wins, sign, summary.total_profit_loss,
        );
    }

    // Stage 8: Write reports
    for result in &results {
        if let Err(e) = report_port.write_result(result) {
            eprintln!("error: failed to write report for {}: {e}", result.ticker);
            return (&e).into();
        }
    }

    ExitCode::SUCCESS
}

fn print_config(config: &BacktestConfig) {
    let trading = &config.trading;
    let risk = &config.risk;
    eprintln!("\nTrading:");
    eprintln!("  entry_struct:  {}", trading.entry_struct);
    eprintln!("  exit_struct:   {}", trading.exit_struct);
    eprintln!("  num_lots:      {}", trading.num_lots);
    eprintln!("  monitor_close: {}", trading.monitor_close);
    eprintln!("\nRisk:");
    eprintln!("  sig_eval_method: {}", risk.sig_eval_method);
    eprintln!("  stop_method:     {} ({})", risk.stop_method, risk.percent_loss);
    eprintln!("  trail_method:    {} ({})", risk.trail_method, risk.trigger_trail);
    if let Some(period) = risk.time_period {
        eprintln!("  time_period:     {} days", period);
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let built = validate_config(&adapter).and_then(|()| build_backtest_config(&adapter));
    match built {
        Ok(config) => {
            print_config(&config);
            eprintln!("\nConfiguration is valid.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_list_tickers(data_dir: &Path) -> ExitCode {
    let adapter = CsvAdapter::new(data_dir.to_path_buf());
    let tickers = match adapter.list_tickers() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    if tickers.is_empty() {
        eprintln!("No bar files found in {}", data_dir.display());
    } else {
        for ticker in &tickers {
            println!("{}", ticker);
        }
        eprintln!("{} tickers found", tickers.len());
    }
    ExitCode::SUCCESS
}
