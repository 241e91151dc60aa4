//! Multi-ticker backtest driver.
//!
//! Each ticker owns its own [`GenTrades`] instance, so tickers are processed
//! in parallel with no shared state.

use rayon::prelude::*;
use rust_decimal::Decimal;

use super::bar::Bar;
use super::config::{RiskConfig, TradingConfig};
use super::error::TradeGenError;
use super::gen_trades::{GenTrades, TradeRun};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BacktestConfig {
    pub trading: TradingConfig,
    pub risk: RiskConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickerResult {
    pub ticker: String,
    pub run: TradeRun,
}

impl TickerResult {
    pub fn summary(&self) -> TradeSummary {
        TradeSummary::from_run(&self.run)
    }
}

/// Headline counts for one ticker's completed trades.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TradeSummary {
    pub trades: usize,
    pub wins: usize,
    /// Sum of per-unit profit/loss weighted by lots.
    pub total_profit_loss: Decimal,
}

impl TradeSummary {
    pub fn from_run(run: &TradeRun) -> Self {
        let wins = run.trades.iter().filter(|t| t.win).count();
        let total_profit_loss = run
            .trades
            .iter()
            .map(|t| t.profit_loss * t.exit_lots)
            .sum();
        Self {
            trades: run.trades.len(),
            wins,
            total_profit_loss,
        }
    }
}

/// Generate trades for a single ticker's bars.
pub fn run_ticker(bars: &[Bar], config: &BacktestConfig) -> Result<TradeRun, TradeGenError> {
    let mut generator = GenTrades::new(config.trading.clone(), config.risk.clone());
    generator.gen_trades(bars)
}

/// Generate trades for every `(ticker, bars)` series in parallel.
///
/// Results keep the input order. The first failing ticker aborts the batch.
pub fn run_backtest(
    series: &[(String, Vec<Bar>)],
    config: &BacktestConfig,
) -> Result<Vec<TickerResult>, TradeGenError> {
    series
        .par_iter()
        .map(|(ticker, bars)| {
            let run = run_ticker(bars, config)?;
            tracing::info!(%ticker, trades = run.trades.len(), "generated trades");
            Ok(TickerResult {
                ticker: ticker.clone(),
                run,
            })
        })
        .collect::<Result<Vec<_>, TradeGenError>>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::PriceAction;
    use crate::domain::signal_eval::SigEvalMethod;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn series(ticker: &str, closes: &[Decimal]) -> (String, Vec<Bar>) {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, close)| Bar {
                ticker: ticker.into(),
                date: NaiveDate::from_ymd_opt(2025, 4, i as u32 + 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                entry_signal: if i == 0 { PriceAction::Buy } else { PriceAction::Wait },
                exit_signal: PriceAction::Wait,
                stop: None,
            })
            .collect();
        (ticker.to_string(), bars)
    }

    fn config() -> BacktestConfig {
        BacktestConfig {
            risk: RiskConfig {
                sig_eval_method: SigEvalMethod::Close,
                ..RiskConfig::default()
            },
            ..BacktestConfig::default()
        }
    }

    #[test]
    fn results_keep_input_order() {
        let input = vec![
            series("AAA", &[dec!(10), dec!(12)]),
            series("BBB", &[dec!(20), dec!(18)]),
            series("CCC", &[dec!(30), dec!(33)]),
        ];
        let results = run_backtest(&input, &config()).unwrap();
        let tickers: Vec<_> = results.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAA", "BBB", "CCC"]);
        assert!(results.iter().all(|r| r.run.trades.len() == 1));
    }

    #[test]
    fn summary_weights_by_lots() {
        let input = vec![series("AAA", &[dec!(10), dec!(12)])];
        let results = run_backtest(&input, &config()).unwrap();
        let summary = results[0].summary();
        assert_eq!(summary.trades, 1);
        assert_eq!(summary.wins, 1);
        // 10 lots * 2
        assert_eq!(summary.total_profit_loss, dec!(20));
    }

    #[test]
    fn failing_ticker_aborts_batch() {
        let (ticker, mut bars) = series("AAA", &[dec!(10), dec!(12)]);
        bars.swap(0, 1);
        let input = vec![series("BBB", &[dec!(1), dec!(2)]), (ticker, bars)];
        assert!(matches!(
            run_backtest(&input, &config()),
            Err(TradeGenError::UnsortedBars { .. })
        ));
    }
}
