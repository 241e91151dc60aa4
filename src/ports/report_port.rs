//! Result persistence port trait.

use crate::domain::backtest::TickerResult;
use crate::domain::error::TradeGenError;
use crate::domain::gen_trades::SignalRow;
use crate::domain::trade::CompletedTrade;

/// Port for persisting completed trades and the annotated bar stream.
pub trait ReportPort {
    fn write_trades(&self, ticker: &str, trades: &[CompletedTrade]) -> Result<(), TradeGenError>;

    fn write_signals(&self, ticker: &str, signals: &[SignalRow]) -> Result<(), TradeGenError>;

    /// Default implementation: writes both outputs of one ticker's run.
    fn write_result(&self, result: &TickerResult) -> Result<(), TradeGenError> {
        self.write_trades(&result.ticker, &result.run.trades)?;
        self.write_signals(&result.ticker, &result.run.signals)
    }
}
