//! Bar data access port trait.

use crate::domain::bar::Bar;
use crate::domain::error::TradeGenError;

pub trait DataPort {
    /// All bars for `ticker`, oldest first.
    fn fetch_bars(&self, ticker: &str) -> Result<Vec<Bar>, TradeGenError>;

    fn list_tickers(&self) -> Result<Vec<String>, TradeGenError>;
}
