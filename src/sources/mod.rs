//! Market data sources.

pub mod yahoo;

pub use yahoo::YahooFinanceClient;

use crate::error::DataError;
use crate::types::PriceBar;
use async_trait::async_trait;

/// Supplier of daily price history.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Daily bars for `ticker` covering roughly the last `lookback_days`
    /// calendar days, oldest first. An empty vector means no data.
    async fn fetch(&self, ticker: &str, lookback_days: u32) -> Result<Vec<PriceBar>, DataError>;
}
