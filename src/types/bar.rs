use serde::{Deserialize, Serialize};

/// One daily OHLCV observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Unix timestamp (milliseconds) of the bar open.
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Create a bar where open/high/low/close are all the same price.
    pub fn flat(time: i64, price: f64, volume: f64) -> Self {
        Self {
            time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }
}

/// Mean volume of the trailing `count` bars, or `None` for an empty series.
pub fn trailing_mean_volume(bars: &[PriceBar], count: usize) -> Option<f64> {
    let window = &bars[bars.len().saturating_sub(count)..];
    if window.is_empty() {
        return None;
    }
    Some(window.iter().map(|b| b.volume).sum::<f64>() / window.len() as f64)
}
