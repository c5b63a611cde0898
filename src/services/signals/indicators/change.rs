//! Percentage price change against an earlier close.

use crate::services::signals::{pct_change, Indicator};
use crate::types::PriceBar;

/// Percentage change of the latest close versus the close `bars_back` bars earlier.
pub struct PriceChange {
    bars_back: usize,
}

impl PriceChange {
    pub fn new(bars_back: usize) -> Self {
        Self { bars_back }
    }
}

impl Indicator for PriceChange {
    type Output = f64;

    fn min_periods(&self) -> usize {
        self.bars_back + 1
    }

    fn calculate(&self, bars: &[PriceBar]) -> Option<f64> {
        if bars.len() < self.min_periods() {
            return None;
        }
        let latest = bars[bars.len() - 1].close;
        let base = bars[bars.len() - 1 - self.bars_back].close;
        pct_change(base, latest)
    }
}
