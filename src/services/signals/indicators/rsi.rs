//! Relative Strength Index (RSI) indicator.

use crate::services::signals::Indicator;
use crate::types::PriceBar;

/// RSI reported when the trailing window has neither gains nor losses.
pub const FLAT_RSI: f64 = 50.0;

/// RSI (Relative Strength Index) indicator.
///
/// Compares the simple average gain to the simple average loss over the
/// trailing `period` close-to-close deltas. Values range from 0-100:
/// - Below 30: Oversold
/// - Above 70: Overbought
///
/// A window with no losses reads 100. A window with no movement at all is
/// indeterminate and reads [`FLAT_RSI`].
pub struct Rsi {
    period: usize,
}

impl Default for Rsi {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

impl Indicator for Rsi {
    type Output = f64;

    fn min_periods(&self) -> usize {
        self.period + 1
    }

    fn calculate(&self, bars: &[PriceBar]) -> Option<f64> {
        if self.period == 0 || bars.len() < self.min_periods() {
            return None;
        }

        let window = &bars[bars.len() - self.min_periods()..];
        let (gains, losses) = window
            .windows(2)
            .map(|pair| pair[1].close - pair[0].close)
            .fold((0.0, 0.0), |(g, l), change| {
                if change > 0.0 {
                    (g + change, l)
                } else {
                    (g, l - change)
                }
            });

        let avg_gain = gains / self.period as f64;
        let avg_loss = losses / self.period as f64;

        if avg_loss == 0.0 {
            return Some(if avg_gain == 0.0 { FLAT_RSI } else { 100.0 });
        }

        let rs = avg_gain / avg_loss;
        Some(100.0 - (100.0 / (1.0 + rs)))
    }
}
