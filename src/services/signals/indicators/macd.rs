//! MACD (Moving Average Convergence Divergence) indicator.

use super::ema::ewm_series;
use crate::services::signals::Indicator;
use crate::types::PriceBar;

/// MACD values at the latest bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdOutput {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD indicator.
///
/// Shows the relationship between two EMAs:
/// - MACD Line = EMA(12) - EMA(26)
/// - Signal Line = EMA(9) of MACD Line
/// - Histogram = MACD Line - Signal Line
pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

impl Default for Macd {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

impl Indicator for Macd {
    type Output = MacdOutput;

    fn min_periods(&self) -> usize {
        1
    }

    fn calculate(&self, bars: &[PriceBar]) -> Option<MacdOutput> {
        if bars.len() < self.min_periods() {
            return None;
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let fast_ema = ewm_series(&closes, self.fast_period);
        let slow_ema = ewm_series(&closes, self.slow_period);

        let macd_line: Vec<f64> = fast_ema
            .iter()
            .zip(slow_ema.iter())
            .map(|(f, s)| f - s)
            .collect();
        let signal_line = ewm_series(&macd_line, self.signal_period);

        let macd = *macd_line.last()?;
        let signal = *signal_line.last()?;

        Some(MacdOutput {
            macd,
            signal,
            histogram: macd - signal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(closes: impl Iterator<Item = f64>) -> Vec<PriceBar> {
        closes
            .enumerate()
            .map(|(i, c)| PriceBar::flat(i as i64, c, 1000.0))
            .collect()
    }

    #[test]
    fn test_macd_flat_series_is_zero() {
        let bars = series(std::iter::repeat(100.0).take(40));
        let out = Macd::default().calculate(&bars).unwrap();
        assert!(out.macd.abs() < 1e-9);
        assert!(out.signal.abs() < 1e-9);
        assert!(out.histogram.abs() < 1e-9);
    }

    #[test]
    fn test_macd_uptrend_positive_line() {
        let bars = series((0..60).map(|i| 100.0 + i as f64 * 2.0));
        let out = Macd::default().calculate(&bars).unwrap();
        assert!(out.macd > 0.0, "MACD in uptrend should be positive");
    }

    #[test]
    fn test_macd_downtrend_negative_line() {
        let bars = series((0..60).map(|i| 300.0 - i as f64 * 2.0));
        let out = Macd::default().calculate(&bars).unwrap();
        assert!(out.macd < 0.0, "MACD in downtrend should be negative");
    }

    #[test]
    fn test_macd_histogram_is_difference() {
        let bars = series((0..45).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0));
        let out = Macd::default().calculate(&bars).unwrap();
        assert!((out.histogram - (out.macd - out.signal)).abs() < 1e-12);
    }

    #[test]
    fn test_macd_empty_series() {
        assert!(Macd::default().calculate(&[]).is_none());
    }
}
