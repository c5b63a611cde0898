//! Technical signal detection.
//!
//! Computes an indicator bundle from a daily bar series and classifies it
//! into at most one trading setup.

pub mod classifier;
pub mod indicators;

pub use classifier::classify;

use crate::error::DataError;
use crate::types::{IndicatorBundle, PriceBar};
use indicators::{Macd, PriceChange, PriceField, Rsi, Sma, SupportResistance};

/// Bars required before a ticker is run through the indicator pipeline.
pub const MIN_HISTORY: usize = 20;

/// Trait for implementing technical indicators.
pub trait Indicator {
    type Output;

    /// Minimum number of bars required for calculation.
    fn min_periods(&self) -> usize;

    /// Calculate the indicator at the latest bar.
    /// Returns None if there is not enough history or the value is undefined.
    fn calculate(&self, bars: &[PriceBar]) -> Option<Self::Output>;
}

/// Percentage change from `from` to `to`; undefined for a zero base.
pub fn pct_change(from: f64, to: f64) -> Option<f64> {
    if from == 0.0 || !from.is_finite() {
        return None;
    }
    Some((to - from) / from * 100.0)
}

/// Compute the full indicator bundle for a bar series.
///
/// Rejects series shorter than [`MIN_HISTORY`]. Indicators that need more
/// history than the series holds are left as `None`.
pub fn compute_indicators(bars: &[PriceBar]) -> Result<IndicatorBundle, DataError> {
    if bars.len() < MIN_HISTORY {
        return Err(DataError::InsufficientHistory {
            have: bars.len(),
            need: MIN_HISTORY,
        });
    }
    let latest = bars[bars.len() - 1];

    let volume_sma_20 = Sma::new(20, PriceField::Volume).calculate(bars);
    let volume_ratio = volume_sma_20
        .filter(|avg| *avg != 0.0)
        .map(|avg| latest.volume / avg);

    let macd = Macd::default().calculate(bars);
    let levels = SupportResistance::default().calculate(bars);
    let resistance_level = levels.map(|l| l.resistance);
    let support_level = levels.map(|l| l.support);

    Ok(IndicatorBundle {
        close: latest.close,
        volume: latest.volume,
        sma_10: Sma::new(10, PriceField::Close).calculate(bars),
        sma_20: Sma::new(20, PriceField::Close).calculate(bars),
        sma_50: Sma::new(50, PriceField::Close).calculate(bars),
        rsi: Rsi::default().calculate(bars),
        macd: macd.map(|m| m.macd),
        macd_signal: macd.map(|m| m.signal),
        macd_histogram: macd.map(|m| m.histogram),
        volume_sma_20,
        volume_ratio,
        price_change_1d: PriceChange::new(1).calculate(bars),
        price_change_5d: PriceChange::new(5).calculate(bars),
        price_change_20d: PriceChange::new(20).calculate(bars),
        resistance_level,
        support_level,
        price_to_resistance: resistance_level.and_then(|r| pct_change(r, latest.close)),
        price_to_support: support_level.and_then(|s| pct_change(s, latest.close)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising_bars(count: usize) -> Vec<PriceBar> {
        (0..count)
            .map(|i| {
                let close = 100.0 + i as f64;
                PriceBar {
                    time: i as i64 * 86_400_000,
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000_000.0,
                }
            })
            .collect()
    }

    #[test]
    fn test_rejects_short_history() {
        let bars = rising_bars(15);
        match compute_indicators(&bars) {
            Err(DataError::InsufficientHistory { have, need }) => {
                assert_eq!(have, 15);
                assert_eq!(need, 20);
            }
            other => panic!("expected insufficient history, got {:?}", other),
        }
    }

    #[test]
    fn test_twenty_bars_leave_long_windows_undefined() {
        let bars = rising_bars(20);
        let bundle = compute_indicators(&bars).unwrap();

        assert!(bundle.sma_10.is_some());
        assert!(bundle.sma_20.is_some());
        assert!(bundle.sma_50.is_none());
        // 20-bar change needs 21 bars
        assert!(bundle.price_change_20d.is_none());
        assert!(bundle.price_change_5d.is_some());
    }

    #[test]
    fn test_bundle_references_latest_bar() {
        let bars = rising_bars(60);
        let bundle = compute_indicators(&bars).unwrap();

        assert_eq!(bundle.close, 159.0);
        assert_eq!(bundle.volume, 1_000_000.0);
        assert!(bundle.sma_50.is_some());
        // Last 20 highs run 141..=160
        assert_eq!(bundle.resistance_level, Some(160.0));
        assert_eq!(bundle.support_level, Some(139.0));
        assert_eq!(bundle.volume_ratio, Some(1.0));
        let expected_1d = (159.0 - 158.0) / 158.0 * 100.0;
        assert!((bundle.price_change_1d.unwrap() - expected_1d).abs() < 1e-9);
    }

    #[test]
    fn test_rising_series_has_positive_histogram() {
        let bars: Vec<PriceBar> = (0..60)
            .map(|i| {
                let close = 100.0 * 1.01f64.powi(i);
                PriceBar::flat(i as i64, close, 1_000_000.0)
            })
            .collect();
        let bundle = compute_indicators(&bars).unwrap();
        assert!(bundle.macd_histogram.unwrap() > 0.0);
        assert_eq!(bundle.rsi, Some(100.0));
    }

    #[test]
    fn test_zero_volume_average_leaves_ratio_undefined() {
        let bars: Vec<PriceBar> = (0..25).map(|i| PriceBar::flat(i, 50.0, 0.0)).collect();
        let bundle = compute_indicators(&bars).unwrap();
        assert_eq!(bundle.volume_sma_20, Some(0.0));
        assert!(bundle.volume_ratio.is_none());
    }

    #[test]
    fn test_pct_change_guards_zero_base() {
        assert_eq!(pct_change(0.0, 10.0), None);
        assert_eq!(pct_change(100.0, 110.0), Some(10.0));
    }

    #[test]
    fn test_is_deterministic() {
        let bars = rising_bars(45);
        assert_eq!(
            compute_indicators(&bars).unwrap(),
            compute_indicators(&bars).unwrap()
        );
    }
}
