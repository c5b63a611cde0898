//! Rolling support and resistance levels.

use crate::services::signals::Indicator;
use crate::types::PriceBar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levels {
    pub support: f64,
    pub resistance: f64,
}

/// Rolling extrema: resistance is the highest high and support the lowest
/// low over the trailing `period` bars, latest bar included.
pub struct SupportResistance {
    period: usize,
}

impl Default for SupportResistance {
    fn default() -> Self {
        Self { period: 20 }
    }
}

impl Indicator for SupportResistance {
    type Output = Levels;

    fn min_periods(&self) -> usize {
        self.period
    }

    fn calculate(&self, bars: &[PriceBar]) -> Option<Levels> {
        if self.period == 0 || bars.len() < self.period {
            return None;
        }

        let window = &bars[bars.len() - self.period..];
        let resistance = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let support = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);

        Some(Levels {
            support,
            resistance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_use_trailing_window() {
        let mut bars: Vec<PriceBar> = (0..25)
            .map(|i| PriceBar {
                time: i,
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 1.0,
            })
            .collect();
        // Outside the 20-bar window
        bars[2].high = 150.0;
        bars[3].low = 50.0;
        // Inside the window
        bars[10].high = 120.0;
        bars[24].low = 95.0;

        let levels = SupportResistance::default().calculate(&bars).unwrap();
        assert_eq!(levels.resistance, 120.0);
        assert_eq!(levels.support, 95.0);
    }

    #[test]
    fn test_levels_insufficient_data() {
        let bars: Vec<PriceBar> = (0..19).map(|i| PriceBar::flat(i, 1.0, 1.0)).collect();
        assert!(SupportResistance::default().calculate(&bars).is_none());
    }
}
