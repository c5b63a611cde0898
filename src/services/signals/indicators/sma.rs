//! Simple Moving Average (SMA) indicator.

use crate::services::signals::Indicator;
use crate::types::PriceBar;

/// Bar field an average is taken over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    Close,
    Volume,
}

impl PriceField {
    fn value(&self, bar: &PriceBar) -> f64 {
        match self {
            PriceField::Close => bar.close,
            PriceField::Volume => bar.volume,
        }
    }
}

/// SMA (Simple Moving Average) indicator.
///
/// Average of the trailing `period` bars. A partial window is never averaged:
/// with fewer bars than the period the value is undefined.
pub struct Sma {
    period: usize,
    field: PriceField,
}

impl Sma {
    pub fn new(period: usize, field: PriceField) -> Self {
        Self { period, field }
    }
}

impl Indicator for Sma {
    type Output = f64;

    fn min_periods(&self) -> usize {
        self.period
    }

    fn calculate(&self, bars: &[PriceBar]) -> Option<f64> {
        if self.period == 0 || bars.len() < self.period {
            return None;
        }

        let sum: f64 = bars
            .iter()
            .rev()
            .take(self.period)
            .map(|b| self.field.value(b))
            .sum();

        Some(sum / self.period as f64)
    }
}
