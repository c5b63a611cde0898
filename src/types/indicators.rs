use serde::{Deserialize, Serialize};

use super::SetupCandidate;

/// Indicator snapshot for one ticker in one scan.
///
/// Every field is derived from the same bar sequence and refers to the same
/// latest bar. A field that needs more history than was available is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorBundle {
    /// Close of the latest bar.
    pub close: f64,
    /// Volume of the latest bar.
    pub volume: f64,
    pub sma_10: Option<f64>,
    pub sma_20: Option<f64>,
    /// Only computed when at least 50 bars are available.
    pub sma_50: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub volume_sma_20: Option<f64>,
    /// Latest volume divided by `volume_sma_20`.
    pub volume_ratio: Option<f64>,
    /// Percentage change of the close against 1, 5 and 20 bars prior.
    pub price_change_1d: Option<f64>,
    pub price_change_5d: Option<f64>,
    pub price_change_20d: Option<f64>,
    /// Rolling 20-bar max(high).
    pub resistance_level: Option<f64>,
    /// Rolling 20-bar min(low).
    pub support_level: Option<f64>,
    pub price_to_resistance: Option<f64>,
    pub price_to_support: Option<f64>,
}

/// Persisted indicator snapshot consumed by downstream display code.
///
/// Keys and rounding are a stable contract: RSI, volume ratio and 5-day change
/// to one decimal, MACD histogram to three, SMA(20) to two.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyIndicators {
    pub rsi: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub price_change_5d: Option<f64>,
    pub sma_20: Option<f64>,
    #[serde(default)]
    pub entry_zone: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub stop_loss: String,
}

impl KeyIndicators {
    /// Build the persisted snapshot from a bundle and the matched setup.
    pub fn snapshot(bundle: &IndicatorBundle, candidate: &SetupCandidate) -> Self {
        Self {
            rsi: bundle.rsi.map(|v| round_to(v, 1)),
            macd_histogram: bundle.macd_histogram.map(|v| round_to(v, 3)),
            volume_ratio: bundle.volume_ratio.map(|v| round_to(v, 1)),
            price_change_5d: bundle.price_change_5d.map(|v| round_to(v, 1)),
            sma_20: bundle.sma_20.map(|v| round_to(v, 2)),
            entry_zone: candidate.entry_zone.clone(),
            target: candidate.target.clone(),
            stop_loss: candidate.stop_loss.clone(),
        }
    }
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
