//! Exponential Moving Average (EMA) indicator.

/// Bias-corrected exponential moving average series.
///
/// Smoothing factor is `2 / (span + 1)`. Each point is the weighted mean of
/// all observations so far with weights `(1 - alpha)^age`, so the series is
/// defined from the first value without an SMA seed.
pub fn ewm_series(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let decay = 1.0 - alpha;
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    values
        .iter()
        .map(|&v| {
            weighted_sum = v + decay * weighted_sum;
            weight_total = 1.0 + decay * weight_total;
            weighted_sum / weight_total
        })
        .collect()
}
