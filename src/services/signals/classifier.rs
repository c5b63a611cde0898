//! Rule-based setup classifier.
//!
//! Rules are evaluated in [`SetupType::PRIORITY`] order and the first match
//! wins, so a ticker is classified into at most one setup per scan.
//! Bullish Momentum and Breakout clamp their confidence; Oversold Bounce and
//! Mean Reversion do not.

use crate::types::{IndicatorBundle, SetupCandidate, SetupType};

/// Confidence, rationale and price levels of a matched rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub confidence: f64,
    pub rationale: String,
    pub entry_zone: String,
    pub target: String,
    pub stop_loss: String,
}

type RuleFn = fn(f64, &IndicatorBundle) -> Option<RuleMatch>;

/// Rule table in evaluation order.
const RULES: [(SetupType, RuleFn); 4] = [
    (SetupType::BullishMomentum, bullish_momentum),
    (SetupType::OversoldBounce, oversold_bounce),
    (SetupType::Breakout, breakout),
    (SetupType::MeanReversionShort, mean_reversion_short),
];

/// Classify a ticker from its latest close and indicator bundle.
pub fn classify(close: f64, bundle: &IndicatorBundle) -> Option<SetupCandidate> {
    RULES.iter().find_map(|(setup_type, rule)| {
        rule(close, bundle).map(|m| into_candidate(*setup_type, m))
    })
}

/// Evaluate a single rule in isolation, ignoring priority.
pub fn evaluate_rule(
    setup_type: SetupType,
    close: f64,
    bundle: &IndicatorBundle,
) -> Option<SetupCandidate> {
    let (_, rule) = RULES.iter().find(|(t, _)| *t == setup_type)?;
    rule(close, bundle).map(|m| into_candidate(setup_type, m))
}

fn into_candidate(setup_type: SetupType, m: RuleMatch) -> SetupCandidate {
    SetupCandidate {
        setup_type,
        confidence_score: m.confidence,
        rationale: m.rationale,
        timeframe: setup_type.timeframe().to_string(),
        entry_zone: m.entry_zone,
        target: m.target,
        stop_loss: m.stop_loss,
    }
}

fn usd(value: f64) -> String {
    format!("${:.2}", value)
}

fn usd_range(low: f64, high: f64) -> String {
    format!("{} - {}", usd(low), usd(high))
}

fn bullish_momentum(close: f64, b: &IndicatorBundle) -> Option<RuleMatch> {
    let rsi = b.rsi?;
    let sma_10 = b.sma_10?;
    let sma_20 = b.sma_20?;
    let histogram = b.macd_histogram?;
    let volume_ratio = b.volume_ratio?;

    let matched = rsi > 30.0
        && rsi < 70.0
        && close > sma_10
        && sma_10 > sma_20
        && histogram > 0.0
        && volume_ratio > 1.2;
    if !matched {
        return None;
    }

    Some(RuleMatch {
        confidence: (0.5 + (volume_ratio - 1.0) * 0.3).min(0.9),
        rationale: format!(
            "Price above moving averages with MACD bullish crossover. RSI at {:.1} shows room to run. Volume {:.1}x average confirms strength.",
            rsi, volume_ratio
        ),
        entry_zone: usd_range(close, close * 1.02),
        target: usd_range(close * 1.05, close * 1.08),
        stop_loss: usd(close * 0.97),
    })
}

fn oversold_bounce(close: f64, b: &IndicatorBundle) -> Option<RuleMatch> {
    let rsi = b.rsi?;
    let change_5d = b.price_change_5d?;
    let support = b.support_level?;
    let volume_ratio = b.volume_ratio?;

    let matched =
        rsi < 35.0 && change_5d < -3.0 && close > support * 1.02 && volume_ratio > 1.1;
    if !matched {
        return None;
    }

    Some(RuleMatch {
        confidence: 0.6 + (35.0 - rsi) * 0.01,
        rationale: format!(
            "Oversold conditions (RSI {:.1}) with support holding at ${:.2}. Volume uptick suggests buying interest.",
            rsi, support
        ),
        entry_zone: usd_range(close, support * 1.03),
        target: usd_range(close * 1.03, close * 1.06),
        stop_loss: usd(support * 0.98),
    })
}

fn breakout(close: f64, b: &IndicatorBundle) -> Option<RuleMatch> {
    let resistance = b.resistance_level?;
    let volume_ratio = b.volume_ratio?;
    let rsi = b.rsi?;

    let matched =
        close >= resistance * 0.99 && volume_ratio > 1.5 && rsi > 55.0 && rsi < 75.0;
    if !matched {
        return None;
    }

    Some(RuleMatch {
        confidence: 0.7 + ((volume_ratio - 1.5) * 0.1).min(0.2),
        rationale: format!(
            "Breaking resistance at ${:.2} with {:.1}x volume. RSI {:.1} shows strength.",
            resistance, volume_ratio, rsi
        ),
        entry_zone: usd_range(close, resistance * 1.01),
        target: usd_range(close * 1.04, close * 1.07),
        stop_loss: usd(resistance * 0.98),
    })
}

fn mean_reversion_short(close: f64, b: &IndicatorBundle) -> Option<RuleMatch> {
    let rsi = b.rsi?;
    let change_5d = b.price_change_5d?;
    let sma_20 = b.sma_20?;

    let matched = rsi > 70.0 && change_5d > 5.0 && close > sma_20 * 1.05;
    if !matched {
        return None;
    }

    Some(RuleMatch {
        confidence: 0.6,
        rationale: format!(
            "Overbought conditions (RSI {:.1}) with {:.1}% 5-day gain. Due for pullback to 20-SMA at ${:.2}.",
            rsi, change_5d, sma_20
        ),
        entry_zone: usd_range(close, close * 0.98),
        target: usd_range(sma_20, sma_20 * 0.98),
        stop_loss: usd(close * 1.03),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bundle that satisfies no rule.
    fn neutral() -> IndicatorBundle {
        IndicatorBundle {
            close: 100.0,
            volume: 1_000_000.0,
            sma_10: Some(100.0),
            sma_20: Some(100.0),
            sma_50: None,
            rsi: Some(50.0),
            macd: Some(0.0),
            macd_signal: Some(0.0),
            macd_histogram: Some(0.0),
            volume_sma_20: Some(1_000_000.0),
            volume_ratio: Some(1.0),
            price_change_1d: Some(0.0),
            price_change_5d: Some(0.0),
            price_change_20d: Some(0.0),
            resistance_level: Some(110.0),
            support_level: Some(90.0),
            price_to_resistance: Some(-9.09),
            price_to_support: Some(11.1),
        }
    }

    fn momentum() -> IndicatorBundle {
        IndicatorBundle {
            rsi: Some(65.0),
            sma_10: Some(125.0),
            sma_20: Some(118.0),
            macd_histogram: Some(0.4),
            volume_ratio: Some(2.0),
            resistance_level: Some(140.0),
            ..neutral()
        }
    }

    #[test]
    fn test_rule_table_follows_priority() {
        let order: Vec<SetupType> = RULES.iter().map(|(t, _)| *t).collect();
        assert_eq!(order, SetupType::PRIORITY.to_vec());
    }

    #[test]
    fn test_neutral_bundle_matches_nothing() {
        assert!(classify(100.0, &neutral()).is_none());
    }

    #[test]
    fn test_bullish_momentum() {
        let candidate = classify(130.0, &momentum()).unwrap();
        assert_eq!(candidate.setup_type, SetupType::BullishMomentum);
        assert!((candidate.confidence_score - 0.8).abs() < 1e-12);
        assert_eq!(candidate.timeframe, "3-7 days");
        assert_eq!(candidate.entry_zone, "$130.00 - $132.60");
        assert_eq!(candidate.target, "$136.50 - $140.40");
        assert_eq!(candidate.stop_loss, "$126.10");
        assert!(candidate.rationale.contains("RSI at 65.0"));
        assert!(candidate.rationale.contains("Volume 2.0x"));
    }

    #[test]
    fn test_bullish_momentum_confidence_clamped() {
        let bundle = IndicatorBundle {
            volume_ratio: Some(5.0),
            ..momentum()
        };
        let candidate = evaluate_rule(SetupType::BullishMomentum, 130.0, &bundle).unwrap();
        assert_eq!(candidate.confidence_score, 0.9);
    }

    #[test]
    fn test_oversold_bounce() {
        let bundle = IndicatorBundle {
            rsi: Some(25.0),
            price_change_5d: Some(-6.0),
            support_level: Some(80.0),
            volume_ratio: Some(1.3),
            ..neutral()
        };
        let candidate = classify(85.0, &bundle).unwrap();
        assert_eq!(candidate.setup_type, SetupType::OversoldBounce);
        assert!((candidate.confidence_score - 0.7).abs() < 1e-12);
        assert_eq!(candidate.entry_zone, "$85.00 - $82.40");
        assert_eq!(candidate.stop_loss, "$78.40");
    }

    #[test]
    fn test_oversold_bounce_confidence_unclamped() {
        let bundle = IndicatorBundle {
            rsi: Some(0.0),
            price_change_5d: Some(-20.0),
            support_level: Some(50.0),
            volume_ratio: Some(2.0),
            ..neutral()
        };
        let candidate = evaluate_rule(SetupType::OversoldBounce, 60.0, &bundle).unwrap();
        assert!((candidate.confidence_score - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_breakout() {
        let bundle = IndicatorBundle {
            rsi: Some(72.0),
            volume_ratio: Some(2.5),
            resistance_level: Some(100.0),
            ..neutral()
        };
        // 99.0 sits exactly on the 1% band below resistance
        let candidate = classify(99.0, &bundle).unwrap();
        assert_eq!(candidate.setup_type, SetupType::Breakout);
        assert!((candidate.confidence_score - 0.8).abs() < 1e-12);
        assert_eq!(candidate.stop_loss, "$98.00");
    }

    #[test]
    fn test_breakout_confidence_capped() {
        let bundle = IndicatorBundle {
            rsi: Some(60.0),
            volume_ratio: Some(10.0),
            resistance_level: Some(100.0),
            ..neutral()
        };
        let candidate = evaluate_rule(SetupType::Breakout, 101.0, &bundle).unwrap();
        assert!((candidate.confidence_score - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_mean_reversion_short() {
        let bundle = IndicatorBundle {
            rsi: Some(82.0),
            price_change_5d: Some(9.0),
            sma_20: Some(100.0),
            volume_ratio: Some(0.9),
            ..neutral()
        };
        let candidate = classify(112.0, &bundle).unwrap();
        assert_eq!(candidate.setup_type, SetupType::MeanReversionShort);
        assert_eq!(candidate.confidence_score, 0.6);
        assert_eq!(candidate.target, "$100.00 - $98.00");
        assert!(candidate.rationale.contains("9.0% 5-day gain"));
    }

    #[test]
    fn test_priority_momentum_over_breakout() {
        // Satisfies both Bullish Momentum and Breakout
        let bundle = IndicatorBundle {
            rsi: Some(62.0),
            sma_10: Some(101.0),
            sma_20: Some(99.0),
            macd_histogram: Some(0.2),
            volume_ratio: Some(1.8),
            resistance_level: Some(103.0),
            ..neutral()
        };
        assert!(evaluate_rule(SetupType::Breakout, 103.0, &bundle).is_some());
        let candidate = classify(103.0, &bundle).unwrap();
        assert_eq!(candidate.setup_type, SetupType::BullishMomentum);
    }

    #[test]
    fn test_oversold_bounce_rsi_bound_is_strict() {
        let bundle = IndicatorBundle {
            rsi: Some(30.0),
            price_change_5d: Some(-5.0),
            support_level: Some(90.0),
            volume_ratio: Some(1.5),
            ..neutral()
        };
        let candidate = classify(100.0, &bundle).unwrap();
        assert_eq!(candidate.setup_type, SetupType::OversoldBounce);

        let at_bound = IndicatorBundle {
            rsi: Some(35.0),
            ..bundle
        };
        assert!(classify(100.0, &at_bound).is_none());
    }

    #[test]
    fn test_undefined_indicator_blocks_rule() {
        let bundle = IndicatorBundle {
            rsi: None,
            ..momentum()
        };
        assert!(classify(130.0, &bundle).is_none());
    }

    #[test]
    fn test_classification_is_deterministic() {
        let bundle = momentum();
        let first = classify(130.0, &bundle);
        for _ in 0..10 {
            assert_eq!(classify(130.0, &bundle), first);
        }
    }
}
