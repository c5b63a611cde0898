use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading setup archetypes recognised by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetupType {
    #[serde(rename = "Bullish Momentum")]
    BullishMomentum,
    #[serde(rename = "Oversold Bounce")]
    OversoldBounce,
    #[serde(rename = "Breakout")]
    Breakout,
    #[serde(rename = "Mean Reversion (Short)")]
    MeanReversionShort,
}

impl SetupType {
    /// Evaluation order of the classifier. The first matching rule wins.
    pub const PRIORITY: [SetupType; 4] = [
        SetupType::BullishMomentum,
        SetupType::OversoldBounce,
        SetupType::Breakout,
        SetupType::MeanReversionShort,
    ];

    /// Display label, also used as the persisted value.
    pub fn label(&self) -> &'static str {
        match self {
            SetupType::BullishMomentum => "Bullish Momentum",
            SetupType::OversoldBounce => "Oversold Bounce",
            SetupType::Breakout => "Breakout",
            SetupType::MeanReversionShort => "Mean Reversion (Short)",
        }
    }

    /// Parse from a persisted label.
    pub fn from_label(s: &str) -> Option<Self> {
        Self::PRIORITY.into_iter().find(|t| t.label() == s)
    }

    /// Expected holding window for the setup.
    pub fn timeframe(&self) -> &'static str {
        match self {
            SetupType::BullishMomentum => "3-7 days",
            SetupType::OversoldBounce => "2-5 days",
            SetupType::Breakout => "1-3 days",
            SetupType::MeanReversionShort => "2-4 days",
        }
    }
}

impl fmt::Display for SetupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of classifying one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupCandidate {
    pub setup_type: SetupType,
    /// Confidence score. Only some rules clamp it.
    pub confidence_score: f64,
    pub rationale: String,
    pub timeframe: String,
    pub entry_zone: String,
    pub target: String,
    pub stop_loss: String,
}
