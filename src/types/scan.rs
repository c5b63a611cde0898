use serde::{Deserialize, Serialize};
use std::fmt;

use super::{KeyIndicators, OpportunityPayload, OpportunityRecord, SetupType};

/// Fully resolved scan parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Tickers to scan, in evaluation order.
    pub tickers: Vec<String>,
    /// Calendar days of daily history to request per ticker.
    pub lookback_days: u32,
    /// Minimum mean volume of the trailing 5 bars.
    pub min_volume: f64,
    /// Stop starting new tickers once this many opportunities are returned.
    pub max_opportunities: usize,
}

/// Opportunity as returned to a scan caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalOpportunity {
    pub ticker: String,
    pub setup_type: SetupType,
    pub confidence_score: f64,
    pub price: f64,
    pub volume: i64,
    pub key_indicators: KeyIndicators,
    pub rationale: String,
    pub timeframe: String,
}

impl From<&OpportunityRecord> for TechnicalOpportunity {
    fn from(record: &OpportunityRecord) -> Self {
        Self {
            ticker: record.ticker.clone(),
            setup_type: record.setup_type,
            confidence_score: record.confidence_score,
            price: record.price,
            volume: record.volume,
            key_indicators: record.key_indicators.clone(),
            rationale: record.rationale.clone(),
            timeframe: record.timeframe.clone(),
        }
    }
}

/// Result of a completed scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResponse {
    /// Created or updated opportunities, highest confidence first.
    pub opportunities: Vec<TechnicalOpportunity>,
    pub execution_time_seconds: f64,
    pub analysis_type: String,
    pub message: String,
    /// Tickers that passed the volume filter and were classified.
    pub analyzed: u32,
    pub new_count: u32,
    pub updated_count: u32,
}

/// Why a ticker produced no candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    InsufficientHistory { have: usize, need: usize },
    LowVolume { mean: f64, min: f64 },
    NoSetup,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoData => write!(f, "no data"),
            SkipReason::InsufficientHistory { have, need } => {
                write!(f, "insufficient history ({} of {} bars)", have, need)
            }
            SkipReason::LowVolume { mean, min } => {
                write!(f, "recent volume {:.0} below minimum {:.0}", mean, min)
            }
            SkipReason::NoSetup => write!(f, "no setup matched"),
        }
    }
}

/// Per-ticker result of the fetch/indicator/classify stage.
#[derive(Debug, Clone, PartialEq)]
pub enum TickerOutcome {
    Skip(SkipReason),
    /// The ticker errored; the scan continues.
    Failed(String),
    Candidate(Box<OpportunityPayload>),
}

impl TickerOutcome {
    /// Whether the ticker got past the data and volume filters.
    pub fn was_analyzed(&self) -> bool {
        matches!(
            self,
            TickerOutcome::Candidate(_) | TickerOutcome::Skip(SkipReason::NoSetup)
        )
    }
}
