use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{KeyIndicators, SetupType};

/// Lifecycle state of a persisted opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityStatus {
    #[default]
    Active,
    Closed,
    Expired,
}

impl OpportunityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityStatus::Active => "active",
            OpportunityStatus::Closed => "closed",
            OpportunityStatus::Expired => "expired",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "closed" => Some(Self::Closed),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for OpportunityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A freshly detected opportunity, before reconciliation with stored state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityPayload {
    pub ticker: String,
    pub setup_type: SetupType,
    pub confidence_score: f64,
    pub price: f64,
    pub volume: i64,
    pub key_indicators: KeyIndicators,
    pub rationale: String,
    pub timeframe: String,
}

/// Persisted opportunity.
///
/// At most one record per (ticker, setup_type) is `Active` at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityRecord {
    /// Store-assigned id; zero until first persisted.
    pub id: i64,
    pub ticker: String,
    pub setup_type: SetupType,
    pub confidence_score: f64,
    pub price: f64,
    pub volume: i64,
    pub key_indicators: KeyIndicators,
    pub rationale: String,
    pub timeframe: String,
    /// Set once on creation.
    pub first_detected: DateTime<Utc>,
    /// Bumped on every reconciliation pass.
    pub last_updated: DateTime<Utc>,
    pub status: OpportunityStatus,
    /// True while the record has a change not yet handed off downstream.
    pub is_new: bool,
    /// Price change against the previously stored price, in percent.
    pub price_change_pct: f64,
    /// Confidence change against the previously stored confidence.
    pub confidence_change: f64,
}

impl OpportunityRecord {
    /// New, unsaved active record for a first detection.
    pub fn from_payload(payload: OpportunityPayload, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            ticker: payload.ticker,
            setup_type: payload.setup_type,
            confidence_score: payload.confidence_score,
            price: payload.price,
            volume: payload.volume,
            key_indicators: payload.key_indicators,
            rationale: payload.rationale,
            timeframe: payload.timeframe,
            first_detected: now,
            last_updated: now,
            status: OpportunityStatus::Active,
            is_new: true,
            price_change_pct: 0.0,
            confidence_change: 0.0,
        }
    }
}

/// Kind of change recorded in the history log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Updated,
    StatusChange,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Created => "created",
            ChangeType::Updated => "updated",
            ChangeType::StatusChange => "status_change",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "updated" => Some(Self::Updated),
            "status_change" => Some(Self::StatusChange),
            _ => None,
        }
    }
}

/// Append-only change log row for an opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Store-assigned id; zero until appended.
    pub id: i64,
    pub opportunity_id: i64,
    pub timestamp: DateTime<Utc>,
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub change_type: ChangeType,
}

impl HistoryEntry {
    /// Entry recording the creation of an opportunity.
    pub fn created(record: &OpportunityRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            opportunity_id: record.id,
            timestamp: now,
            field_name: "created".to_string(),
            old_value: None,
            new_value: Some(format!("New {} opportunity", record.setup_type)),
            change_type: ChangeType::Created,
        }
    }

    /// Entry recording a single changed field.
    pub fn updated(
        opportunity_id: i64,
        field_name: &str,
        old_value: String,
        new_value: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            opportunity_id,
            timestamp: now,
            field_name: field_name.to_string(),
            old_value: Some(old_value),
            new_value: Some(new_value),
            change_type: ChangeType::Updated,
        }
    }

    /// Entry recording a status transition.
    pub fn status_change(
        opportunity_id: i64,
        old: OpportunityStatus,
        new: OpportunityStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            opportunity_id,
            timestamp: now,
            field_name: "status".to_string(),
            old_value: Some(old.to_string()),
            new_value: Some(new.to_string()),
            change_type: ChangeType::StatusChange,
        }
    }
}

/// Outcome recorded for an agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Success,
    Error,
    Partial,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Success => "success",
            ActionStatus::Error => "error",
            ActionStatus::Partial => "partial",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            "partial" => Some(Self::Partial),
            _ => None,
        }
    }
}

/// Audit row written once per scan attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    /// Store-assigned id; zero until appended.
    pub id: i64,
    pub agent_name: String,
    pub action_type: String,
    pub timestamp: DateTime<Utc>,
    pub opportunities_processed: u32,
    pub new_opportunities: u32,
    pub execution_time_seconds: f64,
    pub status: ActionStatus,
    pub notes: Option<String>,
}

/// Row counts and recency markers for the whole store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_opportunities: u64,
    pub new_opportunities: u64,
    pub history_records: u64,
    pub agent_actions: u64,
    pub last_detected: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> OpportunityPayload {
        OpportunityPayload {
            ticker: "AAPL".to_string(),
            setup_type: SetupType::Breakout,
            confidence_score: 0.75,
            price: 150.0,
            volume: 1_000_000,
            key_indicators: KeyIndicators::default(),
            rationale: "test".to_string(),
            timeframe: "1-3 days".to_string(),
        }
    }

    #[test]
    fn test_record_from_payload_defaults() {
        let now = Utc::now();
        let record = OpportunityRecord::from_payload(payload(), now);
        assert_eq!(record.id, 0);
        assert_eq!(record.status, OpportunityStatus::Active);
        assert!(record.is_new);
        assert_eq!(record.first_detected, now);
        assert_eq!(record.last_updated, now);
        assert_eq!(record.price_change_pct, 0.0);
        assert_eq!(record.confidence_change, 0.0);
    }

    #[test]
    fn test_created_history_entry() {
        let mut record = OpportunityRecord::from_payload(payload(), Utc::now());
        record.id = 7;
        let entry = HistoryEntry::created(&record, Utc::now());
        assert_eq!(entry.opportunity_id, 7);
        assert_eq!(entry.field_name, "created");
        assert_eq!(entry.old_value, None);
        assert_eq!(entry.new_value.as_deref(), Some("New Breakout opportunity"));
        assert_eq!(entry.change_type, ChangeType::Created);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(OpportunityStatus::from_str("CLOSED"), Some(OpportunityStatus::Closed));
        assert_eq!(OpportunityStatus::from_str("pending"), None);
        assert_eq!(ChangeType::from_str("status_change"), Some(ChangeType::StatusChange));
        assert_eq!(ActionStatus::from_str("partial"), Some(ActionStatus::Partial));
    }
}
