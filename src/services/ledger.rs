//! Opportunity ledger.
//!
//! Reconciles freshly detected opportunities against the active record for the
//! same (ticker, setup type) pair. A first detection creates a record; later
//! detections update it in place and log one history entry per changed field.
//! Writes to a given pair are serialized through a keyed lock; an entry lives
//! in the lock map only while some caller holds or waits on it.

use crate::error::StoreError;
use crate::services::signals::pct_change;
use crate::services::store::OpportunityStore;
use crate::types::{
    HistoryEntry, OpportunityPayload, OpportunityRecord, OpportunityStatus, SetupType,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// How a payload was applied to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// No active record existed; one was created.
    Created,
    /// An active record existed. `changed_fields` may be zero.
    Updated { changed_fields: usize },
}

/// Stored state after a reconciliation pass.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub record: OpportunityRecord,
    pub outcome: Reconciliation,
}

impl Reconciled {
    pub fn is_created(&self) -> bool {
        self.outcome == Reconciliation::Created
    }
}

/// A changed field and its string-rendered values.
struct FieldChange {
    field: &'static str,
    old: String,
    new: String,
}

pub struct Ledger {
    store: Arc<dyn OpportunityStore>,
    locks: DashMap<(String, SetupType), Arc<Mutex<()>>>,
}

impl Ledger {
    pub fn new(store: Arc<dyn OpportunityStore>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    /// Underlying store.
    pub fn store(&self) -> &Arc<dyn OpportunityStore> {
        &self.store
    }

    /// Run `f` while holding the lock for a (ticker, setup type) pair.
    fn with_pair_lock<T>(
        &self,
        ticker: &str,
        setup_type: SetupType,
        f: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let key = (ticker.to_string(), setup_type);
        let lock = self.locks.entry(key.clone()).or_default().clone();

        let result = match lock.lock() {
            Ok(_guard) => f(),
            Err(_) => Err(StoreError::Unavailable("ledger key lock poisoned".to_string())),
        };

        drop(lock);
        self.locks.remove_if(&key, |_, entry| Arc::strong_count(entry) == 1);
        result
    }

    #[cfg(test)]
    fn held_locks(&self) -> usize {
        self.locks.len()
    }

    /// Create or update the active record for the payload's pair.
    pub fn reconcile(
        &self,
        payload: OpportunityPayload,
        now: DateTime<Utc>,
    ) -> Result<Reconciled, StoreError> {
        let ticker = payload.ticker.clone();
        self.with_pair_lock(&ticker, payload.setup_type, || {
            match self.store.find_active(&payload.ticker, payload.setup_type)? {
                None => self.create(payload, now),
                Some(existing) => self.update(existing, payload, now),
            }
        })
    }

    fn create(
        &self,
        payload: OpportunityPayload,
        now: DateTime<Utc>,
    ) -> Result<Reconciled, StoreError> {
        let mut record = OpportunityRecord::from_payload(payload, now);
        record.id = self.store.upsert(&record)?;
        self.store
            .append_history(&HistoryEntry::created(&record, now))?;

        info!(
            "Created {} opportunity for {} (id {}, confidence {:.2})",
            record.setup_type, record.ticker, record.id, record.confidence_score
        );

        Ok(Reconciled {
            record,
            outcome: Reconciliation::Created,
        })
    }

    fn update(
        &self,
        existing: OpportunityRecord,
        payload: OpportunityPayload,
        now: DateTime<Utc>,
    ) -> Result<Reconciled, StoreError> {
        let changes = diff(&existing, &payload)?;

        let mut record = existing;
        if payload.price != record.price {
            if let Some(pct) = pct_change(record.price, payload.price) {
                record.price_change_pct = pct;
            }
        }
        if payload.confidence_score != record.confidence_score {
            record.confidence_change = payload.confidence_score - record.confidence_score;
        }

        record.confidence_score = payload.confidence_score;
        record.price = payload.price;
        record.volume = payload.volume;
        record.key_indicators = payload.key_indicators;
        record.rationale = payload.rationale;
        record.timeframe = payload.timeframe;
        record.is_new = !changes.is_empty();
        record.last_updated = now;

        self.store.upsert(&record)?;
        for change in &changes {
            self.store.append_history(&HistoryEntry::updated(
                record.id,
                change.field,
                change.old.clone(),
                change.new.clone(),
                now,
            ))?;
        }

        if changes.is_empty() {
            debug!(
                "{} {} unchanged (id {})",
                record.ticker, record.setup_type, record.id
            );
        } else {
            let fields: Vec<&str> = changes.iter().map(|c| c.field).collect();
            info!(
                "Updated {} opportunity for {} (id {}): {}",
                record.setup_type,
                record.ticker,
                record.id,
                fields.join(", ")
            );
        }

        Ok(Reconciled {
            record,
            outcome: Reconciliation::Updated {
                changed_fields: changes.len(),
            },
        })
    }

    /// Move a record to a new status, logging a `status_change` entry.
    ///
    /// Setting the status a record already has is a no-op. A record cannot
    /// be made active while another record holds its pair.
    pub fn change_status(
        &self,
        id: i64,
        status: OpportunityStatus,
    ) -> Result<OpportunityRecord, StoreError> {
        let pair = self.store.get(id)?.ok_or(StoreError::NotFound(id))?;

        self.with_pair_lock(&pair.ticker, pair.setup_type, || {
            let mut record = self.store.get(id)?.ok_or(StoreError::NotFound(id))?;
            if record.status == status {
                return Ok(record);
            }

            if status == OpportunityStatus::Active {
                let holder = self.store.find_active(&record.ticker, record.setup_type)?;
                if let Some(active) = holder {
                    warn!(
                        "Refusing to reactivate opportunity {}: {} {} already active as {}",
                        id, record.ticker, record.setup_type, active.id
                    );
                    return Err(StoreError::ActiveConflict {
                        id,
                        active: active.id,
                    });
                }
            }

            let now = Utc::now();
            self.store.set_status(id, status)?;
            self.store
                .append_history(&HistoryEntry::status_change(id, record.status, status, now))?;

            info!(
                "Opportunity {} ({} {}) {} -> {}",
                id, record.ticker, record.setup_type, record.status, status
            );
            record.status = status;
            Ok(record)
        })
    }
}

/// Field-level differences between the stored record and an incoming payload.
/// `last_updated` is never compared.
fn diff(
    existing: &OpportunityRecord,
    payload: &OpportunityPayload,
) -> Result<Vec<FieldChange>, StoreError> {
    let mut changes = Vec::new();
    let mut push = |field: &'static str, old: String, new: String| {
        changes.push(FieldChange { field, old, new });
    };

    if existing.confidence_score != payload.confidence_score {
        push(
            "confidence_score",
            existing.confidence_score.to_string(),
            payload.confidence_score.to_string(),
        );
    }
    if existing.price != payload.price {
        push("price", existing.price.to_string(), payload.price.to_string());
    }
    if existing.volume != payload.volume {
        push("volume", existing.volume.to_string(), payload.volume.to_string());
    }
    if existing.key_indicators != payload.key_indicators {
        push(
            "key_indicators",
            serde_json::to_string(&existing.key_indicators)?,
            serde_json::to_string(&payload.key_indicators)?,
        );
    }
    if existing.rationale != payload.rationale {
        push("rationale", existing.rationale.clone(), payload.rationale.clone());
    }
    if existing.timeframe != payload.timeframe {
        push("timeframe", existing.timeframe.clone(), payload.timeframe.clone());
    }

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::MemoryStore;
    use crate::types::{ChangeType, KeyIndicators};
    use chrono::Duration;

    fn payload(price: f64, confidence: f64) -> OpportunityPayload {
        OpportunityPayload {
            ticker: "AAPL".to_string(),
            setup_type: SetupType::BullishMomentum,
            confidence_score: confidence,
            price,
            volume: 2_000_000,
            key_indicators: KeyIndicators {
                rsi: Some(62.5),
                ..KeyIndicators::default()
            },
            rationale: "momentum".to_string(),
            timeframe: "3-7 days".to_string(),
        }
    }

    fn ledger() -> (Ledger, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Ledger::new(store.clone()), store)
    }

    #[test]
    fn test_first_detection_creates() {
        let (ledger, store) = ledger();
        let now = Utc::now();
        let result = ledger.reconcile(payload(100.0, 0.8), now).unwrap();

        assert!(result.is_created());
        assert!(result.record.id > 0);
        assert!(result.record.is_new);
        assert_eq!(result.record.first_detected, now);

        let history = store.history(result.record.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].change_type, ChangeType::Created);
        assert_eq!(
            history[0].new_value.as_deref(),
            Some("New Bullish Momentum opportunity")
        );
    }

    #[test]
    fn test_unchanged_payload_bumps_last_updated_only() {
        let (ledger, store) = ledger();
        let t0 = Utc::now();
        let first = ledger.reconcile(payload(100.0, 0.8), t0).unwrap();

        let t1 = t0 + Duration::minutes(10);
        let second = ledger.reconcile(payload(100.0, 0.8), t1).unwrap();

        assert_eq!(second.outcome, Reconciliation::Updated { changed_fields: 0 });
        assert_eq!(second.record.id, first.record.id);
        assert!(!second.record.is_new);
        assert_eq!(second.record.last_updated, t1);
        assert_eq!(second.record.first_detected, t0);
        assert_eq!(store.history(first.record.id).unwrap().len(), 1);
    }

    #[test]
    fn test_price_and_confidence_deltas_use_prior_values() {
        let (ledger, store) = ledger();
        let t0 = Utc::now();
        let id = ledger.reconcile(payload(100.0, 0.8), t0).unwrap().record.id;

        let second = ledger
            .reconcile(payload(110.0, 0.85), t0 + Duration::days(1))
            .unwrap();
        assert_eq!(second.outcome, Reconciliation::Updated { changed_fields: 2 });
        assert!(second.record.is_new);
        assert!((second.record.price_change_pct - 10.0).abs() < 1e-9);
        assert!((second.record.confidence_change - 0.05).abs() < 1e-9);

        // Relative to 110, not the first-detected 100
        let third = ledger
            .reconcile(payload(121.0, 0.85), t0 + Duration::days(2))
            .unwrap();
        assert!((third.record.price_change_pct - 10.0).abs() < 1e-9);
        // Confidence unchanged, previous delta kept
        assert!((third.record.confidence_change - 0.05).abs() < 1e-9);

        let history = store.history(id).unwrap();
        let price_entries: Vec<&HistoryEntry> =
            history.iter().filter(|h| h.field_name == "price").collect();
        assert_eq!(price_entries.len(), 2);
        assert_eq!(price_entries[0].old_value.as_deref(), Some("110"));
        assert_eq!(price_entries[0].new_value.as_deref(), Some("121"));
    }

    #[test]
    fn test_key_indicator_change_is_logged_as_json() {
        let (ledger, store) = ledger();
        let t0 = Utc::now();
        let id = ledger.reconcile(payload(100.0, 0.8), t0).unwrap().record.id;

        let mut changed = payload(100.0, 0.8);
        changed.key_indicators.rsi = Some(64.0);
        ledger.reconcile(changed, t0 + Duration::hours(1)).unwrap();

        let history = store.history(id).unwrap();
        assert_eq!(history[0].field_name, "key_indicators");
        assert!(history[0].old_value.as_deref().unwrap().contains("62.5"));
        assert!(history[0].new_value.as_deref().unwrap().contains("64.0"));
    }

    #[test]
    fn test_change_status_releases_pair() {
        let (ledger, store) = ledger();
        let first = ledger.reconcile(payload(100.0, 0.8), Utc::now()).unwrap();

        let closed = ledger
            .change_status(first.record.id, OpportunityStatus::Closed)
            .unwrap();
        assert_eq!(closed.status, OpportunityStatus::Closed);

        let history = store.history(first.record.id).unwrap();
        assert_eq!(history[0].change_type, ChangeType::StatusChange);
        assert_eq!(history[0].old_value.as_deref(), Some("active"));
        assert_eq!(history[0].new_value.as_deref(), Some("closed"));

        let second = ledger.reconcile(payload(100.0, 0.8), Utc::now()).unwrap();
        assert!(second.is_created());
        assert_ne!(second.record.id, first.record.id);
    }

    #[test]
    fn test_change_status_unknown_id() {
        let (ledger, _) = ledger();
        assert!(matches!(
            ledger.change_status(5, OpportunityStatus::Expired),
            Err(StoreError::NotFound(5))
        ));
    }

    #[test]
    fn test_concurrent_reconcile_single_active_record() {
        let (ledger, store) = ledger();
        let ledger = Arc::new(ledger);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    ledger
                        .reconcile(payload(100.0 + i as f64, 0.8), Utc::now())
                        .unwrap()
                })
            })
            .collect();
        let results: Vec<Reconciled> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_created()).count(), 1);
        assert_eq!(store.active_opportunities(10).unwrap().len(), 1);
    }

    #[test]
    fn test_reactivation_blocked_by_replacement() {
        let (ledger, store) = ledger();
        let first = ledger.reconcile(payload(100.0, 0.8), Utc::now()).unwrap();
        ledger
            .change_status(first.record.id, OpportunityStatus::Closed)
            .unwrap();
        let second = ledger.reconcile(payload(101.0, 0.8), Utc::now()).unwrap();

        let result = ledger.change_status(first.record.id, OpportunityStatus::Active);
        assert!(matches!(
            result,
            Err(StoreError::ActiveConflict { id, active })
                if id == first.record.id && active == second.record.id
        ));
        assert_eq!(
            store.get(first.record.id).unwrap().unwrap().status,
            OpportunityStatus::Closed
        );

        // Free again once the replacement is retired.
        ledger
            .change_status(second.record.id, OpportunityStatus::Expired)
            .unwrap();
        let reopened = ledger
            .change_status(first.record.id, OpportunityStatus::Active)
            .unwrap();
        assert_eq!(reopened.status, OpportunityStatus::Active);
        assert_eq!(store.active_opportunities(10).unwrap().len(), 1);
    }

    #[test]
    fn test_pair_locks_are_released() {
        let (ledger, _) = ledger();
        let ledger = Arc::new(ledger);

        let handles: Vec<_> = ["AAPL", "MSFT", "NVDA", "AMD"]
            .into_iter()
            .map(|ticker| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    let mut detected = payload(100.0, 0.8);
                    detected.ticker = ticker.to_string();
                    ledger.reconcile(detected, Utc::now()).unwrap().record.id
                })
            })
            .collect();
        let ids: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ledger.held_locks(), 0);

        ledger.change_status(ids[0], OpportunityStatus::Closed).unwrap();
        assert!(ledger.change_status(999, OpportunityStatus::Closed).is_err());
        assert_eq!(ledger.held_locks(), 0);
    }
}
