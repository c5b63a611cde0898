//! Storage contract for the opportunity ledger.
//!
//! Operations are synchronous; implementations serialize access internally
//! and are shared behind an `Arc<dyn OpportunityStore>`.

use crate::error::StoreError;
use crate::types::{
    AgentAction, HistoryEntry, OpportunityRecord, OpportunityStatus, SetupType, StoreStats,
};
use std::sync::{Mutex, MutexGuard};

/// Persistent keyed storage for opportunities, their history and the agent
/// action log.
pub trait OpportunityStore: Send + Sync {
    /// The active record for a (ticker, setup type) pair, if any.
    fn find_active(
        &self,
        ticker: &str,
        setup_type: SetupType,
    ) -> Result<Option<OpportunityRecord>, StoreError>;

    fn get(&self, id: i64) -> Result<Option<OpportunityRecord>, StoreError>;

    /// Insert a record with `id == 0`, otherwise overwrite the stored row.
    /// Returns the record id.
    fn upsert(&self, record: &OpportunityRecord) -> Result<i64, StoreError>;

    fn append_history(&self, entry: &HistoryEntry) -> Result<i64, StoreError>;

    fn append_action(&self, action: &AgentAction) -> Result<i64, StoreError>;

    /// Active records, most recently updated first.
    fn active_opportunities(&self, limit: usize) -> Result<Vec<OpportunityRecord>, StoreError>;

    /// Active records still flagged `is_new`, oldest first.
    fn new_opportunities(&self) -> Result<Vec<OpportunityRecord>, StoreError>;

    /// Clear `is_new` on the given records. Returns how many rows matched.
    fn mark_processed(&self, ids: &[i64]) -> Result<usize, StoreError>;

    /// History of one record, newest first.
    fn history(&self, opportunity_id: i64) -> Result<Vec<HistoryEntry>, StoreError>;

    /// Actions logged under `agent_name`, newest first.
    fn recent_actions(&self, agent_name: &str, limit: usize)
        -> Result<Vec<AgentAction>, StoreError>;

    fn set_status(&self, id: i64, status: OpportunityStatus) -> Result<(), StoreError>;

    fn stats(&self) -> Result<StoreStats, StoreError>;
}

#[derive(Default)]
struct Tables {
    opportunities: Vec<OpportunityRecord>,
    history: Vec<HistoryEntry>,
    actions: Vec<AgentAction>,
}

/// In-process store. Rows are never deleted, so ids are row positions + 1.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl OpportunityStore for MemoryStore {
    fn find_active(
        &self,
        ticker: &str,
        setup_type: SetupType,
    ) -> Result<Option<OpportunityRecord>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .opportunities
            .iter()
            .find(|r| {
                r.ticker == ticker
                    && r.setup_type == setup_type
                    && r.status == OpportunityStatus::Active
            })
            .cloned())
    }

    fn get(&self, id: i64) -> Result<Option<OpportunityRecord>, StoreError> {
        let tables = self.lock()?;
        Ok(tables.opportunities.iter().find(|r| r.id == id).cloned())
    }

    fn upsert(&self, record: &OpportunityRecord) -> Result<i64, StoreError> {
        let mut tables = self.lock()?;
        if record.id == 0 {
            let id = tables.opportunities.len() as i64 + 1;
            let mut stored = record.clone();
            stored.id = id;
            tables.opportunities.push(stored);
            return Ok(id);
        }

        let slot = tables
            .opportunities
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or(StoreError::NotFound(record.id))?;
        *slot = record.clone();
        Ok(record.id)
    }

    fn append_history(&self, entry: &HistoryEntry) -> Result<i64, StoreError> {
        let mut tables = self.lock()?;
        let id = tables.history.len() as i64 + 1;
        let mut stored = entry.clone();
        stored.id = id;
        tables.history.push(stored);
        Ok(id)
    }

    fn append_action(&self, action: &AgentAction) -> Result<i64, StoreError> {
        let mut tables = self.lock()?;
        let id = tables.actions.len() as i64 + 1;
        let mut stored = action.clone();
        stored.id = id;
        tables.actions.push(stored);
        Ok(id)
    }

    fn active_opportunities(&self, limit: usize) -> Result<Vec<OpportunityRecord>, StoreError> {
        let tables = self.lock()?;
        let mut active: Vec<OpportunityRecord> = tables
            .opportunities
            .iter()
            .filter(|r| r.status == OpportunityStatus::Active)
            .cloned()
            .collect();
        active.sort_by(|a, b| {
            b.last_updated
                .cmp(&a.last_updated)
                .then_with(|| b.id.cmp(&a.id))
        });
        active.truncate(limit);
        Ok(active)
    }

    fn new_opportunities(&self) -> Result<Vec<OpportunityRecord>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .opportunities
            .iter()
            .filter(|r| r.is_new && r.status == OpportunityStatus::Active)
            .cloned()
            .collect())
    }

    fn mark_processed(&self, ids: &[i64]) -> Result<usize, StoreError> {
        let mut tables = self.lock()?;
        let mut marked = 0;
        for record in tables.opportunities.iter_mut().filter(|r| ids.contains(&r.id)) {
            record.is_new = false;
            marked += 1;
        }
        Ok(marked)
    }

    fn history(&self, opportunity_id: i64) -> Result<Vec<HistoryEntry>, StoreError> {
        let tables = self.lock()?;
        let mut entries: Vec<HistoryEntry> = tables
            .history
            .iter()
            .filter(|h| h.opportunity_id == opportunity_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        Ok(entries)
    }

    fn recent_actions(
        &self,
        agent_name: &str,
        limit: usize,
    ) -> Result<Vec<AgentAction>, StoreError> {
        let tables = self.lock()?;
        let mut actions: Vec<AgentAction> = tables
            .actions
            .iter()
            .filter(|a| a.agent_name == agent_name)
            .cloned()
            .collect();
        actions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        actions.truncate(limit);
        Ok(actions)
    }

    fn set_status(&self, id: i64, status: OpportunityStatus) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        let record = tables
            .opportunities
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        record.status = status;
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let tables = self.lock()?;
        Ok(StoreStats {
            total_opportunities: tables.opportunities.len() as u64,
            new_opportunities: tables.opportunities.iter().filter(|r| r.is_new).count() as u64,
            history_records: tables.history.len() as u64,
            agent_actions: tables.actions.len() as u64,
            last_detected: tables.opportunities.iter().map(|r| r.first_detected).max(),
            last_run: tables.actions.iter().map(|a| a.timestamp).max(),
        })
    }
}
