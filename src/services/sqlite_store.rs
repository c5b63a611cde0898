//! SQLite persistence layer for the opportunity ledger.
//!
//! Three tables:
//! - `opportunities`: one row per detected setup, `key_indicators` as JSON text
//! - `opportunity_history`: append-only field change log
//! - `agent_actions`: one audit row per scan
//!
//! Timestamps are stored as Unix milliseconds.

use crate::error::StoreError;
use crate::services::store::OpportunityStore;
use crate::types::{
    ActionStatus, AgentAction, ChangeType, HistoryEntry, OpportunityRecord, OpportunityStatus,
    SetupType, StoreStats,
};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const OPPORTUNITY_COLUMNS: &str = "id, ticker, setup_type, confidence_score, price, volume, \
     key_indicators, rationale, timeframe, first_detected, last_updated, status, is_new, \
     price_change_pct, confidence_change";

const HISTORY_COLUMNS: &str =
    "id, opportunity_id, timestamp, field_name, old_value, new_value, change_type";

const ACTION_COLUMNS: &str = "id, agent_name, action_type, timestamp, opportunities_processed, \
     new_opportunities, execution_time_seconds, status, notes";

/// SQLite store for opportunities, history and agent actions.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS opportunities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticker TEXT NOT NULL,
                setup_type TEXT NOT NULL,
                confidence_score REAL NOT NULL,
                price REAL NOT NULL,
                volume INTEGER NOT NULL,
                key_indicators TEXT NOT NULL,
                rationale TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                first_detected INTEGER NOT NULL,
                last_updated INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                is_new INTEGER NOT NULL DEFAULT 1,
                price_change_pct REAL NOT NULL DEFAULT 0,
                confidence_change REAL NOT NULL DEFAULT 0
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_opportunities_ticker ON opportunities(ticker)",
            [],
        )?;
        // At most one active row per (ticker, setup_type)
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_opportunities_active_pair
             ON opportunities(ticker, setup_type) WHERE status = 'active'",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_opportunities_last_updated
             ON opportunities(last_updated DESC)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS opportunity_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                opportunity_id INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                field_name TEXT NOT NULL,
                old_value TEXT,
                new_value TEXT,
                change_type TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_history_opportunity
             ON opportunity_history(opportunity_id, timestamp DESC)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS agent_actions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                agent_name TEXT NOT NULL,
                action_type TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                opportunities_processed INTEGER NOT NULL DEFAULT 0,
                new_opportunities INTEGER NOT NULL DEFAULT 0,
                execution_time_seconds REAL NOT NULL,
                status TEXT NOT NULL,
                notes TEXT
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_actions_agent
             ON agent_actions(agent_name, timestamp DESC)",
            [],
        )?;

        info!("SQLite schema initialized");
        Ok(())
    }
}

impl OpportunityStore for SqliteStore {
    // ========== Opportunity Methods ==========

    fn find_active(
        &self,
        ticker: &str,
        setup_type: SetupType,
    ) -> Result<Option<OpportunityRecord>, StoreError> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM opportunities
                     WHERE ticker = ?1 AND setup_type = ?2 AND status = 'active'",
                    OPPORTUNITY_COLUMNS
                ),
                params![ticker, setup_type.label()],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn get(&self, id: i64) -> Result<Option<OpportunityRecord>, StoreError> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM opportunities WHERE id = ?1", OPPORTUNITY_COLUMNS),
                params![id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn upsert(&self, record: &OpportunityRecord) -> Result<i64, StoreError> {
        let key_indicators = serde_json::to_string(&record.key_indicators)?;
        let conn = self.conn()?;

        if record.id == 0 {
            conn.execute(
                "INSERT INTO opportunities (ticker, setup_type, confidence_score, price, volume,
                    key_indicators, rationale, timeframe, first_detected, last_updated, status,
                    is_new, price_change_pct, confidence_change)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    record.ticker,
                    record.setup_type.label(),
                    record.confidence_score,
                    record.price,
                    record.volume,
                    key_indicators,
                    record.rationale,
                    record.timeframe,
                    record.first_detected.timestamp_millis(),
                    record.last_updated.timestamp_millis(),
                    record.status.as_str(),
                    record.is_new,
                    record.price_change_pct,
                    record.confidence_change,
                ],
            )?;
            let id = conn.last_insert_rowid();
            debug!("Inserted opportunity {} ({} {})", id, record.ticker, record.setup_type);
            return Ok(id);
        }

        let changed = conn.execute(
            "UPDATE opportunities SET
                ticker = ?2, setup_type = ?3, confidence_score = ?4, price = ?5, volume = ?6,
                key_indicators = ?7, rationale = ?8, timeframe = ?9, first_detected = ?10,
                last_updated = ?11, status = ?12, is_new = ?13, price_change_pct = ?14,
                confidence_change = ?15
             WHERE id = ?1",
            params![
                record.id,
                record.ticker,
                record.setup_type.label(),
                record.confidence_score,
                record.price,
                record.volume,
                key_indicators,
                record.rationale,
                record.timeframe,
                record.first_detected.timestamp_millis(),
                record.last_updated.timestamp_millis(),
                record.status.as_str(),
                record.is_new,
                record.price_change_pct,
                record.confidence_change,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(record.id));
        }
        Ok(record.id)
    }

    fn active_opportunities(&self, limit: usize) -> Result<Vec<OpportunityRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM opportunities WHERE status = 'active'
             ORDER BY last_updated DESC, id DESC LIMIT ?1",
            OPPORTUNITY_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![limit as i64], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn new_opportunities(&self) -> Result<Vec<OpportunityRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM opportunities WHERE is_new = 1 AND status = 'active' ORDER BY id",
            OPPORTUNITY_COLUMNS
        ))?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn mark_processed(&self, ids: &[i64]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let conn = self.conn()?;
        let marked = conn.execute(
            &format!(
                "UPDATE opportunities SET is_new = 0 WHERE id IN ({})",
                placeholders
            ),
            params_from_iter(ids.iter()),
        )?;
        Ok(marked)
    }

    fn set_status(&self, id: i64, status: OpportunityStatus) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE opportunities SET status = ?2 WHERE id = ?1",
            params![id, status.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    // ========== History Methods ==========

    fn append_history(&self, entry: &HistoryEntry) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO opportunity_history
                (opportunity_id, timestamp, field_name, old_value, new_value, change_type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.opportunity_id,
                entry.timestamp.timestamp_millis(),
                entry.field_name,
                entry.old_value,
                entry.new_value,
                entry.change_type.as_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn history(&self, opportunity_id: i64) -> Result<Vec<HistoryEntry>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM opportunity_history WHERE opportunity_id = ?1
             ORDER BY timestamp DESC, id DESC",
            HISTORY_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![opportunity_id], row_to_history)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // ========== Agent Action Methods ==========

    fn append_action(&self, action: &AgentAction) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO agent_actions (agent_name, action_type, timestamp,
                opportunities_processed, new_opportunities, execution_time_seconds, status, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                action.agent_name,
                action.action_type,
                action.timestamp.timestamp_millis(),
                action.opportunities_processed,
                action.new_opportunities,
                action.execution_time_seconds,
                action.status.as_str(),
                action.notes,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn recent_actions(
        &self,
        agent_name: &str,
        limit: usize,
    ) -> Result<Vec<AgentAction>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM agent_actions WHERE agent_name = ?1
             ORDER BY timestamp DESC, id DESC LIMIT ?2",
            ACTION_COLUMNS
        ))?;
        let actions = stmt
            .query_map(params![agent_name, limit as i64], row_to_action)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(actions)
    }

    // ========== Stats ==========

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.conn()?;
        let count = |sql: &str| -> Result<u64, rusqlite::Error> {
            conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|n| n as u64)
        };

        let total_opportunities = count("SELECT COUNT(*) FROM opportunities")?;
        let new_opportunities = count("SELECT COUNT(*) FROM opportunities WHERE is_new = 1")?;
        let history_records = count("SELECT COUNT(*) FROM opportunity_history")?;
        let agent_actions = count("SELECT COUNT(*) FROM agent_actions")?;

        let last_detected: Option<i64> =
            conn.query_row("SELECT MAX(first_detected) FROM opportunities", [], |row| {
                row.get(0)
            })?;
        let last_run: Option<i64> =
            conn.query_row("SELECT MAX(timestamp) FROM agent_actions", [], |row| row.get(0))?;

        Ok(StoreStats {
            total_opportunities,
            new_opportunities,
            history_records,
            agent_actions,
            last_detected: last_detected.map(from_millis),
            last_run: last_run.map(from_millis),
        })
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Parse a stored label column, surfacing unknown values as a conversion error.
fn parse_column<T>(row: &Row, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unrecognized value '{}'", raw).into(),
        )
    })
}

fn row_to_record(row: &Row) -> rusqlite::Result<OpportunityRecord> {
    let key_indicators_json: String = row.get(6)?;
    let key_indicators = serde_json::from_str(&key_indicators_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    Ok(OpportunityRecord {
        id: row.get(0)?,
        ticker: row.get(1)?,
        setup_type: parse_column(row, 2, SetupType::from_label)?,
        confidence_score: row.get(3)?,
        price: row.get(4)?,
        volume: row.get(5)?,
        key_indicators,
        rationale: row.get(7)?,
        timeframe: row.get(8)?,
        first_detected: from_millis(row.get(9)?),
        last_updated: from_millis(row.get(10)?),
        status: parse_column(row, 11, OpportunityStatus::from_str)?,
        is_new: row.get(12)?,
        price_change_pct: row.get(13)?,
        confidence_change: row.get(14)?,
    })
}

fn row_to_history(row: &Row) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: row.get(0)?,
        opportunity_id: row.get(1)?,
        timestamp: from_millis(row.get(2)?),
        field_name: row.get(3)?,
        old_value: row.get(4)?,
        new_value: row.get(5)?,
        change_type: parse_column(row, 6, ChangeType::from_str)?,
    })
}

fn row_to_action(row: &Row) -> rusqlite::Result<AgentAction> {
    Ok(AgentAction {
        id: row.get(0)?,
        agent_name: row.get(1)?,
        action_type: row.get(2)?,
        timestamp: from_millis(row.get(3)?),
        opportunities_processed: row.get(4)?,
        new_opportunities: row.get(5)?,
        execution_time_seconds: row.get(6)?,
        status: parse_column(row, 7, ActionStatus::from_str)?,
        notes: row.get(8)?,
    })
}
