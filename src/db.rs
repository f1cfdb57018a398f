//! Session list persistence
//!
//! Only sidebar metadata lives here. Failures are logged and absorbed: a
//! broken store must never take a conversation down with it.

mod schema;

pub use schema::SessionSummary;
use schema::SCHEMA;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe session list handle
#[derive(Clone)]
pub struct SessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SessionStore {
    /// Open or create the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory store (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Public, failure-absorbing API ====================

    /// Insert or replace a summary
    pub fn save(&self, summary: &SessionSummary) {
        if let Err(e) = self.try_save(summary) {
            tracing::warn!(session = %summary.id, error = %e, "Failed to save session");
        }
    }

    pub fn load(&self, id: &str) -> Option<SessionSummary> {
        self.try_load(id).unwrap_or_else(|e| {
            tracing::warn!(session = %id, error = %e, "Failed to load session");
            None
        })
    }

    /// All sessions, most recently updated first
    pub fn list(&self) -> Vec<SessionSummary> {
        self.try_list().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to list sessions");
            Vec::new()
        })
    }

    pub fn delete(&self, id: &str) {
        if let Err(e) = self.try_delete(id) {
            tracing::warn!(session = %id, error = %e, "Failed to delete session");
        }
    }

    /// Update counters and bump `updated_at`
    pub fn update_metadata(&self, id: &str, message_count: Option<u32>, total_cost: Option<f64>) {
        if let Err(e) = self.try_update_metadata(id, message_count, total_cost) {
            tracing::warn!(session = %id, error = %e, "Failed to update session metadata");
        }
    }

    // ==================== Fallible operations ====================

    fn try_save(&self, summary: &SessionSummary) -> DbResult<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO sessions (id, title, project_name, message_count, total_cost, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                summary.id,
                summary.title,
                summary.project_name,
                summary.message_count,
                summary.total_cost,
                format_timestamp(&summary.created_at),
                format_timestamp(&summary.updated_at),
            ],
        )?;
        Ok(())
    }

    fn try_load(&self, id: &str) -> DbResult<Option<SessionSummary>> {
        let conn = self.conn();
        let raw = conn
            .query_row(
                "SELECT id, title, project_name, message_count, total_cost, created_at, updated_at
                 FROM sessions WHERE id = ?1",
                params![id],
                RawSummary::from_row,
            )
            .optional()?;
        raw.map(RawSummary::parse).transpose()
    }

    fn try_list(&self) -> DbResult<Vec<SessionSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, title, project_name, message_count, total_cost, created_at, updated_at
             FROM sessions ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map([], RawSummary::from_row)?;
        let summaries: DbResult<Vec<_>> = rows
            .map(|row| row.map_err(DbError::from).and_then(RawSummary::parse))
            .collect();
        summaries
    }

    fn try_delete(&self, id: &str) -> DbResult<()> {
        self.conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn try_update_metadata(
        &self,
        id: &str,
        message_count: Option<u32>,
        total_cost: Option<f64>,
    ) -> DbResult<()> {
        self.conn().execute(
            "UPDATE sessions
             SET message_count = COALESCE(?2, message_count),
                 total_cost = COALESCE(?3, total_cost),
                 updated_at = ?4
             WHERE id = ?1",
            params![id, message_count, total_cost, format_timestamp(&Utc::now())],
        )?;
        Ok(())
    }
}

/// Row as stored, timestamps still text
struct RawSummary {
    id: String,
    title: String,
    project_name: String,
    message_count: u32,
    total_cost: f64,
    created_at: String,
    updated_at: String,
}

impl RawSummary {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            project_name: row.get(2)?,
            message_count: row.get(3)?,
            total_cost: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn parse(self) -> DbResult<SessionSummary> {
        Ok(SessionSummary {
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            id: self.id,
            title: self.title,
            project_name: self.project_name,
            message_count: self.message_count,
            total_cost: self.total_cost,
        })
    }
}

/// Fixed-width so text order is time order
fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| DbError::Timestamp {
            value: value.to_string(),
            source,
        })
}
