//! Session persistence
//!
//! One row per chat holding the serialized session and its expiry. Expired
//! rows read as absent and are removed lazily or by `purge_expired`.

mod schema;

pub use schema::*;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Session TTL out of range")]
    TtlOutOfRange,
    #[error("Database lock poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database (for testing)
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

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    // ==================== Session Operations ====================

    /// Load a live session; `None` when missing or expired
    pub fn get_session(&self, chat_id: &str) -> DbResult<Option<SessionRecord>> {
        let conn = self.conn()?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT payload, expires_at FROM sessions WHERE chat_id = ?1",
                params![chat_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((payload, expires_at)) = row else {
            return Ok(None);
        };
        if expires_at <= timestamp(Utc::now()) {
            conn.execute("DELETE FROM sessions WHERE chat_id = ?1", params![chat_id])?;
            return Ok(None);
        }
        Ok(Some(SessionRecord::from_json(&payload)))
    }

    /// Upsert a session, restarting its time to live
    pub fn put_session(&self, chat_id: &str, record: &SessionRecord, ttl: Duration) -> DbResult<()> {
        let payload = serde_json::to_string(record)?;
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| DbError::TtlOutOfRange)?;
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or(DbError::TtlOutOfRange)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (chat_id, payload, expires_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(chat_id) DO UPDATE SET
                payload = excluded.payload,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at",
            params![chat_id, payload, timestamp(expires_at), timestamp(now)],
        )?;
        Ok(())
    }

    pub fn delete_session(&self, chat_id: &str) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM sessions WHERE chat_id = ?1", params![chat_id])?;
        Ok(())
    }

    /// Remove every expired session, returning how many were dropped
    pub fn purge_expired(&self) -> DbResult<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![timestamp(Utc::now())],
        )?;
        Ok(removed)
    }
}

/// Fixed-width UTC timestamps so SQL string comparison orders them
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
