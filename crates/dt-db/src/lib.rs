//! Storage and aggregation engine for the developer activity tracker.
//!
//! Persists raw events, sessions, tool events, commits, project mappings and
//! daily summaries using `rusqlite`, and applies every inbound event to the
//! derived state inside a single transaction.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Each writer (thread or process) opens its own `Database` on the same file.
//! File databases run in WAL mode with a bounded busy timeout, and every
//! mutation runs in a `BEGIN IMMEDIATE` transaction, so concurrent writers are
//! serialized by SQLite and wait at most [`BUSY_TIMEOUT`] for each other.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in ISO 8601 format with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`), so lexicographic ordering matches
//! chronological ordering. Calendar days are stored as `YYYY-MM-DD` (UTC).
//!
//! ## Event Payload Storage
//!
//! The `data` column of `events` stores the full JSON-serialized event and the
//! `type` column its canonical event type. Events are never updated or deleted.

mod commits;
mod events;
mod ingest;
mod mappings;
mod sessions;
mod summaries;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use thiserror::Error;

use dt_core::ValidationError;

pub use commits::CommitGap;
pub use events::{StoredEvent, TypeLastEvent};
pub use ingest::IngestOutcome;
pub use summaries::RebuildStats;

/// How long a writer waits for another connection's transaction to finish.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The input was rejected before anything was written.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The operation referenced an entity that does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    /// Failed to encode or decode a stored JSON payload.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    /// Failed to parse a stored timestamp or date.
    #[error("invalid {column} value: {value}")]
    TimestampParse {
        column: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row holds a value the domain types reject.
    #[error("invalid {table} row: {message}")]
    InvalidRow { table: &'static str, message: String },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::trace!(path = %path.display(), %journal_mode, "opened database");
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            -- Events table: append-only record of raw hook submissions
            -- id: deterministic content id, so re-deliveries collide
            -- type: canonical event type (e.g., 'tool_start')
            -- data: full JSON event
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                type TEXT NOT NULL,
                session_id TEXT,
                repo_path TEXT,
                data TEXT NOT NULL,
                received_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
            CREATE INDEX IF NOT EXISTS idx_events_type ON events(type);
            CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id);

            CREATE TABLE IF NOT EXISTS project_mappings (
                repo_path TEXT PRIMARY KEY,
                project_key TEXT NOT NULL,
                display_name TEXT NOT NULL,
                phase TEXT NOT NULL DEFAULT 'development',
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                repo_path TEXT NOT NULL,
                project_key TEXT,
                date TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT,
                tool_call_count INTEGER NOT NULL DEFAULT 0,
                active_coding_ms INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'active'
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_repo_date ON sessions(repo_path, date);
            CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);

            CREATE TABLE IF NOT EXISTS tool_events (
                session_id TEXT NOT NULL,
                tool_name TEXT NOT NULL,
                phase TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                exit_code INTEGER,
                after_close INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (session_id, tool_name, phase, timestamp),
                FOREIGN KEY (session_id) REFERENCES sessions(session_id)
            );

            CREATE TABLE IF NOT EXISTS commits (
                hash TEXT PRIMARY KEY,
                repo_path TEXT NOT NULL,
                session_id TEXT,
                project_key TEXT,
                timestamp TEXT NOT NULL,
                date TEXT NOT NULL,
                message TEXT NOT NULL,
                author TEXT,
                branch TEXT,
                insertions INTEGER NOT NULL DEFAULT 0,
                deletions INTEGER NOT NULL DEFAULT 0,
                files_changed INTEGER NOT NULL DEFAULT 0,
                pushed_externally INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_commits_repo_date ON commits(repo_path, date);
            CREATE INDEX IF NOT EXISTS idx_commits_timestamp ON commits(timestamp);

            CREATE TABLE IF NOT EXISTS daily_summaries (
                date TEXT NOT NULL,
                repo_path TEXT NOT NULL,
                project_key TEXT,
                total_sessions INTEGER NOT NULL DEFAULT 0,
                total_dev_hours REAL NOT NULL DEFAULT 0,
                active_coding_hours REAL NOT NULL DEFAULT 0,
                total_commits INTEGER NOT NULL DEFAULT 0,
                total_insertions INTEGER NOT NULL DEFAULT 0,
                total_deletions INTEGER NOT NULL DEFAULT 0,
                avg_commit_gap_minutes REAL,
                commits_per_hour REAL NOT NULL DEFAULT 0,
                lines_per_hour REAL NOT NULL DEFAULT 0,
                PRIMARY KEY (date, repo_path)
            );
            ",
        )?;
        Ok(())
    }

    /// Starts a write transaction that holds the database write lock from the start.
    fn immediate(&mut self) -> Result<Transaction<'_>, DbError> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: &str, column: &'static str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            column,
            value: value.to_string(),
            source,
        })
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(value: &str, column: &'static str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|source| DbError::TimestampParse {
        column,
        value: value.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn open_file_database_uses_wal() {
        let temp = tempfile::tempdir().unwrap();
        let db = Database::open(&temp.path().join("dt.db")).unwrap();
        let mode: String = db
            .conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn init_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("dt.db");
        drop(Database::open(&path).unwrap());
        assert!(Database::open(&path).is_ok());
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().expect("open in-memory db");

        assert_eq!(
            table_columns(&db.conn, "events"),
            vec![
                "id",
                "timestamp",
                "type",
                "session_id",
                "repo_path",
                "data",
                "received_at",
            ]
        );
        assert_eq!(
            table_columns(&db.conn, "sessions"),
            vec![
                "session_id",
                "repo_path",
                "project_key",
                "date",
                "started_at",
                "ended_at",
                "tool_call_count",
                "active_coding_ms",
                "status",
            ]
        );
        assert_eq!(
            table_columns(&db.conn, "tool_events"),
            vec![
                "session_id",
                "tool_name",
                "phase",
                "timestamp",
                "exit_code",
                "after_close"
            ]
        );
        assert_eq!(
            table_columns(&db.conn, "daily_summaries"),
            vec![
                "date",
                "repo_path",
                "project_key",
                "total_sessions",
                "total_dev_hours",
                "active_coding_hours",
                "total_commits",
                "total_insertions",
                "total_deletions",
                "avg_commit_gap_minutes",
                "commits_per_hour",
                "lines_per_hour",
            ]
        );

        let event_indexes = index_names(&db.conn, "events");
        let expected: HashSet<String> = [
            "idx_events_timestamp",
            "idx_events_type",
            "idx_events_session",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert!(expected.is_subset(&event_indexes));
        assert!(index_names(&db.conn, "commits").contains("idx_commits_repo_date"));
    }

    #[test]
    fn date_helpers_roundtrip() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert_eq!(format_date(date), "2025-03-09");
        assert_eq!(parse_date("2025-03-09", "date").unwrap(), date);
        assert!(matches!(
            parse_date("03/09/2025", "date"),
            Err(DbError::TimestampParse { column: "date", .. })
        ));
    }

    #[test]
    fn timestamps_sort_lexicographically() {
        let early = parse_timestamp("2025-03-09T09:00:00Z", "timestamp").unwrap();
        let late = parse_timestamp("2025-03-09T10:00:00.5Z", "timestamp").unwrap();
        assert!(format_timestamp(early) < format_timestamp(late));
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .expect("prepare table_info");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query table_info");
        rows.map(|row| row.expect("table_info row")).collect()
    }

    fn index_names(conn: &Connection, table: &str) -> HashSet<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA index_list({table})"))
            .expect("prepare index_list");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query index_list");
        rows.map(|row| row.expect("index_list row")).collect()
    }
}
