//! Session lifecycle and tool-event storage.
//!
//! A session is opened by its first start or tool event and closed exactly
//! once. Closing fixes `active_coding_ms` from the stored tool events that
//! fall between start and end, and merges the session's hours into the daily
//! summary of its start day.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use dt_core::{
    ApplyOutcome, ProjectKey, Session, SessionId, SessionStatus, SummaryDelta, ToolEvent,
    ToolPhase, ValidationError, active_coding_ms_between, require_non_empty, require_non_negative,
    session_id_for,
};

use crate::mappings::project_key_for;
use crate::summaries::merge_in;
use crate::{Database, DbError, format_date, format_timestamp, parse_date, parse_timestamp};

const MS_PER_HOUR: f64 = 3_600_000.0;

impl Database {
    /// Opens the session for `repo_path` on the day of `started_at`.
    ///
    /// Starting a session that already exists is a no-op; the original start
    /// time is kept.
    pub fn apply_session_start(
        &mut self,
        repo_path: &str,
        started_at: DateTime<Utc>,
    ) -> Result<(SessionId, ApplyOutcome), DbError> {
        require_non_empty("repo path", repo_path)?;
        let session_id = session_id_for(repo_path, started_at);
        let tx = self.immediate()?;
        let outcome = session_start_in(&tx, &session_id, repo_path, started_at)?;
        tx.commit()?;
        Ok((session_id, outcome))
    }

    /// Closes a session and merges its hours into the daily summary.
    ///
    /// Closing an already-closed session returns [`ApplyOutcome::AlreadyApplied`]
    /// and changes nothing. The stored tool call count becomes the larger of
    /// the observed count and `tool_call_count`.
    pub fn apply_session_end(
        &mut self,
        session_id: &SessionId,
        ended_at: DateTime<Utc>,
        tool_call_count: i64,
    ) -> Result<ApplyOutcome, DbError> {
        let tx = self.immediate()?;
        let outcome = session_end_in(&tx, session_id, ended_at, tool_call_count)?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Records one tool start or end, creating the session when needed.
    ///
    /// A repeated `(session, tool, phase, timestamp)` is ignored. Tool starts
    /// on an open session increment its tool call count.
    pub fn apply_tool_event(
        &mut self,
        repo_path: &str,
        event: &ToolEvent,
    ) -> Result<ApplyOutcome, DbError> {
        let tx = self.immediate()?;
        let outcome = tool_event_in(&tx, repo_path, event)?;
        tx.commit()?;
        Ok(outcome)
    }

    pub fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>, DbError> {
        load_session(&self.conn, session_id)
    }

    /// Sessions, newest start first, optionally filtered by status.
    pub fn list_sessions(&self, status: Option<SessionStatus>) -> Result<Vec<Session>, DbError> {
        list_sessions_in(&self.conn, status)
    }

    /// Tool events recorded for a session, in timestamp order.
    pub fn tool_events(&self, session_id: &SessionId) -> Result<Vec<ToolEvent>, DbError> {
        tool_events_in(&self.conn, session_id)
    }

    /// Number of sessions that have not been closed.
    pub fn active_session_count(&self) -> Result<i64, DbError> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE status = 'active'",
            [],
            |row| row.get(0),
        )?)
    }
}

pub(crate) fn session_start_in(
    conn: &Connection,
    session_id: &SessionId,
    repo_path: &str,
    started_at: DateTime<Utc>,
) -> Result<ApplyOutcome, DbError> {
    require_non_empty("repo path", repo_path)?;
    let project_key = project_key_for(conn, repo_path)?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO sessions
            (session_id, repo_path, project_key, date, started_at, status)
         VALUES (?1, ?2, ?3, ?4, ?5, 'active')",
        params![
            session_id.as_str(),
            repo_path,
            project_key.as_ref().map(ProjectKey::as_str),
            format_date(started_at.date_naive()),
            format_timestamp(started_at),
        ],
    )?;
    if inserted == 0 {
        tracing::trace!(session = %session_id, "session already open");
        return Ok(ApplyOutcome::AlreadyApplied);
    }
    tracing::debug!(session = %session_id, repo = repo_path, "opened session");
    Ok(ApplyOutcome::Applied)
}

#[allow(clippy::cast_precision_loss, reason = "millisecond spans fit in f64")]
pub(crate) fn session_end_in(
    conn: &Connection,
    session_id: &SessionId,
    ended_at: DateTime<Utc>,
    tool_call_count: i64,
) -> Result<ApplyOutcome, DbError> {
    require_non_negative("tool call count", tool_call_count)?;
    let session = load_session(conn, session_id)?.ok_or_else(|| DbError::NotFound {
        entity: "session",
        id: session_id.to_string(),
    })?;
    if session.ended_at.is_some() {
        tracing::debug!(session = %session_id, "session already closed");
        return Ok(ApplyOutcome::AlreadyApplied);
    }
    if ended_at < session.started_at {
        return Err(ValidationError::EndBeforeStart {
            start: format_timestamp(session.started_at),
            end: format_timestamp(ended_at),
        }
        .into());
    }

    let active_ms = active_coding_ms_between(
        &tool_events_in(conn, session_id)?,
        session.started_at,
        ended_at,
    );
    let closed = conn.execute(
        "UPDATE sessions
         SET ended_at = ?1,
             status = 'completed',
             tool_call_count = MAX(tool_call_count, ?2),
             active_coding_ms = ?3
         WHERE session_id = ?4 AND ended_at IS NULL",
        params![
            format_timestamp(ended_at),
            tool_call_count,
            active_ms,
            session_id.as_str(),
        ],
    )?;
    if closed == 0 {
        return Ok(ApplyOutcome::AlreadyApplied);
    }

    let dev_hours =
        ended_at.signed_duration_since(session.started_at).num_milliseconds() as f64 / MS_PER_HOUR;
    let delta = SummaryDelta::session_closed(dev_hours, active_ms as f64 / MS_PER_HOUR);
    merge_in(
        conn,
        session.date,
        &session.repo_path,
        &delta,
        session.project_key.as_ref(),
    )?;
    tracing::debug!(
        session = %session_id,
        dev_hours,
        active_ms,
        "closed session"
    );
    Ok(ApplyOutcome::Applied)
}

pub(crate) fn tool_event_in(
    conn: &Connection,
    repo_path: &str,
    event: &ToolEvent,
) -> Result<ApplyOutcome, DbError> {
    require_non_empty("tool name", &event.tool_name)?;
    session_start_in(conn, &event.session_id, repo_path, event.timestamp)?;

    let still_open: bool = conn.query_row(
        "SELECT ended_at IS NULL FROM sessions WHERE session_id = ?1",
        [event.session_id.as_str()],
        |row| row.get(0),
    )?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO tool_events
             (session_id, tool_name, phase, timestamp, exit_code, after_close)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.session_id.as_str(),
            event.tool_name,
            event.phase.as_str(),
            format_timestamp(event.timestamp),
            event.exit_code,
            !still_open,
        ],
    )?;
    if inserted == 0 {
        return Ok(ApplyOutcome::AlreadyApplied);
    }

    if still_open && event.phase == ToolPhase::Start {
        conn.execute(
            "UPDATE sessions SET tool_call_count = tool_call_count + 1 WHERE session_id = ?1",
            [event.session_id.as_str()],
        )?;
    }
    if !still_open {
        tracing::warn!(
            session = %event.session_id,
            tool = %event.tool_name,
            "tool event after session close; stored without affecting totals"
        );
    }
    Ok(ApplyOutcome::Applied)
}

pub(crate) fn session_exists(conn: &Connection, session_id: &SessionId) -> Result<bool, DbError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM sessions WHERE session_id = ?1",
            [session_id.as_str()],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

const SESSION_COLUMNS: &str = "session_id, repo_path, project_key, date, started_at, ended_at,
    tool_call_count, active_coding_ms, status";

pub(crate) fn load_session(
    conn: &Connection,
    session_id: &SessionId,
) -> Result<Option<Session>, DbError> {
    conn.query_row(
        &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1"),
        [session_id.as_str()],
        SessionRow::from_row,
    )
    .optional()?
    .map(SessionRow::into_session)
    .transpose()
}

pub(crate) fn list_sessions_in(
    conn: &Connection,
    status: Option<SessionStatus>,
) -> Result<Vec<Session>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions
         WHERE (?1 IS NULL OR status = ?1)
         ORDER BY started_at DESC, session_id ASC"
    ))?;
    let rows = stmt.query_map([status.as_ref().map(SessionStatus::as_str)], SessionRow::from_row)?;
    rows.map(|row| row?.into_session()).collect()
}

pub(crate) fn tool_events_in(
    conn: &Connection,
    session_id: &SessionId,
) -> Result<Vec<ToolEvent>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT session_id, tool_name, phase, timestamp, exit_code
         FROM tool_events
         WHERE session_id = ?1
         ORDER BY timestamp ASC, phase DESC",
    )?;
    let rows = stmt.query_map([session_id.as_str()], ToolEventRow::from_row)?;
    rows.map(|row| row?.into_tool_event()).collect()
}

/// Tool events stored before their session closed, grouped by session in
/// timestamp order. Events that arrived after close are audit-only.
pub(crate) fn pre_close_tool_events_in(conn: &Connection) -> Result<Vec<ToolEvent>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT session_id, tool_name, phase, timestamp, exit_code
         FROM tool_events
         WHERE after_close = 0
         ORDER BY session_id ASC, timestamp ASC",
    )?;
    let rows = stmt.query_map([], ToolEventRow::from_row)?;
    rows.map(|row| row?.into_tool_event()).collect()
}

struct SessionRow {
    session_id: String,
    repo_path: String,
    project_key: Option<String>,
    date: String,
    started_at: String,
    ended_at: Option<String>,
    tool_call_count: i64,
    active_coding_ms: i64,
    status: String,
}

impl SessionRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            session_id: row.get(0)?,
            repo_path: row.get(1)?,
            project_key: row.get(2)?,
            date: row.get(3)?,
            started_at: row.get(4)?,
            ended_at: row.get(5)?,
            tool_call_count: row.get(6)?,
            active_coding_ms: row.get(7)?,
            status: row.get(8)?,
        })
    }

    fn into_session(self) -> Result<Session, DbError> {
        Ok(Session {
            session_id: SessionId::new(self.session_id)?,
            repo_path: self.repo_path,
            project_key: self.project_key.map(ProjectKey::new).transpose()?,
            date: parse_date(&self.date, "date")?,
            started_at: parse_timestamp(&self.started_at, "started_at")?,
            ended_at: self
                .ended_at
                .as_deref()
                .map(|value| parse_timestamp(value, "ended_at"))
                .transpose()?,
            tool_call_count: self.tool_call_count,
            active_coding_ms: self.active_coding_ms,
            status: self.status.parse()?,
        })
    }
}

struct ToolEventRow {
    session_id: String,
    tool_name: String,
    phase: String,
    timestamp: String,
    exit_code: Option<i32>,
}

impl ToolEventRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            session_id: row.get(0)?,
            tool_name: row.get(1)?,
            phase: row.get(2)?,
            timestamp: row.get(3)?,
            exit_code: row.get(4)?,
        })
    }

    fn into_tool_event(self) -> Result<ToolEvent, DbError> {
        Ok(ToolEvent {
            session_id: SessionId::new(self.session_id)?,
            tool_name: self.tool_name,
            phase: self.phase.parse()?,
            timestamp: parse_timestamp(&self.timestamp, "timestamp")?,
            exit_code: self.exit_code,
        })
    }
}
