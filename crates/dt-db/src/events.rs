//! Append-only log of accepted events.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::Serialize;

use dt_core::{Event, EventType, SessionId};

use crate::{Database, DbError, format_timestamp, parse_timestamp};

/// An event as stored in the log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEvent {
    /// Deterministic content id; see [`Event::content_id`].
    pub id: String,
    pub received_at: DateTime<Utc>,
    pub event: Event,
}

/// Latest event timestamp for one event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeLastEvent {
    pub event_type: EventType,
    pub last_event: DateTime<Utc>,
}

impl Database {
    /// Lists stored events ordered by timestamp then id.
    ///
    /// With a range, `start` is inclusive and `end` exclusive.
    pub fn list_events(
        &self,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<StoredEvent>, DbError> {
        let (start, end) = match range {
            Some((start, end)) if end <= start => return Ok(Vec::new()),
            Some((start, end)) => (Some(format_timestamp(start)), Some(format_timestamp(end))),
            None => (None, None),
        };
        let mut stmt = self.conn.prepare(
            "
            SELECT id, data, received_at
            FROM events
            WHERE (?1 IS NULL OR timestamp >= ?1) AND (?2 IS NULL OR timestamp < ?2)
            ORDER BY timestamp ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map(params![start, end], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut events = Vec::new();
        for row in rows {
            let (id, data, received_at) = row?;
            events.push(StoredEvent {
                id,
                received_at: parse_timestamp(&received_at, "received_at")?,
                event: serde_json::from_str(&data)?,
            });
        }
        Ok(events)
    }

    /// Lists the last event timestamp per event type, most recent first.
    pub fn last_event_times_by_type(&self) -> Result<Vec<TypeLastEvent>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT type, MAX(timestamp) AS last_event
            FROM events
            GROUP BY type
            ORDER BY last_event DESC, type ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut types = Vec::new();
        for row in rows {
            let (event_type, last_event) = row?;
            types.push(TypeLastEvent {
                event_type: event_type.parse().map_err(|_| DbError::InvalidRow {
                    table: "events",
                    message: format!("unknown event type {event_type}"),
                })?,
                last_event: parse_timestamp(&last_event, "timestamp")?,
            });
        }
        Ok(types)
    }

    /// Total number of stored events.
    pub fn event_count(&self) -> Result<i64, DbError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?)
    }
}

/// Appends `event` under `id`, returning `false` when the id is already stored.
pub(crate) fn append_event(
    conn: &Connection,
    id: &str,
    event: &Event,
    received_at: DateTime<Utc>,
) -> Result<bool, DbError> {
    let inserted = conn.execute(
        "
        INSERT OR IGNORE INTO events (id, timestamp, type, session_id, repo_path, data, received_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ",
        params![
            id,
            format_timestamp(event.timestamp),
            event.event_type().as_str(),
            event.session_id.as_ref().map(SessionId::as_str),
            event.repo_path,
            serde_json::to_string(event)?,
            format_timestamp(received_at),
        ],
    )?;
    Ok(inserted > 0)
}
