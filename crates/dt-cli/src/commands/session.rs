//! Session start and end events.

use std::io::Write;

use anyhow::Result;

use dt_core::{Event, EventKind, SessionId};
use dt_db::Database;

use super::ingest::submit;
use super::util::event_time;

pub fn start<W: Write>(
    writer: &mut W,
    db: &mut Database,
    repo: &str,
    session: Option<&str>,
    at: Option<&str>,
) -> Result<()> {
    let event = Event::new(
        EventKind::SessionStart,
        session.map(SessionId::new).transpose()?,
        Some(repo.to_string()),
        event_time(at)?,
    );
    event.validate()?;
    submit(writer, db, &event)?;
    Ok(())
}

pub fn end<W: Write>(
    writer: &mut W,
    db: &mut Database,
    repo: Option<&str>,
    session: Option<&str>,
    tool_calls: i64,
    at: Option<&str>,
) -> Result<()> {
    let event = Event::new(
        EventKind::SessionEnd {
            tool_call_count: tool_calls,
        },
        session.map(SessionId::new).transpose()?,
        repo.map(str::to_string),
        event_time(at)?,
    );
    event.validate()?;
    submit(writer, db, &event)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveDate;

    #[test]
    fn test_start_then_end_by_repo() {
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();

        start(
            &mut output,
            &mut db,
            "/work/api",
            None,
            Some("2025-03-10T09:00:00Z"),
        )
        .unwrap();
        end(
            &mut output,
            &mut db,
            Some("/work/api"),
            None,
            2,
            Some("2025-03-10T09:45:00Z"),
        )
        .unwrap();

        let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let summary = db.get_summary(day, "/work/api").unwrap().unwrap();
        assert!((summary.total_dev_hours - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_end_without_session_fails() {
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();

        let err = end(
            &mut output,
            &mut db,
            None,
            Some("never-started"),
            0,
            Some("2025-03-10T09:45:00Z"),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("session not found: never-started"));
    }

    #[test]
    fn test_negative_tool_calls_rejected() {
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        assert!(
            end(&mut output, &mut db, Some("/work/api"), None, -1, None).is_err()
        );
    }
}
