//! Tool invocation events.

use std::io::Write;

use anyhow::Result;

use dt_core::{Event, EventKind, SessionId};
use dt_db::Database;

use super::ingest::submit;
use super::util::event_time;
use crate::cli::ToolArgs;

pub fn start<W: Write>(writer: &mut W, db: &mut Database, args: &ToolArgs) -> Result<()> {
    let kind = EventKind::ToolStart {
        tool_name: args.tool.clone(),
    };
    record(writer, db, args, kind)
}

pub fn end<W: Write>(
    writer: &mut W,
    db: &mut Database,
    args: &ToolArgs,
    exit_code: Option<i32>,
) -> Result<()> {
    let kind = EventKind::ToolEnd {
        tool_name: args.tool.clone(),
        exit_code,
    };
    record(writer, db, args, kind)
}

fn record<W: Write>(
    writer: &mut W,
    db: &mut Database,
    args: &ToolArgs,
    kind: EventKind,
) -> Result<()> {
    let event = Event::new(
        kind,
        args.session.as_deref().map(SessionId::new).transpose()?,
        Some(args.repo.clone()),
        event_time(args.at.as_deref())?,
    );
    event.validate()?;
    submit(writer, db, &event)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use dt_core::session_id_for;

    fn args(at: &str) -> ToolArgs {
        ToolArgs {
            repo: "/work/api".into(),
            tool: "Bash".into(),
            session: None,
            at: Some(at.into()),
        }
    }

    #[test]
    fn test_tool_pair_is_recorded_on_todays_session() {
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();

        start(&mut output, &mut db, &args("2025-03-10T09:00:00Z")).unwrap();
        end(&mut output, &mut db, &args("2025-03-10T09:00:20Z"), Some(0)).unwrap();

        let at = chrono::DateTime::parse_from_rfc3339("2025-03-10T09:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let session_id = session_id_for("/work/api", at);
        let events = db.tool_events(&session_id).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].exit_code, Some(0));
    }

    #[test]
    fn test_blank_tool_name_rejected() {
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        let mut blank = args("2025-03-10T09:00:00Z");
        blank.tool = " ".into();
        assert!(start(&mut output, &mut db, &blank).is_err());
        assert_eq!(db.event_count().unwrap(), 0);
    }
}
