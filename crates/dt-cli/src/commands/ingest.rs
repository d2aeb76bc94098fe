//! Ingest command for raw events from editor and shell hooks.
//!
//! Every write command funnels through [`submit`], which stores and applies
//! the event and prints the outcome as one JSON line for the calling hook.

use std::io::{Read, Write};

use anyhow::{Context, Result};

use dt_core::Event;
use dt_db::{Database, IngestOutcome};

/// Reads one JSON event from `event_json`, or from `input` when absent, and ingests it.
pub fn run<W: Write, R: Read>(
    writer: &mut W,
    db: &mut Database,
    event_json: Option<&str>,
    mut input: R,
) -> Result<IngestOutcome> {
    let json = match event_json {
        Some(json) => json.to_string(),
        None => {
            let mut buf = String::new();
            input
                .read_to_string(&mut buf)
                .context("failed to read event from stdin")?;
            buf
        }
    };
    let event = Event::from_json(json.trim()).context("invalid event")?;
    submit(writer, db, &event)
}

/// Ingests a validated event and writes the outcome as JSON.
pub fn submit<W: Write>(writer: &mut W, db: &mut Database, event: &Event) -> Result<IngestOutcome> {
    let outcome = db
        .ingest(event)
        .with_context(|| format!("failed to ingest {} event", event.event_type()))?;
    writeln!(writer, "{}", serde_json::to_string(&outcome)?)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    const START: &str = r#"{"kind":{"type":"session_start"},"repo_path":"/work/api","timestamp":"2025-03-10T09:00:00Z"}"#;

    #[test]
    fn test_ingest_from_flag_then_duplicate() {
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();

        run(&mut output, &mut db, Some(START), std::io::empty()).unwrap();
        let again = run(&mut output, &mut db, Some(START), std::io::empty()).unwrap();
        assert!(!again.changed_state());

        let output = String::from_utf8(output).unwrap();
        let mut lines = output.lines();
        assert!(lines.next().unwrap().contains(r#""result":"session""#));
        assert!(lines.next().unwrap().starts_with(r#"{"result":"duplicate""#));
    }

    #[test]
    fn test_ingest_reads_stdin_when_flag_absent() {
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        let stdin = format!("{START}\n");

        let outcome = run(&mut output, &mut db, None, stdin.as_bytes()).unwrap();
        assert!(outcome.changed_state());
    }

    #[test]
    fn test_ingest_rejects_malformed_event() {
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();

        let err = run(
            &mut output,
            &mut db,
            Some(r#"{"kind":{"type":"session_start"},"repo_path":"/work/api"}"#),
            std::io::empty(),
        )
        .unwrap_err();
        assert_snapshot!(err.to_string(), @"invalid event");
        let cause = format!("{err:#}");
        assert!(cause.contains("missing field `timestamp`"), "{cause}");
        assert!(output.is_empty());
    }
}
