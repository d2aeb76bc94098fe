//! Single entry point for inbound hook events.

use chrono::Utc;
use serde::Serialize;

use dt_core::{
    ApplyOutcome, CommitOutcome, Event, EventKind, NewCommit, SessionId, ToolEvent, ToolPhase,
    ValidationError,
};

use crate::commits::record_commit_in;
use crate::events::append_event;
use crate::sessions::{session_end_in, session_start_in, tool_event_in};
use crate::{Database, DbError};

/// What ingesting one event did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// The identical event was already stored; nothing was re-applied.
    Duplicate { event_id: String },
    Session {
        event_id: String,
        session_id: SessionId,
        outcome: ApplyOutcome,
    },
    Tool {
        event_id: String,
        session_id: SessionId,
        outcome: ApplyOutcome,
    },
    Commit {
        event_id: String,
        commit: CommitOutcome,
    },
}

impl IngestOutcome {
    pub fn event_id(&self) -> &str {
        match self {
            Self::Duplicate { event_id }
            | Self::Session { event_id, .. }
            | Self::Tool { event_id, .. }
            | Self::Commit { event_id, .. } => event_id,
        }
    }

    /// Whether the event changed any derived state.
    pub const fn changed_state(&self) -> bool {
        match self {
            Self::Duplicate { .. } => false,
            Self::Session { outcome, .. } | Self::Tool { outcome, .. } => outcome.is_applied(),
            Self::Commit { commit, .. } => commit.accepted,
        }
    }
}

impl Database {
    /// Validates, stores and applies one event atomically.
    ///
    /// The event is appended to the log and applied to sessions, tool events,
    /// commits and summaries in one transaction. When applying fails, nothing
    /// is stored, so a producer may retry (for example an end event that
    /// arrived before its start).
    pub fn ingest(&mut self, event: &Event) -> Result<IngestOutcome, DbError> {
        event.validate()?;
        let event_id = event.content_id();
        let kind = event.event_type();

        let tx = self.immediate()?;
        if !append_event(&tx, &event_id, event, Utc::now())? {
            tracing::debug!(event_id, event_type = %kind, "duplicate event ignored");
            return Ok(IngestOutcome::Duplicate { event_id });
        }

        let outcome = match &event.kind {
            EventKind::SessionStart => {
                let session_id = resolved_session(event)?;
                let repo_path = required_repo(event)?;
                let outcome = session_start_in(&tx, &session_id, repo_path, event.timestamp)?;
                IngestOutcome::Session {
                    event_id,
                    session_id,
                    outcome,
                }
            }
            EventKind::SessionEnd { tool_call_count } => {
                let session_id = resolved_session(event)?;
                let outcome = session_end_in(&tx, &session_id, event.timestamp, *tool_call_count)?;
                IngestOutcome::Session {
                    event_id,
                    session_id,
                    outcome,
                }
            }
            EventKind::ToolStart { tool_name } | EventKind::ToolEnd { tool_name, .. } => {
                let (phase, exit_code) = match &event.kind {
                    EventKind::ToolEnd { exit_code, .. } => (ToolPhase::End, *exit_code),
                    _ => (ToolPhase::Start, None),
                };
                let session_id = resolved_session(event)?;
                let tool_event = ToolEvent {
                    session_id: session_id.clone(),
                    tool_name: tool_name.clone(),
                    phase,
                    timestamp: event.timestamp,
                    exit_code,
                };
                let outcome = tool_event_in(&tx, required_repo(event)?, &tool_event)?;
                IngestOutcome::Tool {
                    event_id,
                    session_id,
                    outcome,
                }
            }
            EventKind::Commit(_) => {
                let commit = NewCommit::from_event(event).ok_or(ValidationError::MissingField {
                    kind: "commit",
                    field: "commit payload",
                })?;
                IngestOutcome::Commit {
                    event_id,
                    commit: record_commit_in(&tx, &commit)?,
                }
            }
        };
        tx.commit()?;
        tracing::debug!(
            event_id = outcome.event_id(),
            event_type = %kind,
            changed = outcome.changed_state(),
            "ingested event"
        );
        Ok(outcome)
    }
}

fn resolved_session(event: &Event) -> Result<SessionId, ValidationError> {
    event
        .resolved_session_id()
        .ok_or(ValidationError::MissingField {
            kind: event.event_type().as_str(),
            field: "session_id or repo_path",
        })
}

fn required_repo(event: &Event) -> Result<&str, ValidationError> {
    event
        .repo_path
        .as_deref()
        .ok_or(ValidationError::MissingField {
            kind: event.event_type().as_str(),
            field: "repo_path",
        })
}
