//! Raw activity events submitted by hooks.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::commit::CommitStats;
use crate::event_type::EventType;
use crate::session::session_id_for;
use crate::types::{
    CommitHash, SessionId, ValidationError, require_non_empty, require_non_negative,
};

/// An immutable fact reported by a development tool.
///
/// The same real-world occurrence may be delivered more than once and in any
/// order; see [`Event::content_id`] for how re-deliveries are recognised.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// The type of activity, with its kind-specific payload.
    pub kind: EventKind,
    /// Explicit session, when the producer knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Repository the activity happened in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_path: Option<String>,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Optional additional context as JSON. Not part of the event identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// The type of activity captured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A work session began.
    SessionStart,
    /// A work session ended.
    #[serde(alias = "stop")]
    SessionEnd {
        /// Tool calls the producer counted during the session.
        #[serde(default)]
        tool_call_count: i64,
    },
    /// A tool invocation began.
    #[serde(alias = "pre_tool_use")]
    ToolStart { tool_name: String },
    /// A tool invocation finished.
    #[serde(alias = "post_tool_use")]
    ToolEnd {
        tool_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
    },
    /// A git commit was created.
    #[serde(alias = "post_commit")]
    Commit(CommitPayload),
}

/// Commit details carried by a [`EventKind::Commit`] event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitPayload {
    pub hash: CommitHash,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default)]
    pub stats: CommitStats,
}

impl Event {
    /// Creates an event without metadata.
    pub fn new(
        kind: EventKind,
        session_id: Option<SessionId>,
        repo_path: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            session_id,
            repo_path,
            timestamp,
            metadata: None,
        }
    }

    /// Decodes and validates a single JSON event.
    ///
    /// Decoding failures (missing timestamp, unknown type, empty hash) are
    /// reported as [`ValidationError::Malformed`].
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let event: Self = serde_json::from_str(json).map_err(|err| ValidationError::Malformed {
            message: err.to_string(),
        })?;
        event.validate()?;
        Ok(event)
    }

    /// The canonical type of this event.
    pub const fn event_type(&self) -> EventType {
        match self.kind {
            EventKind::SessionStart => EventType::SessionStart,
            EventKind::SessionEnd { .. } => EventType::SessionEnd,
            EventKind::ToolStart { .. } => EventType::ToolStart,
            EventKind::ToolEnd { .. } => EventType::ToolEnd,
            EventKind::Commit(_) => EventType::Commit,
        }
    }

    /// Checks that every field this kind of event needs is present and sane.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let kind = self.event_type().as_str();
        if let Some(repo_path) = &self.repo_path {
            require_non_empty("repo path", repo_path)?;
        }

        match &self.kind {
            EventKind::SessionStart => {
                self.require_repo(kind)?;
            }
            EventKind::SessionEnd { tool_call_count } => {
                if self.session_id.is_none() && self.repo_path.is_none() {
                    return Err(ValidationError::MissingField {
                        kind,
                        field: "session_id or repo_path",
                    });
                }
                require_non_negative("tool call count", *tool_call_count)?;
            }
            EventKind::ToolStart { tool_name } | EventKind::ToolEnd { tool_name, .. } => {
                self.require_repo(kind)?;
                require_non_empty("tool name", tool_name)?;
            }
            EventKind::Commit(payload) => {
                self.require_repo(kind)?;
                payload.stats.validate()?;
            }
        }
        Ok(())
    }

    fn require_repo(&self, kind: &'static str) -> Result<&str, ValidationError> {
        self.repo_path
            .as_deref()
            .ok_or(ValidationError::MissingField {
                kind,
                field: "repo_path",
            })
    }

    /// The session this event belongs to.
    ///
    /// An explicit `session_id` wins; otherwise the id is derived from the
    /// repository and the calendar day of the timestamp.
    pub fn resolved_session_id(&self) -> Option<SessionId> {
        self.session_id.clone().or_else(|| {
            self.repo_path
                .as_deref()
                .map(|repo_path| session_id_for(repo_path, self.timestamp))
        })
    }

    /// Deterministic identity of this occurrence.
    ///
    /// Two deliveries of the same occurrence produce the same id. Metadata is
    /// excluded so that transport annotations do not defeat deduplication.
    pub fn content_id(&self) -> String {
        let timestamp = self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        let session = self.session_id.as_ref().map_or("", SessionId::as_str);
        let repo = self.repo_path.as_deref().unwrap_or("");
        let detail = match &self.kind {
            EventKind::SessionStart => String::new(),
            EventKind::SessionEnd { tool_call_count } => tool_call_count.to_string(),
            EventKind::ToolStart { tool_name } => tool_name.clone(),
            EventKind::ToolEnd {
                tool_name,
                exit_code,
            } => format!("{tool_name}|{}", exit_code.map_or(String::new(), |c| c.to_string())),
            EventKind::Commit(payload) => payload.hash.to_string(),
        };
        let content = format!(
            "event|{}|{session}|{repo}|{timestamp}|{detail}",
            self.event_type()
        );
        Uuid::new_v5(&Uuid::NAMESPACE_OID, content.as_bytes()).to_string()
    }
}
