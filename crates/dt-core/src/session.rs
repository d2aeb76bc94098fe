//! Work sessions and active coding time.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ProjectKey, SessionId, ValidationError};

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Lifecycle state of a session. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Completed,
}

impl SessionStatus {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            _ => Err(ValidationError::InvalidStatus {
                value: s.to_string(),
            }),
        }
    }
}

/// Whether a tool event opens or closes an invocation.
///
/// Ordered so that, at equal timestamps, starts sort before ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPhase {
    Start,
    End,
}

impl ToolPhase {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
        }
    }
}

impl fmt::Display for ToolPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolPhase {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "end" => Ok(Self::End),
            _ => Err(ValidationError::InvalidToolPhase {
                value: s.to_string(),
            }),
        }
    }
}

/// One continuous block of tracked activity for a repository on a given day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub repo_path: String,
    /// Project linked to the repository when the session was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_key: Option<ProjectKey>,
    /// Calendar day (UTC) the session is aggregated under.
    pub date: NaiveDate,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub tool_call_count: i64,
    /// Matched tool time, fixed when the session closes.
    pub active_coding_ms: i64,
    pub status: SessionStatus,
}

impl Session {
    /// Wall-clock hours between start and end, once the session has ended.
    #[allow(clippy::cast_precision_loss, reason = "millisecond spans fit in f64")]
    pub fn dev_hours(&self) -> Option<f64> {
        self.ended_at.map(|ended_at| {
            ended_at
                .signed_duration_since(self.started_at)
                .num_milliseconds() as f64
                / MS_PER_HOUR
        })
    }

    /// Active coding time in hours.
    #[allow(clippy::cast_precision_loss, reason = "millisecond spans fit in f64")]
    pub fn active_coding_hours(&self) -> f64 {
        self.active_coding_ms as f64 / MS_PER_HOUR
    }

    pub const fn is_active(&self) -> bool {
        matches!(self.status, SessionStatus::Active)
    }
}

/// A single tool start or end observed within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolEvent {
    pub session_id: SessionId,
    pub tool_name: String,
    pub phase: ToolPhase,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// Derives the session id for work in `repo_path` on the UTC day of `timestamp`.
///
/// Repeated work in the same repository on the same day resolves to one session.
pub fn session_id_for(repo_path: &str, timestamp: DateTime<Utc>) -> SessionId {
    let day = timestamp.date_naive();
    let content = format!("session|{repo_path}|{day}");
    SessionId::derived(Uuid::new_v5(&Uuid::NAMESPACE_OID, content.as_bytes()))
}

/// Sums matched tool intervals, in milliseconds.
///
/// Events are ordered by timestamp (starts before ends on ties). Each end is
/// paired with the earliest still-open start of the same tool name, so nested
/// or repeated invocations resolve deterministically. Unmatched starts and
/// ends contribute nothing, as do pairs whose end is not after the start.
pub fn active_coding_ms(events: &[ToolEvent]) -> i64 {
    paired_ms(events.iter())
}

/// Like [`active_coding_ms`], counting only events inside `[started_at, ended_at]`.
///
/// This is the window a closed session is measured over, both when it closes
/// and when summaries are rebuilt.
pub fn active_coding_ms_between(
    events: &[ToolEvent],
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
) -> i64 {
    paired_ms(
        events
            .iter()
            .filter(|event| (started_at..=ended_at).contains(&event.timestamp)),
    )
}

fn paired_ms<'a>(events: impl Iterator<Item = &'a ToolEvent>) -> i64 {
    let mut ordered: Vec<&ToolEvent> = events.collect();
    ordered.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.phase.cmp(&b.phase))
    });

    let mut open: HashMap<&str, VecDeque<DateTime<Utc>>> = HashMap::new();
    let mut total_ms = 0;
    for event in ordered {
        match event.phase {
            ToolPhase::Start => {
                open.entry(event.tool_name.as_str())
                    .or_default()
                    .push_back(event.timestamp);
            }
            ToolPhase::End => {
                let Some(started_at) = open
                    .get_mut(event.tool_name.as_str())
                    .and_then(VecDeque::pop_front)
                else {
                    tracing::trace!(tool = %event.tool_name, "unmatched tool end");
                    continue;
                };
                let span_ms = event
                    .timestamp
                    .signed_duration_since(started_at)
                    .num_milliseconds();
                if span_ms > 0 {
                    total_ms += span_ms;
                }
            }
        }
    }
    total_ms
}
