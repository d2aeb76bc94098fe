//! Core domain logic for the developer activity tracker.
//!
//! This crate contains the fundamental types and pure algorithms for:
//! - Events: validation and deterministic identity of hook submissions
//! - Sessions: deterministic session ids and FIFO active-time pairing
//! - Commits: commit records, project-sync requests and commit gaps
//! - Summaries: additive daily aggregates and their derived rates
//! - ROI: estimated time and cost saved

pub mod commit;
pub mod event;
pub mod event_type;
pub mod project;
pub mod roi;
pub mod session;
pub mod summary;
pub mod types;

pub use commit::{CommitOutcome, CommitRecord, CommitStats, NewCommit, ProjectSyncRequest};
pub use event::{CommitPayload, Event, EventKind};
pub use event_type::{EventType, UnknownEventType};
pub use project::{ProjectMapping, ProjectPhase, repo_display_name};
pub use roi::{ConfigurationError, RoiConfig, RoiEstimate, roi};
pub use session::{
    Session, SessionStatus, ToolEvent, ToolPhase, active_coding_ms,
    active_coding_ms_between, session_id_for,
};
pub use summary::{DailySummary, DateRange, Rates, SummaryDelta, SummaryTotals};
pub use types::{
    ApplyOutcome, CommitHash, MAX_COUNT, ProjectKey, SessionId, ValidationError, require_count,
    require_non_empty, require_non_negative,
};
