//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types and inbound events.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A field required by this event kind was absent.
    #[error("{kind} event requires {field}")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    /// A counter was negative.
    #[error("{field} cannot be negative, got {value}")]
    NegativeCount { field: &'static str, value: i64 },

    /// A counter exceeded [`MAX_COUNT`].
    #[error("{field} must be at most {max}, got {value}")]
    CountTooLarge {
        field: &'static str,
        value: i64,
        max: i64,
    },

    /// A duration or hour amount was negative, NaN or infinite.
    #[error("{field} must be a finite non-negative number, got {value}")]
    InvalidHours { field: &'static str, value: f64 },

    /// An interval ended before it started.
    #[error("end {end} is before start {start}")]
    EndBeforeStart { start: String, end: String },

    /// Invalid project phase value.
    #[error("invalid project phase: {value}")]
    InvalidPhase { value: String },

    /// Invalid session status value.
    #[error("invalid session status: {value}")]
    InvalidStatus { value: String },

    /// Invalid tool phase value.
    #[error("invalid tool phase: {value}")]
    InvalidToolPhase { value: String },

    /// The payload could not be decoded at all.
    #[error("malformed event: {message}")]
    Malformed { message: String },
}

/// Rejects empty or whitespace-only strings.
pub fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}

/// Rejects negative counters.
pub const fn require_non_negative(field: &'static str, value: i64) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::NegativeCount { field, value });
    }
    Ok(())
}

/// Largest count one commit or summary increment may carry.
///
/// Keeps summed totals far from `i64::MAX`.
pub const MAX_COUNT: i64 = 1_000_000_000_000;

/// Rejects counters that are negative or above [`MAX_COUNT`].
pub const fn require_count(field: &'static str, value: i64) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::NegativeCount { field, value });
    }
    if value > MAX_COUNT {
        return Err(ValidationError::CountTooLarge {
            field,
            value,
            max: MAX_COUNT,
        });
    }
    Ok(())
}

/// Result of applying an idempotent operation.
///
/// Re-delivery is part of the contract, so an operation that finds its effect
/// already present reports `AlreadyApplied` instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// The operation changed state.
    Applied,
    /// The same effect was already recorded; nothing changed.
    AlreadyApplied,
}

impl ApplyOutcome {
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated session identifier.
    ///
    /// Usually derived from repository path and calendar day
    /// (see [`crate::session::session_id_for`]), but hooks may supply their own.
    SessionId, "session ID"
);

impl SessionId {
    /// Wraps a derived UUID, which is never empty.
    pub(crate) fn derived(id: uuid::Uuid) -> Self {
        Self(id.to_string())
    }
}

define_string_id!(
    /// A validated git commit hash.
    ///
    /// Hashes are globally unique; uniqueness is enforced at the database level.
    CommitHash, "commit hash"
);

define_string_id!(
    /// A validated key of a project in the external tracking system.
    ProjectKey, "project key"
);
