//! Repository to project links.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{ProjectKey, ValidationError, require_non_empty};

/// Lifecycle phase of a tracked project.
///
/// Hours spent in `Development` and `Beta` are capitalizable for accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectPhase {
    Planning,
    #[default]
    Development,
    Beta,
    Live,
    Maintenance,
}

impl ProjectPhase {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Development => "development",
            Self::Beta => "beta",
            Self::Live => "live",
            Self::Maintenance => "maintenance",
        }
    }

    pub const fn is_capitalizable(self) -> bool {
        matches!(self, Self::Development | Self::Beta)
    }
}

impl fmt::Display for ProjectPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectPhase {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planning" => Ok(Self::Planning),
            "development" => Ok(Self::Development),
            "beta" => Ok(Self::Beta),
            "live" | "production" => Ok(Self::Live),
            "maintenance" => Ok(Self::Maintenance),
            _ => Err(ValidationError::InvalidPhase {
                value: s.to_string(),
            }),
        }
    }
}

/// The project a repository currently reports to. One per repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMapping {
    pub repo_path: String,
    pub project_key: ProjectKey,
    pub display_name: String,
    #[serde(default)]
    pub phase: ProjectPhase,
}

impl ProjectMapping {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("repo path", &self.repo_path)?;
        require_non_empty("display name", &self.display_name)
    }
}

/// Short name for a repository: the last path component.
pub fn repo_display_name(repo_path: &str) -> &str {
    Path::new(repo_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(repo_path)
}
