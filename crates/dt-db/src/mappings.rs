//! Repository to project links.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use dt_core::{ProjectKey, ProjectMapping, ProjectPhase};

use crate::{Database, DbError, format_timestamp};

impl Database {
    /// Links a repository to a project, replacing any existing link.
    ///
    /// Only sessions and commits recorded afterwards pick up the new key.
    pub fn upsert_project_mapping(&mut self, mapping: &ProjectMapping) -> Result<(), DbError> {
        mapping.validate()?;
        let tx = self.immediate()?;
        tx.execute(
            "INSERT INTO project_mappings (repo_path, project_key, display_name, phase, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(repo_path) DO UPDATE SET
                project_key = excluded.project_key,
                display_name = excluded.display_name,
                phase = excluded.phase,
                updated_at = excluded.updated_at",
            params![
                mapping.repo_path,
                mapping.project_key.as_str(),
                mapping.display_name,
                mapping.phase.as_str(),
                format_timestamp(Utc::now()),
            ],
        )?;
        tx.commit()?;
        tracing::debug!(
            repo = %mapping.repo_path,
            project = %mapping.project_key,
            phase = %mapping.phase,
            "linked repository to project"
        );
        Ok(())
    }

    /// All project links, ordered by repository path.
    pub fn list_project_mappings(&self) -> Result<Vec<ProjectMapping>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT repo_path, project_key, display_name, phase
             FROM project_mappings
             ORDER BY repo_path ASC",
        )?;
        let rows = stmt.query_map([], MappingRow::from_row)?;
        rows.map(|row| row?.into_mapping()).collect()
    }

    /// The link for one repository, if any.
    pub fn project_mapping(&self, repo_path: &str) -> Result<Option<ProjectMapping>, DbError> {
        self.conn
            .query_row(
                "SELECT repo_path, project_key, display_name, phase
                 FROM project_mappings WHERE repo_path = ?1",
                [repo_path],
                MappingRow::from_row,
            )
            .optional()?
            .map(MappingRow::into_mapping)
            .transpose()
    }
}

/// The project key currently linked to `repo_path`.
pub(crate) fn project_key_for(
    conn: &Connection,
    repo_path: &str,
) -> Result<Option<ProjectKey>, DbError> {
    let key: Option<String> = conn
        .query_row(
            "SELECT project_key FROM project_mappings WHERE repo_path = ?1",
            [repo_path],
            |row| row.get(0),
        )
        .optional()?;
    Ok(key.map(ProjectKey::new).transpose()?)
}

struct MappingRow {
    repo_path: String,
    project_key: String,
    display_name: String,
    phase: String,
}

impl MappingRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            repo_path: row.get(0)?,
            project_key: row.get(1)?,
            display_name: row.get(2)?,
            phase: row.get(3)?,
        })
    }

    fn into_mapping(self) -> Result<ProjectMapping, DbError> {
        Ok(ProjectMapping {
            repo_path: self.repo_path,
            project_key: ProjectKey::new(self.project_key)?,
            display_name: self.display_name,
            phase: self.phase.parse::<ProjectPhase>()?,
        })
    }
}
