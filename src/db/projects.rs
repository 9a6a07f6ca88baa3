//! Project CRUD, quadrant placement and progress.

use super::tasks::load_project_tasks;
use super::{Database, new_id, now_ms};
use crate::error::ApiError;
use crate::hierarchy::{organize, sort_parents};
use crate::progress::{ProjectProgress, calculate_progress};
use crate::types::{
    NewProject, Project, ProjectDetail, ProjectPatch, ProjectSummary, Quadrant, TaskSort,
};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

pub fn parse_project_row(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        quadrant: row.get("quadrant")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Internal helper to get a project using an existing connection (avoids deadlock).
pub(crate) fn get_project_internal(
    conn: &Connection,
    user_id: &str,
    project_id: &str,
) -> Result<Option<Project>> {
    let project = conn
        .query_row(
            "SELECT * FROM projects WHERE id = ?1 AND user_id = ?2",
            params![project_id, user_id],
            parse_project_row,
        )
        .optional()?;
    Ok(project)
}

/// Like [`get_project_internal`], but a missing project is an error.
pub(crate) fn require_project(conn: &Connection, user_id: &str, project_id: &str) -> Result<Project> {
    get_project_internal(conn, user_id, project_id)?
        .ok_or_else(|| ApiError::project_not_found().into())
}

/// Bump `updated_at` so recently touched projects sort first.
pub(crate) fn touch_project(conn: &Connection, project_id: &str, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE projects SET updated_at = ?1 WHERE id = ?2",
        params![now, project_id],
    )?;
    Ok(())
}

fn save_project(conn: &Connection, project: &Project) -> Result<()> {
    conn.execute(
        "UPDATE projects SET title = ?1, description = ?2, quadrant = ?3, updated_at = ?4
         WHERE id = ?5 AND user_id = ?6",
        params![
            project.title,
            project.description,
            project.quadrant,
            project.updated_at,
            project.id,
            project.user_id,
        ],
    )?;
    Ok(())
}

fn clean_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::invalid_value("title", "Title cannot be empty").into());
    }
    Ok(title.to_string())
}

impl Database {
    /// Create a project. Description defaults to empty, quadrant to not-urgent-not-important.
    pub fn create_project(&self, user_id: &str, input: NewProject) -> Result<Project> {
        if input.title.trim().is_empty() {
            return Err(ApiError::missing_field("title", "Title is required").into());
        }
        let now = now_ms();
        let project = Project {
            id: new_id(),
            user_id: user_id.to_string(),
            title: input.title.trim().to_string(),
            description: input.description.unwrap_or_default().trim().to_string(),
            quadrant: input.quadrant.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO projects (id, user_id, title, description, quadrant, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    project.id,
                    project.user_id,
                    project.title,
                    project.description,
                    project.quadrant,
                    project.created_at,
                    project.updated_at,
                ],
            )?;
            Ok(())
        })?;

        debug!(project_id = %project.id, quadrant = %project.quadrant, "Project created");
        Ok(project)
    }

    /// Get a single project owned by `user_id`.
    pub fn get_project(&self, user_id: &str, project_id: &str) -> Result<Option<Project>> {
        self.with_conn(|conn| get_project_internal(conn, user_id, project_id))
    }

    /// List the user's projects, most recently updated first, with top-level task counts.
    pub fn list_projects(&self, user_id: &str) -> Result<Vec<ProjectSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.*,
                        COUNT(t.id) AS total_tasks,
                        COALESCE(SUM(CASE WHEN t.status = 'Done' THEN 1 ELSE 0 END), 0) AS completed_tasks
                 FROM projects p
                 LEFT JOIN tasks t ON t.project_id = p.id AND t.parent_task_id IS NULL
                 WHERE p.user_id = ?1
                 GROUP BY p.id
                 ORDER BY p.updated_at DESC, p.created_at DESC",
            )?;

            let summaries = stmt
                .query_map(params![user_id], |row| {
                    let total_tasks: u32 = row.get("total_tasks")?;
                    let completed_tasks: u32 = row.get("completed_tasks")?;
                    Ok(ProjectSummary {
                        project: parse_project_row(row)?,
                        total_tasks,
                        completed_tasks,
                        progress: calculate_progress(total_tasks, completed_tasks),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(summaries)
        })
    }

    /// A project with its task tree: parents by priority then age, subtasks by age.
    pub fn get_project_detail(&self, user_id: &str, project_id: &str) -> Result<ProjectDetail> {
        self.with_conn(|conn| {
            let project = require_project(conn, user_id, project_id)?;
            let tasks = load_project_tasks(conn, &project.id)?;

            let (mut parents, subtasks): (Vec<_>, Vec<_>) =
                tasks.into_iter().partition(|t| !t.is_subtask());
            sort_parents(&mut parents, TaskSort::Priority);
            parents.extend(subtasks);

            Ok(ProjectDetail {
                project,
                tasks: organize(parents),
            })
        })
    }

    /// Apply a partial update. At least one field must be present.
    pub fn update_project(
        &self,
        user_id: &str,
        project_id: &str,
        patch: ProjectPatch,
    ) -> Result<Project> {
        if patch.is_empty() {
            return Err(ApiError::missing_field("title", "No valid fields to update").into());
        }
        let title = patch.title.as_deref().map(clean_title).transpose()?;

        self.with_conn(|conn| {
            let mut project = require_project(conn, user_id, project_id)?;
            if let Some(title) = title {
                project.title = title;
            }
            if let Some(description) = patch.description {
                project.description = description.trim().to_string();
            }
            if let Some(quadrant) = patch.quadrant {
                project.quadrant = quadrant;
            }
            project.updated_at = now_ms();
            save_project(conn, &project)?;
            Ok(project)
        })
    }

    /// Move a project to another quadrant.
    pub fn set_project_quadrant(
        &self,
        user_id: &str,
        project_id: &str,
        quadrant: Quadrant,
    ) -> Result<Project> {
        self.with_conn(|conn| {
            let mut project = require_project(conn, user_id, project_id)?;
            project.quadrant = quadrant;
            project.updated_at = now_ms();
            save_project(conn, &project)?;
            Ok(project)
        })
    }

    /// Delete a project together with all of its tasks.
    pub fn delete_project(&self, user_id: &str, project_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM projects WHERE id = ?1 AND user_id = ?2",
                params![project_id, user_id],
            )?;
            if deleted == 0 {
                return Err(ApiError::project_not_found().into());
            }
            Ok(())
        })
    }

    /// Completion figures for one project.
    pub fn project_progress(&self, user_id: &str, project_id: &str) -> Result<ProjectProgress> {
        self.with_conn(|conn| {
            let project = require_project(conn, user_id, project_id)?;
            let tasks = load_project_tasks(conn, &project.id)?;
            Ok(ProjectProgress::from_tasks(&project.id, &tasks))
        })
    }
}
