//! Board export.
//!
//! Serializes one user's projects with their task trees. Projects keep the
//! board ordering (most recently updated first) so successive exports diff cleanly.

use super::Database;
use crate::error::ApiError;
use crate::types::{ProjectDetail, User};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Format version written into every export.
pub const EXPORT_VERSION: u32 = 1;

/// A user's whole board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardExport {
    pub version: u32,
    pub exported_at: i64,
    pub user: User,
    pub projects: Vec<ProjectDetail>,
}

impl Database {
    /// Export the board of `username`.
    pub fn export_board(&self, username: &str) -> Result<BoardExport> {
        let user = self
            .get_user_by_username(username)?
            .ok_or_else(ApiError::user_not_found)?;

        let projects = self
            .list_projects(&user.id)?
            .into_iter()
            .map(|summary| self.get_project_detail(&user.id, &summary.project.id))
            .collect::<Result<Vec<_>>>()?;

        Ok(BoardExport {
            version: EXPORT_VERSION,
            exported_at: super::now_ms(),
            user,
            projects,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::types::{NewProject, NewTask};

    #[test]
    fn exports_projects_with_task_trees() {
        let db = Database::open_in_memory().unwrap();
        let user = db.signup("alice", "secret1").unwrap();
        let project = db
            .create_project(
                &user.id,
                NewProject {
                    title: "Taxes".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        let parent = db
            .create_task(
                &user.id,
                NewTask {
                    project_id: project.id.clone(),
                    title: "Collect receipts".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        db.create_task(
            &user.id,
            NewTask {
                project_id: project.id.clone(),
                title: "Scan".into(),
                parent_task_id: Some(parent.id.clone()),
                ..Default::default()
            },
        )
        .unwrap();

        let export = db.export_board("alice").unwrap();
        assert_eq!(export.version, EXPORT_VERSION);
        assert_eq!(export.user.id, user.id);
        assert_eq!(export.projects.len(), 1);
        assert_eq!(export.projects[0].tasks.len(), 1);
        assert_eq!(export.projects[0].tasks[0].subtasks.len(), 1);

        let json = serde_json::to_value(&export).unwrap();
        assert!(json["user"].get("password_hash").is_none());
    }

    #[test]
    fn unknown_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = ApiError::from(db.export_board("nobody").unwrap_err());
        assert_eq!(err.code, ErrorCode::UserNotFound);
    }
}
