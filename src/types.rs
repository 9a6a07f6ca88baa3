//! Core types for the Eisenhower board.

use crate::error::ApiError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four Eisenhower-matrix categories assigned to a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Quadrant {
    UrgentImportant,
    NotUrgentImportant,
    UrgentNotImportant,
    #[default]
    NotUrgentNotImportant,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::UrgentImportant,
        Quadrant::NotUrgentImportant,
        Quadrant::UrgentNotImportant,
        Quadrant::NotUrgentNotImportant,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Quadrant::UrgentImportant => "urgent-important",
            Quadrant::NotUrgentImportant => "not-urgent-important",
            Quadrant::UrgentNotImportant => "urgent-not-important",
            Quadrant::NotUrgentNotImportant => "not-urgent-not-important",
        }
    }
}

impl FromStr for Quadrant {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Quadrant::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| ApiError::invalid_value("quadrant", "Invalid quadrant value"))
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }

    /// Sort rank, most urgent first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }
}

impl FromStr for Priority {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ApiError::invalid_value("priority", "Invalid priority value"))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kanban column of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "To Do")]
    ToDo,
    #[serde(rename = "In Progress")]
    InProgress,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::ToDo, TaskStatus::InProgress, TaskStatus::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::ToDo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
        }
    }

    pub fn rank(self) -> u8 {
        match self {
            TaskStatus::ToDo => 1,
            TaskStatus::InProgress => 2,
            TaskStatus::Done => 3,
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| ApiError::invalid_value("status", "Invalid status value"))
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordering applied to top-level tasks of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSort {
    #[default]
    Priority,
    Status,
    DueDate,
    /// Newest first.
    Created,
}

impl FromStr for TaskSort {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "priority" => Ok(TaskSort::Priority),
            "status" => Ok(TaskSort::Status),
            "due_date" => Ok(TaskSort::DueDate),
            "created" | "created_at" => Ok(TaskSort::Created),
            _ => Err(ApiError::invalid_value("sort_by", "Invalid sort value")),
        }
    }
}

/// A registered user. The password hash stays in the database layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub created_at: i64,
}

/// A project placed in one quadrant of the matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub quadrant: Quadrant,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Project with its top-level task counts, as shown on the matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: Project,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub progress: u8,
}

/// A task or subtask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    pub parent_task_id: Option<String>,
    pub completed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    pub fn is_subtask(&self) -> bool {
        self.parent_task_id.is_some()
    }

    /// Set completion and keep the status column consistent with it.
    pub fn set_completed(&mut self, completed: bool) {
        self.completed = completed;
        if completed {
            self.status = TaskStatus::Done;
        } else if self.status == TaskStatus::Done {
            self.status = TaskStatus::ToDo;
        }
    }

    /// Move to a kanban column; `Done` is equivalent to completed.
    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.completed = status == TaskStatus::Done;
    }
}

/// Top-level task with its subtasks attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNode {
    #[serde(flatten)]
    pub task: Task,
    pub subtask_count: u32,
    pub completed_subtasks: u32,
    pub subtasks: Vec<Task>,
}

/// A project with its task tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDetail {
    pub project: Project,
    pub tasks: Vec<TaskNode>,
}

/// Fields accepted when creating a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProject {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quadrant: Option<Quadrant>,
}

/// Partial project update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quadrant: Option<Quadrant>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.quadrant.is_none()
    }
}

/// Fields accepted when creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub parent_task_id: Option<String>,
}

/// Partial task update.
///
/// `due_date` distinguishes "absent" (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_some"
    )]
    pub due_date: Option<Option<NaiveDate>>,
}

/// Keeps an explicit `null` distinct from a missing field.
pub(crate) fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.due_date.is_none()
    }
}

/// Filters for listing a project's tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub sort: TaskSort,
}

/// Per-quadrant totals for a user's board.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuadrantStats {
    pub quadrant: Option<Quadrant>,
    pub projects: u32,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub progress: u8,
}

/// Board-wide statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardStats {
    pub projects: u32,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub total_subtasks: u32,
    pub completed_subtasks: u32,
    pub progress: u8,
    pub overdue_tasks: u32,
    pub by_quadrant: Vec<QuadrantStats>,
    pub by_status: Vec<StatusCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: TaskStatus,
    pub count: u32,
}

/// Parse a date in `YYYY-MM-DD` form, treating blank input as no date.
pub fn parse_due_date(raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => {
            // Accept full timestamps by keeping the date part.
            let date_part = s.get(..10).unwrap_or(s);
            NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
                .map(Some)
                .map_err(|_| ApiError::invalid_value("due_date", "Invalid due date"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadrant_wire_names() {
        assert_eq!(
            serde_json::to_string(&Quadrant::UrgentNotImportant).unwrap(),
            "\"urgent-not-important\""
        );
        assert_eq!(
            "not-urgent-important".parse::<Quadrant>().unwrap(),
            Quadrant::NotUrgentImportant
        );
        assert_eq!(Quadrant::default(), Quadrant::NotUrgentNotImportant);
    }

    #[test]
    fn unknown_quadrant_is_validation_error() {
        let err = "urgent".parse::<Quadrant>().unwrap_err();
        assert_eq!(err.message, "Invalid quadrant value");
        assert_eq!(err.field.as_deref(), Some("quadrant"));
    }

    #[test]
    fn status_wire_names_have_spaces() {
        assert_eq!(serde_json::to_string(&TaskStatus::ToDo).unwrap(), "\"To Do\"");
        assert_eq!(
            serde_json::from_str::<TaskStatus>("\"In Progress\"").unwrap(),
            TaskStatus::InProgress
        );
        assert!("done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn priority_rank_orders_high_first() {
        assert!(Priority::High.rank() < Priority::Medium.rank());
        assert!(Priority::Medium.rank() < Priority::Low.rank());
        assert!("Urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn due_date_parsing() {
        assert_eq!(parse_due_date(None).unwrap(), None);
        assert_eq!(parse_due_date(Some("  ")).unwrap(), None);
        assert_eq!(
            parse_due_date(Some("2024-03-05")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(
            parse_due_date(Some("2024-03-05T00:00:00.000Z")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert!(parse_due_date(Some("next week")).is_err());
    }

    #[test]
    fn task_patch_distinguishes_null_from_missing() {
        let missing: TaskPatch = serde_json::from_str(r#"{"title":"a"}"#).unwrap();
        assert_eq!(missing.due_date, None);
        let cleared: TaskPatch = serde_json::from_str(r#"{"due_date":null}"#).unwrap();
        assert_eq!(cleared.due_date, Some(None));
        assert!(!cleared.is_empty());
    }

    #[test]
    fn completion_and_status_stay_consistent() {
        let mut task = Task {
            id: "t".into(),
            project_id: "p".into(),
            user_id: "u".into(),
            title: "x".into(),
            description: String::new(),
            priority: Priority::Medium,
            status: TaskStatus::InProgress,
            due_date: None,
            parent_task_id: None,
            completed: false,
            created_at: 0,
            updated_at: 0,
        };
        task.set_completed(true);
        assert_eq!(task.status, TaskStatus::Done);
        task.set_completed(false);
        assert_eq!(task.status, TaskStatus::ToDo);
        task.set_status(TaskStatus::Done);
        assert!(task.completed);
        task.set_status(TaskStatus::InProgress);
        assert!(!task.completed);
    }

    #[test]
    fn summary_flattens_project_fields() {
        let summary = ProjectSummary {
            project: Project {
                id: "p1".into(),
                user_id: "u1".into(),
                title: "Launch".into(),
                description: String::new(),
                quadrant: Quadrant::UrgentImportant,
                created_at: 1,
                updated_at: 2,
            },
            total_tasks: 4,
            completed_tasks: 1,
            progress: 25,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["id"], "p1");
        assert_eq!(json["quadrant"], "urgent-important");
        assert_eq!(json["progress"], 25);
    }
}
