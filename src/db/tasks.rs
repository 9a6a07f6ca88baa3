//! Task CRUD and the completion rules between parents and subtasks.

use super::projects::{require_project, touch_project};
use super::{Database, new_id, now_ms};
use crate::error::ApiError;
use crate::hierarchy::{can_create_subtask, organize, sort_parents};
use crate::progress::should_auto_complete_parent;
use crate::types::{NewTask, Task, TaskFilter, TaskNode, TaskPatch, TaskStatus};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use tracing::debug;

/// A mutated task plus any other tasks the completion rules touched.
#[derive(Debug, Clone, Serialize)]
pub struct TaskUpdate {
    pub task: Task,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<Task>,
}

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let completed: i64 = row.get("completed")?;
    Ok(Task {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        priority: row.get("priority")?,
        status: row.get("status")?,
        due_date: row.get("due_date")?,
        parent_task_id: row.get("parent_task_id")?,
        completed: completed != 0,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn query_tasks(conn: &Connection, sql: &str, param: &str) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(sql)?;
    let tasks = stmt
        .query_map(params![param], parse_task_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

/// Every task of a project, parents and subtasks, oldest first.
pub(crate) fn load_project_tasks(conn: &Connection, project_id: &str) -> Result<Vec<Task>> {
    query_tasks(
        conn,
        "SELECT * FROM tasks WHERE project_id = ?1 ORDER BY created_at ASC, id ASC",
        project_id,
    )
}

/// Subtasks of a parent, oldest first.
pub(crate) fn load_subtasks(conn: &Connection, parent_id: &str) -> Result<Vec<Task>> {
    query_tasks(
        conn,
        "SELECT * FROM tasks WHERE parent_task_id = ?1 ORDER BY created_at ASC, id ASC",
        parent_id,
    )
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
pub(crate) fn get_task_internal(conn: &Connection, user_id: &str, task_id: &str) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            "SELECT * FROM tasks WHERE id = ?1 AND user_id = ?2",
            params![task_id, user_id],
            parse_task_row,
        )
        .optional()?;
    Ok(task)
}

fn require_task(conn: &Connection, user_id: &str, task_id: &str) -> Result<Task> {
    get_task_internal(conn, user_id, task_id)?.ok_or_else(|| ApiError::task_not_found().into())
}

fn insert_task(conn: &Connection, task: &Task) -> Result<()> {
    conn.execute(
        "INSERT INTO tasks (
            id, project_id, user_id, title, description, priority, status,
            due_date, parent_task_id, completed, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            task.id,
            task.project_id,
            task.user_id,
            task.title,
            task.description,
            task.priority,
            task.status,
            task.due_date,
            task.parent_task_id,
            task.completed,
            task.created_at,
            task.updated_at,
        ],
    )?;
    Ok(())
}

fn save_task(conn: &Connection, task: &Task) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET title = ?1, description = ?2, priority = ?3, status = ?4,
                due_date = ?5, completed = ?6, updated_at = ?7
         WHERE id = ?8",
        params![
            task.title,
            task.description,
            task.priority,
            task.status,
            task.due_date,
            task.completed,
            task.updated_at,
            task.id,
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

/// Persist `task` and apply the parent/subtask completion rules.
///
/// - a parent entering `Done` completes all of its subtasks;
/// - a completed subtask whose siblings are all complete completes its parent.
fn save_with_effects(conn: &Connection, mut task: Task, was_done: bool) -> Result<TaskUpdate> {
    let now = now_ms();
    task.updated_at = now;
    save_task(conn, &task)?;

    let mut related = Vec::new();

    if !task.is_subtask() && task.status == TaskStatus::Done && !was_done {
        for mut subtask in load_subtasks(conn, &task.id)? {
            if subtask.completed {
                continue;
            }
            subtask.set_completed(true);
            subtask.updated_at = now;
            save_task(conn, &subtask)?;
            related.push(subtask);
        }
        if !related.is_empty() {
            debug!(task_id = %task.id, count = related.len(), "Cascaded completion to subtasks");
        }
    }

    if let Some(parent_id) = task.parent_task_id.as_deref()
        && task.completed
    {
        let siblings = load_subtasks(conn, parent_id)?;
        if should_auto_complete_parent(&siblings)
            && let Some(mut parent) = get_task_internal(conn, &task.user_id, parent_id)?
            && !parent.completed
        {
            parent.set_completed(true);
            parent.updated_at = now;
            save_task(conn, &parent)?;
            debug!(task_id = %parent.id, "Parent auto-completed by its subtasks");
            related.push(parent);
        }
    }

    touch_project(conn, &task.project_id, now)?;
    Ok(TaskUpdate { task, related })
}

impl Database {
    /// Create a task or, with `parent_task_id`, a subtask.
    pub fn create_task(&self, user_id: &str, input: NewTask) -> Result<Task> {
        if input.project_id.trim().is_empty() || input.title.trim().is_empty() {
            return Err(ApiError::missing_field("title", "Project ID and title are required").into());
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let project = require_project(&tx, user_id, input.project_id.trim())?;

            if let Some(parent_id) = input.parent_task_id.as_deref() {
                let parent = get_task_internal(&tx, user_id, parent_id)?
                    .ok_or_else(ApiError::parent_task_not_found)?;
                if !can_create_subtask(&parent, &project.id, user_id) {
                    return Err(ApiError::invalid_hierarchy().into());
                }
            }

            let now = now_ms();
            let mut task = Task {
                id: new_id(),
                project_id: project.id.clone(),
                user_id: user_id.to_string(),
                title: input.title.trim().to_string(),
                description: input.description.unwrap_or_default().trim().to_string(),
                priority: input.priority.unwrap_or_default(),
                status: TaskStatus::ToDo,
                due_date: input.due_date,
                parent_task_id: input.parent_task_id,
                completed: false,
                created_at: now,
                updated_at: now,
            };
            task.set_status(input.status.unwrap_or_default());

            insert_task(&tx, &task)?;
            touch_project(&tx, &project.id, now)?;
            tx.commit()?;

            debug!(task_id = %task.id, project_id = %task.project_id, subtask = task.is_subtask(), "Task created");
            Ok(task)
        })
    }

    /// Get a task owned by `user_id`.
    pub fn get_task(&self, user_id: &str, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, user_id, task_id))
    }

    /// List a project's task tree.
    ///
    /// Status and priority filters select parent tasks; every subtask of a
    /// selected parent is attached regardless of its own fields.
    pub fn list_project_tasks(
        &self,
        user_id: &str,
        project_id: &str,
        filter: &TaskFilter,
    ) -> Result<Vec<TaskNode>> {
        self.with_conn(|conn| {
            let project = require_project(conn, user_id, project_id)?;
            let tasks = load_project_tasks(conn, &project.id)?;

            let (parents, subtasks): (Vec<Task>, Vec<Task>) =
                tasks.into_iter().partition(|t| !t.is_subtask());
            let mut parents: Vec<Task> = parents
                .into_iter()
                .filter(|t| filter.status.is_none_or(|s| t.status == s))
                .filter(|t| filter.priority.is_none_or(|p| t.priority == p))
                .collect();
            sort_parents(&mut parents, filter.sort);
            parents.extend(subtasks);

            Ok(organize(parents))
        })
    }

    /// Apply a partial update; absent fields stay as they are.
    pub fn update_task(&self, user_id: &str, task_id: &str, patch: TaskPatch) -> Result<TaskUpdate> {
        let title = patch.title.as_deref().map(clean_title).transpose()?;

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut task = require_task(&tx, user_id, task_id)?;
            let was_done = task.status == TaskStatus::Done;

            if let Some(title) = title {
                task.title = title;
            }
            if let Some(description) = patch.description {
                task.description = description.trim().to_string();
            }
            if let Some(priority) = patch.priority {
                task.priority = priority;
            }
            if let Some(status) = patch.status {
                task.set_status(status);
            }
            if let Some(due_date) = patch.due_date {
                task.due_date = due_date;
            }

            let update = save_with_effects(&tx, task, was_done)?;
            tx.commit()?;
            Ok(update)
        })
    }

    /// Delete a task; its subtasks go with it.
    pub fn delete_task(&self, user_id: &str, task_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let task = require_task(&tx, user_id, task_id)?;
            tx.execute(
                "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
                params![task.id, user_id],
            )?;
            touch_project(&tx, &task.project_id, now_ms())?;
            tx.commit()?;
            debug!(task_id = %task.id, "Task deleted");
            Ok(())
        })
    }

    /// Mark a task complete or incomplete.
    pub fn set_task_completed(&self, user_id: &str, task_id: &str, completed: bool) -> Result<TaskUpdate> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut task = require_task(&tx, user_id, task_id)?;
            let was_done = task.status == TaskStatus::Done;
            task.set_completed(completed);
            let update = save_with_effects(&tx, task, was_done)?;
            tx.commit()?;
            Ok(update)
        })
    }

    /// Move a task to a kanban column.
    pub fn set_task_status(&self, user_id: &str, task_id: &str, status: TaskStatus) -> Result<TaskUpdate> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut task = require_task(&tx, user_id, task_id)?;
            let was_done = task.status == TaskStatus::Done;
            task.set_status(status);
            let update = save_with_effects(&tx, task, was_done)?;
            tx.commit()?;
            Ok(update)
        })
    }
}
