//! Optimistic board state with a background sync queue.
//!
//! Edits are applied to a local [`BoardState`] immediately and queued for
//! the server. [`SyncQueue::flush`] replays the queue in order through a
//! [`SyncExecutor`]. Confirmed ops are folded into the server-confirmed
//! state together with the server's copies; failed ops are dropped and the
//! local view is rebuilt from what the server accepted.

use crate::backoff::RetryPolicy;
use crate::db::Database;
use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::progress::{ProjectProgress, should_auto_complete_parent};
use crate::types::{Project, ProjectDetail, ProjectPatch, Quadrant, Task, TaskPatch, TaskStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

/// One queued edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SyncOp {
    MoveProject {
        project_id: String,
        quadrant: Quadrant,
    },
    UpdateProject {
        project_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    SetTaskStatus {
        task_id: String,
        status: TaskStatus,
    },
    ToggleTask {
        task_id: String,
        completed: bool,
    },
    UpdateTask {
        task_id: String,
        patch: TaskPatch,
    },
    DeleteTask {
        task_id: String,
    },
    DeleteProject {
        project_id: String,
    },
}

impl SyncOp {
    /// Ops sharing a key supersede each other while still pending.
    pub fn key(&self) -> Option<String> {
        match self {
            SyncOp::MoveProject { project_id, .. } => Some(format!("project-quadrant-{}", project_id)),
            SyncOp::SetTaskStatus { task_id, .. } => Some(format!("task-status-{}", task_id)),
            SyncOp::ToggleTask { task_id, .. } => Some(format!("task-completion-{}", task_id)),
            _ => None,
        }
    }
}

/// Authoritative entities returned by the server for a confirmed op.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,
    /// The task the op targeted first, then any task the completion rules changed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,
}

/// Sends one op to the server.
#[async_trait]
pub trait SyncExecutor: Send + Sync {
    async fn execute(&self, op: &SyncOp) -> ApiResult<SyncOutcome>;
}

/// Client-side view of a user's board.
#[derive(Debug, Clone, Default)]
pub struct BoardState {
    pub projects: HashMap<String, Project>,
    pub tasks: HashMap<String, Task>,
}

impl BoardState {
    pub fn from_details(details: impl IntoIterator<Item = ProjectDetail>) -> Self {
        let mut state = Self::default();
        for detail in details {
            for node in detail.tasks {
                for subtask in node.subtasks {
                    state.tasks.insert(subtask.id.clone(), subtask);
                }
                state.tasks.insert(node.task.id.clone(), node.task);
            }
            state.projects.insert(detail.project.id.clone(), detail.project);
        }
        state
    }

    /// Subtasks of `parent_id`, oldest first.
    pub fn subtasks_of(&self, parent_id: &str) -> Vec<&Task> {
        let mut subtasks: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| t.parent_task_id.as_deref() == Some(parent_id))
            .collect();
        subtasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        subtasks
    }

    pub fn progress(&self, project_id: &str) -> ProjectProgress {
        let tasks: Vec<Task> = self
            .tasks
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect();
        ProjectProgress::from_tasks(project_id, &tasks)
    }
}

struct PendingOp {
    id: u64,
    op: SyncOp,
}

/// An op that could not be persisted and was undone locally.
#[derive(Debug)]
pub struct RolledBack {
    pub op_id: u64,
    pub op: SyncOp,
    pub error: ApiError,
}

/// Result of one [`SyncQueue::flush`].
#[derive(Debug, Default)]
pub struct SyncReport {
    pub applied: Vec<u64>,
    pub rolled_back: Vec<RolledBack>,
}

/// Local state plus the ops not yet confirmed by the server.
///
/// `confirmed` holds only what the server has accepted. The visible state is
/// always `confirmed` with the pending ops replayed on top.
pub struct SyncQueue {
    confirmed: BoardState,
    state: BoardState,
    pending: VecDeque<PendingOp>,
    next_id: u64,
    retry: RetryPolicy,
}

impl SyncQueue {
    pub fn new(state: BoardState) -> Self {
        Self::with_policy(
            state,
            RetryPolicy {
                max_attempts: 3,
                initial_ms: 1000,
                multiplier: 2.0,
                max_ms: 8000,
                jitter_ms: 0,
            },
        )
    }

    pub fn with_policy(state: BoardState, retry: RetryPolicy) -> Self {
        Self {
            confirmed: state.clone(),
            state,
            pending: VecDeque::new(),
            next_id: 1,
            retry,
        }
    }

    /// The optimistic view: confirmed state plus every pending op.
    pub fn state(&self) -> &BoardState {
        &self.state
    }

    /// The state as last confirmed by the server.
    pub fn confirmed(&self) -> &BoardState {
        &self.confirmed
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_ops(&self) -> impl Iterator<Item = (u64, &SyncOp)> {
        self.pending.iter().map(|p| (p.id, &p.op))
    }

    /// Apply `op` to local state and queue it. Returns the op id.
    ///
    /// A pending op with the same [`SyncOp::key`] is dropped in favour of the
    /// new one, which goes to the back of the queue.
    pub fn apply(&mut self, op: SyncOp) -> ApiResult<u64> {
        apply_local(&mut self.state, &op, crate::db::now_ms())?;

        if let Some(key) = op.key()
            && let Some(pos) = self
                .pending
                .iter()
                .position(|p| p.op.key().as_deref() == Some(key.as_str()))
            && let Some(older) = self.pending.remove(pos)
        {
            debug!(key = %key, replaced = older.id, "Superseding pending sync op");
        }

        let id = self.next_id;
        self.next_id += 1;
        self.pending.push_back(PendingOp { id, op });
        Ok(id)
    }

    /// Send every pending op, oldest first.
    pub async fn flush<E>(&mut self, executor: &E) -> SyncReport
    where
        E: SyncExecutor + ?Sized,
    {
        let mut report = SyncReport::default();

        while let Some(pending) = self.pending.pop_front() {
            match self.execute_with_retry(executor, &pending.op).await {
                Ok(outcome) => {
                    self.confirm(&pending.op, outcome);
                    report.applied.push(pending.id);
                }
                Err(error) => {
                    warn!(op_id = pending.id, "Sync op failed, rolling back: {}", error);
                    report.rolled_back.push(RolledBack {
                        op_id: pending.id,
                        op: pending.op,
                        error,
                    });
                }
            }
        }

        self.rebuild();
        report
    }

    /// Fold an accepted op into the confirmed state; server copies win.
    fn confirm(&mut self, op: &SyncOp, outcome: SyncOutcome) {
        if let Err(e) = apply_local(&mut self.confirmed, op, crate::db::now_ms()) {
            debug!("Confirmed op does not apply to the confirmed state: {}", e);
        }
        if let Some(project) = outcome.project {
            self.confirmed.projects.insert(project.id.clone(), project);
        }
        for task in outcome.tasks {
            self.confirmed.tasks.insert(task.id.clone(), task);
        }
    }

    /// Recompute the optimistic view from the confirmed state.
    fn rebuild(&mut self) {
        let mut state = self.confirmed.clone();
        let now = crate::db::now_ms();
        self.pending
            .retain(|p| match apply_local(&mut state, &p.op, now) {
                Ok(()) => true,
                Err(e) => {
                    warn!(op_id = p.id, "Dropping pending op that no longer applies: {}", e);
                    false
                }
            });
        self.state = state;
    }

    async fn execute_with_retry<E>(&self, executor: &E, op: &SyncOp) -> ApiResult<SyncOutcome>
    where
        E: SyncExecutor + ?Sized,
    {
        let mut attempt = 1;
        loop {
            match executor.execute(op).await {
                Ok(outcome) => return Ok(outcome),
                // Validation and not-found errors will not change on retry.
                Err(e) if e.code.is_internal() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay(attempt);
                    debug!(attempt, ?delay, "Retrying sync op: {}", e);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn task_mut<'a>(state: &'a mut BoardState, id: &str) -> ApiResult<&'a mut Task> {
    state.tasks.get_mut(id).ok_or_else(ApiError::task_not_found)
}

fn project_mut<'a>(state: &'a mut BoardState, id: &str) -> ApiResult<&'a mut Project> {
    state
        .projects
        .get_mut(id)
        .ok_or_else(ApiError::project_not_found)
}

fn non_empty_title(title: &str) -> ApiResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::invalid_value("title", "Title cannot be empty"));
    }
    Ok(title.to_string())
}

/// Apply `op` to `state` the way the server would. Validates before mutating.
fn apply_local(state: &mut BoardState, op: &SyncOp, now: i64) -> ApiResult<()> {
    match op {
        SyncOp::MoveProject {
            project_id,
            quadrant,
        } => {
            let project = project_mut(state, project_id)?;
            project.quadrant = *quadrant;
            project.updated_at = now;
        }
        SyncOp::UpdateProject {
            project_id,
            title,
            description,
        } => {
            if title.is_none() && description.is_none() {
                return Err(ApiError::missing_field("title", "No valid fields to update"));
            }
            let title = title.as_deref().map(non_empty_title).transpose()?;
            let project = project_mut(state, project_id)?;
            if let Some(title) = title {
                project.title = title;
            }
            if let Some(description) = description {
                project.description = description.trim().to_string();
            }
            project.updated_at = now;
        }
        SyncOp::SetTaskStatus { task_id, status } => {
            let task = task_mut(state, task_id)?;
            let was_done = task.status == TaskStatus::Done;
            task.set_status(*status);
            task.updated_at = now;
            completion_rules(state, task_id, was_done, now);
        }
        SyncOp::ToggleTask { task_id, completed } => {
            let task = task_mut(state, task_id)?;
            let was_done = task.status == TaskStatus::Done;
            task.set_completed(*completed);
            task.updated_at = now;
            completion_rules(state, task_id, was_done, now);
        }
        SyncOp::UpdateTask { task_id, patch } => {
            let title = patch.title.as_deref().map(non_empty_title).transpose()?;
            let task = task_mut(state, task_id)?;
            let was_done = task.status == TaskStatus::Done;
            if let Some(title) = title {
                task.title = title;
            }
            if let Some(description) = &patch.description {
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
            task.updated_at = now;
            completion_rules(state, task_id, was_done, now);
        }
        SyncOp::DeleteTask { task_id } => {
            if !state.tasks.contains_key(task_id) {
                return Err(ApiError::task_not_found());
            }
            state
                .tasks
                .retain(|id, t| id != task_id && t.parent_task_id.as_deref() != Some(task_id));
        }
        SyncOp::DeleteProject { project_id } => {
            if state.projects.remove(project_id).is_none() {
                return Err(ApiError::project_not_found());
            }
            state.tasks.retain(|_, t| t.project_id != *project_id);
        }
    }

    Ok(())
}

/// Mirror of the server's cascade and auto-complete rules.
fn completion_rules(state: &mut BoardState, task_id: &str, was_done: bool, now: i64) {
    let Some(task) = state.tasks.get(task_id).cloned() else {
        return;
    };

    if !task.is_subtask() && task.status == TaskStatus::Done && !was_done {
        let open: Vec<String> = state
            .subtasks_of(&task.id)
            .into_iter()
            .filter(|t| !t.completed)
            .map(|t| t.id.clone())
            .collect();
        for id in open {
            if let Some(subtask) = state.tasks.get_mut(&id) {
                subtask.set_completed(true);
                subtask.updated_at = now;
            }
        }
    }

    if let Some(parent_id) = task.parent_task_id.as_deref()
        && task.completed
    {
        let siblings: Vec<Task> = state.subtasks_of(parent_id).into_iter().cloned().collect();
        let parent_open = state.tasks.get(parent_id).is_some_and(|p| !p.completed);
        if parent_open
            && should_auto_complete_parent(&siblings)
            && let Some(parent) = state.tasks.get_mut(parent_id)
        {
            parent.set_completed(true);
            parent.updated_at = now;
        }
    }
}

/// Runs ops directly against the database on behalf of one user.
#[derive(Clone)]
pub struct ServiceExecutor {
    db: Database,
    user_id: String,
}

impl ServiceExecutor {
    pub fn new(db: Database, user_id: impl Into<String>) -> Self {
        Self {
            db,
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl SyncExecutor for ServiceExecutor {
    async fn execute(&self, op: &SyncOp) -> ApiResult<SyncOutcome> {
        let user_id = self.user_id.clone();
        let op = op.clone();
        self.db
            .call(move |db| run_op(db, &user_id, op))
            .await
            .map_err(ApiError::from)
    }
}

fn run_op(db: &Database, user_id: &str, op: SyncOp) -> anyhow::Result<SyncOutcome> {
    let with_tasks = |update: crate::db::tasks::TaskUpdate| {
        let mut tasks = vec![update.task];
        tasks.extend(update.related);
        SyncOutcome {
            project: None,
            tasks,
        }
    };

    Ok(match op {
        SyncOp::MoveProject {
            project_id,
            quadrant,
        } => SyncOutcome {
            project: Some(db.set_project_quadrant(user_id, &project_id, quadrant)?),
            tasks: Vec::new(),
        },
        SyncOp::UpdateProject {
            project_id,
            title,
            description,
        } => {
            let patch = ProjectPatch {
                title,
                description,
                quadrant: None,
            };
            SyncOutcome {
                project: Some(db.update_project(user_id, &project_id, patch)?),
                tasks: Vec::new(),
            }
        }
        SyncOp::SetTaskStatus { task_id, status } => {
            with_tasks(db.set_task_status(user_id, &task_id, status)?)
        }
        SyncOp::ToggleTask { task_id, completed } => {
            with_tasks(db.set_task_completed(user_id, &task_id, completed)?)
        }
        SyncOp::UpdateTask { task_id, patch } => {
            with_tasks(db.update_task(user_id, &task_id, patch)?)
        }
        SyncOp::DeleteTask { task_id } => {
            db.delete_task(user_id, &task_id)?;
            SyncOutcome::default()
        }
        SyncOp::DeleteProject { project_id } => {
            db.delete_project(user_id, &project_id)?;
            SyncOutcome::default()
        }
    })
}

/// Per-op result of a server-side batch.
#[derive(Debug, Serialize)]
pub struct SyncResult {
    pub index: usize,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<Task>,
}

/// Execute a batch in order. A failing op does not stop the ones after it.
pub async fn execute_batch<E>(executor: &E, ops: &[SyncOp], expose_internal: bool) -> Vec<SyncResult>
where
    E: SyncExecutor + ?Sized,
{
    let mut results = Vec::with_capacity(ops.len());
    for (index, op) in ops.iter().enumerate() {
        let result = match executor.execute(op).await {
            Ok(outcome) => {
                let mut tasks = outcome.tasks.into_iter();
                SyncResult {
                    index,
                    ok: true,
                    error: None,
                    code: None,
                    project: outcome.project,
                    task: tasks.next(),
                    related: tasks.collect(),
                }
            }
            Err(e) => {
                let e = if expose_internal { e } else { e.redacted() };
                SyncResult {
                    index,
                    ok: false,
                    error: Some(e.message),
                    code: Some(e.code),
                    project: None,
                    task: None,
                    related: Vec::new(),
                }
            }
        };
        results.push(result);
    }
    results
}
