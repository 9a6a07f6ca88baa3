//! Completion arithmetic shared by project lists, task trees and stats.

use crate::types::Task;
use serde::{Deserialize, Serialize};

/// Percentage of completed items, rounded half-up. Zero when there is nothing to do.
pub fn calculate_progress(total: u32, completed: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total) as u64;
    let total = total as u64;
    ((completed * 200 + total) / (2 * total)) as u8
}

/// Progress over a set of tasks, counting the `completed` flag.
pub fn task_progress(tasks: &[Task]) -> u8 {
    let completed = tasks.iter().filter(|t| t.completed).count() as u32;
    calculate_progress(tasks.len() as u32, completed)
}

/// Same rule as [`task_progress`], applied to the subtasks of one parent.
pub fn subtask_progress(subtasks: &[Task]) -> u8 {
    task_progress(subtasks)
}

/// A parent auto-completes once it has subtasks and every one of them is done.
pub fn should_auto_complete_parent(subtasks: &[Task]) -> bool {
    !subtasks.is_empty() && subtasks.iter().all(|t| t.completed)
}

/// Progress breakdown for a single project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectProgress {
    pub project_id: String,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub progress: u8,
    pub total_subtasks: u32,
    pub completed_subtasks: u32,
    pub subtask_progress: u8,
}

impl ProjectProgress {
    /// Build from a flat list of the project's tasks (parents and subtasks).
    pub fn from_tasks(project_id: &str, tasks: &[Task]) -> Self {
        let (subtasks, parents): (Vec<&Task>, Vec<&Task>) =
            tasks.iter().partition(|t| t.is_subtask());

        let total_tasks = parents.len() as u32;
        let completed_tasks = parents.iter().filter(|t| t.completed).count() as u32;
        let total_subtasks = subtasks.len() as u32;
        let completed_subtasks = subtasks.iter().filter(|t| t.completed).count() as u32;

        Self {
            project_id: project_id.to_string(),
            total_tasks,
            completed_tasks,
            progress: calculate_progress(total_tasks, completed_tasks),
            total_subtasks,
            completed_subtasks,
            subtask_progress: calculate_progress(total_subtasks, completed_subtasks),
        }
    }
}
