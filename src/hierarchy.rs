//! Parent/subtask organization.
//!
//! Tasks form a two-level tree: top-level tasks may own subtasks, subtasks
//! may not own anything.

use crate::types::{Task, TaskNode, TaskSort};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Attach subtasks to their parents.
///
/// Parents keep their input order and so do the subtasks under each parent.
/// Subtasks whose parent is not in `tasks` are dropped.
pub fn organize(tasks: Vec<Task>) -> Vec<TaskNode> {
    let (subtasks, parents): (Vec<Task>, Vec<Task>) =
        tasks.into_iter().partition(Task::is_subtask);

    let mut by_parent: HashMap<String, Vec<Task>> = HashMap::new();
    for subtask in subtasks {
        if let Some(parent_id) = subtask.parent_task_id.clone() {
            by_parent.entry(parent_id).or_default().push(subtask);
        }
    }

    parents
        .into_iter()
        .map(|task| {
            let subtasks = by_parent.remove(&task.id).unwrap_or_default();
            node(task, subtasks)
        })
        .collect()
}

/// Build a node, deriving the subtask counters.
pub fn node(task: Task, subtasks: Vec<Task>) -> TaskNode {
    TaskNode {
        subtask_count: subtasks.len() as u32,
        completed_subtasks: subtasks.iter().filter(|t| t.completed).count() as u32,
        task,
        subtasks,
    }
}

/// Whether a subtask for `project_id`/`user_id` may be created under `parent`.
pub fn can_create_subtask(parent: &Task, project_id: &str, user_id: &str) -> bool {
    // No subtasks of subtasks.
    if parent.is_subtask() {
        return false;
    }
    parent.project_id == project_id && parent.user_id == user_id
}

/// Sort top-level tasks in place.
pub fn sort_parents(tasks: &mut [Task], sort: TaskSort) {
    match sort {
        TaskSort::Priority => tasks.sort_by(|a, b| {
            a.priority
                .rank()
                .cmp(&b.priority.rank())
                .then(a.created_at.cmp(&b.created_at))
        }),
        TaskSort::Status => tasks.sort_by(|a, b| {
            a.status
                .rank()
                .cmp(&b.status.rank())
                .then(a.created_at.cmp(&b.created_at))
        }),
        TaskSort::DueDate => tasks.sort_by(|a, b| match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y).then(a.created_at.cmp(&b.created_at)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.created_at.cmp(&b.created_at),
        }),
        TaskSort::Created => tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Priority, TaskStatus};
    use chrono::NaiveDate;

    fn task(id: &str, parent: Option<&str>, created_at: i64) -> Task {
        Task {
            id: id.to_string(),
            project_id: "p".to_string(),
            user_id: "u".to_string(),
            title: id.to_string(),
            description: String::new(),
            priority: Priority::Medium,
            status: TaskStatus::ToDo,
            due_date: None,
            parent_task_id: parent.map(str::to_string),
            completed: false,
            created_at,
            updated_at: created_at,
        }
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn organize_groups_subtasks_under_parents() {
        let mut done = task("s2", Some("a"), 4);
        done.completed = true;
        let nodes = organize(vec![
            task("a", None, 1),
            task("s1", Some("a"), 3),
            task("b", None, 2),
            done,
            task("orphan", Some("zzz"), 5),
        ]);

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].task.id, "a");
        assert_eq!(ids(&nodes[0].subtasks), vec!["s1", "s2"]);
        assert_eq!(nodes[0].subtask_count, 2);
        assert_eq!(nodes[0].completed_subtasks, 1);
        assert!(nodes[1].subtasks.is_empty());
    }

    #[test]
    fn subtasks_cannot_nest() {
        let parent = task("a", None, 1);
        let child = task("b", Some("a"), 2);
        assert!(can_create_subtask(&parent, "p", "u"));
        assert!(!can_create_subtask(&child, "p", "u"));
        assert!(!can_create_subtask(&parent, "other", "u"));
        assert!(!can_create_subtask(&parent, "p", "someone-else"));
    }

    #[test]
    fn priority_sort_breaks_ties_by_age() {
        let mut a = task("a", None, 3);
        a.priority = Priority::Low;
        let mut b = task("b", None, 2);
        b.priority = Priority::High;
        let c = task("c", None, 1);
        let d = task("d", None, 0);
        let mut tasks = vec![a, b, c, d];
        sort_parents(&mut tasks, TaskSort::Priority);
        assert_eq!(ids(&tasks), vec!["b", "d", "c", "a"]);
    }

    #[test]
    fn status_sort_follows_board_columns() {
        let mut a = task("a", None, 1);
        a.status = TaskStatus::Done;
        let mut b = task("b", None, 2);
        b.status = TaskStatus::InProgress;
        let c = task("c", None, 3);
        let mut tasks = vec![a, b, c];
        sort_parents(&mut tasks, TaskSort::Status);
        assert_eq!(ids(&tasks), vec!["c", "b", "a"]);
    }

    #[test]
    fn due_date_sort_puts_undated_last() {
        let mut a = task("a", None, 1);
        a.due_date = NaiveDate::from_ymd_opt(2025, 6, 1);
        let b = task("b", None, 2);
        let mut c = task("c", None, 3);
        c.due_date = NaiveDate::from_ymd_opt(2025, 1, 1);
        let d = task("d", None, 0);
        let mut tasks = vec![a, b, c, d];
        sort_parents(&mut tasks, TaskSort::DueDate);
        assert_eq!(ids(&tasks), vec!["c", "a", "d", "b"]);
    }

    #[test]
    fn created_sort_is_newest_first() {
        let mut tasks = vec![task("a", None, 1), task("b", None, 3), task("c", None, 2)];
        sort_parents(&mut tasks, TaskSort::Created);
        assert_eq!(ids(&tasks), vec!["b", "c", "a"]);
    }
}
