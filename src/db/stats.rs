//! Board-wide statistics.

use super::Database;
use crate::progress::calculate_progress;
use crate::types::{BoardStats, Quadrant, QuadrantStats, StatusCount, TaskStatus};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::params;

struct TaskRow {
    quadrant: Quadrant,
    is_subtask: bool,
    status: TaskStatus,
    completed: bool,
    due_date: Option<NaiveDate>,
}

impl Database {
    /// Totals for the user's whole board, with `today` deciding what is overdue.
    pub fn board_stats_on(&self, user_id: &str, today: NaiveDate) -> Result<BoardStats> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT quadrant, COUNT(*) FROM projects WHERE user_id = ?1 GROUP BY quadrant",
            )?;
            let project_counts = stmt
                .query_map(params![user_id], |row| {
                    Ok((row.get::<_, Quadrant>(0)?, row.get::<_, u32>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut stmt = conn.prepare(
                "SELECT p.quadrant, t.parent_task_id IS NOT NULL, t.status, t.completed, t.due_date
                 FROM tasks t
                 JOIN projects p ON p.id = t.project_id
                 WHERE t.user_id = ?1",
            )?;
            let rows = stmt
                .query_map(params![user_id], |row| {
                    Ok(TaskRow {
                        quadrant: row.get(0)?,
                        is_subtask: row.get(1)?,
                        status: row.get(2)?,
                        completed: row.get(3)?,
                        due_date: row.get(4)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(summarize(&project_counts, &rows, today))
        })
    }

    /// Totals for the user's whole board as of today (UTC).
    pub fn board_stats(&self, user_id: &str) -> Result<BoardStats> {
        self.board_stats_on(user_id, chrono::Utc::now().date_naive())
    }
}

fn summarize(project_counts: &[(Quadrant, u32)], rows: &[TaskRow], today: NaiveDate) -> BoardStats {
    let mut stats = BoardStats::default();

    stats.by_quadrant = Quadrant::ALL
        .into_iter()
        .map(|quadrant| QuadrantStats {
            quadrant: Some(quadrant),
            projects: project_counts
                .iter()
                .filter(|(q, _)| *q == quadrant)
                .map(|(_, n)| *n)
                .sum(),
            ..Default::default()
        })
        .collect();
    stats.by_status = TaskStatus::ALL
        .into_iter()
        .map(|status| StatusCount { status, count: 0 })
        .collect();
    stats.projects = project_counts.iter().map(|(_, n)| *n).sum();

    for row in rows {
        if !row.completed && row.due_date.is_some_and(|d| d < today) {
            stats.overdue_tasks += 1;
        }

        if row.is_subtask {
            stats.total_subtasks += 1;
            stats.completed_subtasks += row.completed as u32;
            continue;
        }

        stats.total_tasks += 1;
        stats.completed_tasks += row.completed as u32;

        if let Some(q) = stats
            .by_quadrant
            .iter_mut()
            .find(|q| q.quadrant == Some(row.quadrant))
        {
            q.total_tasks += 1;
            q.completed_tasks += row.completed as u32;
        }
        if let Some(s) = stats.by_status.iter_mut().find(|s| s.status == row.status) {
            s.count += 1;
        }
    }

    stats.progress = calculate_progress(stats.total_tasks, stats.completed_tasks);
    for q in &mut stats.by_quadrant {
        q.progress = calculate_progress(q.total_tasks, q.completed_tasks);
    }
    stats
}
