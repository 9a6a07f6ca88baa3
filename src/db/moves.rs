//! Batched quadrant moves.

use super::{Database, now_ms};
use crate::types::Quadrant;
use anyhow::Result;
use rusqlite::params;
use tracing::debug;

/// One pending project move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMove {
    pub user_id: String,
    pub project_id: String,
    pub quadrant: Quadrant,
}

impl Database {
    /// Apply a batch of moves in a single transaction.
    ///
    /// Moves for projects that are missing or owned by someone else are
    /// skipped. Returns the number of projects actually moved.
    pub fn apply_quadrant_moves(&self, moves: &[QueuedMove]) -> Result<usize> {
        if moves.is_empty() {
            return Ok(0);
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let now = now_ms();
            let mut applied = 0;
            {
                let mut stmt = tx.prepare_cached(
                    "UPDATE projects SET quadrant = ?1, updated_at = ?2
                     WHERE id = ?3 AND user_id = ?4",
                )?;
                for mv in moves {
                    applied += stmt.execute(params![mv.quadrant, now, mv.project_id, mv.user_id])?;
                }
            }
            tx.commit()?;
            debug!(batch = moves.len(), applied, "Applied quadrant moves");
            Ok(applied)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewProject;

    fn project(db: &Database, user_id: &str, title: &str) -> String {
        db.create_project(
            user_id,
            NewProject {
                title: title.to_string(),
                ..Default::default()
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn moves_apply_in_one_batch() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.signup("alice", "secret1").unwrap();
        let bob = db.signup("bob", "secret1").unwrap();
        let a = project(&db, &alice.id, "A");
        let b = project(&db, &bob.id, "B");

        let applied = db
            .apply_quadrant_moves(&[
                QueuedMove {
                    user_id: alice.id.clone(),
                    project_id: a.clone(),
                    quadrant: Quadrant::UrgentImportant,
                },
                // Not alice's project.
                QueuedMove {
                    user_id: alice.id.clone(),
                    project_id: b.clone(),
                    quadrant: Quadrant::UrgentImportant,
                },
                QueuedMove {
                    user_id: alice.id.clone(),
                    project_id: "missing".to_string(),
                    quadrant: Quadrant::UrgentImportant,
                },
            ])
            .unwrap();

        assert_eq!(applied, 1);
        let moved = db.get_project(&alice.id, &a).unwrap().unwrap();
        assert_eq!(moved.quadrant, Quadrant::UrgentImportant);
        let untouched = db.get_project(&bob.id, &b).unwrap().unwrap();
        assert_eq!(untouched.quadrant, Quadrant::NotUrgentNotImportant);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.apply_quadrant_moves(&[]).unwrap(), 0);
    }
}
