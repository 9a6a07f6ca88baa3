//! Cookie sessions backed by the `sessions` table.

use super::{Database, now_ms};
use crate::auth::new_session_token;
use crate::types::User;
use anyhow::Result;
use rusqlite::{OptionalExtension, params};
use tracing::debug;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

impl Database {
    /// Create a session for `user_id` lasting `ttl_days`. Returns the token.
    pub fn create_session(&self, user_id: &str, ttl_days: u32) -> Result<String> {
        let token = new_session_token();
        let now = now_ms();
        let expires_at = now + i64::from(ttl_days) * DAY_MS;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
                params![token, user_id, now, expires_at],
            )?;
            Ok(())
        })?;
        Ok(token)
    }

    /// Resolve a session token to its user. Expired sessions are removed.
    pub fn user_for_session(&self, token: &str) -> Result<Option<User>> {
        let now = now_ms();
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT u.id, u.username, u.created_at, s.expires_at
                     FROM sessions s JOIN users u ON u.id = s.user_id
                     WHERE s.token = ?1",
                    params![token],
                    |row| {
                        Ok((
                            User {
                                id: row.get(0)?,
                                username: row.get(1)?,
                                created_at: row.get(2)?,
                            },
                            row.get::<_, i64>(3)?,
                        ))
                    },
                )
                .optional()?;

            match row {
                Some((user, expires_at)) if expires_at > now => Ok(Some(user)),
                Some(_) => {
                    debug!("Dropping expired session");
                    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
                    Ok(None)
                }
                None => Ok(None),
            }
        })
    }

    /// Remove a session. Unknown tokens are ignored.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
            Ok(())
        })
    }

    /// Delete every expired session, returning how many were removed.
    pub fn purge_expired_sessions(&self) -> Result<usize> {
        let now = now_ms();
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?;
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_resolves_to_user() {
        let db = Database::open_in_memory().unwrap();
        let user = db.signup("alice", "secret1").unwrap();
        let token = db.create_session(&user.id, 30).unwrap();
        assert_eq!(db.user_for_session(&token).unwrap(), Some(user));
    }

    #[test]
    fn deleted_session_is_gone() {
        let db = Database::open_in_memory().unwrap();
        let user = db.signup("alice", "secret1").unwrap();
        let token = db.create_session(&user.id, 30).unwrap();
        db.delete_session(&token).unwrap();
        assert_eq!(db.user_for_session(&token).unwrap(), None);
    }

    #[test]
    fn expired_sessions_are_dropped() {
        let db = Database::open_in_memory().unwrap();
        let user = db.signup("alice", "secret1").unwrap();
        let token = db.create_session(&user.id, 0).unwrap();
        assert_eq!(db.user_for_session(&token).unwrap(), None);

        db.create_session(&user.id, 0).unwrap();
        db.create_session(&user.id, 30).unwrap();
        assert_eq!(db.purge_expired_sessions().unwrap(), 1);
    }
}
