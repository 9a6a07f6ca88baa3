//! User accounts: signup, login and lookup.

use super::{Database, new_id, now_ms};
use crate::auth::{hash_password, validate_login, validate_signup, verify_password};
use crate::error::ApiError;
use crate::types::User;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        created_at: row.get("created_at")?,
    })
}

/// Look up a user and their stored password hash by username.
fn find_by_username(conn: &Connection, username: &str) -> Result<Option<(User, String)>> {
    let found = conn
        .query_row(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
            params![username],
            |row| Ok((parse_user_row(row)?, row.get::<_, String>("password_hash")?)),
        )
        .optional()?;
    Ok(found)
}

impl Database {
    /// Register a new account.
    pub fn signup(&self, username: &str, password: &str) -> Result<User> {
        let username = validate_signup(username, password)?;
        let password_hash = hash_password(password);

        self.with_conn(|conn| {
            if find_by_username(conn, &username)?.is_some() {
                return Err(ApiError::already_exists("User").into());
            }

            let user = User {
                id: new_id(),
                username,
                created_at: now_ms(),
            };
            conn.execute(
                "INSERT INTO users (id, username, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![user.id, user.username, password_hash, user.created_at],
            )?;
            Ok(user)
        })
    }

    /// Verify credentials. Unknown users and wrong passwords fail the same way.
    pub fn login(&self, username: &str, password: &str) -> Result<User> {
        let username = validate_login(username, password)?;

        self.with_conn(|conn| match find_by_username(conn, &username)? {
            Some((user, hash)) if verify_password(password, &hash) => Ok(user),
            _ => Err(ApiError::invalid_credentials().into()),
        })
    }

    /// Get a user by id.
    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    "SELECT id, username, created_at FROM users WHERE id = ?1",
                    params![user_id],
                    parse_user_row,
                )
                .optional()?;
            Ok(user)
        })
    }

    /// Get a user by username.
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.with_conn(|conn| Ok(find_by_username(conn, username.trim())?.map(|(user, _)| user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn code(err: anyhow::Error) -> ErrorCode {
        ApiError::from(err).code
    }

    #[test]
    fn signup_then_login() {
        let db = Database::open_in_memory().unwrap();
        let user = db.signup("alice", "secret1").unwrap();
        assert_eq!(user.username, "alice");

        let logged_in = db.login("alice", "secret1").unwrap();
        assert_eq!(logged_in, user);
        assert_eq!(db.get_user(&user.id).unwrap(), Some(user));
    }

    #[test]
    fn duplicate_username_conflicts() {
        let db = Database::open_in_memory().unwrap();
        db.signup("alice", "secret1").unwrap();
        let err = db.signup("alice", "other-pw").unwrap_err();
        assert_eq!(code(err), ErrorCode::AlreadyExists);
    }

    #[test]
    fn wrong_password_and_unknown_user_look_alike() {
        let db = Database::open_in_memory().unwrap();
        db.signup("alice", "secret1").unwrap();
        let wrong = ApiError::from(db.login("alice", "nope-nope").unwrap_err());
        let unknown = ApiError::from(db.login("bob", "secret1").unwrap_err());
        assert_eq!(wrong.code, ErrorCode::InvalidCredentials);
        assert_eq!(wrong.message, unknown.message);
    }

    #[test]
    fn short_credentials_are_rejected_before_storage() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(
            code(db.signup("al", "secret1").unwrap_err()),
            ErrorCode::InvalidFieldValue
        );
        assert!(db.get_user_by_username("al").unwrap().is_none());
    }
}
