//! Credential validation, password hashing and session tokens.

use crate::error::ApiError;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "sid";

const HASH_SCHEME: &str = "sha256";
const HASH_ITERATIONS: u32 = 10_000;

/// Validate signup input, returning the trimmed username.
pub fn validate_signup(username: &str, password: &str) -> Result<String, ApiError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::missing_field(
            "username",
            "Username and password are required",
        ));
    }
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(ApiError::invalid_value(
            "username",
            format!(
                "Username must be at least {} characters long",
                MIN_USERNAME_LEN
            ),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::invalid_value(
            "password",
            format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LEN
            ),
        ));
    }
    Ok(username.to_string())
}

/// Validate login input, returning the trimmed username.
pub fn validate_login(username: &str, password: &str) -> Result<String, ApiError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::missing_field(
            "username",
            "Username and password are required",
        ));
    }
    Ok(username.to_string())
}

/// Hash a password with a fresh random salt.
///
/// Format: `sha256$<iterations>$<salt>$<hex digest>`.
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    let digest = derive(password, &salt, HASH_ITERATIONS);
    format!("{}${}${}${}", HASH_SCHEME, HASH_ITERATIONS, salt, digest)
}

/// Check a password against a stored hash. Malformed hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(4, '$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != HASH_SCHEME {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    if iterations == 0 {
        return false;
    }
    let actual = derive(password, salt, iterations);
    constant_time_eq(actual.as_bytes(), expected.as_bytes())
}

fn derive(password: &str, salt: &str, iterations: u32) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..iterations {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(password.as_bytes())
            .finalize();
    }
    format!("{:x}", digest)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Generate an opaque session token.
pub fn new_session_token() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// Build the `Set-Cookie` value that installs a session.
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let same_site = if secure { "None; Secure" } else { "Lax" };
    format!(
        "{}={}; Path=/; HttpOnly; SameSite={}; Max-Age={}",
        SESSION_COOKIE, token, same_site, max_age_secs
    )
}

/// Build the `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

/// Extract the session token from a `Cookie` header value.
pub fn token_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_requires_both_fields() {
        let err = validate_signup("", "secret1").unwrap_err();
        assert_eq!(err.message, "Username and password are required");
        assert!(validate_signup("alice", "").is_err());
    }

    #[test]
    fn signup_enforces_minimum_lengths() {
        let err = validate_signup("al", "secret1").unwrap_err();
        assert_eq!(err.message, "Username must be at least 3 characters long");
        let err = validate_signup("alice", "12345").unwrap_err();
        assert_eq!(err.message, "Password must be at least 6 characters long");
        assert_eq!(validate_signup("  alice ", "123456").unwrap(), "alice");
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse");
        assert!(hash.starts_with("sha256$10000$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn same_password_gets_different_salts() {
        assert_ne!(hash_password("pw1234"), hash_password("pw1234"));
    }

    #[test]
    fn malformed_hashes_never_verify() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "bcrypt$10$abc$def"));
        assert!(!verify_password("x", "sha256$zero$abc$def"));
        assert!(!verify_password("x", "sha256$0$abc$def"));
    }

    #[test]
    fn session_tokens_are_unique_hex() {
        let a = new_session_token();
        let b = new_session_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn cookie_header_parsing() {
        assert_eq!(
            token_from_cookie_header("theme=dark; sid=abc123; lang=en"),
            Some("abc123")
        );
        assert_eq!(token_from_cookie_header("sid="), None);
        assert_eq!(token_from_cookie_header("other=1"), None);
    }

    #[test]
    fn cookie_attributes() {
        let lax = session_cookie("tok", 60, false);
        assert!(lax.contains("sid=tok"));
        assert!(lax.contains("HttpOnly"));
        assert!(lax.contains("SameSite=Lax"));
        assert!(lax.contains("Max-Age=60"));
        assert!(session_cookie("tok", 60, true).contains("SameSite=None; Secure"));
        assert!(clear_session_cookie(false).contains("Max-Age=0"));
    }
}
