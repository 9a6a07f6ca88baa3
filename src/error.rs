//! Structured error types for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    MissingRequiredField,
    InvalidFieldValue,
    InvalidHierarchy,

    // Authentication errors
    NotAuthenticated,
    InvalidCredentials,

    // Not found errors
    UserNotFound,
    ProjectNotFound,
    TaskNotFound,
    ParentTaskNotFound,
    RouteNotFound,

    // Conflict errors
    AlreadyExists,

    // Internal errors
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    /// HTTP status returned for this code.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFieldValue
            | ErrorCode::InvalidHierarchy => StatusCode::BAD_REQUEST,
            ErrorCode::NotAuthenticated | ErrorCode::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            ErrorCode::UserNotFound
            | ErrorCode::ProjectNotFound
            | ErrorCode::TaskNotFound
            | ErrorCode::ParentTaskNotFound
            | ErrorCode::RouteNotFound => StatusCode::NOT_FOUND,
            ErrorCode::AlreadyExists => StatusCode::CONFLICT,
            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn is_internal(self) -> bool {
        matches!(self, ErrorCode::DatabaseError | ErrorCode::InternalError)
    }
}

/// Structured error carried from the database layer up to the HTTP response.
#[derive(Debug, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: ErrorCode,
    #[serde(rename = "error")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }

    // Convenience constructors

    pub fn missing_field(field: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MissingRequiredField, message).with_field(field)
    }

    pub fn invalid_value(field: &str, reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn invalid_hierarchy() -> Self {
        Self::new(ErrorCode::InvalidHierarchy, "Invalid task hierarchy")
    }

    pub fn not_authenticated() -> Self {
        Self::new(ErrorCode::NotAuthenticated, "Not authenticated")
    }

    pub fn invalid_credentials() -> Self {
        Self::new(ErrorCode::InvalidCredentials, "Invalid credentials")
    }

    pub fn user_not_found() -> Self {
        Self::new(ErrorCode::UserNotFound, "User not found")
    }

    pub fn project_not_found() -> Self {
        Self::new(ErrorCode::ProjectNotFound, "Project not found")
    }

    pub fn task_not_found() -> Self {
        Self::new(ErrorCode::TaskNotFound, "Task not found")
    }

    pub fn parent_task_not_found() -> Self {
        Self::new(ErrorCode::ParentTaskNotFound, "Parent task not found")
    }

    pub fn route_not_found() -> Self {
        Self::new(ErrorCode::RouteNotFound, "Route not found")
    }

    pub fn already_exists(what: &str) -> Self {
        Self::new(ErrorCode::AlreadyExists, format!("{} already exists", what))
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }

    /// Replace internal details with a generic message.
    pub fn redacted(self) -> Self {
        if self.code.is_internal() {
            Self::new(self.code, "Internal server error")
        } else {
            self
        }
    }
}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ApiError>() {
            Ok(api_err) => api_err,
            Err(err) => match err.downcast::<rusqlite::Error>() {
                Ok(db_err) => ApiError::database(db_err),
                Err(err) => ApiError::internal(err),
            },
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::database(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Result type for API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_message_under_error_key() {
        let err = ApiError::invalid_value("quadrant", "Invalid quadrant value");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["error"], "Invalid quadrant value");
        assert_eq!(json["code"], "INVALID_FIELD_VALUE");
        assert_eq!(json["field"], "quadrant");
    }

    #[test]
    fn field_is_omitted_when_absent() {
        let json = serde_json::to_value(ApiError::project_not_found()).unwrap();
        assert!(json.get("field").is_none());
    }

    #[test]
    fn maps_codes_to_http_status() {
        assert_eq!(ApiError::task_not_found().status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::already_exists("User").status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::invalid_credentials().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::invalid_hierarchy().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::internal("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn anyhow_round_trip_keeps_structured_error() {
        let err: anyhow::Error = ApiError::project_not_found().into();
        let back = ApiError::from(err);
        assert_eq!(back.code, ErrorCode::ProjectNotFound);
    }

    #[test]
    fn plain_anyhow_becomes_internal() {
        let back = ApiError::from(anyhow::anyhow!("disk on fire"));
        assert_eq!(back.code, ErrorCode::InternalError);
        assert_eq!(back.redacted().message, "Internal server error");
    }
}
