//! Signup, login and the session-cookie extractor.

use super::{ApiJson, AppState, cookie_header};
use crate::auth::{clear_session_cookie, session_cookie, token_from_cookie_header};
use crate::error::{ApiError, ApiResult};
use crate::types::User;
use axum::{
    Json,
    extract::{FromRequestParts, State},
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// The signed-in user, resolved from the `sid` cookie.
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(token_from_cookie_header)
            .map(str::to_string)
            .ok_or_else(ApiError::not_authenticated)?;

        let lookup = token.clone();
        let user = state
            .call(move |db| db.user_for_session(&lookup))
            .await?
            .ok_or_else(ApiError::not_authenticated)?;

        Ok(CurrentUser { user, token })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl Credentials {
    fn into_parts(self) -> (String, String) {
        (
            self.username.unwrap_or_default(),
            self.password.unwrap_or_default(),
        )
    }
}

/// Create a session for `user` and build the response carrying its cookie.
async fn start_session(
    state: &AppState,
    user: User,
    status: StatusCode,
) -> ApiResult<Response> {
    let ttl_days = state.config.session_ttl_days;
    let user_id = user.id.clone();
    let token = state
        .call(move |db| db.create_session(&user_id, ttl_days))
        .await?;
    let cookie = session_cookie(
        &token,
        state.config.session_max_age_secs(),
        state.config.cookie_secure,
    );
    Ok((
        status,
        [(header::SET_COOKIE, cookie_header(cookie))],
        Json(json!({"ok": true, "user": user})),
    )
        .into_response())
}

pub async fn signup(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Credentials>,
) -> ApiResult<Response> {
    let (username, password) = body.into_parts();
    let user = state
        .call(move |db| db.signup(&username, &password))
        .await?;
    info!(user_id = %user.id, "User signed up");
    start_session(&state, user, StatusCode::CREATED).await
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Credentials>,
) -> ApiResult<Response> {
    let (username, password) = body.into_parts();
    let user = state.call(move |db| db.login(&username, &password)).await?;
    info!(user_id = %user.id, "User logged in");
    start_session(&state, user, StatusCode::OK).await
}

pub async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let token = current.token;
    state.call(move |db| db.delete_session(&token)).await?;
    let cookie = clear_session_cookie(state.config.cookie_secure);
    Ok((
        [(header::SET_COOKIE, cookie_header(cookie))],
        Json(json!({"ok": true})),
    ))
}

pub async fn me(current: CurrentUser) -> Json<serde_json::Value> {
    Json(json!({"user": current.user}))
}
