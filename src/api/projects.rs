//! Project endpoints.

use super::{ApiJson, AppState, CurrentUser, parse_field};
use crate::error::{ApiError, ApiResult};
use crate::types::{NewProject, ProjectPatch, Quadrant};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
pub struct ProjectRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    quadrant: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuadrantRequest {
    #[serde(default)]
    quadrant: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MoveItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    quadrant: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MovesRequest {
    #[serde(default)]
    moves: Option<Vec<MoveItem>>,
}

fn require_quadrant(raw: Option<&str>) -> ApiResult<Quadrant> {
    parse_field(raw)?.ok_or_else(|| ApiError::missing_field("quadrant", "Quadrant is required"))
}

pub async fn list_projects(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Value>> {
    let user_id = current.user.id;
    let projects = state.call(move |db| db.list_projects(&user_id)).await?;
    Ok(Json(json!({"projects": projects})))
}

pub async fn get_project(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let user_id = current.user.id;
    let detail = state
        .call(move |db| db.get_project_detail(&user_id, &id))
        .await?;
    Ok(Json(detail))
}

pub async fn create_project(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(body): ApiJson<ProjectRequest>,
) -> ApiResult<impl IntoResponse> {
    let input = NewProject {
        title: body.title.unwrap_or_default(),
        description: body.description,
        quadrant: parse_field(body.quadrant.as_deref())?,
    };
    let user_id = current.user.id;
    let project = state
        .call(move |db| db.create_project(&user_id, input))
        .await?;
    Ok((StatusCode::CREATED, Json(json!({"project": project}))))
}

pub async fn update_project(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ProjectRequest>,
) -> ApiResult<Json<Value>> {
    let patch = ProjectPatch {
        title: body.title,
        description: body.description,
        quadrant: parse_field(body.quadrant.as_deref())?,
    };
    let user_id = current.user.id;
    let project = state
        .call(move |db| db.update_project(&user_id, &id, patch))
        .await?;
    Ok(Json(json!({"project": project})))
}

pub async fn delete_project(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user_id = current.user.id;
    state
        .call(move |db| db.delete_project(&user_id, &id))
        .await?;
    Ok(Json(json!({"ok": true})))
}

pub async fn set_quadrant(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<QuadrantRequest>,
) -> ApiResult<Json<Value>> {
    let quadrant = require_quadrant(body.quadrant.as_deref())?;
    let user_id = current.user.id;
    let project = state
        .call(move |db| db.set_project_quadrant(&user_id, &id, quadrant))
        .await?;
    Ok(Json(json!({"project": project})))
}

pub async fn project_progress(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user_id = current.user.id;
    let progress = state
        .call(move |db| db.project_progress(&user_id, &id))
        .await?;
    Ok(Json(json!({"progress": progress})))
}

/// Queue quadrant moves for the batch writer. Answers before they are written.
pub async fn queue_moves(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(body): ApiJson<MovesRequest>,
) -> ApiResult<impl IntoResponse> {
    let items = body
        .moves
        .ok_or_else(|| ApiError::missing_field("moves", "Moves are required"))?;

    let moves = items
        .into_iter()
        .map(|item| -> ApiResult<(String, Quadrant)> {
            Ok((
                item.id.unwrap_or_default(),
                require_quadrant(item.quadrant.as_deref())?,
            ))
        })
        .collect::<ApiResult<Vec<_>>>()?;

    let queued = state
        .moves
        .enqueue_bulk(&current.user.id, moves)
        .map_err(|e| state.api_error(e))?;
    debug!(user_id = %current.user.id, queued, "Moves queued");

    Ok((StatusCode::ACCEPTED, Json(json!({"ok": true, "queued": queued}))))
}
