//! Board-wide endpoints: batched edits and statistics.

use super::{ApiJson, AppState, CurrentUser};
use crate::error::ApiResult;
use crate::sync::{ServiceExecutor, SyncOp, execute_batch};
use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    ops: Vec<SyncOp>,
}

/// Apply a batch of queued client edits in order.
///
/// Each op gets its own result; one failure does not abort the rest.
pub async fn sync(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(body): ApiJson<SyncRequest>,
) -> ApiResult<Json<Value>> {
    let executor = ServiceExecutor::new(state.db.clone(), current.user.id.clone());
    let results = execute_batch(&executor, &body.ops, state.config.expose_internal_errors).await;
    let failed = results.iter().filter(|r| !r.ok).count();
    debug!(user_id = %current.user.id, ops = results.len(), failed, "Sync batch applied");
    Ok(Json(json!({"results": results})))
}

pub async fn stats(State(state): State<AppState>, current: CurrentUser) -> ApiResult<Json<Value>> {
    let user_id = current.user.id;
    let stats = state.call(move |db| db.board_stats(&user_id)).await?;
    Ok(Json(json!({"stats": stats})))
}
