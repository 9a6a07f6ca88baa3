//! Task and subtask endpoints.

use super::{ApiJson, AppState, CurrentUser, parse_field};
use crate::error::{ApiError, ApiResult};
use crate::types::{NewTask, TaskFilter, TaskPatch, TaskStatus, deserialize_some, parse_due_date};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Default, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default, alias = "projectId")]
    project_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "dueDate")]
    due_date: Option<String>,
    #[serde(default, alias = "parentTaskId")]
    parent_task_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "dueDate", deserialize_with = "deserialize_some")]
    due_date: Option<Option<String>>,
}

impl UpdateTaskRequest {
    fn into_patch(self) -> ApiResult<TaskPatch> {
        Ok(TaskPatch {
            title: self.title,
            description: self.description,
            priority: parse_field(self.priority.as_deref())?,
            status: parse_field(self.status.as_deref())?,
            // null and "" both clear the date
            due_date: match self.due_date {
                None => None,
                Some(raw) => Some(parse_due_date(raw.as_deref())?),
            },
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    sort_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    status: Option<String>,
}

pub async fn create_task(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(body): ApiJson<CreateTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    let input = NewTask {
        project_id: body.project_id.unwrap_or_default(),
        title: body.title.unwrap_or_default(),
        description: body.description,
        priority: parse_field(body.priority.as_deref())?,
        status: parse_field(body.status.as_deref())?,
        due_date: parse_due_date(body.due_date.as_deref())?,
        parent_task_id: body.parent_task_id.filter(|id| !id.trim().is_empty()),
    };
    let user_id = current.user.id;
    let task = state.call(move |db| db.create_task(&user_id, input)).await?;
    Ok((StatusCode::CREATED, Json(json!({"task": task}))))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(project_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Value>> {
    let filter = TaskFilter {
        status: parse_field(query.status.as_deref())?,
        priority: parse_field(query.priority.as_deref())?,
        sort: parse_field(query.sort_by.as_deref())?.unwrap_or_default(),
    };
    let user_id = current.user.id;
    let tasks = state
        .call(move |db| db.list_project_tasks(&user_id, &project_id, &filter))
        .await?;
    Ok(Json(json!({"tasks": tasks})))
}

pub async fn get_task(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user_id = current.user.id;
    let task = state
        .call(move |db| db.get_task(&user_id, &id))
        .await?
        .ok_or_else(ApiError::task_not_found)?;
    Ok(Json(json!({"task": task})))
}

pub async fn update_task(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    let patch = body.into_patch()?;
    let user_id = current.user.id;
    let update = state
        .call(move |db| db.update_task(&user_id, &id, patch))
        .await?;
    Ok(Json(update))
}

pub async fn delete_task(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user_id = current.user.id;
    state.call(move |db| db.delete_task(&user_id, &id)).await?;
    Ok(Json(json!({"ok": true})))
}

/// Body is `{"completed": bool}`; anything else is rejected.
pub async fn toggle_task(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<impl IntoResponse> {
    let completed = body
        .get("completed")
        .and_then(Value::as_bool)
        .ok_or_else(|| ApiError::invalid_value("completed", "Completed must be a boolean value"))?;
    let user_id = current.user.id;
    let update = state
        .call(move |db| db.set_task_completed(&user_id, &id, completed))
        .await?;
    Ok(Json(update))
}

pub async fn set_status(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let status: TaskStatus = parse_field(body.status.as_deref())?
        .ok_or_else(|| ApiError::invalid_value("status", "Invalid status value"))?;
    let user_id = current.user.id;
    let update = state
        .call(move |db| db.set_task_status(&user_id, &id, status))
        .await?;
    Ok(Json(update))
}

#[cfg(test)]
mod tests {
    use super::super::build_router;
    use super::super::test_support::*;
    use axum::Router;
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    async fn new_project(app: &Router, cookie: &str) -> String {
        let response = send(app, "POST", "/api/projects", Some(cookie), Some(json!({"title": "P"}))).await;
        body_json(response).await["project"]["id"].as_str().unwrap().to_string()
    }

    async fn new_task(app: &Router, cookie: &str, body: Value) -> Value {
        let response = send(app, "POST", "/api/tasks", Some(cookie), Some(body)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["task"].clone()
    }

    #[tokio::test]
    async fn create_applies_defaults() {
        let app = build_router(test_state());
        let cookie = login_cookie(&app, "alice").await;
        let project_id = new_project(&app, &cookie).await;

        let task = new_task(
            &app,
            &cookie,
            json!({"project_id": project_id, "title": "  File forms ", "dueDate": "2026-04-15"}),
        )
        .await;
        assert_eq!(task["title"], "File forms");
        assert_eq!(task["priority"], "Medium");
        assert_eq!(task["status"], "To Do");
        assert_eq!(task["completed"], false);
        assert_eq!(task["due_date"], "2026-04-15");
        assert!(task["parent_task_id"].is_null());
    }

    #[tokio::test]
    async fn create_validation_messages() {
        let app = build_router(test_state());
        let cookie = login_cookie(&app, "alice").await;
        let project_id = new_project(&app, &cookie).await;

        let response = send(&app, "POST", "/api/tasks", Some(&cookie), Some(json!({"title": "x"}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Project ID and title are required");

        let response = send(
            &app,
            "POST",
            "/api/tasks",
            Some(&cookie),
            Some(json!({"project_id": project_id, "title": "x", "priority": "Urgent"})),
        )
        .await;
        assert_eq!(body_json(response).await["error"], "Invalid priority value");

        let response = send(
            &app,
            "POST",
            "/api/tasks",
            Some(&cookie),
            Some(json!({"project_id": "missing", "title": "x"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn subtask_of_subtask_is_rejected() {
        let app = build_router(test_state());
        let cookie = login_cookie(&app, "alice").await;
        let project_id = new_project(&app, &cookie).await;
        let parent = new_task(&app, &cookie, json!({"project_id": project_id, "title": "parent"})).await;
        let child = new_task(
            &app,
            &cookie,
            json!({"project_id": project_id, "title": "child", "parent_task_id": parent["id"]}),
        )
        .await;

        let response = send(
            &app,
            "POST",
            "/api/tasks",
            Some(&cookie),
            Some(json!({"project_id": project_id, "title": "grandchild", "parent_task_id": child["id"]})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_accepts_camel_case_keys() {
        let app = build_router(test_state());
        let cookie = login_cookie(&app, "alice").await;
        let project_id = new_project(&app, &cookie).await;
        let parent = new_task(&app, &cookie, json!({"projectId": project_id, "title": "parent"})).await;
        assert_eq!(parent["project_id"], project_id.as_str());

        let child = new_task(
            &app,
            &cookie,
            json!({
                "projectId": project_id,
                "title": "child",
                "parentTaskId": parent["id"],
                "dueDate": "2026-05-01",
            }),
        )
        .await;
        assert_eq!(child["parent_task_id"], parent["id"]);
        assert_eq!(child["due_date"], "2026-05-01");
    }

    #[tokio::test]
    async fn list_filters_and_nests_subtasks() {
        let app = build_router(test_state());
        let cookie = login_cookie(&app, "alice").await;
        let project_id = new_project(&app, &cookie).await;
        let parent = new_task(
            &app,
            &cookie,
            json!({"project_id": project_id, "title": "a", "priority": "High"}),
        )
        .await;
        new_task(
            &app,
            &cookie,
            json!({"project_id": project_id, "title": "sub", "parent_task_id": parent["id"], "priority": "Low"}),
        )
        .await;
        new_task(&app, &cookie, json!({"project_id": project_id, "title": "b", "priority": "Low"})).await;

        let uri = format!("/api/tasks/project/{}?priority=High", project_id);
        let body = body_json(send(&app, "GET", &uri, Some(&cookie), None).await).await;
        let tasks = body["tasks"].as_array().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0]["subtask_count"], 1);
        assert_eq!(tasks[0]["subtasks"][0]["title"], "sub");

        let uri = format!("/api/tasks/project/{}?status=Later", project_id);
        let response = send(&app, "GET", &uri, Some(&cookie), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_clears_due_date_with_null_or_blank() {
        let app = build_router(test_state());
        let cookie = login_cookie(&app, "alice").await;
        let project_id = new_project(&app, &cookie).await;
        let task = new_task(
            &app,
            &cookie,
            json!({"project_id": project_id, "title": "t", "due_date": "2026-01-02"}),
        )
        .await;
        let uri = format!("/api/tasks/{}", task["id"].as_str().unwrap());

        let body = body_json(send(&app, "PUT", &uri, Some(&cookie), Some(json!({"title": "renamed"}))).await).await;
        assert_eq!(body["task"]["due_date"], "2026-01-02");
        assert_eq!(body["task"]["title"], "renamed");

        let body = body_json(send(&app, "PUT", &uri, Some(&cookie), Some(json!({"due_date": ""}))).await).await;
        assert!(body["task"]["due_date"].is_null());

        let response = send(&app, "PUT", &uri, Some(&cookie), Some(json!({"due_date": "soon"}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn toggle_and_status_follow_completion_rules() {
        let app = build_router(test_state());
        let cookie = login_cookie(&app, "alice").await;
        let project_id = new_project(&app, &cookie).await;
        let parent = new_task(&app, &cookie, json!({"project_id": project_id, "title": "p"})).await;
        let sub = new_task(
            &app,
            &cookie,
            json!({"project_id": project_id, "title": "s", "parent_task_id": parent["id"]}),
        )
        .await;

        let uri = format!("/api/tasks/{}/toggle", sub["id"].as_str().unwrap());
        let response = send(&app, "POST", &uri, Some(&cookie), Some(json!({"completed": "yes"}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Completed must be a boolean value");

        let body = body_json(send(&app, "POST", &uri, Some(&cookie), Some(json!({"completed": true}))).await).await;
        assert_eq!(body["task"]["status"], "Done");
        assert_eq!(body["related"][0]["id"], parent["id"]);
        assert_eq!(body["related"][0]["completed"], true);

        let uri = format!("/api/tasks/{}/status", parent["id"].as_str().unwrap());
        let response = send(&app, "POST", &uri, Some(&cookie), Some(json!({}))).await;
        assert_eq!(body_json(response).await["error"], "Invalid status value");

        let body = body_json(
            send(&app, "POST", &uri, Some(&cookie), Some(json!({"status": "In Progress"}))).await,
        )
        .await;
        assert_eq!(body["task"]["status"], "In Progress");
        assert_eq!(body["task"]["completed"], false);
        assert!(body.get("related").is_none());
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let app = build_router(test_state());
        let cookie = login_cookie(&app, "alice").await;
        let project_id = new_project(&app, &cookie).await;
        let task = new_task(&app, &cookie, json!({"project_id": project_id, "title": "t"})).await;
        let uri = format!("/api/tasks/{}", task["id"].as_str().unwrap());

        assert_eq!(body_json(send(&app, "DELETE", &uri, Some(&cookie), None).await).await["ok"], true);
        let response = send(&app, "GET", &uri, Some(&cookie), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Task not found");
    }
}
