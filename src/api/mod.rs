//! JSON HTTP API.
//!
//! Routes live under `/api`; everything else is served from the optional
//! static directory holding the browser client.

mod auth;
mod board;
mod projects;
mod tasks;

pub use auth::CurrentUser;

use crate::config::ServerConfig;
use crate::db::Database;
use crate::error::{ApiError, ApiResult};
use crate::moves::MoveQueueHandle;
use axum::{
    Json, Router,
    extract::{FromRequest, Request},
    http::{HeaderValue, Method, StatusCode, header},
    response::IntoResponse,
    routing::{any, get, patch, post},
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<ServerConfig>,
    pub moves: MoveQueueHandle,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig, moves: MoveQueueHandle) -> Self {
        Self {
            db,
            config: Arc::new(config),
            moves,
        }
    }

    /// Run a database closure on the blocking pool, mapping failures to API errors.
    pub async fn call<F, T>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.db.call(f).await.map_err(|e| self.api_error(e))
    }

    /// Convert, log and (unless configured otherwise) redact an internal failure.
    pub fn api_error(&self, err: anyhow::Error) -> ApiError {
        let err = ApiError::from(err);
        if !err.code.is_internal() {
            return err;
        }
        error!(code = ?err.code, "Request failed: {}", err.message);
        if self.config.expose_internal_errors {
            err
        } else {
            err.redacted()
        }
    }
}

/// `Json` extractor whose rejections use the API error body.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::invalid_value("body", rejection.body_text())),
        }
    }
}

/// Parse an optional enum field; absent or blank means "not given".
pub(crate) fn parse_field<T>(raw: Option<&str>) -> ApiResult<Option<T>>
where
    T: FromStr<Err = ApiError>,
{
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some),
    }
}

async fn health(axum::extract::State(state): axum::extract::State<AppState>) -> impl IntoResponse {
    match state.db.call(|db| db.health_check()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"status": "ok", "database": "connected"})),
        ),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "database": "disconnected", "error": e.to_string()})),
            )
        }
    }
}

async fn route_not_found() -> ApiError {
    ApiError::route_not_found()
}

fn cors_layer() -> CorsLayer {
    // Cookie sessions need credentials, which rules out a wildcard origin.
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE])
}

/// Build the router with all routes.
pub fn build_router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();

    let router = Router::new()
        .route("/api/health", get(health))
        // Auth
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        // Projects
        .route(
            "/api/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route("/api/projects/moves", post(projects::queue_moves))
        .route(
            "/api/projects/{id}",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/api/projects/{id}/quadrant", patch(projects::set_quadrant))
        .route("/api/projects/{id}/progress", get(projects::project_progress))
        // Tasks
        .route("/api/tasks", post(tasks::create_task))
        .route("/api/tasks/project/{project_id}", get(tasks::list_tasks))
        .route(
            "/api/tasks/{id}",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/api/tasks/{id}/toggle", post(tasks::toggle_task))
        .route("/api/tasks/{id}/status", post(tasks::set_status))
        // Board
        .route("/api/sync", post(board::sync))
        .route("/api/stats", get(board::stats))
        .route("/api", any(route_not_found))
        .route("/api/{*rest}", any(route_not_found));

    let router = match static_dir {
        Some(dir) => {
            let index = ServeFile::new(dir.join("index.html"));
            router.fallback_service(ServeDir::new(dir).fallback(index))
        }
        None => router.fallback(route_not_found),
    };

    router
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the API.
///
/// Returns a oneshot sender that triggers graceful shutdown, the bound
/// address, and the server task.
pub async fn start_server(
    state: AppState,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr, tokio::task::JoinHandle<()>)> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Eisenhower board listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("HTTP server shutting down");
            })
            .await
        {
            error!("HTTP server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr, server))
}

/// `Set-Cookie` header value, falling back to an expired cookie if the token is not header-safe.
pub(crate) fn cookie_header(value: String) -> HeaderValue {
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("sid=; Path=/; Max-Age=0"))
}
