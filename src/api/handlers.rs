//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    ErrorResponse, ExecuteRequest, QueuedResponse, SelectFolderRequest, SelectFolderResponse,
    SessionListResponse, SetSettingRequest, SettingResponse, SuccessResponse,
};
use super::AppState;
use crate::settings::PROJECT_DIR_KEY;
use crate::transport::{LiveState, TransportError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::path::PathBuf;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Live conversation
        .route("/api/state", get(get_state))
        .route("/api/stream", get(stream))
        .route("/api/execute", post(execute))
        .route("/api/stop", post(stop))
        // Session list
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/new", post(new_session))
        .route("/api/sessions/:id/select", post(select_session))
        .route("/api/sessions/:id", axum::routing::delete(delete_session))
        // Project and settings
        .route("/api/select-folder", post(select_folder))
        .route("/api/settings/:key", get(get_setting).put(put_setting))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Live Conversation
// ============================================================

async fn get_state(State(state): State<AppState>) -> Result<Json<LiveState>, AppError> {
    Ok(Json(state.transport.state().await?))
}

async fn stream(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    // Subscribe first so nothing between the snapshot and the stream is lost
    let rx = state.transport.subscribe();
    let init = state.transport.state().await?;
    Ok(sse_stream(init, rx))
}

async fn execute(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> Result<Json<QueuedResponse>, AppError> {
    if req.prompt.trim().is_empty() {
        return Err(AppError::BadRequest("Prompt is empty".to_string()));
    }

    let cwd = req
        .cwd
        .filter(|c| !c.trim().is_empty())
        .or_else(|| state.settings.get_string(PROJECT_DIR_KEY))
        .map(PathBuf::from)
        .ok_or_else(|| AppError::BadRequest("No project directory selected".to_string()))?;
    if !cwd.is_dir() {
        return Err(AppError::BadRequest(format!(
            "Directory does not exist: {}",
            cwd.display()
        )));
    }

    state.transport.execute(req.prompt, cwd, req.model).await?;
    Ok(Json(QueuedResponse { queued: true }))
}

async fn stop(State(state): State<AppState>) -> Result<Json<SuccessResponse>, AppError> {
    state.transport.stop().await?;
    Ok(Json(SuccessResponse::ok()))
}

// ============================================================
// Session List
// ============================================================

async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<SessionListResponse>, AppError> {
    let active = state.transport.state().await?.session;
    Ok(Json(SessionListResponse {
        sessions: state.sessions.list(),
        active,
    }))
}

async fn new_session(State(state): State<AppState>) -> Result<Json<LiveState>, AppError> {
    state.transport.switch_session(None).await?;
    Ok(Json(state.transport.state().await?))
}

async fn select_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LiveState>, AppError> {
    if state.sessions.load(&id).is_none() {
        return Err(AppError::NotFound(format!("Session not found: {id}")));
    }
    state.transport.switch_session(Some(id)).await?;
    Ok(Json(state.transport.state().await?))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.transport.delete_session(id).await?;
    Ok(Json(SuccessResponse::ok()))
}

// ============================================================
// Project and Settings
// ============================================================

async fn select_folder(
    State(state): State<AppState>,
    Json(req): Json<SelectFolderRequest>,
) -> Json<SelectFolderResponse> {
    let picked = state
        .folders
        .select_folder(req.path.map(PathBuf::from))
        .await
        .map(|p| p.display().to_string());

    if let Some(path) = &picked {
        state.settings.set(PROJECT_DIR_KEY, Value::String(path.clone()));
    }
    Json(SelectFolderResponse { path: picked })
}

async fn get_setting(State(state): State<AppState>, Path(key): Path<String>) -> Json<SettingResponse> {
    let value = state.settings.get(&key).unwrap_or(Value::Null);
    Json(SettingResponse { key, value })
}

async fn put_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<SetSettingRequest>,
) -> Json<SuccessResponse> {
    state.settings.set(&key, req.value);
    Json(SuccessResponse::ok())
}

async fn get_version() -> &'static str {
    concat!("visual-agent ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<TransportError> for AppError {
    fn from(e: TransportError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
