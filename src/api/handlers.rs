//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    AcceptedResponse, ErrorResponse, QueryRequest, SearchRequest, SearchResponse, SubmitRequest,
    ThemeRequest,
};
use super::AppState;
use crate::error::RuntimeStopped;
use crate::runtime::Command;
use crate::state_machine::WidgetSnapshot;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
#[must_use = "the router does nothing until served"]
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Snapshot and live updates
        .route("/api/widget", get(get_widget))
        .route("/api/stream", get(stream_widget))
        // Renderer commands
        .route("/api/open", post(open_composer))
        .route("/api/query", post(edit_query))
        .route("/api/submit", post(submit))
        .route("/api/dismiss", post(dismiss))
        .route("/api/reset", post(reset))
        .route("/api/theme", post(set_theme))
        // Reference search
        .route("/api/search", post(search))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Snapshot
// ============================================================

async fn get_widget(State(state): State<AppState>) -> Json<WidgetSnapshot> {
    Json(state.widget.snapshot())
}

async fn stream_widget(State(state): State<AppState>) -> impl IntoResponse {
    // Subscribe before reading the snapshot so nothing falls between them
    let rx = state.widget.subscribe();
    sse_stream(state.widget.snapshot(), rx)
}

// ============================================================
// Commands
// ============================================================

async fn dispatch(state: &AppState, command: Command) -> Result<Json<AcceptedResponse>, AppError> {
    tracing::debug!(?command, "Renderer command");
    state.widget.send(command).await?;
    Ok(Json(AcceptedResponse::new()))
}

async fn open_composer(State(state): State<AppState>) -> Result<Json<AcceptedResponse>, AppError> {
    dispatch(&state, Command::OpenComposer).await
}

async fn edit_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<AcceptedResponse>, AppError> {
    dispatch(&state, Command::EditQuery(req.text)).await
}

async fn submit(
    State(state): State<AppState>,
    body: Option<Json<SubmitRequest>>,
) -> Result<Json<AcceptedResponse>, AppError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    dispatch(&state, Command::Submit(req.query)).await
}

async fn dismiss(State(state): State<AppState>) -> Result<Json<AcceptedResponse>, AppError> {
    dispatch(&state, Command::Dismiss).await
}

async fn reset(State(state): State<AppState>) -> Result<Json<AcceptedResponse>, AppError> {
    dispatch(&state, Command::Reset).await
}

async fn set_theme(
    State(state): State<AppState>,
    Json(req): Json<ThemeRequest>,
) -> Result<Json<AcceptedResponse>, AppError> {
    dispatch(&state, Command::SetTheme(req.theme)).await
}

// ============================================================
// Search
// ============================================================

async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(AppError::BadRequest("Query must not be empty".to_string()));
    }

    let references = state.search.search(&req.query).await.map_err(|e| {
        tracing::warn!(error = %e, "Reference search failed");
        AppError::Upstream(e.message)
    })?;

    Ok(Json(SearchResponse { references }))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("clippy-widget ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    Upstream(String),
    Unavailable(String),
}

impl From<RuntimeStopped> for AppError {
    fn from(err: RuntimeStopped) -> Self {
        AppError::Unavailable(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
