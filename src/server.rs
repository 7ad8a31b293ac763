//! Debug HTTP server.
//!
//! Exposes the initialised tools over HTTP so a stage can be exercised with
//! `curl` before it is wired into a larger pipeline:
//!
//! ```text
//! curl --data-binary @input.tsv http://localhost:5000/process/dummy-tagger
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::runtime::{Pipeline, PipelineError, Presets, InitedTools, RunStats};

const TSV_CONTENT_TYPE: &str = "text/tab-separated-values; charset=utf-8";

/// Tools and presets served by the debug API.
pub struct AppState {
    pub name: String,
    pub tools: InitedTools,
    pub presets: Presets,
}

/// Build the debug router.
pub fn pipeline_rest_api(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/tools", get(list_tools))
        .route("/process/*tools", post(process_text))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> std::io::Result<()> {
    let app = pipeline_rest_api(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Debug server listening on {}", addr);
    axum::serve(listener, app).await
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": state.name,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Serialize)]
struct ToolInfo<'a> {
    name: &'a str,
    source_fields: Vec<&'a str>,
    target_fields: &'a [String],
    pass_header: bool,
}

/// List tools with their declared fields, plus presets
async fn list_tools(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let tools: Vec<ToolInfo<'_>> = state
        .tools
        .iter()
        .map(|(name, stage)| ToolInfo {
            name,
            source_fields: stage.sources().iter().map(String::as_str).collect(),
            target_fields: stage.targets(),
            pass_header: stage.passes_header(),
        })
        .collect();

    Json(serde_json::json!({
        "tools": tools,
        "presets": state.presets,
    }))
}

/// Run the tools named in the path over the request body
///
/// Stages are synchronous, so the run happens on the blocking pool.
async fn process_text(
    State(state): State<Arc<AppState>>,
    Path(tools): Path<String>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let output = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, PipelineError> {
        let used: Vec<&str> = tools.split('/').filter(|t| !t.is_empty()).collect();

        let pipeline = Pipeline::build(&used, &state.tools, &state.presets)?;
        let mut output = Vec::new();
        let stats = pipeline.run(body.as_bytes(), &mut output)?;
        log_run(&used, stats);
        Ok(output)
    })
    .await
    .map_err(|e| AppError::Internal(format!("processing task failed: {}", e)))??;

    let text = String::from_utf8(output)
        .map_err(|e| AppError::Internal(format!("output is not UTF-8: {}", e)))?;

    Ok(([(header::CONTENT_TYPE, TSV_CONTENT_TYPE)], text))
}

fn log_run(tools: &[&str], stats: RunStats) {
    tracing::info!(
        tools = ?tools,
        sentences = stats.sentences,
        tokens = stats.tokens,
        "Processed request"
    );
}

// Error handling

#[derive(Debug)]
enum AppError {
    Validation(String),
    Internal(String),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Io(e) => AppError::Internal(e.to_string()),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        tracing::warn!(status = %status, "Request failed: {}", message);

        (status, Json(serde_json::json!({
            "error": message
        }))).into_response()
    }
}
