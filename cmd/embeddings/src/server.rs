//! HTTP server.
//!
//! API endpoints:
//! - POST /api/embeddings - `{file_path, duration}` -> track embedding
//! - GET  /api/health     - model name and embedding dimension

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use coral_embeddings::{ErrorCode, Extraction, Extractor};
use serde::{Deserialize, Serialize};

/// Accepted track durations, in seconds, are strictly between these bounds.
pub const MIN_DURATION: i64 = 60;
pub const MAX_DURATION: i64 = 900;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub file_path: String,
    pub duration: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub success: bool,
    pub error: Option<ErrorCode>,
    pub data: EmbeddingData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingData {
    pub embeddings: Vec<f32>,
}

impl From<Extraction> for EmbeddingResponse {
    fn from(result: Extraction) -> Self {
        match result {
            Ok(embeddings) => Self {
                success: true,
                error: None,
                data: EmbeddingData { embeddings },
            },
            Err(code) => Self {
                success: false,
                error: Some(code),
                data: EmbeddingData::default(),
            },
        }
    }
}

impl EmbeddingResponse {
    pub fn status(&self) -> StatusCode {
        match self.error {
            None => StatusCode::OK,
            Some(code) if code.is_server_fault() => StatusCode::INTERNAL_SERVER_ERROR,
            Some(_) => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Debug, Serialize)]
struct ValidationError {
    detail: String,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    model: String,
    dimension: usize,
}

/// Shared state: the loaded extractor and the name of its model.
#[derive(Clone)]
pub struct AppState {
    extractor: Arc<Extractor>,
    model: Arc<str>,
}

impl AppState {
    pub fn new(extractor: Arc<Extractor>, model: &str) -> Self {
        Self {
            extractor,
            model: Arc::from(model),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/embeddings", post(embeddings))
        .route("/api/health", get(health))
        .with_state(state)
}

/// Serves until `shutdown` resolves, then waits for in-flight requests.
pub async fn serve(
    addr: &str,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = parse_addr(addr)?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Parse address string to SocketAddr. `:port` binds all interfaces.
pub fn parse_addr(addr: &str) -> Result<SocketAddr> {
    let addr = if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    };
    Ok(addr.parse()?)
}

/// Checks the declared track duration.
pub fn validate_duration(duration: i64) -> Result<(), String> {
    if duration > MIN_DURATION && duration < MAX_DURATION {
        Ok(())
    } else {
        Err(format!(
            "duration must be greater than {MIN_DURATION} and less than \
             {MAX_DURATION} seconds, got {duration}"
        ))
    }
}

fn unprocessable(detail: String) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, Json(ValidationError { detail })).into_response()
}

async fn embeddings(
    State(state): State<AppState>,
    payload: Result<Json<EmbeddingRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => return unprocessable(rejection.body_text()),
    };
    if let Err(detail) = validate_duration(req.duration) {
        tracing::debug!(file_path = %req.file_path, duration = req.duration, "rejected request");
        return unprocessable(detail);
    }

    let extractor = state.extractor.clone();
    let path = req.file_path.clone();
    let result = tokio::task::spawn_blocking(move || extractor.extract(&path))
        .await
        .unwrap_or_else(|e| {
            tracing::error!(file_path = %req.file_path, error = %e, "extraction task failed");
            Err(ErrorCode::UnknownProcessingError)
        });

    let response = EmbeddingResponse::from(result);
    tracing::info!(
        file_path = %req.file_path,
        success = response.success,
        error = ?response.error,
        "embeddings request"
    );
    (response.status(), Json(response)).into_response()
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        model: state.model.to_string(),
        dimension: state.extractor.dimension(),
    })
}
