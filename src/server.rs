//! HTTP gateway.
//!
//! Exposes the [`RagService`] operations as a small JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Body | Success |
//! |--------|------|------|---------|
//! | `POST` | `/add_text` | `{text, metadata?}` | `{success, message, id}` |
//! | `POST` | `/add_file` | multipart, field `file` | `{success, message, id}` |
//! | `POST` | `/search` | `{query, n_results?}` | `{results: [hit]}` |
//! | `POST` | `/get_context` | `{query, n_results?}` | `{context}` |
//! | `GET`  | `/health` | none | `{status: "healthy", message, version}` |
//!
//! # Error Contract
//!
//! Every failure is a single flat JSON object:
//!
//! ```json
//! { "error": "No text provided" }
//! ```
//!
//! Missing or malformed input is `400`; extraction, embedding, and store
//! failures are `500`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser-based chat
//! clients can call the API directly.

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::models::{validate_metadata, Metadata};
use crate::rag::RagService;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    rag: Arc<RagService>,
    /// `n_results` used when a request omits it.
    default_results: usize,
    /// Where uploads are parked while they are ingested.
    upload_dir: Arc<PathBuf>,
    max_upload_bytes: usize,
    debug: bool,
}

impl AppState {
    pub fn new(rag: Arc<RagService>, config: &Config) -> Self {
        Self {
            rag,
            default_results: config.retrieval.default_results,
            upload_dir: Arc::new(config.server.upload_dir.clone()),
            max_upload_bytes: config.server.max_upload_bytes,
            debug: config.debug,
        }
    }
}

/// Builds the router with CORS, the upload size limit, and (in debug
/// mode) per-request tracing.
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let debug = state.debug;
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    let app = Router::new()
        .route("/add_text", post(handle_add_text))
        .route("/add_file", post(handle_add_file))
        .route("/search", post(handle_search))
        .route("/get_context", post(handle_get_context))
        .route("/health", get(handle_health))
        .layer(body_limit)
        .layer(cors)
        .with_state(state);

    if debug {
        app.layer(TraceLayer::new_for_http())
    } else {
        app
    }
}

/// Binds `[server].host:port` and serves until Ctrl-C.
pub async fn run_server(config: &Config, rag: Arc<RagService>) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.server.upload_dir)?;

    let bind_addr = config.server.bind_addr();
    let app = create_app(AppState::new(rag, config));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(debug = config.debug, "RAG server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("RAG server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ============ Error response ============

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

/// Constructs a 500 error, logging the full error chain.
fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %format!("{:#}", err), "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: format!("{:#}", err),
    }
}

// ============ Request parsing ============

fn parse_body(body: &Bytes) -> Result<Value, AppError> {
    if body.is_empty() {
        return Err(bad_request("Request body must be a JSON object"));
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| bad_request(format!("Invalid JSON body: {}", e)))?;
    if !value.is_object() {
        return Err(bad_request("Request body must be a JSON object"));
    }
    Ok(value)
}

/// Reads a required, non-empty string field; absent, null, or `""` all
/// yield `missing`.
fn required_str<'a>(body: &'a Value, field: &str, missing: &str) -> Result<&'a str, AppError> {
    match body.get(field) {
        None | Some(Value::Null) => Err(bad_request(missing)),
        Some(Value::String(s)) if s.is_empty() => Err(bad_request(missing)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(bad_request(format!("'{}' must be a string", field))),
    }
}

fn n_results(body: &Value, default: usize) -> Result<usize, AppError> {
    match body.get("n_results") {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_u64()
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .ok_or_else(|| bad_request("'n_results' must be a positive integer")),
    }
}

fn metadata(body: &Value) -> Result<Option<Metadata>, AppError> {
    match body.get("metadata") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => {
            validate_metadata(map).map_err(|e| bad_request(e))?;
            Ok(Some(map.clone()))
        }
        Some(_) => Err(bad_request("'metadata' must be an object")),
    }
}

// ============ POST /add_text ============

async fn handle_add_text(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let body = parse_body(&body)?;
    let text = required_str(&body, "text", "No text provided")?;
    let metadata = metadata(&body)?;

    let id = state
        .rag
        .add_document(text, metadata)
        .await
        .map_err(internal)?;

    Ok(Json(json!({
        "success": true,
        "message": "Text added successfully",
        "id": id,
    })))
}

// ============ POST /add_file ============

/// Strips any directory components a client put in the upload name.
fn sanitize_file_name(name: &str) -> Option<String> {
    let normalized = name.replace('\\', "/");
    Path::new(&normalized)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty() && n != "." && n != "..")
}

/// Writes the upload to `temp_<random>_<file name>` inside `dir`.
///
/// The returned handle deletes the file when dropped, so every exit path
/// of the caller (including errors and cancellation) cleans up.
async fn save_upload(
    dir: &Path,
    file_name: &str,
    data: Bytes,
) -> anyhow::Result<tempfile::NamedTempFile> {
    let dir = dir.to_path_buf();
    let suffix = format!("_{}", file_name);
    tokio::task::spawn_blocking(move || -> anyhow::Result<tempfile::NamedTempFile> {
        use std::io::Write;

        std::fs::create_dir_all(&dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("temp_")
            .suffix(&suffix)
            .tempfile_in(&dir)?;
        file.write_all(&data)?;
        file.flush()?;
        Ok(file)
    })
    .await?
}

async fn handle_add_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, AppError> {
    let mut multipart = multipart.map_err(|_| bad_request("No file provided"))?;
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("Failed to read upload: {}", e)))?;
        upload = Some((file_name, data));
        break;
    }

    let (file_name, data) = upload.ok_or_else(|| bad_request("No file provided"))?;
    let file_name = sanitize_file_name(&file_name).ok_or_else(|| bad_request("No file selected"))?;

    let temp = save_upload(&state.upload_dir, &file_name, data)
        .await
        .map_err(internal)?;
    tracing::debug!(upload = %file_name, path = %temp.path().display(), "upload saved");

    let result = state.rag.add_file(temp.path()).await;
    if let Err(e) = temp.close() {
        tracing::warn!(error = %e, "failed to remove temporary upload");
    }
    let id = result.map_err(internal)?;

    Ok(Json(json!({
        "success": true,
        "message": "File added successfully",
        "id": id,
    })))
}

// ============ POST /search ============

async fn handle_search(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let body = parse_body(&body)?;
    let query = required_str(&body, "query", "No query provided")?;
    let n = n_results(&body, state.default_results)?;

    let results = state.rag.search(query, n).await.map_err(internal)?;
    Ok(Json(json!({ "results": results })))
}

// ============ POST /get_context ============

async fn handle_get_context(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let body = parse_body(&body)?;
    let query = required_str(&body, "query", "No query provided")?;
    let n = n_results(&body, state.default_results)?;

    let context = state.rag.get_context(query, n).await.map_err(internal)?;
    Ok(Json(json!({ "context": context })))
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"healthy"` while the process is serving.
    status: &'static str,
    message: &'static str,
    version: &'static str,
    /// Stored document count; omitted if the store could not answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    documents: Option<usize>,
}

/// Handler for `GET /health`. Never fails.
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let documents = match state.rag.document_count().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!(error = %e, "health check could not count documents");
            None
        }
    };

    Json(HealthResponse {
        status: "healthy",
        message: "RAG server is running",
        version: env!("CARGO_PKG_VERSION"),
        documents,
    })
}
