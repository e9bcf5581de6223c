use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use hyper::Server;
use serde_json::json;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::app::{ReconcileUseCase, RunInputs, RunReport};
use crate::config::{OutputFormat, ReconConfig};
use crate::constants::MAX_MESSAGE_HEADER_BYTES;
use crate::infra;

const UPLOAD_PARTS: [&str; 3] = ["weekly", "history", "mapping"];
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Shared state of the HTTP wrapper
#[derive(Clone)]
pub struct AppState {
    config: Arc<ReconConfig>,
    /// Held for the whole duration of a run so runs never overlap
    run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(config: ReconConfig) -> Self {
        Self {
            config: Arc::new(config),
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Failure response: status plus `{ok: false, message}`
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "ok": false, "message": self.message })),
        )
            .into_response()
    }
}

/// Header-safe copy of a run message: control characters flattened, cut to
/// the header limit on a character boundary
fn message_header(message: &str) -> HeaderValue {
    let flat: String = message
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let mut end = flat.len().min(MAX_MESSAGE_HEADER_BYTES);
    while !flat.is_char_boundary(end) {
        end -= 1;
    }
    HeaderValue::from_bytes(flat[..end].as_bytes()).unwrap_or_else(|_| HeaderValue::from_static(""))
}

fn artifact_response(path: &Path, data: Vec<u8>, message: Option<&str>) -> Response {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("results.json")
        .replace('"', "");

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    if let Ok(disposition) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name)) {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    headers.insert("x-recon-runner", HeaderValue::from_static("ok"));
    if let Some(message) = message {
        headers.insert("x-recon-message", message_header(message));
    }
    (StatusCode::OK, headers, data).into_response()
}

/// Successful run that wrote nothing
fn empty_run_response(message: &str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert("x-recon-message", message_header(message));
    (StatusCode::NO_CONTENT, headers).into_response()
}

fn modified_utc(metadata: &std::fs::Metadata) -> Option<String> {
    metadata
        .modified()
        .ok()
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Run the job on a blocking worker, serialized with every other run
async fn execute(state: &AppState, inputs: RunInputs, destination: PathBuf) -> Result<RunReport, ApiError> {
    let _guard = state.run_lock.lock().await;
    let config = state.config.as_ref().clone();

    let joined = tokio::task::spawn_blocking(move || {
        let use_case = ReconcileUseCase::new(
            Box::new(infra::WorkbookSource::new()),
            infra::table_sink(OutputFormat::Json),
            infra::pivot_builder(&config.pivot),
            config,
        );
        use_case.run(&inputs, &destination)
    })
    .await;

    match joined {
        Ok(Ok(report)) => Ok(report),
        Ok(Err(e)) => {
            error!("Run failed: {}", e);
            Err(ApiError::internal(format!("Run failed: {}", e)))
        }
        Err(e) => {
            error!("Run worker panicked: {}", e);
            Err(ApiError::internal(format!("Run worker failed: {}", e)))
        }
    }
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "time": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn run(State(state): State<AppState>) -> Result<Response, ApiError> {
    let inputs = RunInputs::from(&state.config.input);
    let destination = state.config.output.path.clone();
    let report = execute(&state, inputs, destination).await?;

    let mut body = json!({
        "ok": report.ok,
        "message": &report.message,
        "run_id": report.run_id,
        "counts": &report.counts,
        "outfile": &report.output,
        "size_bytes": null,
        "modified_utc": null,
    });
    if let Some(path) = &report.output {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| ApiError::internal(format!("Run finished but no file was created: {}", path.display())))?;
        body["size_bytes"] = json!(metadata.len());
        body["modified_utc"] = json!(modified_utc(&metadata));
    }
    Ok(Json(body).into_response())
}

async fn run_file(State(state): State<AppState>) -> Result<Response, ApiError> {
    let inputs = RunInputs::from(&state.config.input);
    let destination = state.config.output.path.clone();
    let report = execute(&state, inputs, destination).await?;

    let Some(path) = report.output else {
        return Ok(empty_run_response(&report.message));
    };
    let data = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::internal(format!("Run finished but no file was created: {}", path.display())))?;
    Ok(artifact_response(&path, data, Some(&report.message)))
}

/// Extension of an uploaded file name, `xlsx` when it has none
fn upload_extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "xlsx".to_string())
}

async fn run_from_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let workspace = tempfile::tempdir()
        .map_err(|e| ApiError::internal(format!("Failed to create workspace: {}", e)))?;
    let mut saved: Vec<(String, PathBuf)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if !UPLOAD_PARTS.contains(&name.as_str()) {
            warn!("Ignoring unexpected upload part '{}'", name);
            continue;
        }
        let ext = upload_extension(field.file_name());
        let data: Bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read part '{}': {}", name, e)))?;

        let path = workspace.path().join(format!("{}.{}", name, ext));
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to store upload '{}': {}", name, e)))?;
        saved.retain(|(n, _)| n != &name);
        saved.push((name, path));
    }

    let find = |part: &str| saved.iter().find(|(n, _)| n == part).map(|(_, p)| p.clone());
    let missing: Vec<&str> = UPLOAD_PARTS.iter().copied().filter(|p| find(*p).is_none()).collect();
    if !missing.is_empty() {
        return Err(ApiError::bad_request(format!(
            "Missing files in request: {}",
            missing.join(", ")
        )));
    }

    let inputs = RunInputs {
        weekly: find("weekly").unwrap_or_default(),
        history: find("history").unwrap_or_default(),
        mapping: find("mapping").unwrap_or_default(),
    };
    let output_name = state
        .config
        .output
        .path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(crate::constants::DEFAULT_OUTPUT_FILE));
    let destination = workspace.path().join(output_name);

    info!("Running on uploaded files in {}", workspace.path().display());
    let report = execute(&state, inputs, destination).await?;

    let Some(path) = report.output else {
        return Ok(empty_run_response(&report.message));
    };
    let data = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::internal("Run finished but no file was created"))?;
    Ok(artifact_response(&path, data, Some(&report.message)))
}

async fn latest(State(state): State<AppState>) -> Result<Response, ApiError> {
    let path = &state.config.output.path;
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| ApiError::not_found(format!("{} does not exist yet", path.display())))?;
    Ok(Json(json!({
        "ok": true,
        "outfile": path,
        "size_bytes": metadata.len(),
        "modified_utc": modified_utc(&metadata),
    }))
    .into_response())
}

async fn latest_file(State(state): State<AppState>) -> Result<Response, ApiError> {
    let path = &state.config.output.path;
    let data = tokio::fs::read(path)
        .await
        .map_err(|_| ApiError::not_found(format!("{} does not exist yet", path.display())))?;
    Ok(artifact_response(path, data, None))
}

async fn metrics() -> Response {
    match crate::observability::render() {
        Some(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        None => ApiError::not_found("Metrics recorder is not installed").into_response(),
    }
}

/// Create the HTTP router with all routes
pub fn create_server(config: ReconConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/health", get(health))
        .route("/run", post(run))
        .route("/run/file", get(run_file).post(run_file))
        .route("/run/from-files", post(run_from_files))
        .route("/latest", get(latest))
        .route("/latest/file", get(latest_file))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(AppState::new(config))
}

/// Start the HTTP server on the configured host and port
pub async fn start_server(config: ReconConfig) -> anyhow::Result<()> {
    crate::observability::init()?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;
    let app = create_server(config);

    info!("HTTP server running on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    Server::bind(&addr).serve(app.into_make_service()).await?;
    Ok(())
}
