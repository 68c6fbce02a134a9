//! HTTP surface for the File Search service.
//!
//! This module exposes a compact Axum router:
//!
//! - `GET /store` – The resolved store and its documents.
//! - `GET /documents` – Documents in the store, oldest first.
//! - `POST /documents` – Multipart upload of one or more `file` fields. Files are uploaded and
//!   indexed one after another; each gets its own `indexed` | `skipped` | `failed` result.
//!   When every file fails, the response takes the error status of the first failure.
//! - `DELETE /documents` – Remove every document. Partial failures answer `502` with the report.
//! - `DELETE /documents/:filename` – Remove one document by filename.
//! - `POST /ask` – Answer a question grounded in the store.
//! - `GET /metrics` – Upload and indexing counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Errors are rendered as `{ "error", "kind", "retryable" }`.

use crate::metrics::MetricsSnapshot;
use crate::processing::{
    Citation, ClearReport, DeletionFailure, DocumentRecord, DocumentState, FileSearchApi,
    PollProgress, ServiceError, StoreHandle, UploadReport, ValidationError,
    validate::normalize_filename,
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::Field},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Most files accepted in a single `POST /documents` request.
const MAX_FILES_PER_REQUEST: usize = 16;

/// Build the HTTP router exposing the File Search API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: FileSearchApi + 'static,
{
    let body_limit = service
        .max_upload_bytes()
        .saturating_mul(MAX_FILES_PER_REQUEST);
    Router::new()
        .route("/store", get(get_store::<S>))
        .route(
            "/documents",
            get(list_documents::<S>)
                .post(upload_documents::<S>)
                .delete(clear_store::<S>),
        )
        .route("/documents/:filename", delete(remove_document::<S>))
        .route("/ask", post(ask::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}

/// Document as rendered by the HTTP API.
#[derive(Serialize)]
struct DocumentView {
    id: String,
    filename: String,
    state: DocumentState,
    size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    create_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_reason: Option<String>,
}

impl From<DocumentRecord> for DocumentView {
    fn from(record: DocumentRecord) -> Self {
        Self {
            create_time: format_time(record.create_time),
            id: record.id,
            filename: record.filename,
            state: record.state,
            size_bytes: record.size_bytes,
            mime_type: record.mime_type,
            failure_reason: record.failure_reason,
        }
    }
}

#[derive(Serialize)]
struct StoreView {
    id: String,
    display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    create_time: Option<String>,
}

impl From<&StoreHandle> for StoreView {
    fn from(store: &StoreHandle) -> Self {
        Self {
            id: store.id.clone(),
            display_name: store.display_name.clone(),
            create_time: format_time(store.create_time),
        }
    }
}

fn format_time(time: Option<OffsetDateTime>) -> Option<String> {
    time.and_then(|value| value.format(&Rfc3339).ok())
}

/// Response body for `GET /store`.
#[derive(Serialize)]
struct StoreResponse {
    store: StoreView,
    documents: Vec<DocumentView>,
}

/// Return the store handle together with its current documents.
async fn get_store<S>(State(service): State<Arc<S>>) -> Result<Json<StoreResponse>, AppError>
where
    S: FileSearchApi,
{
    let documents = service.list_documents().await?;
    Ok(Json(StoreResponse {
        store: StoreView::from(service.store()),
        documents: documents.into_iter().map(DocumentView::from).collect(),
    }))
}

/// Response body for `GET /documents`.
#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<DocumentView>,
}

async fn list_documents<S>(
    State(service): State<Arc<S>>,
) -> Result<Json<DocumentsResponse>, AppError>
where
    S: FileSearchApi,
{
    let documents = service.list_documents().await?;
    Ok(Json(DocumentsResponse {
        documents: documents.into_iter().map(DocumentView::from).collect(),
    }))
}

/// One poll as reported back to HTTP clients.
#[derive(Serialize)]
struct ProgressView {
    poll: u32,
    state: DocumentState,
    elapsed_ms: u64,
}

impl From<&PollProgress> for ProgressView {
    fn from(progress: &PollProgress) -> Self {
        Self {
            poll: progress.poll,
            state: progress.record.state,
            elapsed_ms: progress.elapsed.as_millis() as u64,
        }
    }
}

#[derive(Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum UploadStatus {
    Indexed,
    Skipped,
    Failed,
}

impl UploadStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Indexed => "indexed",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

/// Per-file outcome of `POST /documents`.
#[derive(Serialize)]
struct UploadResult {
    filename: String,
    status: UploadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<DocumentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_digest: Option<String>,
    progress: Vec<ProgressView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    retryable: bool,
    #[serde(skip)]
    error_status: Option<StatusCode>,
}

impl UploadResult {
    fn from_report(filename: String, report: UploadReport) -> Self {
        let UploadReport { outcome, progress } = report;
        let progress = progress.iter().map(ProgressView::from).collect();
        match outcome {
            Ok(document) => Self {
                filename,
                status: if document.skipped {
                    UploadStatus::Skipped
                } else {
                    UploadStatus::Indexed
                },
                content_digest: Some(document.content_digest),
                document: Some(DocumentView::from(document.record)),
                progress,
                error: None,
                kind: None,
                retryable: false,
                error_status: None,
            },
            Err(error) => Self {
                progress,
                ..Self::from_error(filename, &error)
            },
        }
    }

    fn from_error(filename: String, error: &ServiceError) -> Self {
        Self {
            filename,
            status: UploadStatus::Failed,
            document: None,
            content_digest: None,
            progress: Vec::new(),
            error: Some(error.to_string()),
            kind: Some(error.kind()),
            retryable: error.is_retryable(),
            error_status: Some(AppError::status(error)),
        }
    }
}

/// Response body for `POST /documents`.
#[derive(Serialize)]
struct UploadResponse {
    results: Vec<UploadResult>,
}

/// Upload every `file` field in order, waiting for each to finish indexing before the next.
async fn upload_documents<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError>
where
    S: FileSearchApi,
{
    let max_bytes = service.max_upload_bytes();
    let mut results = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some("file") {
            continue;
        }
        let raw_name = field.file_name().unwrap_or_default().to_string();
        let filename = normalize_filename(&raw_name).unwrap_or_default();
        let bytes = read_field(field, max_bytes).await.map_err(bad_multipart)?;

        let result = match bytes {
            FieldBytes::Complete(bytes) => {
                let report = service.upload(filename.clone(), bytes).await;
                UploadResult::from_report(filename, report)
            }
            FieldBytes::TooLarge(size) => {
                let error = ServiceError::from(ValidationError::TooLarge {
                    filename: filename.clone(),
                    size,
                    max: max_bytes,
                });
                UploadResult::from_error(filename, &error)
            }
        };
        tracing::info!(
            filename = %result.filename,
            status = result.status.as_str(),
            polls = result.progress.len(),
            "Upload request item completed"
        );
        results.push(result);
    }

    if results.is_empty() {
        return Err(ServiceError::from(ValidationError::NoFiles).into());
    }
    let status = upload_status(&results);
    Ok((status, Json(UploadResponse { results })))
}

/// `200` unless every file failed, in which case the first failure decides.
fn upload_status(results: &[UploadResult]) -> StatusCode {
    let mut failures = results.iter().map(|result| result.error_status);
    match failures.next() {
        Some(Some(first)) if failures.all(|status| status.is_some()) => first,
        _ => StatusCode::OK,
    }
}

enum FieldBytes {
    Complete(Vec<u8>),
    TooLarge(usize),
}

/// Read a multipart field, keeping at most `max_bytes` in memory.
async fn read_field(
    mut field: Field<'_>,
    max_bytes: usize,
) -> Result<FieldBytes, axum::extract::multipart::MultipartError> {
    let mut bytes = Vec::new();
    let mut size = 0usize;
    while let Some(chunk) = field.chunk().await? {
        size += chunk.len();
        if size <= max_bytes {
            bytes.extend_from_slice(&chunk);
        }
    }
    if size > max_bytes {
        Ok(FieldBytes::TooLarge(size))
    } else {
        Ok(FieldBytes::Complete(bytes))
    }
}

fn bad_multipart(error: axum::extract::multipart::MultipartError) -> AppError {
    AppError::BadRequest(error.body_text())
}

/// Response body for `DELETE /documents`.
#[derive(Serialize)]
struct ClearResponse {
    deleted: Vec<String>,
    failed: Vec<DeletionFailure>,
}

impl From<ClearReport> for ClearResponse {
    fn from(report: ClearReport) -> Self {
        Self {
            deleted: report.deleted,
            failed: report.failed,
        }
    }
}

async fn clear_store<S>(State(service): State<Arc<S>>) -> Result<Json<ClearResponse>, AppError>
where
    S: FileSearchApi,
{
    let report = service.clear_store().await?;
    Ok(Json(ClearResponse::from(report)))
}

/// Response body for `DELETE /documents/:filename`.
#[derive(Serialize)]
struct RemoveResponse {
    removed: String,
}

async fn remove_document<S>(
    State(service): State<Arc<S>>,
    Path(filename): Path<String>,
) -> Result<Json<RemoveResponse>, AppError>
where
    S: FileSearchApi,
{
    if service.remove_document(&filename).await? {
        Ok(Json(RemoveResponse { removed: filename }))
    } else {
        Err(AppError::NotFound(format!(
            "No document named '{filename}'"
        )))
    }
}

/// Request body for `POST /ask`.
#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

/// Response body for `POST /ask`.
#[derive(Serialize)]
struct AskResponse {
    answer: String,
    citations: Vec<Citation>,
}

async fn ask<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError>
where
    S: FileSearchApi,
{
    let answer = service.ask(&request.question).await?;
    Ok(Json(AskResponse {
        answer: answer.text,
        citations: answer.citations,
    }))
}

/// Return the current upload and indexing counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: FileSearchApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "store",
                method: "GET",
                path: "/store",
                description: "Return the File Search store used by this server and its documents.",
                request_example: None,
            },
            CommandDescriptor {
                name: "list_documents",
                method: "GET",
                path: "/documents",
                description: "List documents in the store, oldest upload first.",
                request_example: None,
            },
            CommandDescriptor {
                name: "upload",
                method: "POST",
                path: "/documents",
                description: "Multipart upload of one or more `file` fields. Each file is uploaded, indexed, and reported as indexed, skipped (filename already present), or failed.",
                request_example: None,
            },
            CommandDescriptor {
                name: "clear",
                method: "DELETE",
                path: "/documents",
                description: "Delete every document in the store. Answers 502 with the report when some deletions fail.",
                request_example: None,
            },
            CommandDescriptor {
                name: "remove",
                method: "DELETE",
                path: "/documents/{filename}",
                description: "Delete the document with the given filename.",
                request_example: None,
            },
            CommandDescriptor {
                name: "ask",
                method: "POST",
                path: "/ask",
                description: "Answer a question using the store for retrieval. Response returns { \"answer\": string, \"citations\": [...] }.",
                request_example: Some(json!({ "question": "What does the report conclude?" })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return upload and indexing counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    Service(ServiceError),
    BadRequest(String),
    NotFound(String),
}

impl AppError {
    fn status(error: &ServiceError) -> StatusCode {
        match error {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::IndexingFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::IndexingTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::Remote(_) | ServiceError::ClearIncomplete(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Service(error) => {
                let status = Self::status(&error);
                if status.is_server_error() {
                    tracing::error!(error = %error, kind = error.kind(), "Request failed");
                } else {
                    tracing::warn!(error = %error, kind = error.kind(), "Request rejected");
                }
                let mut body = json!({
                    "error": error.to_string(),
                    "kind": error.kind(),
                    "retryable": error.is_retryable(),
                });
                if let ServiceError::ClearIncomplete(report) = error {
                    body["deleted"] = json!(report.deleted);
                    body["failed"] = json!(report.failed);
                }
                (status, Json(body)).into_response()
            }
            AppError::BadRequest(message) => {
                let body = json!({ "error": message, "kind": "validation", "retryable": false });
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            AppError::NotFound(message) => {
                let body = json!({ "error": message, "kind": "not_found", "retryable": false });
                (StatusCode::NOT_FOUND, Json(body)).into_response()
            }
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(inner: ServiceError) -> Self {
        Self::Service(inner)
    }
}
