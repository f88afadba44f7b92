//! HTTP handlers.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use docqa_rag::{Document, Pipeline, SearchResult, VectorIndex};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

/// Bound on fetching a remote document.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    pub chunk_ids: Vec<String>,
    pub chunk_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub context: Option<String>,
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    pub context: String,
    pub scenario: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub n_results: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total_found: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HybridResponse {
    pub vector_results: Vec<SearchResult>,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub documents: String,
    pub questions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    pub answers: Vec<String>,
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "docqa",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut upload = None;
    while let Some(field) =
        multipart.next_field().await.map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload.txt").to_string();
        let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
        upload = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(ApiError::BadRequest("multipart field 'file' is required".to_string()));
    };

    let text = state.extractor.extract(&filename, &bytes);
    if text.trim().is_empty() {
        warn!(%filename, size = bytes.len(), "no text extracted from upload");
        return Err(ApiError::Unprocessable(format!("no text could be extracted from '{filename}'")));
    }

    let metadata = HashMap::from([
        ("filename".to_string(), filename.clone()),
        ("size".to_string(), bytes.len().to_string()),
        ("uploaded_at".to_string(), chrono::Utc::now().to_rfc3339()),
    ]);
    let document = Document::new(text, metadata).with_source_uri(filename.clone());
    let chunk_ids = state.pipeline.ingest_document(&document).await?;

    info!(%filename, chunk_count = chunk_ids.len(), "upload ingested");
    Ok(Json(UploadResponse { filename, chunk_count: chunk_ids.len(), chunk_ids }))
}

pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> ApiResult<Json<Value>> {
    let answer = match request.context.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(context) => state.pipeline.answer_with_context(&request.question, context).await?,
        None => state.pipeline.answer(&request.question).await?,
    };
    Ok(Json(json!({ "answer": answer })))
}

pub async fn simulate(
    State(state): State<AppState>,
    Json(request): Json<SimulateRequest>,
) -> ApiResult<Json<Value>> {
    let result = state.pipeline.simulate(&request.context, &request.scenario).await?;
    Ok(Json(json!({ "result": result })))
}

pub async fn vector_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }
    let k = request.n_results.unwrap_or(state.pipeline.config().top_k);
    let results = state.pipeline.index().query(&request.query, k).await?;
    Ok(Json(SearchResponse { total_found: results.len(), results }))
}

pub async fn vector_stats(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let total = state.pipeline.index().count().await?;
    Ok(Json(json!({ "total_documents": total })))
}

pub async fn delete_vector(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.pipeline.index().delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("entry '{id}'")))
    }
}

pub async fn hybrid_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<HybridResponse>> {
    let k = request.n_results.unwrap_or(state.pipeline.config().top_k);
    let hybrid = state.pipeline.hybrid_search(&request.query, k).await?;
    Ok(Json(HybridResponse { vector_results: hybrid.results, answer: hybrid.answer }))
}

/// Download a document, index it in isolation and answer every question.
pub async fn hackrx_run(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> ApiResult<Json<RunResponse>> {
    if request.questions.is_empty() {
        return Err(ApiError::BadRequest("questions must not be empty".to_string()));
    }

    let (filename, bytes) =
        download(&state.http, &request.documents, state.max_document_bytes).await?;
    let text = state.extractor.extract(&filename, &bytes);
    if text.trim().is_empty() {
        return Err(ApiError::Unprocessable(format!("no text could be extracted from '{filename}'")));
    }

    let provider = Arc::clone(state.pipeline.index().embedding_provider());
    let pipeline = Arc::new(state.pipeline.with_index(Arc::new(VectorIndex::in_memory(provider))));
    let metadata = HashMap::from([("filename".to_string(), filename.clone())]);
    pipeline
        .ingest_document(&Document::new(text, metadata).with_source_uri(request.documents.clone()))
        .await?;

    // Dropping the handler future (client disconnect) cancels the batch.
    let (batch, _cancel_on_drop) = spawn_batch(pipeline, request.questions);
    let answers = batch.await.map_err(|e| ApiError::Internal(format!("batch task failed: {e}")))?;

    info!(%filename, question_count = answers.len(), "batch run completed");
    Ok(Json(RunResponse { answers }))
}

/// Answer `questions` on a background task.
///
/// The task stops at its next delay or retry once the returned guard is dropped.
pub fn spawn_batch(pipeline: Arc<Pipeline>, questions: Vec<String>) -> (JoinHandle<Vec<String>>, DropGuard) {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let batch = tokio::spawn(async move { pipeline.answer_many(&questions, &token).await });
    (batch, cancel.drop_guard())
}

async fn download(http: &reqwest::Client, url: &str, max_bytes: usize) -> ApiResult<(String, Vec<u8>)> {
    let parsed = reqwest::Url::parse(url).map_err(|e| ApiError::Download(format!("invalid URL: {e}")))?;
    let filename = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .unwrap_or("document.txt")
        .to_string();

    let mut response = http
        .get(parsed)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| ApiError::Download(e.to_string()))?;
    let too_large = || ApiError::Download(format!("document is larger than {max_bytes} bytes"));
    if response.content_length().is_some_and(|len| len > max_bytes as u64) {
        return Err(too_large());
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| ApiError::Download(e.to_string()))? {
        if bytes.len() + chunk.len() > max_bytes {
            return Err(too_large());
        }
        bytes.extend_from_slice(&chunk);
    }

    info!(%filename, size = bytes.len(), "document downloaded");
    Ok((filename, bytes))
}
