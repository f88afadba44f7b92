use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
};
use docqa_rag::{
    GroqBackend, HashEmbeddingProvider, InMemoryVectorStore, LocalVectorStore, Pipeline,
    ResilientGenerationClient, RetryConfig, VectorIndex, VectorStore,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    auth::require_bearer,
    config::ServerConfig,
    extract::{PlainTextExtractor, TextExtractor},
    handlers,
};

/// Largest accepted request body (uploads included).
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub api_key: Arc<str>,
    pub extractor: Arc<dyn TextExtractor>,
    pub http: reqwest::Client,
    /// Largest remote document `/hackrx/run` will download.
    pub max_document_bytes: usize,
}

impl AppState {
    pub fn new(pipeline: Pipeline, api_key: impl Into<String>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            api_key: Arc::from(api_key.into()),
            extractor: Arc::new(PlainTextExtractor),
            http: reqwest::Client::new(),
            max_document_bytes: MAX_BODY_BYTES,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_max_document_bytes(mut self, bytes: usize) -> Self {
        self.max_document_bytes = bytes;
        self
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/upload", post(handlers::upload))
        .route("/ask", post(handlers::ask))
        .route("/simulate", post(handlers::simulate))
        .route("/vector/search", post(handlers::vector_search))
        .route("/vector/stats", get(handlers::vector_stats))
        .route("/vector/{id}", delete(handlers::delete_vector))
        .route("/hybrid/search", post(handlers::hybrid_search))
        .route("/hackrx/run", post(handlers::hackrx_run))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Assemble the pipeline described by `config`.
pub async fn build_pipeline(config: &ServerConfig) -> anyhow::Result<Pipeline> {
    let mut backend = GroqBackend::new(config.groq_api_key.clone())?;
    if let Some(model) = &config.groq_model {
        backend = backend.with_model(model.clone());
    }
    if let Some(base_url) = &config.groq_base_url {
        backend = backend.with_base_url(base_url.clone());
    }

    let store: Arc<dyn VectorStore> = match &config.data_dir {
        Some(dir) => Arc::new(
            LocalVectorStore::open(dir)
                .await
                .with_context(|| format!("failed to open index at {}", dir.display()))?,
        ),
        None => Arc::new(InMemoryVectorStore::new()),
    };
    info!(backend = store.backend(), model = backend.model(), "pipeline configured");

    let provider = Arc::new(HashEmbeddingProvider::new(config.embedding_dimensions));
    let index = Arc::new(VectorIndex::new(provider, store));
    let retry = RetryConfig { max_prompt_chars: config.rag.max_prompt_chars, ..RetryConfig::default() };
    let generator = Arc::new(ResilientGenerationClient::new(Arc::new(backend)).with_config(retry));

    Ok(Pipeline::builder().config(config.rag.clone()).index(index).generator(generator).build()?)
}

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&config).await?;
    let app = app_router(AppState::new(pipeline, config.api_key.clone()));
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for docqa server")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("docqa listening on http://{}", addr);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
