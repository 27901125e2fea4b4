use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use docchat_rag::openai::{CompletionConfig, OpenAICompletionModel, OpenAIEmbeddingProvider};
use docchat_rag::pinecone::PineconeIndex;
use docchat_rag::{
    Answer, AnswerPipeline, Document, EmbeddingProvider, IngestionPipeline, RagConfig,
    RecursiveChunker, Resilient, VectorIndex,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::{DEFAULT_MAX_BODY_BYTES, ServiceConfig};
use crate::protocol::{ChatRequest, ErrorResponse, UploadDocumentRequest, UploadDocumentResponse};

/// Shared handler state: one pipeline per endpoint.
#[derive(Clone)]
pub struct AppState {
    pub ingestion: Arc<IngestionPipeline>,
    pub answering: Arc<AnswerPipeline>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(ingestion: Arc<IngestionPipeline>, answering: Arc<AnswerPipeline>) -> Self {
        Self { ingestion, answering, max_body_bytes: DEFAULT_MAX_BODY_BYTES }
    }

    /// Wire the OpenAI and Pinecone backends described by `config`, each
    /// wrapped in the configured retry policy.
    pub fn from_config(config: &ServiceConfig) -> docchat_rag::Result<Self> {
        let policy = config.retry_policy();
        let rag_config = RagConfig::default();

        let mut embedder = OpenAIEmbeddingProvider::new(config.openai_api_key.clone())?;
        if let Some(model) = &config.embedding_model {
            embedder = embedder.with_model(model.clone(), config.embedding_dimensions);
        }
        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(Resilient::new("openai-embeddings", embedder, policy.clone()));

        let mut completion_config = CompletionConfig::default();
        if let Some(model) = &config.completion_model {
            completion_config.model = model.clone();
        }
        let completion = OpenAICompletionModel::new(config.openai_api_key.clone())?
            .with_config(completion_config);
        let completion = Arc::new(Resilient::new("openai-completions", completion, policy.clone()));

        let mut index = PineconeIndex::new(config.pinecone_api_key.clone(), &config.pinecone_index_host)?
            .with_max_batch_size(rag_config.upsert_batch_size);
        if let Some(namespace) = &config.pinecone_namespace {
            index = index.with_namespace(namespace.clone());
        }
        let index: Arc<dyn VectorIndex> = Arc::new(Resilient::new("pinecone", index, policy));

        let ingestion = IngestionPipeline::builder()
            .chunker(Arc::new(RecursiveChunker::from_config(&rag_config)))
            .config(rag_config.clone())
            .embedding_provider(embedder.clone())
            .vector_index(index.clone())
            .build()?;
        let answering = AnswerPipeline::builder()
            .config(rag_config)
            .embedding_provider(embedder)
            .vector_index(index)
            .completion_model(completion)
            .build()?;

        Ok(Self {
            ingestion: Arc::new(ingestion),
            answering: Arc::new(answering),
            max_body_bytes: config.max_body_bytes,
        })
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let max_body_bytes = state.max_body_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/api/upload-document", post(upload_document))
        .route("/api/chat", post(chat))
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Bind the configured host and port. The host may be a name such as
/// `localhost`; it is resolved before binding.
pub async fn bind_listener(config: &ServiceConfig) -> anyhow::Result<tokio::net::TcpListener> {
    tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", config.host, config.port))
}

pub async fn run_server(config: ServiceConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config).context("failed to set up backends")?;
    let app = app_router(state);

    let listener = bind_listener(&config).await?;
    let addr = listener.local_addr()?;
    info!("docchat-server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({"status":"ok","service":"docchat-server"}))
}

// Bodies are taken as text: browser clients post JSON without a JSON content type.
async fn upload_document(
    State(state): State<AppState>,
    body: String,
) -> (StatusCode, Json<UploadDocumentResponse>) {
    let request: UploadDocumentRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "rejected malformed upload body");
            return (StatusCode::BAD_REQUEST, Json(UploadDocumentResponse { success: false }));
        }
    };

    let document = Document::new(request.name, request.text);
    match state.ingestion.ingest(&document).await {
        Ok(report) => {
            info!(
                document.name = %report.document_name,
                chunk_count = report.chunk_count,
                "document uploaded"
            );
            (StatusCode::OK, Json(UploadDocumentResponse { success: true }))
        }
        Err(e) => {
            error!(document.name = %document.name, kind = e.kind(), error = %e, "upload failed");
            (StatusCode::OK, Json(UploadDocumentResponse { success: false }))
        }
    }
}

async fn chat(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<Answer>, (StatusCode, Json<ErrorResponse>)> {
    let request: ChatRequest = serde_json::from_str(&body).map_err(|e| {
        warn!(error = %e, "rejected malformed chat body");
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse { error: format!("invalid request body: {e}"), kind: None }),
        )
    })?;

    let answer =
        state.answering.answer(&request.question, &request.document_name).await.map_err(|e| {
            error!(
                document.name = %request.document_name,
                kind = e.kind(),
                error = %e,
                "chat failed"
            );
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: "failed to answer question".to_string(),
                    kind: Some(e.kind().to_string()),
                }),
            )
        })?;

    Ok(Json(answer))
}
