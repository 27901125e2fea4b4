//! Wire-level tests for the OpenAI and Pinecone adapters against a local mock server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::post;
use axum::{Json, Router};
use docchat_rag::openai::{
    CompletionConfig, MAX_INPUTS_PER_REQUEST, OpenAICompletionModel, OpenAIEmbeddingProvider,
};
use docchat_rag::pinecone::PineconeIndex;
use docchat_rag::{
    Chunk, ChunkLocation, CompletionModel, DocumentFilter, EmbeddingProvider, LineRange,
    RagError, Resilient, RetryPolicy, VectorIndex, VectorRecord,
};
use serde_json::{Value, json};

#[derive(Debug, Clone)]
struct Captured {
    path: String,
    headers: HeaderMap,
    body: Value,
}

#[derive(Clone)]
struct Mock {
    requests: Arc<Mutex<Vec<Captured>>>,
    status: StatusCode,
    query_matches: Value,
}

impl Mock {
    fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            status: StatusCode::OK,
            query_matches: json!([]),
        }
    }

    fn failing(status: StatusCode) -> Self {
        Self { status, ..Self::new() }
    }

    fn with_matches(matches: Value) -> Self {
        Self { query_matches: matches, ..Self::new() }
    }

    fn captured(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handle(
    State(mock): State<Mock>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let path = uri.path().to_string();
    mock.requests.lock().unwrap().push(Captured { path: path.clone(), headers, body: body.clone() });

    if !mock.status.is_success() {
        return (mock.status, Json(json!({ "error": { "message": "Rate limit reached" } })));
    }

    let response = match path.as_str() {
        // Answer out of order so the client has to sort by `index`.
        "/embeddings" => {
            let inputs = body["input"].as_array().cloned().unwrap_or_default();
            let data: Vec<Value> = (0..inputs.len())
                .rev()
                .map(|i| json!({ "index": i, "embedding": [i as f32, 1.0] }))
                .collect();
            json!({ "data": data })
        }
        "/completions" => json!({ "choices": [{ "text": " Cats are mammals." }] }),
        "/query" => json!({ "matches": mock.query_matches }),
        "/vectors/upsert" => {
            json!({ "upsertedCount": body["vectors"].as_array().map_or(0, Vec::len) })
        }
        _ => json!({}),
    };
    (StatusCode::OK, Json(response))
}

async fn spawn_mock(mock: Mock) -> (String, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/embeddings", post(handle))
        .route("/completions", post(handle))
        .route("/query", post(handle))
        .route("/vectors/upsert", post(handle))
        .route("/vectors/delete", post(handle))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock listener");
    let addr = listener.local_addr().expect("listener addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server run");
    });

    (format!("http://{addr}"), handle)
}

fn input_counts(captured: &[Captured]) -> Vec<usize> {
    captured.iter().map(|c| c.body["input"].as_array().map_or(0, Vec::len)).collect()
}

fn quick_retries(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
        timeout: Duration::from_secs(5),
    }
}

fn record(document: &str, index: usize, content: &str) -> VectorRecord {
    let chunk = Chunk {
        content: content.to_string(),
        index,
        location: ChunkLocation { start: 0, end: content.len(), lines: LineRange { from: 1, to: 1 } },
    };
    VectorRecord::new(document, &chunk, vec![0.1, 0.2]).unwrap()
}

// ── OpenAI ─────────────────────────────────────────────────────────

#[tokio::test]
async fn embeddings_normalize_newlines_and_restore_order() {
    let mock = Mock::new();
    let (base, handle) = spawn_mock(mock.clone()).await;
    let provider = OpenAIEmbeddingProvider::new("sk-test").unwrap().with_base_url(&base);

    let vectors = provider.embed_batch(&["first\nline", "second\r\nline", "third"]).await.unwrap();

    assert_eq!(vectors, vec![vec![0.0, 1.0], vec![1.0, 1.0], vec![2.0, 1.0]]);
    assert_eq!(provider.dimensions(), 1536);

    let captured = mock.captured();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].body["model"], json!("text-embedding-ada-002"));
    assert_eq!(captured[0].body["input"], json!(["first line", "second line", "third"]));
    assert_eq!(captured[0].headers["authorization"], "Bearer sk-test");

    handle.abort();
}

#[tokio::test]
async fn embedding_api_errors_surface_as_embedding_failures() {
    let mock = Mock::failing(StatusCode::TOO_MANY_REQUESTS);
    let (base, handle) = spawn_mock(mock).await;
    let provider = OpenAIEmbeddingProvider::new("sk-test").unwrap().with_base_url(&base);

    let err = provider.embed("question").await.unwrap_err();

    match err {
        RagError::Embedding { provider, message, retryable } => {
            assert!(retryable);
            assert_eq!(provider, "OpenAI");
            assert!(message.contains("429"));
            assert!(message.contains("Rate limit reached"));
        }
        other => panic!("expected an embedding error, got {other:?}"),
    }

    handle.abort();
}

#[tokio::test]
async fn large_batches_are_split_across_requests() {
    let mock = Mock::new();
    let (base, handle) = spawn_mock(mock.clone()).await;
    let provider = OpenAIEmbeddingProvider::new("sk-test").unwrap().with_base_url(&base);

    let owned: Vec<String> = (0..3000).map(|i| format!("text {i}")).collect();
    let texts: Vec<&str> = owned.iter().map(String::as_str).collect();
    let vectors = provider.embed_batch(&texts).await.unwrap();

    let captured = mock.captured();
    assert_eq!(MAX_INPUTS_PER_REQUEST, 512);
    assert_eq!(input_counts(&captured), vec![512, 512, 512, 512, 512, 440]);
    // Sub-batches are contiguous slices of the input, sent in order.
    assert_eq!(captured[1].body["input"][0], json!("text 512"));
    assert_eq!(captured[5].body["input"][439], json!("text 2999"));

    // Each request's results are ordered by index and appended in request order.
    assert_eq!(vectors.len(), 3000);
    assert_eq!(vectors[0], vec![0.0, 1.0]);
    assert_eq!(vectors[511], vec![511.0, 1.0]);
    assert_eq!(vectors[512], vec![0.0, 1.0]);
    assert_eq!(vectors[2999], vec![439.0, 1.0]);

    handle.abort();
}

#[tokio::test]
async fn batch_size_is_configurable_and_clamped() {
    let mock = Mock::new();
    let (base, handle) = spawn_mock(mock.clone()).await;
    let provider =
        OpenAIEmbeddingProvider::new("sk-test").unwrap().with_base_url(&base).with_batch_size(2);

    let vectors = provider.embed_batch(&["a", "b", "c", "d", "e"]).await.unwrap();

    assert_eq!(input_counts(&mock.captured()), vec![2, 2, 1]);
    let firsts: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
    assert_eq!(firsts, vec![0.0, 1.0, 0.0, 1.0, 0.0]);

    let one_at_a_time =
        OpenAIEmbeddingProvider::new("sk-test").unwrap().with_base_url(&base).with_batch_size(0);
    one_at_a_time.embed_batch(&["x", "y"]).await.unwrap();
    assert_eq!(input_counts(&mock.captured()[3..]), vec![1, 1]);

    handle.abort();
}

#[tokio::test]
async fn single_embed_matches_a_batch_of_one() {
    let mock = Mock::new();
    let (base, handle) = spawn_mock(mock.clone()).await;
    let provider = OpenAIEmbeddingProvider::new("sk-test").unwrap().with_base_url(&base);
    let text = "line one\nline two\r\nline three";

    let single = provider.embed(text).await.unwrap();
    let batch = provider.embed_batch(&[text]).await.unwrap();

    assert_eq!(batch.len(), 1);
    assert_eq!(single, batch[0]);

    let captured = mock.captured();
    assert_eq!(captured.len(), 2);
    assert_eq!(captured[0].body, captured[1].body);
    assert_eq!(captured[0].body["input"], json!(["line one line two line three"]));

    handle.abort();
}

#[tokio::test]
async fn rejected_credentials_are_not_retried() {
    let mock = Mock::failing(StatusCode::UNAUTHORIZED);
    let (base, handle) = spawn_mock(mock.clone()).await;
    let provider = Resilient::new(
        "openai",
        OpenAIEmbeddingProvider::new("sk-wrong").unwrap().with_base_url(&base),
        quick_retries(3),
    );

    let err = provider.embed("question").await.unwrap_err();

    assert_eq!(err.kind(), "embedding");
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("401"));
    assert_eq!(mock.captured().len(), 1);

    handle.abort();
}

#[tokio::test]
async fn server_errors_are_retried_within_budget() {
    let mock = Mock::failing(StatusCode::SERVICE_UNAVAILABLE);
    let (base, handle) = spawn_mock(mock.clone()).await;
    let model = Resilient::new(
        "openai",
        OpenAICompletionModel::new("sk-test").unwrap().with_base_url(&base),
        quick_retries(2),
    );

    let err = model.complete("prompt").await.unwrap_err();

    assert_eq!(err.kind(), "completion");
    assert!(err.is_retryable());
    assert_eq!(mock.captured().len(), 3);

    handle.abort();
}

#[tokio::test]
async fn completions_send_prompt_with_low_temperature() {
    let mock = Mock::new();
    let (base, handle) = spawn_mock(mock.clone()).await;
    let model = OpenAICompletionModel::new("sk-test").unwrap().with_base_url(&base);

    let text = model.complete("Question: Are cats mammals?\nHelpful Answer:").await.unwrap();

    assert_eq!(text, " Cats are mammals.");
    assert_eq!(model.name(), "gpt-3.5-turbo-instruct");

    let body = &mock.captured()[0].body;
    assert_eq!(body["model"], json!("gpt-3.5-turbo-instruct"));
    assert_eq!(body["prompt"], json!("Question: Are cats mammals?\nHelpful Answer:"));
    assert!((body["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    assert_eq!(body["max_tokens"], json!(256));

    handle.abort();
}

#[tokio::test]
async fn completion_config_overrides_model() {
    let mock = Mock::new();
    let (base, handle) = spawn_mock(mock.clone()).await;
    let config = CompletionConfig { model: "custom-instruct".into(), ..CompletionConfig::default() };
    let model = OpenAICompletionModel::new("sk-test").unwrap().with_base_url(&base).with_config(config);

    model.complete("prompt").await.unwrap();

    assert_eq!(mock.captured()[0].body["model"], json!("custom-instruct"));
    handle.abort();
}

#[test]
fn empty_api_keys_are_rejected() {
    assert!(OpenAIEmbeddingProvider::new("").is_err());
    assert!(OpenAICompletionModel::new("").is_err());
    assert!(matches!(PineconeIndex::new("", "host"), Err(RagError::Config(_))));
    assert!(matches!(PineconeIndex::new("key", ""), Err(RagError::Config(_))));
}

// ── Pinecone ───────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_sends_records_with_metadata() {
    let mock = Mock::new();
    let (base, handle) = spawn_mock(mock.clone()).await;
    let index = PineconeIndex::new("pc-key", &base).unwrap().with_namespace("docs");

    index.upsert(&[record("doc1", 0, "Cats."), record("doc1", 1, "Dogs.")]).await.unwrap();

    let captured = mock.captured();
    assert_eq!(captured[0].path, "/vectors/upsert");
    assert_eq!(captured[0].headers["api-key"], "pc-key");
    assert!(captured[0].headers.contains_key("x-pinecone-api-version"));

    let body = &captured[0].body;
    assert_eq!(body["namespace"], json!("docs"));
    assert_eq!(body["vectors"][1]["id"], json!("doc1_1"));
    assert_eq!(body["vectors"][1]["metadata"]["documentName"], json!("doc1"));
    assert_eq!(body["vectors"][1]["metadata"]["pageContent"], json!("Dogs."));
    assert!(body["vectors"][1]["metadata"]["loc"].is_string());

    handle.abort();
}

#[tokio::test]
async fn oversized_batches_are_rejected_before_sending() {
    let mock = Mock::new();
    let (base, handle) = spawn_mock(mock.clone()).await;
    let index = PineconeIndex::new("pc-key", &base).unwrap().with_max_batch_size(2);

    let records: Vec<VectorRecord> = (0..3).map(|i| record("doc", i, "text")).collect();
    let err = index.upsert(&records).await.unwrap_err();

    assert_eq!(err.kind(), "index_write");
    assert!(!err.is_retryable());
    assert!(mock.captured().is_empty());

    let resilient = Resilient::new("pinecone", index, quick_retries(3));
    assert!(resilient.upsert(&records).await.is_err());
    assert!(mock.captured().is_empty());
    handle.abort();
}

#[tokio::test]
async fn index_client_errors_are_not_retried() {
    let mock = Mock::failing(StatusCode::BAD_REQUEST);
    let (base, handle) = spawn_mock(mock.clone()).await;
    let index =
        Resilient::new("pinecone", PineconeIndex::new("pc-key", &base).unwrap(), quick_retries(3));

    let err = index.upsert(&[record("doc", 0, "text")]).await.unwrap_err();
    assert_eq!(err.kind(), "index_write");
    assert!(!err.is_retryable());
    assert_eq!(mock.captured().len(), 1);

    let err = index.query(&[1.0], 10, &DocumentFilter::new("doc")).await.unwrap_err();
    assert_eq!(err.kind(), "index_query");
    assert_eq!(mock.captured().len(), 2);

    handle.abort();
}

#[tokio::test]
async fn query_sends_filter_and_sorts_matches() {
    let mock = Mock::with_matches(json!([
        { "id": "doc1_1", "score": 0.4, "metadata": { "documentName": "doc1", "pageContent": "b", "loc": "{}" } },
        { "id": "doc1_0", "score": 0.9, "metadata": { "documentName": "doc1", "pageContent": "a", "loc": "{}" } },
    ]));
    let (base, handle) = spawn_mock(mock.clone()).await;
    let index = PineconeIndex::new("pc-key", &base).unwrap();

    let matches = index.query(&[0.5, 0.5], 10, &DocumentFilter::new("doc1")).await.unwrap();

    let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["doc1_0", "doc1_1"]);
    assert_eq!(matches[0].metadata.content, "a");

    let body = &mock.captured()[0].body;
    assert_eq!(body["topK"], json!(10));
    assert_eq!(body["includeMetadata"], json!(true));
    assert_eq!(body["filter"], json!({ "documentName": { "$eq": "doc1" } }));
    assert!(body.get("namespace").is_none());

    handle.abort();
}

#[tokio::test]
async fn query_rejects_matches_from_other_documents() {
    let mock = Mock::with_matches(json!([
        { "id": "doc2_0", "score": 0.9, "metadata": { "documentName": "doc2", "pageContent": "x", "loc": "{}" } },
    ]));
    let (base, handle) = spawn_mock(mock).await;
    let index = PineconeIndex::new("pc-key", &base).unwrap();

    let err = index.query(&[1.0], 10, &DocumentFilter::new("doc1")).await.unwrap_err();

    assert!(matches!(err, RagError::IndexQuery { .. }));
    handle.abort();
}

#[tokio::test]
async fn delete_document_filters_on_name() {
    let mock = Mock::new();
    let (base, handle) = spawn_mock(mock.clone()).await;
    let index = PineconeIndex::new("pc-key", &base).unwrap();

    index.delete_document("doc1").await.unwrap();

    let captured = mock.captured();
    assert_eq!(captured[0].path, "/vectors/delete");
    assert_eq!(captured[0].body["filter"], json!({ "documentName": { "$eq": "doc1" } }));
    handle.abort();
}

#[tokio::test]
async fn index_http_errors_map_to_write_and_query_kinds() {
    let mock = Mock::failing(StatusCode::SERVICE_UNAVAILABLE);
    let (base, handle) = spawn_mock(mock).await;
    let index = PineconeIndex::new("pc-key", &base).unwrap();

    let err = index.upsert(&[record("doc", 0, "text")]).await.unwrap_err();
    assert_eq!(err.kind(), "index_write");

    assert!(err.is_retryable());

    let err = index.query(&[1.0], 10, &DocumentFilter::new("doc")).await.unwrap_err();
    assert_eq!(err.kind(), "index_query");
    assert!(err.is_retryable());
    assert!(err.to_string().contains("503"));

    handle.abort();
}
