//! OpenAI embedding provider and completion model.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::completion::CompletionModel;
use crate::embedding::{EmbeddingProvider, normalize_input};
use crate::error::{RagError, Result, is_transient_status};

/// The default OpenAI API base URL.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// The default model for OpenAI embeddings.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// The dimensionality of `text-embedding-ada-002`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// The default completion model.
const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo-instruct";

/// Low temperature favours deterministic answers.
const DEFAULT_TEMPERATURE: f32 = 0.3;

const DEFAULT_MAX_TOKENS: u32 = 256;

/// The most inputs the embeddings endpoint accepts in one request.
pub const MAX_INPUTS_PER_REQUEST: usize = 512;

fn read_api_key(provider: &str, wrap: fn(String, String, bool) -> RagError) -> Result<String> {
    std::env::var("OPENAI_API_KEY").map_err(|_| {
        wrap(provider.into(), "OPENAI_API_KEY environment variable not set".into(), false)
    })
}

fn embedding_error(provider: String, message: String, retryable: bool) -> RagError {
    RagError::Embedding { provider, message, retryable }
}

fn completion_error(provider: String, message: String, retryable: bool) -> RagError {
    RagError::Completion { provider, message, retryable }
}

/// Send a JSON request to the OpenAI API and decode the JSON response,
/// mapping every failure through `wrap` together with its retryability.
async fn post_json<Req, Resp>(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &Req,
    wrap: impl Fn(String, bool) -> RagError,
) -> Result<Resp>
where
    Req: Serialize + ?Sized,
    Resp: for<'de> Deserialize<'de>,
{
    let response = client.post(url).bearer_auth(api_key).json(body).send().await.map_err(|e| {
        error!(provider = "OpenAI", error = %e, "request failed");
        wrap(format!("request failed: {e}"), true)
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail =
            serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);

        error!(provider = "OpenAI", %status, "API error");
        return Err(wrap(format!("API returned {status}: {detail}"), is_transient_status(status)));
    }

    response.json().await.map_err(|e| {
        error!(provider = "OpenAI", error = %e, "failed to parse response");
        wrap(format!("failed to parse response: {e}"), false)
    })
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by the OpenAI embeddings API.
///
/// Newlines are collapsed to spaces before submission.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-ada-002`.
/// - `dimensions` – the size of vectors the model returns (1536 by default).
/// - `api_key` – from the constructor or the `OPENAI_API_KEY` environment variable.
/// - `base_url` – defaults to [`OPENAI_API_BASE`]; override for compatible APIs.
/// - `batch_size` – inputs per request, at most [`MAX_INPUTS_PER_REQUEST`].
///   Larger batches are split and the results concatenated in input order.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(embedding_error(
                "OpenAI".into(),
                "API key must not be empty".into(),
                false,
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_API_BASE.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            batch_size: MAX_INPUTS_PER_REQUEST,
        })
    }

    /// Create a new provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(read_api_key("OpenAI", embedding_error)?)
    }

    /// Set the model name and the dimensionality it produces.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }

    /// Point the provider at a different API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set how many inputs go into one request, clamped to
    /// `1..=MAX_INPUTS_PER_REQUEST`.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.clamp(1, MAX_INPUTS_PER_REQUEST);
        self
    }

    /// Embed one request's worth of texts, returned in input order.
    async fn embed_request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request_body = EmbeddingRequest {
            model: &self.model,
            input: texts.iter().map(|t| normalize_input(t)).collect(),
        };

        let url = format!("{}/embeddings", self.base_url);
        let response: EmbeddingResponse =
            post_json(&self.client, &url, &self.api_key, &request_body, |message, retryable| {
                embedding_error("OpenAI".into(), message, retryable)
            })
            .await?;

        if response.data.len() != texts.len() {
            return Err(embedding_error(
                "OpenAI".into(),
                format!("expected {} embeddings, got {}", texts.len(), response.data.len()),
                false,
            ));
        }

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = "OpenAI", text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| {
            embedding_error("OpenAI".into(), "API returned empty response".into(), false)
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let requests = texts.len().div_ceil(self.batch_size);
        debug!(
            provider = "OpenAI",
            batch_size = texts.len(),
            requests,
            model = %self.model,
            "embedding batch"
        );

        let mut embeddings = Vec::with_capacity(texts.len());
        for sub_batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.embed_request(sub_batch).await?);
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ── Completions ────────────────────────────────────────────────────

/// Sampling configuration for [`OpenAICompletionModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionConfig {
    /// Completion model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum number of generated tokens.
    pub max_tokens: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_COMPLETION_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// A [`CompletionModel`] backed by the OpenAI `/completions` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_rag::openai::OpenAICompletionModel;
///
/// let model = OpenAICompletionModel::from_env()?;
/// let text = model.complete("Say hi").await?;
/// ```
pub struct OpenAICompletionModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    config: CompletionConfig,
}

impl OpenAICompletionModel {
    /// Create a new completion model with the given API key and default sampling.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(completion_error(
                "OpenAI".into(),
                "API key must not be empty".into(),
                false,
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_API_BASE.into(),
            config: CompletionConfig::default(),
        })
    }

    /// Create a new completion model using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(read_api_key("OpenAI", completion_error)?)
    }

    /// Replace the sampling configuration.
    pub fn with_config(mut self, config: CompletionConfig) -> Self {
        self.config = config;
        self
    }

    /// Point the model at a different API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The active sampling configuration.
    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }
}

#[async_trait]
impl CompletionModel for OpenAICompletionModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(
            provider = "OpenAI",
            model = %self.config.model,
            prompt_len = prompt.len(),
            "requesting completion"
        );

        let request_body = CompletionRequest {
            model: &self.config.model,
            prompt,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!("{}/completions", self.base_url);
        let response: CompletionResponse =
            post_json(&self.client, &url, &self.api_key, &request_body, |message, retryable| {
                completion_error("OpenAI".into(), message, retryable)
            })
            .await?;

        response.choices.into_iter().next().map(|c| c.text).ok_or_else(|| {
            completion_error("OpenAI".into(), "API returned no choices".into(), false)
        })
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}
