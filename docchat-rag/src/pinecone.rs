//! Pinecone vector index backend.
//!
//! Provides [`PineconeIndex`] which implements [`VectorIndex`] against the
//! Pinecone data-plane REST API of a single index host.
//!
//! This module is only available when the `pinecone` feature is enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use docchat_rag::pinecone::PineconeIndex;
//!
//! let index = PineconeIndex::new(api_key, "my-index-abc123.svc.us-east-1.pinecone.io")?;
//! index.upsert(&records).await?;
//! let matches = index.query(&embedding, 10, &DocumentFilter::new("doc1")).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::config::DEFAULT_UPSERT_BATCH_SIZE;
use crate::document::{DocumentFilter, QueryMatch, RecordMetadata, VectorRecord};
use crate::error::{RagError, Result, is_transient_status};
use crate::vectorstore::VectorIndex;

const BACKEND: &str = "pinecone";

/// Pinecone data-plane API version sent with every request.
const API_VERSION: &str = "2024-07";

/// A failed request, before it is mapped to a write or query error.
struct RequestFailure {
    message: String,
    retryable: bool,
}

impl RequestFailure {
    fn permanent(message: String) -> Self {
        Self { message, retryable: false }
    }
}

/// A [`VectorIndex`] backed by a [Pinecone](https://www.pinecone.io/) index.
///
/// Record metadata is stored under the keys `documentName`, `pageContent`
/// and `loc`; the document filter is an `$eq` condition on `documentName`.
pub struct PineconeIndex {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    namespace: Option<String>,
    max_batch_size: usize,
}

impl PineconeIndex {
    /// Create an index client for `host`.
    ///
    /// `host` may be a bare host name (`https://` is assumed) or a full URL.
    pub fn new(api_key: impl Into<String>, host: &str) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Config("Pinecone API key must not be empty".into()));
        }
        if host.is_empty() {
            return Err(RagError::Config("Pinecone index host must not be empty".into()));
        }

        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", host.trim_end_matches('/'))
        };

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            namespace: None,
            max_batch_size: DEFAULT_UPSERT_BATCH_SIZE,
        })
    }

    /// Scope all operations to a namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the largest batch accepted by [`upsert`](VectorIndex::upsert).
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size.max(1);
        self
    }

    fn filter_json(document_name: &str) -> Value {
        json!({ "documentName": { "$eq": document_name } })
    }

    async fn post(
        &self,
        path: &str,
        body: &Value,
    ) -> std::result::Result<reqwest::Response, RequestFailure> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| RequestFailure {
                message: format!("request to {path} failed: {e}"),
                retryable: true,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(RequestFailure {
                message: format!("{path} returned {status}: {detail}"),
                retryable: is_transient_status(status),
            });
        }
        Ok(response)
    }

    fn write_error(failure: RequestFailure) -> RagError {
        error!(backend = BACKEND, error = %failure.message, "index write failed");
        RagError::IndexWrite {
            backend: BACKEND.to_string(),
            message: failure.message,
            retryable: failure.retryable,
        }
    }

    fn query_error(failure: RequestFailure) -> RagError {
        error!(backend = BACKEND, error = %failure.message, "index query failed");
        RagError::IndexQuery {
            backend: BACKEND.to_string(),
            message: failure.message,
            retryable: failure.retryable,
        }
    }
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a RecordMetadata,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Deserialize)]
struct PineconeMatch {
    id: String,
    score: f32,
    metadata: Option<RecordMetadata>,
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        if records.len() > self.max_batch_size {
            return Err(Self::write_error(RequestFailure::permanent(format!(
                "batch of {} records exceeds the limit of {}",
                records.len(),
                self.max_batch_size
            ))));
        }

        let vectors: Vec<UpsertVector<'_>> = records
            .iter()
            .map(|r| UpsertVector { id: &r.id, values: &r.embedding, metadata: &r.metadata })
            .collect();
        let mut body = json!({ "vectors": vectors });
        if let Some(namespace) = &self.namespace {
            body["namespace"] = json!(namespace);
        }

        self.post("/vectors/upsert", &body).await.map_err(Self::write_error)?;

        debug!(backend = BACKEND, count = records.len(), "upserted records");
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<QueryMatch>> {
        let mut body = json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": false,
            "filter": Self::filter_json(&filter.document_name),
        });
        if let Some(namespace) = &self.namespace {
            body["namespace"] = json!(namespace);
        }

        let response = self.post("/query", &body).await.map_err(Self::query_error)?;
        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| {
                Self::query_error(RequestFailure::permanent(format!(
                    "failed to parse query response: {e}"
                )))
            })?;

        let mut matches = Vec::with_capacity(parsed.matches.len());
        for m in parsed.matches {
            let Some(metadata) = m.metadata else {
                return Err(Self::query_error(RequestFailure::permanent(format!(
                    "match '{}' has no metadata",
                    m.id
                ))));
            };
            // Never hand back chunks of another document, even if the index ignored the filter.
            if !filter.matches(&metadata) {
                return Err(Self::query_error(RequestFailure::permanent(format!(
                    "match '{}' belongs to document '{}', not '{}'",
                    m.id, metadata.document_name, filter.document_name
                ))));
            }
            matches.push(QueryMatch { id: m.id, score: m.score, metadata });
        }
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        debug!(backend = BACKEND, count = matches.len(), "query returned matches");
        Ok(matches)
    }

    async fn delete_document(&self, document_name: &str) -> Result<()> {
        let mut body = json!({ "filter": Self::filter_json(document_name) });
        if let Some(namespace) = &self.namespace {
            body["namespace"] = json!(namespace);
        }

        self.post("/vectors/delete", &body).await.map_err(Self::write_error)?;

        debug!(backend = BACKEND, document.name = document_name, "deleted document records");
        Ok(())
    }
}
