//! Document ingestion orchestrator.
//!
//! The [`IngestionPipeline`] turns a [`Document`] into vector records by
//! composing a [`Chunker`], an [`EmbeddingProvider`] and a [`VectorIndex`]:
//! chunk → embed (one batch call) → build records → upsert in bounded
//! batches.
//!
//! # Example
//!
//! ```rust,ignore
//! use docchat_rag::{Document, IngestionPipeline, InMemoryVectorIndex, RagConfig, RecursiveChunker};
//!
//! let config = RagConfig::default();
//! let pipeline = IngestionPipeline::builder()
//!     .chunker(Arc::new(RecursiveChunker::from_config(&config)))
//!     .config(config)
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_index(Arc::new(InMemoryVectorIndex::new()))
//!     .build()?;
//!
//! let report = pipeline.ingest(&Document::new("doc1", text)).await?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::chunking::Chunker;
use crate::config::RagConfig;
use crate::document::{Document, VectorRecord};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorIndex;

/// Progress accounting for one ingested document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestReport {
    /// The ingested document's name.
    pub document_name: String,
    /// Number of chunks (and records) written.
    pub chunk_count: usize,
    /// Number of upsert calls made.
    pub batch_count: usize,
}

/// The ingestion orchestrator.
///
/// Embedding finishes completely before the first write, and batches are
/// flushed strictly in chunk order. Any failure aborts the remaining work;
/// batches already written stay in the index, and re-ingesting the same
/// document overwrites them because record ids are deterministic.
///
/// Concurrent ingestion of the same document name is not coordinated: the
/// last writer wins per record id.
pub struct IngestionPipeline {
    config: RagConfig,
    chunker: Arc<dyn Chunker>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<dyn VectorIndex>,
}

impl IngestionPipeline {
    /// Create a new [`IngestionPipelineBuilder`].
    pub fn builder() -> IngestionPipelineBuilder {
        IngestionPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Ingest a document: chunk → embed → upsert in batches.
    ///
    /// Empty text produces no chunks and makes no remote calls.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidRecord`] for an empty document name, and
    /// propagates embedding and index-write failures unchanged.
    pub async fn ingest(&self, document: &Document) -> Result<IngestReport> {
        if document.name.is_empty() {
            return Err(RagError::InvalidRecord("document name must not be empty".to_string()));
        }

        // 1. Chunk the document
        let chunks = self.chunker.chunk(&document.text);
        let total = chunks.len();
        if chunks.is_empty() {
            info!(document.name = %document.name, chunk_count = 0, "ingested document (empty)");
            return Ok(IngestReport {
                document_name: document.name.clone(),
                chunk_count: 0,
                batch_count: 0,
            });
        }

        // 2. Embed every chunk in one batch call
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.inspect_err(|e| {
            error!(document.name = %document.name, error = %e, "embedding failed during ingestion");
        })?;
        if embeddings.len() != total {
            return Err(RagError::Embedding {
                provider: "pipeline".to_string(),
                message: format!("expected {total} embeddings, got {}", embeddings.len()),
                retryable: false,
            });
        }

        // 3. Build one record per chunk
        let mut records = Vec::with_capacity(total);
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            records.push(VectorRecord::new(&document.name, chunk, embedding)?);
            debug!(document.name = %document.name, index = chunk.index, total, "prepared vector record");
        }

        // 4. Flush in order, never more than `upsert_batch_size` records at once
        let mut batch_count = 0;
        for (batch, records) in records.chunks(self.config.upsert_batch_size).enumerate() {
            self.vector_index.upsert(records).await.inspect_err(|e| {
                error!(
                    document.name = %document.name,
                    batch,
                    error = %e,
                    "upsert failed during ingestion"
                );
            })?;
            batch_count += 1;
            debug!(document.name = %document.name, batch, size = records.len(), "flushed batch");
        }

        info!(document.name = %document.name, chunk_count = total, batch_count, "ingested document");

        Ok(IngestReport { document_name: document.name.clone(), chunk_count: total, batch_count })
    }

    /// Replace a document: delete all of its records, then ingest it again.
    ///
    /// Use this when the text or chunking changed, so stale records with
    /// higher chunk indices do not survive.
    ///
    /// # Errors
    ///
    /// Propagates the delete failure, or any failure from [`ingest`](Self::ingest).
    pub async fn reingest(&self, document: &Document) -> Result<IngestReport> {
        self.vector_index.delete_document(&document.name).await.inspect_err(|e| {
            error!(document.name = %document.name, error = %e, "failed to delete document");
        })?;
        self.ingest(document).await
    }
}

/// Builder for constructing an [`IngestionPipeline`].
///
/// `config` defaults to [`RagConfig::default`]; the remaining fields are
/// required.
#[derive(Default)]
pub struct IngestionPipelineBuilder {
    config: Option<RagConfig>,
    chunker: Option<Arc<dyn Chunker>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
}

impl IngestionPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector index backend.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Build the [`IngestionPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<IngestionPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let chunker =
            self.chunker.ok_or_else(|| RagError::Config("chunker is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let vector_index = self
            .vector_index
            .ok_or_else(|| RagError::Config("vector_index is required".to_string()))?;

        Ok(IngestionPipeline { config, chunker, embedding_provider, vector_index })
    }
}
