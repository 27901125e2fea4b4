//! Vector index trait for storing and searching chunk embeddings.

use async_trait::async_trait;

use crate::document::{DocumentFilter, QueryMatch, VectorRecord};
use crate::error::Result;

/// A persistent vector index with similarity search and metadata filtering.
///
/// Writes are idempotent per record id: upserting an existing id overwrites
/// it. Queries must apply the [`DocumentFilter`] as an exact match so that
/// retrieval never returns chunks of another document.
///
/// Callers must not submit unbounded writes; the ingestion pipeline caps each
/// [`upsert`](VectorIndex::upsert) at `RagConfig::upsert_batch_size` records.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_rag::{DocumentFilter, InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.upsert(&records).await?;
/// let matches = index.query(&query_embedding, 10, &DocumentFilter::new("doc1")).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite records.
    ///
    /// Fails with [`RagError::IndexWrite`](crate::RagError::IndexWrite).
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Return up to `top_k` records passing `filter`, ordered by descending score.
    ///
    /// Fails with [`RagError::IndexQuery`](crate::RagError::IndexQuery).
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<QueryMatch>>;

    /// Remove every record belonging to `document_name`.
    ///
    /// Fails with [`RagError::IndexWrite`](crate::RagError::IndexWrite).
    async fn delete_document(&self, document_name: &str) -> Result<()>;
}
