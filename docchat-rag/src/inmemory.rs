//! In-memory vector index using cosine similarity.
//!
//! This module provides [`InMemoryVectorIndex`], a zero-dependency index
//! backed by a `HashMap` protected by a `tokio::sync::RwLock`. It is suitable
//! for development, testing, and single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{DocumentFilter, QueryMatch, VectorRecord};
use crate::error::Result;
use crate::vectorstore::VectorIndex;

/// An in-memory vector index using cosine similarity for search.
///
/// Records are keyed by id. All operations are async-safe via
/// `tokio::sync::RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl InMemoryVectorIndex {
    /// Create a new empty in-memory index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the index holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Sorted ids of all records belonging to `document_name`.
    pub async fn ids_for(&self, document_name: &str) -> Vec<String> {
        let records = self.records.read().await;
        let mut ids: Vec<String> = records
            .values()
            .filter(|r| r.metadata.document_name == document_name)
            .map(|r| r.id.clone())
            .collect();
        ids.sort();
        ids
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut store = self.records.write().await;
        for record in records {
            store.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<QueryMatch>> {
        let store = self.records.read().await;

        let mut scored: Vec<QueryMatch> = store
            .values()
            .filter(|record| filter.matches(&record.metadata))
            .map(|record| QueryMatch {
                id: record.id.clone(),
                score: cosine_similarity(&record.embedding, vector),
                metadata: record.metadata.clone(),
            })
            .collect();

        // Ties break on id so results are deterministic.
        scored.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then(a.id.cmp(&b.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete_document(&self, document_name: &str) -> Result<()> {
        let mut store = self.records.write().await;
        store.retain(|_, record| record.metadata.document_name != document_name);
        Ok(())
    }
}
