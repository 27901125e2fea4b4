//! Data types for documents, chunks, vector records, matches and answers.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// A named unit of uploaded text.
///
/// The name identifies the document inside the vector index and is the
/// filter key that scopes retrieval to this document alone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Unique name of the document within the index.
    pub name: String,
    /// The full raw text.
    pub text: String,
}

impl Document {
    /// Create a new document.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self { name: name.into(), text: text.into() }
    }
}

/// 1-based, inclusive line range of a chunk within its document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineRange {
    /// First line covered by the chunk.
    pub from: usize,
    /// Last line covered by the chunk.
    pub to: usize,
}

/// Where a chunk came from in the original text.
///
/// `start` and `end` are character offsets (half-open).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkLocation {
    /// Offset of the first character of the chunk.
    pub start: usize,
    /// Offset one past the last character of the chunk.
    pub end: usize,
    /// Lines covered by the chunk.
    pub lines: LineRange,
}

/// A contiguous, non-empty piece of a [`Document`]'s text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk text, exactly as it appears in the document.
    pub content: String,
    /// Ordinal position of the chunk within the document.
    pub index: usize,
    /// Position of the chunk in the original text.
    pub location: ChunkLocation,
}

/// Build the vector id of chunk `index` of `document_name`.
///
/// Ids are namespaced by document name, so re-ingesting the same document
/// with the same chunking overwrites exactly the same id space.
pub fn record_id(document_name: &str, index: usize) -> String {
    format!("{document_name}_{index}")
}

/// Metadata stored next to every vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordMetadata {
    /// Name of the document the chunk belongs to.
    #[serde(rename = "documentName")]
    pub document_name: String,
    /// The raw chunk text, kept for display and answer context.
    #[serde(rename = "pageContent")]
    pub content: String,
    /// The chunk's [`ChunkLocation`] serialized as JSON.
    pub loc: String,
}

/// The unit persisted in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    /// Deterministic id, see [`record_id`].
    pub id: String,
    /// The chunk embedding.
    pub embedding: Vec<f32>,
    /// Document name, chunk content and serialized location.
    pub metadata: RecordMetadata,
}

impl VectorRecord {
    /// Build a validated record for `chunk` of `document_name`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidRecord`] if the document name, chunk content
    /// or embedding is empty.
    pub fn new(document_name: &str, chunk: &Chunk, embedding: Vec<f32>) -> Result<Self> {
        if document_name.is_empty() {
            return Err(RagError::InvalidRecord("document name must not be empty".to_string()));
        }
        if chunk.content.is_empty() {
            return Err(RagError::InvalidRecord(format!(
                "chunk {} of '{document_name}' has empty content",
                chunk.index
            )));
        }
        if embedding.is_empty() {
            return Err(RagError::InvalidRecord(format!(
                "chunk {} of '{document_name}' has an empty embedding",
                chunk.index
            )));
        }
        let loc = serde_json::to_string(&chunk.location)
            .map_err(|e| RagError::InvalidRecord(format!("failed to serialize location: {e}")))?;

        Ok(Self {
            id: record_id(document_name, chunk.index),
            embedding,
            metadata: RecordMetadata {
                document_name: document_name.to_string(),
                content: chunk.content.clone(),
                loc,
            },
        })
    }
}

/// Exact-match metadata filter that scopes a query to one document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentFilter {
    /// Only records whose `documentName` equals this value match.
    #[serde(rename = "documentName")]
    pub document_name: String,
}

impl DocumentFilter {
    /// Filter on a single document name.
    pub fn new(document_name: impl Into<String>) -> Self {
        Self { document_name: document_name.into() }
    }

    /// Whether `metadata` passes the filter.
    pub fn matches(&self, metadata: &RecordMetadata) -> bool {
        metadata.document_name == self.document_name
    }
}

/// A record returned by a similarity query, with its score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryMatch {
    /// The matched record id.
    pub id: String,
    /// Similarity score (higher is more similar).
    pub score: f32,
    /// The matched record's metadata.
    pub metadata: RecordMetadata,
}

/// A cited chunk in an [`Answer`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    /// The chunk text.
    #[serde(rename = "pageContent")]
    pub page_content: String,
    /// The similarity score of the chunk.
    pub score: f32,
}

impl From<QueryMatch> for Source {
    fn from(m: QueryMatch) -> Self {
        Self { page_content: m.metadata.content, score: m.score }
    }
}

/// The answering pipeline's output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// Free-text answer from the completion model, or a fixed fallback.
    pub result: String,
    /// Cited chunks in index order; empty when nothing relevant was found.
    pub sources: Vec<Source>,
}
