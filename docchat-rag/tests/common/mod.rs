//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use docchat_rag::{
    Chunk, ChunkLocation, Chunker, CompletionModel, DocumentFilter, EmbeddingProvider,
    InMemoryVectorIndex, LineRange, QueryMatch, RagError, RecordMetadata, Result, VectorIndex,
    VectorRecord,
};

/// Deterministic hash-based embeddings that count every call.
pub struct HashEmbedder {
    dimensions: usize,
    pub embed_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, embed_calls: AtomicUsize::new(0), batch_calls: AtomicUsize::new(0) }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut emb = vec![0.0f32; self.dimensions];
        for (i, v) in emb.iter_mut().enumerate() {
            *v = ((hash.wrapping_add(i as u64)) as f32).sin();
        }
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        emb
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// An embedder that always fails.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::Embedding {
            provider: "stub".into(),
            message: "service unavailable".into(),
            retryable: true,
        })
    }

    fn dimensions(&self) -> usize {
        4
    }
}

/// Produces `count` single-word chunks regardless of input.
pub struct FixedCountChunker {
    pub count: usize,
}

impl Chunker for FixedCountChunker {
    fn chunk(&self, _text: &str) -> Vec<Chunk> {
        (0..self.count)
            .map(|index| Chunk {
                content: format!("chunk {index}"),
                index,
                location: ChunkLocation {
                    start: index,
                    end: index + 1,
                    lines: LineRange { from: 1, to: 1 },
                },
            })
            .collect()
    }
}

/// Wraps an [`InMemoryVectorIndex`] and records the size of every upsert.
#[derive(Default)]
pub struct RecordingIndex {
    pub inner: InMemoryVectorIndex,
    pub batches: Mutex<Vec<Vec<String>>>,
    pub deletes: Mutex<Vec<String>>,
    /// When set, the upsert with this 0-based call number fails.
    pub fail_on_batch: Option<usize>,
}

impl RecordingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(batch: usize) -> Self {
        Self { fail_on_batch: Some(batch), ..Self::default() }
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }
}

#[async_trait]
impl VectorIndex for RecordingIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let call = {
            let mut batches = self.batches.lock().unwrap();
            batches.push(records.iter().map(|r| r.id.clone()).collect());
            batches.len() - 1
        };
        if self.fail_on_batch == Some(call) {
            return Err(RagError::IndexWrite {
                backend: "stub".into(),
                message: "rejected".into(),
                retryable: false,
            });
        }
        self.inner.upsert(records).await
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<QueryMatch>> {
        self.inner.query(vector, top_k, filter).await
    }

    async fn delete_document(&self, document_name: &str) -> Result<()> {
        self.deletes.lock().unwrap().push(document_name.to_string());
        self.inner.delete_document(document_name).await
    }
}

/// Returns a fixed list of matches for every query.
pub struct FixedMatchIndex {
    pub matches: Vec<QueryMatch>,
    pub queries: Mutex<Vec<(usize, DocumentFilter)>>,
}

impl FixedMatchIndex {
    pub fn new(matches: Vec<QueryMatch>) -> Self {
        Self { matches, queries: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl VectorIndex for FixedMatchIndex {
    async fn upsert(&self, _records: &[VectorRecord]) -> Result<()> {
        Ok(())
    }

    async fn query(
        &self,
        _vector: &[f32],
        top_k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<QueryMatch>> {
        self.queries.lock().unwrap().push((top_k, filter.clone()));
        Ok(self.matches.clone())
    }

    async fn delete_document(&self, _document_name: &str) -> Result<()> {
        Ok(())
    }
}

/// Fails every query.
pub struct FailingQueryIndex;

#[async_trait]
impl VectorIndex for FailingQueryIndex {
    async fn upsert(&self, _records: &[VectorRecord]) -> Result<()> {
        Ok(())
    }

    async fn query(
        &self,
        _vector: &[f32],
        _top_k: usize,
        _filter: &DocumentFilter,
    ) -> Result<Vec<QueryMatch>> {
        Err(RagError::IndexQuery {
            backend: "stub".into(),
            message: "timeout".into(),
            retryable: true,
        })
    }

    async fn delete_document(&self, _document_name: &str) -> Result<()> {
        Ok(())
    }
}

/// Returns a fixed completion and records every prompt.
pub struct StubCompletion {
    pub reply: std::result::Result<String, String>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl StubCompletion {
    pub fn replying(reply: &str) -> Self {
        Self { reply: Ok(reply.to_string()), calls: AtomicUsize::new(0), prompts: Mutex::new(Vec::new()) }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionModel for StubCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().map_err(|message| RagError::Completion {
            provider: "stub".into(),
            message,
            retryable: true,
        })
    }

    fn name(&self) -> &str {
        "stub"
    }
}

pub fn query_match(id: &str, document_name: &str, content: &str, score: f32) -> QueryMatch {
    QueryMatch {
        id: id.to_string(),
        score,
        metadata: RecordMetadata {
            document_name: document_name.to_string(),
            content: content.to_string(),
            loc: r#"{"start":0,"end":0,"lines":{"from":1,"to":1}}"#.to_string(),
        },
    }
}
