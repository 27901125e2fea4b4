//! # docchat-rag
//!
//! Retrieval-augmented question answering over uploaded text documents.
//!
//! Two flows share an [`EmbeddingProvider`] and a [`VectorIndex`]:
//!
//! - **Ingestion** ([`IngestionPipeline`]): text → [`RecursiveChunker`] →
//!   one batch embedding call → [`VectorRecord`]s with ids
//!   `{document}_{index}` → upserts of at most `upsert_batch_size` records.
//! - **Answering** ([`AnswerPipeline`]): question → embedding → top-K
//!   matches filtered to one document → single "stuff" prompt →
//!   [`CompletionModel`] → [`Answer`] with cited sources.
//!
//! Remote collaborators can be wrapped in [`Resilient`] to get per-call
//! timeouts and bounded retries with exponential backoff.
//!
//! ## Features
//!
//! - `openai`: [`openai::OpenAIEmbeddingProvider`] and [`openai::OpenAICompletionModel`]
//! - `pinecone`: [`pinecone::PineconeIndex`]
//! - `full`: both of the above

pub mod answer;
pub mod chunking;
pub mod completion;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod inmemory;
pub mod pipeline;
pub mod retry;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "pinecone")]
pub mod pinecone;

pub use answer::{AnswerPipeline, AnswerPipelineBuilder, NO_MATCHES_ANSWER, is_unknown_answer};
pub use chunking::{Chunker, RecursiveChunker};
pub use completion::{CompletionModel, UNKNOWN_ANSWER_SENTINEL, stuff_prompt};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{
    Answer, Chunk, ChunkLocation, Document, DocumentFilter, LineRange, QueryMatch,
    RecordMetadata, Source, VectorRecord, record_id,
};
pub use embedding::{EmbeddingProvider, normalize_input};
pub use error::{RagError, Result};
pub use inmemory::InMemoryVectorIndex;
pub use pipeline::{IngestReport, IngestionPipeline, IngestionPipelineBuilder};
pub use retry::{Resilient, RetryPolicy};
pub use vectorstore::VectorIndex;
