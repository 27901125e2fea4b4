//! Retrieval-augmented answering orchestrator.
//!
//! [`AnswerPipeline::answer`] embeds the question, retrieves the closest
//! chunks of one document, stuffs them into a single prompt and asks the
//! completion model. Two outcomes are successful but degraded:
//!
//! - no matches: a fixed apology is returned and the model is never called;
//! - the model answers with [`UNKNOWN_ANSWER_SENTINEL`]: the answer is kept
//!   but its sources are dropped, since they were not relevant enough to cite.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::completion::{CompletionModel, UNKNOWN_ANSWER_SENTINEL, stuff_prompt};
use crate::config::RagConfig;
use crate::document::{Answer, DocumentFilter, QueryMatch, Source};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorIndex;

/// Returned when the index has no chunks for the requested document.
pub const NO_MATCHES_ANSWER: &str = "Sorry, I don't know the answer to that question.";

/// The answering orchestrator. Construct one via [`AnswerPipeline::builder()`].
pub struct AnswerPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_index: Arc<dyn VectorIndex>,
    completion_model: Arc<dyn CompletionModel>,
}

impl AnswerPipeline {
    /// Create a new [`AnswerPipelineBuilder`].
    pub fn builder() -> AnswerPipelineBuilder {
        AnswerPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Answer `question` using only chunks of `document_name`.
    ///
    /// # Errors
    ///
    /// Embedding, index-query and completion failures propagate unchanged.
    pub async fn answer(&self, question: &str, document_name: &str) -> Result<Answer> {
        let query_embedding = self.embedding_provider.embed(question).await.inspect_err(|e| {
            error!(document.name = document_name, error = %e, "question embedding failed");
        })?;

        let filter = DocumentFilter::new(document_name);
        let matches = self
            .vector_index
            .query(&query_embedding, self.config.top_k, &filter)
            .await
            .inspect_err(|e| {
                error!(document.name = document_name, error = %e, "vector index query failed");
            })?;

        if matches.is_empty() {
            info!(document.name = document_name, "no matches, skipping completion");
            return Ok(Answer { result: NO_MATCHES_ANSWER.to_string(), sources: Vec::new() });
        }

        let context = concatenate_context(&matches);
        debug!(
            document.name = document_name,
            match_count = matches.len(),
            context_len = context.len(),
            model = self.completion_model.name(),
            "requesting answer"
        );

        let prompt = stuff_prompt(&context, question);
        let result = self.completion_model.complete(&prompt).await.inspect_err(|e| {
            error!(document.name = document_name, error = %e, "completion failed");
        })?;

        if is_unknown_answer(&result) {
            info!(
                document.name = document_name,
                match_count = matches.len(),
                "model did not know the answer, dropping sources"
            );
            return Ok(Answer { result, sources: Vec::new() });
        }

        info!(document.name = document_name, source_count = matches.len(), "answered question");
        Ok(Answer { result, sources: matches.into_iter().map(Source::from).collect() })
    }
}

/// Join chunk contents in index order with no separator.
fn concatenate_context(matches: &[QueryMatch]) -> String {
    matches.iter().map(|m| m.metadata.content.as_str()).collect()
}

/// Whether the trimmed model output is exactly the sentinel phrase.
pub fn is_unknown_answer(result: &str) -> bool {
    result.trim() == UNKNOWN_ANSWER_SENTINEL
}

/// Builder for constructing an [`AnswerPipeline`].
///
/// `config` defaults to [`RagConfig::default`]; the remaining fields are
/// required.
#[derive(Default)]
pub struct AnswerPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    completion_model: Option<Arc<dyn CompletionModel>>,
}

impl AnswerPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider used for questions.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector index backend.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Set the completion model.
    pub fn completion_model(mut self, model: Arc<dyn CompletionModel>) -> Self {
        self.completion_model = Some(model);
        self
    }

    /// Build the [`AnswerPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<AnswerPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let vector_index = self
            .vector_index
            .ok_or_else(|| RagError::Config("vector_index is required".to_string()))?;
        let completion_model = self
            .completion_model
            .ok_or_else(|| RagError::Config("completion_model is required".to_string()))?;

        Ok(AnswerPipeline { config, embedding_provider, vector_index, completion_model })
    }
}
