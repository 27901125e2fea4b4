//! Completion model trait and the single-prompt question-answering template.

use async_trait::async_trait;

use crate::error::Result;

/// The answer the QA prompt instructs the model to give when the context
/// does not contain the answer.
pub const UNKNOWN_ANSWER_SENTINEL: &str = "I don't know.";

/// A text completion model.
///
/// Implementations send a fully rendered prompt to a hosted or local model
/// and return the generated text. Sampling parameters (temperature, token
/// limits) are fixed by the implementation's configuration.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// A human-readable model name for logs.
    fn name(&self) -> &str;
}

/// Render the "stuff" QA prompt: every retrieved chunk goes into a single
/// context block followed by the question.
pub fn stuff_prompt(context: &str, question: &str) -> String {
    format!(
        "Use the following pieces of context to answer the question at the end. \
         If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n\
         {context}\n\n\
         Question: {question}\n\
         Helpful Answer:"
    )
}
