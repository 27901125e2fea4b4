//! The embedding seam shared by ingestion and answering.

use async_trait::async_trait;

use crate::error::Result;

/// Turns text into fixed-dimension vectors.
///
/// Implementations wrap a specific embedding backend behind a unified async
/// interface. Embedding a batch of one must produce the same vector as
/// [`embed`](EmbeddingProvider::embed). The default
/// [`embed_batch`](EmbeddingProvider::embed_batch) implementation calls
/// `embed` sequentially; backends that support native batching should
/// override it.
///
/// There is no caching: every call re-embeds.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_rag::{EmbeddingProvider, openai::OpenAIEmbeddingProvider};
///
/// let provider = OpenAIEmbeddingProvider::from_env()?;
/// let vector = provider.embed("What are cats?").await?;
/// assert_eq!(vector.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts in one call.
    ///
    /// The result has the same length and order as `texts`.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;
}

/// Collapse newlines to spaces before text is submitted for embedding.
///
/// `\r\n` counts as a single newline.
pub fn normalize_input(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}
