//! Timeouts and bounded retries for calls to remote collaborators.
//!
//! [`Resilient`] wraps any [`EmbeddingProvider`], [`VectorIndex`] or
//! [`CompletionModel`] and applies a [`RetryPolicy`] to every call. A timed
//! out attempt is reported as the failure kind of the wrapped call, and
//! callers only see an error once all attempts are exhausted.
//!
//! # Example
//!
//! ```rust,ignore
//! use docchat_rag::{Resilient, RetryPolicy};
//!
//! let embedder = Resilient::new("openai", OpenAIEmbeddingProvider::from_env()?, RetryPolicy::default());
//! ```

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::completion::CompletionModel;
use crate::document::{DocumentFilter, QueryMatch, VectorRecord};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorIndex;

/// How often and how patiently to call a remote dependency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every further retry.
    pub initial_backoff: Duration,
    /// Upper bound for the delay between attempts.
    pub max_backoff: Duration,
    /// Time limit for a single attempt.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt with the given timeout.
    pub fn no_retries(timeout: Duration) -> Self {
        Self { max_retries: 0, timeout, ..Self::default() }
    }

    /// The delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the retry budget is spent.
    ///
    /// `on_timeout` turns a timeout message into the caller's failure kind;
    /// a timed out attempt always counts as retryable.
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        mut operation: F,
        on_timeout: impl Fn(String) -> RagError,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(on_timeout(format!("{label} timed out after {:?}", self.timeout))),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries && e.is_retryable() => {
                    let delay = self.backoff(attempt);
                    warn!(
                        operation = label,
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        ?delay,
                        error = %e,
                        "call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Decorator that applies a [`RetryPolicy`] to a remote collaborator.
pub struct Resilient<T> {
    name: String,
    inner: T,
    policy: RetryPolicy,
}

impl<T> Resilient<T> {
    /// Wrap `inner`; `name` identifies the collaborator in logs and errors.
    pub fn new(name: impl Into<String>, inner: T, policy: RetryPolicy) -> Self {
        Self { name: name.into(), inner, policy }
    }

    /// The wrapped collaborator.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// The active policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<T: EmbeddingProvider> EmbeddingProvider for Resilient<T> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let inner = &self.inner;
        self.policy
            .run("embed", move || inner.embed(text), |message| RagError::Embedding {
                provider: self.name.clone(),
                message,
                retryable: true,
            })
            .await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let inner = &self.inner;
        self.policy
            .run("embed_batch", move || inner.embed_batch(texts), |message| {
                RagError::Embedding { provider: self.name.clone(), message, retryable: true }
            })
            .await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

#[async_trait]
impl<T: VectorIndex> VectorIndex for Resilient<T> {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let inner = &self.inner;
        self.policy
            .run("upsert", move || inner.upsert(records), |message| RagError::IndexWrite {
                backend: self.name.clone(),
                message,
                retryable: true,
            })
            .await
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &DocumentFilter,
    ) -> Result<Vec<QueryMatch>> {
        let inner = &self.inner;
        self.policy
            .run("query", move || inner.query(vector, top_k, filter), |message| {
                RagError::IndexQuery { backend: self.name.clone(), message, retryable: true }
            })
            .await
    }

    async fn delete_document(&self, document_name: &str) -> Result<()> {
        let inner = &self.inner;
        self.policy
            .run("delete_document", move || inner.delete_document(document_name), |message| {
                RagError::IndexWrite { backend: self.name.clone(), message, retryable: true }
            })
            .await
    }
}

#[async_trait]
impl<T: CompletionModel> CompletionModel for Resilient<T> {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let inner = &self.inner;
        self.policy
            .run("complete", move || inner.complete(prompt), |message| RagError::Completion {
                provider: self.name.clone(),
                message,
                retryable: true,
            })
            .await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
