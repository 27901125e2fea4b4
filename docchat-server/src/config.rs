//! Environment-driven service configuration.

use std::time::Duration;

use docchat_rag::{RagError, Result, RetryPolicy};

/// Default request body limit: 10 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

/// Everything the server binary needs to bind and to reach its backends.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// An IP address or a host name to resolve.
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
    pub openai_api_key: String,
    /// Overrides the provider's default embedding model.
    pub embedding_model: Option<String>,
    pub embedding_dimensions: usize,
    /// Overrides the default completion model.
    pub completion_model: Option<String>,
    pub pinecone_api_key: String,
    pub pinecone_index_host: String,
    pub pinecone_namespace: Option<String>,
    /// Time limit for one call to any remote backend.
    pub request_timeout: Duration,
    pub max_retries: u32,
}

impl ServiceConfig {
    /// Read the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required key is missing or a numeric
    /// value does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &str| {
            optional(key).ok_or_else(|| RagError::Config(format!("{key} must be set")))
        };
        let defaults = RetryPolicy::default();

        Ok(Self {
            host: optional("DOCCHAT_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(optional("DOCCHAT_PORT"), "DOCCHAT_PORT", DEFAULT_PORT)?,
            max_body_bytes: parse_or(
                optional("DOCCHAT_MAX_BODY_BYTES"),
                "DOCCHAT_MAX_BODY_BYTES",
                DEFAULT_MAX_BODY_BYTES,
            )?,
            openai_api_key: required("OPENAI_API_KEY")?,
            embedding_model: optional("OPENAI_EMBEDDING_MODEL"),
            embedding_dimensions: parse_or(
                optional("OPENAI_EMBEDDING_DIMENSIONS"),
                "OPENAI_EMBEDDING_DIMENSIONS",
                DEFAULT_EMBEDDING_DIMENSIONS,
            )?,
            completion_model: optional("OPENAI_COMPLETION_MODEL"),
            pinecone_api_key: required("PINECONE_API_KEY")?,
            pinecone_index_host: required("PINECONE_INDEX_HOST")?,
            pinecone_namespace: optional("PINECONE_NAMESPACE"),
            request_timeout: Duration::from_secs(parse_or(
                optional("DOCCHAT_REQUEST_TIMEOUT_SECS"),
                "DOCCHAT_REQUEST_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )?),
            max_retries: parse_or(
                optional("DOCCHAT_MAX_RETRIES"),
                "DOCCHAT_MAX_RETRIES",
                defaults.max_retries,
            )?,
        })
    }

    /// The retry policy applied to every remote backend.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            timeout: self.request_timeout,
            ..RetryPolicy::default()
        }
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| RagError::Config(format!("{key} has an invalid value '{raw}': {e}"))),
        None => Ok(default),
    }
}
