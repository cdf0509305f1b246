use async_trait::async_trait;
use prism_common::PrismError;
use prism_http::HttpError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
}

#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    #[error("{provider} transport error: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: HttpError,
    },

    #[error("{provider} returned no text content")]
    EmptyResponse { provider: &'static str },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<LlmError> for PrismError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Http { provider, source } => source.into_upstream(provider),
            LlmError::EmptyResponse { provider } => {
                PrismError::upstream(provider, "response contained no text content")
            }
            LlmError::Config(msg) => PrismError::Config(msg),
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response to the given prompt with optional system prompt.
    ///
    /// Implementations make exactly one provider round-trip; callers that
    /// want retries add them explicitly.
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse, LlmError>;

    /// Get the model name being used
    fn model_name(&self) -> &str;

    /// Short provider name for logs and error attribution.
    fn provider(&self) -> &'static str;
}
