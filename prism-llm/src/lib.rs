//! Provider-agnostic LLM integration for Prism.
//!
//! This crate exposes a common [`traits::LlmClient`] interface and concrete
//! provider implementations for Anthropic and OpenAI. [`build_llm_client`]
//! turns the `llm` configuration section into a ready client, or a
//! [`PrismError::Config`] when the provider's credential is absent.
//!
//! # Examples
//! ```no_run
//! use prism_config::LlmSettings;
//! use prism_llm::build_llm_client;
//!
//! let client = build_llm_client(&LlmSettings::default())?;
//! assert!(!client.model_name().is_empty());
//! # Ok::<(), prism_common::PrismError>(())
//! ```
pub mod anthropic;
pub mod openai;
pub mod traits;

use anthropic::AnthropicClient;
use openai::OpenAiClient;
use prism_common::PrismError;
use prism_config::{LlmProvider, LlmSettings};
use std::sync::Arc;
use traits::LlmClient;

/// Build the configured LLM client once, at startup.
pub fn build_llm_client(
    settings: &LlmSettings,
) -> prism_common::Result<Arc<dyn LlmClient + Send + Sync + 'static>> {
    let api_key = settings.api_key().ok_or_else(|| {
        PrismError::Config(format!(
            "{} is not set; view generation is unavailable",
            settings.provider.api_key_env()
        ))
    })?;
    let model = settings.model().to_string();

    let client: Arc<dyn LlmClient + Send + Sync> = match settings.provider {
        LlmProvider::Anthropic => Arc::new(AnthropicClient::new(
            api_key,
            model,
            settings.endpoint(),
            settings.timeout(),
        )?),
        LlmProvider::Openai => Arc::new(OpenAiClient::new(
            api_key,
            model,
            settings.endpoint(),
            settings.timeout(),
        )?),
    };

    tracing::info!(
        provider = client.provider(),
        model = client.model_name(),
        "llm client ready"
    );
    Ok(client)
}
