use crate::traits::{LlmClient, LlmError, LlmResponse};
use async_trait::async_trait;
use prism_http::{Auth, HttpClient, RequestOpts};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROVIDER: &str = "anthropic";
const FALLBACK_MAX_TOKENS: u32 = 1024;

/// Anthropic Messages API client.
pub struct AnthropicClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl AnthropicClient {
    /// Create a client for the given key and model against `base_url`.
    pub fn new(
        api_key: String,
        model: String,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = HttpClient::new(base_url)
            .map_err(|e| LlmError::Config(format!("HttpClient init failed: {e}")))?
            .with_timeout(timeout)
            .with_retries(0);

        Ok(Self {
            client,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse, LlmError> {
        let req = MessagesRequest {
            model: &self.model,
            max_tokens: max_tokens.unwrap_or(FALLBACK_MAX_TOKENS),
            temperature,
            system: system_prompt,
            messages: vec![WireMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        let auth = Auth::header("x-api-key", &self.api_key).map_err(|source| LlmError::Http {
            provider: PROVIDER,
            source,
        })?;
        let opts = RequestOpts {
            auth: Some(auth),
            headers: Some(headers),
            ..Default::default()
        };

        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "anthropic.messages.request");

        let resp: MessagesResponse = self
            .client
            .post_json("messages", &req, opts)
            .await
            .map_err(|source| LlmError::Http {
                provider: PROVIDER,
                source,
            })?;

        let text: String = resp
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse { provider: PROVIDER });
        }

        let tokens_used = resp.usage.map(|u| u.input_tokens + u.output_tokens);
        tracing::debug!(model = %resp.model, ?tokens_used, "anthropic.messages.response");

        Ok(LlmResponse {
            text,
            model: Some(resp.model),
            tokens_used,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &'static str {
        PROVIDER
    }
}
