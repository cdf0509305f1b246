use prism_common::PrismError;
use prism_config::LlmSettings;
use prism_llm::traits::LlmClient;
use std::sync::Arc;
use tracing::{info, warn};

const INSTRUCTIONS: &str = r#"Generate three radically different but plausible interpretations of this news story. Each interpretation should reveal a profound 'other way of looking at it' that causes an 'ah-ha!' moment by seeing the same events from a completely unexpected perspective. These should not be conspiracy theories, but rather intelligent alternative frameworks that expose deeper implications, hidden dynamics, or non-obvious future impacts.

Each interpretation should be 2-3 sentences long, be both surprising and logically sound, and reveal a perspective that makes us say 'wow, I hadn't thought of it that way!' Focus on identifying the profound historical implications or future consequences that aren't immediately apparent from the conventional narrative. Make each interpretation genuinely insightful rather than merely contrarian.

Respond with a VALID JSON array of view objects. Each view MUST have:
- id (unique number)
- title (non-empty string)
- content (non-empty string)
- imageUrl (non-empty string)
- imageGenerationPrompt (non-empty string describing an image that perfectly captures the view's essence)

IMPORTANT: Ensure the JSON is properly formatted and escaped. Use ONLY JSON in the response.

Example format:
[
  {
    "id": 1,
    "title": "Provocative Perspective",
    "content": "A challenging one-sentence view.",
    "imageUrl": "https://example.com/image.jpg",
    "imageGenerationPrompt": "A symbolic representation of the unique perspective"
  }
]"#;

/// Render the view-generation prompt around `text`.
pub fn build_prompt(text: &str) -> String {
    format!("{INSTRUCTIONS}\n\nSource Text: {text}")
}

/// Cut `text` to at most `max_chars` characters without splitting one.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Asks the configured model for alternative views of an article.
#[derive(Clone)]
pub struct ViewPrompter {
    llm: Arc<dyn LlmClient + Send + Sync>,
    max_tokens: u32,
    temperature: f32,
    max_input_chars: usize,
}

impl ViewPrompter {
    pub fn new(llm: Arc<dyn LlmClient + Send + Sync>, settings: &LlmSettings, max_input_chars: usize) -> Self {
        Self {
            llm,
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            max_input_chars,
        }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// One model call; returns the reply text untouched.
    pub async fn request_views(&self, text: &str) -> Result<String, PrismError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PrismError::Input("text is required".into()));
        }

        let clipped = truncate_chars(text, self.max_input_chars);
        if clipped.len() < text.len() {
            warn!(
                limit = self.max_input_chars,
                original_bytes = text.len(),
                "article text truncated before prompting"
            );
        }

        let prompt = build_prompt(clipped);
        let resp = self
            .llm
            .generate(&prompt, None, Some(self.max_tokens), Some(self.temperature))
            .await?;

        info!(
            provider = self.llm.provider(),
            model = resp.model.as_deref().unwrap_or(self.llm.model_name()),
            tokens = resp.tokens_used.unwrap_or_default(),
            reply_chars = resp.text.len(),
            "views requested"
        );
        Ok(resp.text)
    }
}
