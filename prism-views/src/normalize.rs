use prism_common::PrismError;
use serde::Serialize;
use serde_json::{Map, Value};

pub const MAX_VIEWS: usize = 6;

const DEFAULT_CONTENT: &str = "A unique perspective on the topic.";

/// One alternative reading of an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub image_generation_prompt: String,
}

impl View {
    /// Stable stand-in image keyed by 1-based position.
    pub fn placeholder_image_url(position: usize) -> String {
        format!("https://picsum.photos/seed/{position}/800/600")
    }

    fn check(&self) -> Result<(), &'static str> {
        if self.title.trim().is_empty() {
            return Err("title is empty");
        }
        if self.content.trim().is_empty() {
            return Err("content is empty");
        }
        if self.image_generation_prompt.trim().is_empty() {
            return Err("imageGenerationPrompt is empty");
        }
        if self.subtitle.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err("subtitle is present but empty");
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// The model's reply has the wrong shape.
    #[error("malformed views: {0}")]
    Malformed(String),
    /// A record still fails validation after defaults were applied.
    #[error("view {index} violates invariants after defaulting: {reason}")]
    Invariant { index: usize, reason: &'static str },
}

impl NormalizeError {
    /// Attach the raw reply so parse failures can be shown to operators.
    pub fn into_prism(self, raw: &str) -> PrismError {
        match self {
            Self::Malformed(reason) => PrismError::Parse {
                reason,
                raw: raw.to_string(),
            },
            invariant @ Self::Invariant { .. } => PrismError::Internal(invariant.to_string()),
        }
    }
}

/// Normalize recovered JSON into views, in order, filling gaps from the
/// default table. `imageUrl` is never taken from the model.
///
/// | field                   | default                             |
/// |-------------------------|-------------------------------------|
/// | `id`                    | position (1-based)                  |
/// | `title`                 | `Alternative Perspective {n}`       |
/// | `subtitle`              | absent                              |
/// | `content`               | `A unique perspective on the topic.`|
/// | `imageGenerationPrompt` | `Symbolic representation {n}`       |
pub fn normalize_views(value: &Value) -> Result<Vec<View>, NormalizeError> {
    let items = value
        .as_array()
        .ok_or_else(|| NormalizeError::Malformed(format!("expected an array, got {}", kind(value))))?;
    if items.is_empty() || items.len() > MAX_VIEWS {
        return Err(NormalizeError::Malformed(format!(
            "expected 1 to {MAX_VIEWS} views, got {}",
            items.len()
        )));
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let obj = item.as_object().ok_or_else(|| {
                NormalizeError::Malformed(format!("view {index} is {}, not an object", kind(item)))
            })?;
            let view = normalize_one(index, obj);
            view.check()
                .map_err(|reason| NormalizeError::Invariant { index, reason })?;
            Ok(view)
        })
        .collect()
}

fn normalize_one(index: usize, obj: &Map<String, Value>) -> View {
    let n = index + 1;
    View {
        id: obj
            .get("id")
            .and_then(Value::as_i64)
            .filter(|id| *id != 0)
            .unwrap_or(n as i64),
        title: text_field(obj, "title").unwrap_or_else(|| format!("Alternative Perspective {n}")),
        subtitle: text_field(obj, "subtitle"),
        content: text_field(obj, "content").unwrap_or_else(|| DEFAULT_CONTENT.to_string()),
        image_url: None,
        image_generation_prompt: text_field(obj, "imageGenerationPrompt")
            .unwrap_or_else(|| format!("Symbolic representation {n}")),
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
