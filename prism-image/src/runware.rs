//! Runware task API: one POST carrying an authentication task followed by an
//! image inference task, answered synchronously.

use crate::{GeneratedImages, ImageError, ImageGenerator, ImageOutcome};
use async_trait::async_trait;
use prism_config::RunwareSettings;
use prism_http::{HttpClient, HttpError, RequestOpts};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

const PROVIDER: &str = "runware";

/// Per-call inference parameters. Unset fields fall back to configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InferenceRequest {
    pub prompt: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub model: Option<String>,
    pub number_results: Option<u32>,
}

impl InferenceRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

/// One inference result as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunwareImage {
    #[serde(rename(serialize = "imageUrl", deserialize = "imageURL"))]
    pub image_url: String,
    #[serde(rename = "imageUUID", default)]
    pub image_uuid: Option<String>,
    #[serde(default)]
    pub seed: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "taskType", rename_all_fields = "camelCase")]
enum Task<'a> {
    #[serde(rename = "authentication")]
    Authentication { api_key: &'a str },
    #[serde(rename = "imageInference")]
    ImageInference {
        #[serde(rename = "taskUUID")]
        task_uuid: String,
        positive_prompt: &'a str,
        width: u32,
        height: u32,
        model: &'a str,
        number_results: u32,
    },
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    errors: Vec<Value>,
}

pub struct RunwareClient {
    client: HttpClient,
    endpoint: String,
    api_key: String,
    defaults: RunwareSettings,
}

impl RunwareClient {
    pub fn new(api_key: String, settings: &RunwareSettings) -> Result<Self, HttpError> {
        let client = HttpClient::unanchored()?
            .with_timeout(settings.timeout())
            .with_retries(0);
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key,
            defaults: settings.clone(),
        })
    }

    /// Run one inference and return every image the provider produced.
    pub async fn infer(&self, req: &InferenceRequest) -> Result<Vec<RunwareImage>, ImageError> {
        let model = req.model.as_deref().unwrap_or(&self.defaults.model);
        let tasks = [
            Task::Authentication {
                api_key: &self.api_key,
            },
            Task::ImageInference {
                task_uuid: Uuid::new_v4().to_string(),
                positive_prompt: &req.prompt,
                width: req.width.unwrap_or(self.defaults.width),
                height: req.height.unwrap_or(self.defaults.height),
                model,
                number_results: req.number_results.unwrap_or(self.defaults.number_results),
            },
        ];

        let resp: TaskResponse = self
            .client
            .post_json(
                &self.endpoint,
                &tasks,
                RequestOpts {
                    allow_absolute: true,
                    ..Default::default()
                },
            )
            .await?;

        if !resp.errors.is_empty() {
            let detail = resp
                .errors
                .iter()
                .map(|e| {
                    e.get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| e.to_string())
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ImageError::Provider(detail));
        }

        let images: Vec<RunwareImage> = resp
            .data
            .into_iter()
            .filter(|item| item.get("taskType").and_then(Value::as_str) == Some("imageInference"))
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect();
        info!(provider = PROVIDER, model, count = images.len(), "inference finished");
        Ok(images)
    }
}

#[async_trait]
impl ImageGenerator for RunwareClient {
    async fn generate(&self, prompt: &str) -> ImageOutcome {
        match self.infer(&InferenceRequest::new(prompt)).await {
            Ok(images) => {
                let urls = images.into_iter().map(|img| img.image_url).collect();
                match GeneratedImages::from_urls(urls) {
                    Some(images) => ImageOutcome::Ready(images),
                    None => ImageOutcome::Failed {
                        reason: "no images generated".into(),
                    },
                }
            }
            Err(e) => {
                warn!(provider = PROVIDER, error = %e, "inference failed");
                ImageOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn provider(&self) -> &'static str {
        PROVIDER
    }
}
