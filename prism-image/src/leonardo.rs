//! Leonardo generation API.
//!
//! `POST generations` creates a job and answers with its id; `GET
//! generations/{id}` reports the job, with image URLs appearing once it
//! completes.

use crate::poller::{GenerationBackend, GenerationJob};
use crate::ImageError;
use async_trait::async_trait;
use prism_config::LeonardoSettings;
use prism_http::{Auth, HttpClient, HttpError, RequestOpts};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const PROVIDER: &str = "leonardo";

pub struct LeonardoClient {
    client: HttpClient,
    api_key: String,
    defaults: LeonardoSettings,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateGeneration<'a> {
    model_id: &'a str,
    contrast: f32,
    prompt: &'a str,
    #[serde(rename = "num_images")]
    num_images: u32,
    width: u32,
    height: u32,
    alchemy: bool,
    #[serde(rename = "styleUUID", skip_serializing_if = "Option::is_none")]
    style_uuid: Option<&'a str>,
    enhance_prompt: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateGenerationResponse {
    sd_generation_job: Option<SdGenerationJob>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SdGenerationJob {
    generation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerationStatusResponse {
    generations_by_pk: Option<GenerationRecord>,
}

#[derive(Debug, Deserialize)]
struct GenerationRecord {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    generated_images: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: Option<String>,
}

impl LeonardoClient {
    pub fn new(api_key: String, settings: &LeonardoSettings) -> Result<Self, HttpError> {
        // Each status request is one poll attempt; the poller owns retrying.
        let client = HttpClient::new(&settings.endpoint)?
            .with_timeout(settings.timeout())
            .with_retries(0);
        Ok(Self {
            client,
            api_key,
            defaults: settings.clone(),
        })
    }

    fn create_body<'a>(&'a self, prompt: &'a str) -> CreateGeneration<'a> {
        let d = &self.defaults;
        CreateGeneration {
            model_id: &d.model_id,
            contrast: d.contrast,
            prompt,
            num_images: d.num_images,
            width: d.width,
            height: d.height,
            alchemy: d.alchemy,
            style_uuid: d.style_uuid.as_deref(),
            enhance_prompt: d.enhance_prompt,
        }
    }

    fn opts(&self) -> RequestOpts<'_> {
        RequestOpts {
            auth: Some(Auth::Bearer(&self.api_key)),
            ..Default::default()
        }
    }
}

#[async_trait]
impl GenerationBackend for LeonardoClient {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn submit(&self, prompt: &str) -> Result<String, ImageError> {
        let body = self.create_body(prompt);
        let raw: Value = self.client.post_json("generations", &body, self.opts()).await?;
        let parsed: Option<CreateGenerationResponse> = serde_json::from_value(raw.clone()).ok();
        parsed
            .and_then(|r| r.sd_generation_job)
            .and_then(|job| job.generation_id)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ImageError::MissingJobId {
                body: raw.to_string(),
            })
    }

    async fn status(&self, job_id: &str) -> Result<GenerationJob, ImageError> {
        let path = format!("generations/{job_id}");
        let resp: GenerationStatusResponse = self.client.get_json(&path, self.opts()).await?;

        let Some(record) = resp.generations_by_pk else {
            return Ok(GenerationJob::pending(job_id));
        };
        let image_urls: Vec<String> = record
            .generated_images
            .into_iter()
            .filter_map(|img| img.url)
            .filter(|url| !url.is_empty())
            .collect();

        if image_urls.is_empty() && record.status.as_deref() == Some("FAILED") {
            return Err(ImageError::JobFailed { id: job_id.to_string() });
        }
        Ok(GenerationJob {
            id: job_id.to_string(),
            image_urls,
        })
    }
}
