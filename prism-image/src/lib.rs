//! Image generation for Prism views.
//!
//! - [`ImageGenerator`]: the one seam callers depend on; it never returns an
//!   error, only an [`ImageOutcome`]
//! - [`poller::JobPoller`]: submit-then-poll state machine for asynchronous
//!   providers, driven by a [`sleeper::Sleeper`]
//! - [`leonardo`]: Leonardo job API (asynchronous, polled)
//! - [`runware`]: Runware inference API (single round-trip)

pub mod leonardo;
pub mod poller;
pub mod runware;
pub mod sleeper;

use async_trait::async_trait;
use prism_common::PrismError;
use prism_config::{LeonardoSettings, RunwareSettings};
use prism_http::HttpError;
use serde::Serialize;
use std::sync::Arc;

use leonardo::LeonardoClient;
use poller::{JobPoller, PollPolicy};
use runware::RunwareClient;
use sleeper::TokioSleeper;

/// URLs produced by one successful generation, in provider order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImages {
    pub image_url: String,
    pub all_image_urls: Vec<String>,
}

impl GeneratedImages {
    /// `None` when the provider returned no URLs at all.
    pub fn from_urls(urls: Vec<String>) -> Option<Self> {
        let first = urls.first()?.clone();
        Some(Self {
            image_url: first,
            all_image_urls: urls,
        })
    }
}

/// Terminal result of one generation request.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutcome {
    Ready(GeneratedImages),
    /// The attempt budget ran out before any URL appeared.
    Exhausted { attempts: u32 },
    /// The provider rejected the job or an unexpected error occurred.
    Failed { reason: String },
}

impl ImageOutcome {
    pub fn image_url(&self) -> Option<&str> {
        match self {
            Self::Ready(images) => Some(&images.image_url),
            _ => None,
        }
    }

    /// Strict view of the outcome for callers that need an image.
    pub fn into_result(self, provider: &'static str) -> prism_common::Result<GeneratedImages> {
        match self {
            Self::Ready(images) => Ok(images),
            Self::Exhausted { attempts } => Err(PrismError::Exhausted { attempts }),
            Self::Failed { reason } => Err(PrismError::upstream(provider, reason)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("provider did not return a generation id: {body}")]
    MissingJobId { body: String },

    #[error("provider reported generation {id} as failed")]
    JobFailed { id: String },

    #[error("provider returned errors: {0}")]
    Provider(String),
}

impl ImageError {
    /// Whether a later poll of the same job might still succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_transient(),
            Self::MissingJobId { .. } | Self::JobFailed { .. } | Self::Provider(_) => false,
        }
    }

    /// Convert into the shared taxonomy, keeping the provider's status and body.
    pub fn into_prism(self, provider: &'static str) -> PrismError {
        match self {
            Self::Http(e) => e.into_upstream(provider),
            other => PrismError::upstream(provider, other.to_string()),
        }
    }
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate images for `prompt`. Never panics and never errors; failures
    /// are reported through [`ImageOutcome`].
    async fn generate(&self, prompt: &str) -> ImageOutcome;

    fn provider(&self) -> &'static str;
}

/// Build the polled Leonardo generator, or a configuration error when its key is absent.
pub fn build_leonardo(settings: &LeonardoSettings) -> prism_common::Result<Arc<dyn ImageGenerator>> {
    let api_key = settings.api_key().ok_or_else(|| {
        PrismError::Config("LEONARDO_API_KEY is not set; image generation is unavailable".into())
    })?;
    let client = LeonardoClient::new(api_key, settings)
        .map_err(|e| PrismError::Config(format!("leonardo client init failed: {e}")))?;
    let policy = PollPolicy {
        interval: settings.poll_interval(),
        max_attempts: settings.max_attempts,
    };
    Ok(Arc::new(JobPoller::new(client, TokioSleeper, policy)))
}

/// Build the single-shot Runware client, or a configuration error when its key is absent.
pub fn build_runware(settings: &RunwareSettings) -> prism_common::Result<RunwareClient> {
    let api_key = settings.api_key().ok_or_else(|| {
        PrismError::Config("RUNWARE_API_KEY is not set; image generation is unavailable".into())
    })?;
    RunwareClient::new(api_key, settings)
        .map_err(|e| PrismError::Config(format!("runware client init failed: {e}")))
}
