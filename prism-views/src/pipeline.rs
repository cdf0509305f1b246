//! URL or text in, normalized views out.

use crate::extract::extract_page;
use crate::fetch::PageFetcher;
use crate::normalize::{View, normalize_views};
use crate::prompt::ViewPrompter;
use crate::recover::recover_json;
use futures::future::join_all;
use prism_common::PrismError;
use prism_config::ImagePolicy;
use prism_image::{ImageGenerator, ImageOutcome};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// What a caller asked to analyse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewInput {
    Url(String),
    Text(String),
}

impl ViewInput {
    /// Exactly one of `url` or `text` must be given and non-blank.
    pub fn from_parts(url: Option<String>, text: Option<String>) -> Result<Self, PrismError> {
        let url = url.filter(|u| !u.trim().is_empty());
        let text = text.filter(|t| !t.trim().is_empty());
        match (url, text) {
            (Some(url), None) => Ok(Self::Url(url)),
            (None, Some(text)) => Ok(Self::Text(text)),
            (Some(_), Some(_)) => Err(PrismError::Input("provide either url or text, not both".into())),
            (None, None) => Err(PrismError::Input("url or text is required".into())),
        }
    }
}

pub struct ViewPipeline {
    fetcher: PageFetcher,
    prompter: ViewPrompter,
    images: Option<Arc<dyn ImageGenerator>>,
    policy: ImagePolicy,
    expected_views: Option<usize>,
}

impl ViewPipeline {
    pub fn new(fetcher: PageFetcher, prompter: ViewPrompter) -> Self {
        Self {
            fetcher,
            prompter,
            images: None,
            policy: ImagePolicy::default(),
            expected_views: Some(3),
        }
    }

    pub fn with_image_policy(mut self, policy: ImagePolicy, images: Option<Arc<dyn ImageGenerator>>) -> Self {
        if policy == ImagePolicy::Generate && images.is_none() {
            warn!("image generation requested but no image provider is configured; views will have no images");
        }
        self.policy = policy;
        self.images = images;
        self
    }

    pub fn with_expected_views(mut self, expected: Option<usize>) -> Self {
        self.expected_views = expected;
        self
    }

    pub fn fetcher(&self) -> &PageFetcher {
        &self.fetcher
    }

    pub async fn run(&self, input: ViewInput) -> Result<Vec<View>, PrismError> {
        let text = match input {
            ViewInput::Text(text) => text,
            ViewInput::Url(url) => {
                let page = self.fetcher.fetch(&url).await?;
                let extracted = extract_page(Some(&page.url), &page.html);
                info!(
                    url = %page.url,
                    title = extracted.title.as_deref().unwrap_or("-"),
                    checksum = %extracted.html_checksum,
                    chars = extracted.text.chars().count(),
                    "article extracted"
                );
                if extracted.text.is_empty() {
                    return Err(PrismError::Input(format!("no readable text at {}", page.url)));
                }
                extracted.text
            }
        };
        self.views_from_text(&text).await
    }

    #[instrument(skip_all, fields(model = self.prompter.model_name(), policy = ?self.policy))]
    pub async fn views_from_text(&self, text: &str) -> Result<Vec<View>, PrismError> {
        let raw = self.prompter.request_views(text).await?;
        let value = recover_json(&raw)?;
        let mut views = normalize_views(&value).map_err(|e| e.into_prism(&raw))?;

        match self.expected_views {
            Some(expected) if views.len() != expected => {
                return Err(PrismError::Parse {
                    reason: format!("expected {expected} views, got {}", views.len()),
                    raw,
                });
            }
            _ => {}
        }

        self.attach_images(&mut views).await;
        info!(count = views.len(), "views ready");
        Ok(views)
    }

    async fn attach_images(&self, views: &mut [View]) {
        match (self.policy, &self.images) {
            (ImagePolicy::None, _) => {}
            (ImagePolicy::Placeholder, _) => {
                for (i, view) in views.iter_mut().enumerate() {
                    view.image_url = Some(View::placeholder_image_url(i + 1));
                }
            }
            (ImagePolicy::Generate, None) => {}
            (ImagePolicy::Generate, Some(images)) => {
                let outcomes = join_all(
                    views
                        .iter()
                        .map(|v| images.generate(&v.image_generation_prompt)),
                )
                .await;
                for (view, outcome) in views.iter_mut().zip(outcomes) {
                    match outcome {
                        ImageOutcome::Ready(generated) => view.image_url = Some(generated.image_url),
                        ImageOutcome::Exhausted { attempts } => {
                            warn!(view = view.id, attempts, provider = images.provider(), "image not ready in time");
                        }
                        ImageOutcome::Failed { reason } => {
                            warn!(view = view.id, %reason, provider = images.provider(), "image generation failed");
                        }
                    }
                }
            }
        }
    }
}
