use crate::error::ApiError;
use crate::routes::{fetch, health, images, views};
use anyhow::{Context, Result};
use axum::Router;
use axum::http::{Method, header::CONTENT_TYPE};
use axum::routing::{get, post};
use prism_common::PrismError;
use prism_config::{ImagePolicy, ImageProvider, PrismConfig};
use prism_image::runware::RunwareClient;
use prism_image::{ImageGenerator, build_leonardo, build_runware};
use prism_llm::build_llm_client;
use prism_views::ViewPipeline;
use prism_views::fetch::PageFetcher;
use prism_views::prompt::ViewPrompter;
use std::ops::Deref;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// A service that may be absent because its credential is missing.
pub enum Provisioned<T> {
    Ready(T),
    Missing(String),
}

impl<T> Provisioned<T> {
    pub fn new(service: &'static str, built: prism_common::Result<T>) -> Self {
        match built {
            Ok(value) => Self::Ready(value),
            Err(err) => {
                warn!(service, error = %err, "service unavailable");
                match err {
                    PrismError::Config(reason) => Self::Missing(reason),
                    other => Self::Missing(other.to_string()),
                }
            }
        }
    }

    pub fn get(&self) -> Result<&T, PrismError> {
        match self {
            Self::Ready(value) => Ok(value),
            Self::Missing(reason) => Err(PrismError::Config(reason.clone())),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        self.get().ok()
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Ready(_) => "ok",
            Self::Missing(_) => "unconfigured",
        }
    }
}

/// Everything a handler may need, built once at startup.
pub struct Services {
    pub views: Provisioned<ViewPipeline>,
    pub fetcher: PageFetcher,
    pub leonardo: Provisioned<Arc<dyn ImageGenerator>>,
    pub runware: Provisioned<Arc<RunwareClient>>,
    pub expose_diagnostics: bool,
}

#[derive(Clone)]
pub struct AppState(Arc<Services>);

impl Deref for AppState {
    type Target = Services;

    fn deref(&self) -> &Services {
        &self.0
    }
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self(Arc::new(services))
    }

    pub fn from_config(cfg: &PrismConfig) -> Result<Self> {
        let fetcher = PageFetcher::new(&cfg.fetch).context("building page fetcher")?;
        let leonardo = Provisioned::new("leonardo", build_leonardo(&cfg.images.leonardo));
        let runware = Provisioned::new("runware", build_runware(&cfg.images.runware).map(Arc::new));

        let pipeline_images: Option<Arc<dyn ImageGenerator>> = match cfg.images.policy {
            ImagePolicy::Generate => match cfg.images.provider {
                ImageProvider::Leonardo => leonardo.ready().cloned(),
                ImageProvider::Runware => runware
                    .ready()
                    .map(|client| client.clone() as Arc<dyn ImageGenerator>),
            },
            ImagePolicy::None | ImagePolicy::Placeholder => None,
        };

        let views = Provisioned::new(
            "llm",
            build_llm_client(&cfg.llm).map(|llm| {
                let prompter = ViewPrompter::new(llm, &cfg.llm, cfg.pipeline.max_input_chars);
                ViewPipeline::new(fetcher.clone(), prompter)
                    .with_image_policy(cfg.images.policy, pipeline_images)
                    .with_expected_views(cfg.pipeline.expected_views)
            }),
        );

        info!(
            llm = views.status(),
            leonardo = leonardo.status(),
            runware = runware.status(),
            image_policy = ?cfg.images.policy,
            "services provisioned"
        );

        Ok(Self::new(Services {
            views,
            fetcher,
            leonardo,
            runware,
            expose_diagnostics: cfg.server.expose_diagnostics,
        }))
    }

    /// Wrap a failure with this deployment's diagnostics setting.
    pub fn error(&self, err: PrismError) -> ApiError {
        ApiError::new(err, self.expose_diagnostics)
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/api/views", post(views::create_views))
        .route("/api/generate-views", post(views::generate_views))
        .route("/api/fetch-url", post(fetch::fetch_url))
        .route("/api/generate-image", post(images::generate_image))
        .route("/api/runware-image", post(images::runware_image))
        .route("/health", get(health::health))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
}
