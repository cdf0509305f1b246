use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use prism_config::{FetchSettings, LlmSettings};
use prism_image::{ImageGenerator, ImageOutcome};
use prism_llm::traits::{LlmClient, LlmError, LlmResponse};
use prism_server::{AppState, Provisioned, Services, build_router};
use prism_views::ViewPipeline;
use prism_views::fetch::PageFetcher;
use prism_views::prompt::ViewPrompter;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const THREE_VIEWS: &str = r#"Sure! Here you go:
```json
[
  {"id": 1, "title": "Energy as Sovereignty", "content": "Panels decentralise power.", "imageGenerationPrompt": "a flag woven from solar cells"},
  {"id": 2, "title": "The Copper Century", "content": "Mining becomes the story.", "imageGenerationPrompt": "an open-pit mine at dawn"},
  {"id": 3, "title": "Grid Diplomacy", "content": "Interconnectors redraw alliances.", "imageGenerationPrompt": "power lines crossing a border"},
]
```"#;

struct CannedLlm(&'static str);

#[async_trait]
impl LlmClient for CannedLlm {
    async fn generate(
        &self,
        _prompt: &str,
        _system_prompt: Option<&str>,
        _max_tokens: Option<u32>,
        _temperature: Option<f32>,
    ) -> Result<LlmResponse, LlmError> {
        Ok(LlmResponse {
            text: self.0.to_string(),
            model: None,
            tokens_used: None,
        })
    }

    fn model_name(&self) -> &str {
        "canned"
    }

    fn provider(&self) -> &'static str {
        "canned"
    }
}

struct NeverReady;

#[async_trait]
impl ImageGenerator for NeverReady {
    async fn generate(&self, _prompt: &str) -> ImageOutcome {
        ImageOutcome::Exhausted { attempts: 10 }
    }

    fn provider(&self) -> &'static str {
        "leonardo"
    }
}

fn fetcher() -> PageFetcher {
    PageFetcher::new(&FetchSettings {
        allow_private_hosts: true,
        retries: 0,
        ..Default::default()
    })
    .unwrap()
}

fn services(reply: &'static str) -> Services {
    let prompter = ViewPrompter::new(Arc::new(CannedLlm(reply)), &LlmSettings::default(), 12_000);
    Services {
        views: Provisioned::Ready(ViewPipeline::new(fetcher(), prompter)),
        fetcher: fetcher(),
        leonardo: Provisioned::Missing("LEONARDO_API_KEY is not set".into()),
        runware: Provisioned::Missing("RUNWARE_API_KEY is not set".into()),
        expose_diagnostics: false,
    }
}

fn app(reply: &'static str) -> Router {
    build_router(AppState::new(services(reply)))
}

async fn post(app: Router, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    post(app, uri, body.to_string()).await
}

#[tokio::test]
async fn health_reports_provider_readiness() {
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = app(THREE_VIEWS).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        body,
        json!({
            "status": "ok",
            "llm": "ok",
            "images": { "leonardo": "unconfigured", "runware": "unconfigured" }
        })
    );
}

#[tokio::test]
async fn generate_views_returns_three_normalized_views() {
    let (status, body) = post_json(
        app(THREE_VIEWS),
        "/api/generate-views",
        json!({ "text": "Solar prices fell again." }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let views = body["views"].as_array().unwrap();
    assert_eq!(views.len(), 3);
    assert_eq!(views[0]["id"], 1);
    assert_eq!(views[1]["title"], "The Copper Century");
    assert_eq!(views[2]["imageGenerationPrompt"], "power lines crossing a border");
    assert_eq!(views[0]["imageUrl"], "https://picsum.photos/seed/1/800/600");
    assert!(views[0].get("subtitle").is_none());
}

#[tokio::test]
async fn generate_views_requires_text() {
    let (status, body) =
        post_json(app(THREE_VIEWS), "/api/generate-views", json!({ "text": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Text is required");
}

#[tokio::test]
async fn views_rejects_both_url_and_text() {
    let (status, body) = post_json(
        app(THREE_VIEWS),
        "/api/views",
        json!({ "url": "https://example.com/a", "text": "hello" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn views_accepts_text_input() {
    let (status, body) =
        post_json(app(THREE_VIEWS), "/api/views", json!({ "text": "hello world" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["views"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn malformed_json_body_is_a_bad_request() {
    let (status, body) = post(app(THREE_VIEWS), "/api/generate-views", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn unparseable_reply_is_bad_gateway_with_raw_content() {
    let (status, body) = post_json(
        app("I'd rather not."),
        "/api/generate-views",
        json!({ "text": "Solar prices fell again." }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Failed to parse views");
    assert_eq!(body["rawContent"], "I'd rather not.");
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn missing_image_key_is_unavailable_without_details() {
    let (status, body) = post_json(
        app(THREE_VIEWS),
        "/api/generate-image",
        json!({ "prompt": "a lighthouse" }),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Service is not configured");
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn diagnostics_expose_the_missing_key() {
    let mut svc = services(THREE_VIEWS);
    svc.expose_diagnostics = true;
    let (status, body) = post_json(
        build_router(AppState::new(svc)),
        "/api/runware-image",
        json!({ "prompt": "a lighthouse" }),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["details"], "RUNWARE_API_KEY is not set");
}

#[tokio::test]
async fn image_prompt_is_required() {
    let (status, body) =
        post_json(app(THREE_VIEWS), "/api/generate-image", json!({ "prompt": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "A valid prompt is required");
}

#[tokio::test]
async fn exhausted_polling_is_a_gateway_timeout() {
    let mut svc = services(THREE_VIEWS);
    svc.leonardo = Provisioned::Ready(Arc::new(NeverReady) as Arc<dyn ImageGenerator>);
    let (status, body) = post_json(
        build_router(AppState::new(svc)),
        "/api/generate-image",
        json!({ "prompt": "a lighthouse" }),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["details"]["attempts"], 10);
}

#[tokio::test]
async fn fetch_url_returns_raw_html() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/story"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html><title>Hi</title><p>Body</p></html>"),
        )
        .mount(&server)
        .await;

    let (status, body) = post_json(
        app(THREE_VIEWS),
        "/api/fetch-url",
        json!({ "url": format!("{}/story", server.uri()) }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["html"], "<html><title>Hi</title><p>Body</p></html>");
}

#[tokio::test]
async fn fetch_url_requires_url() {
    let (status, body) = post_json(app(THREE_VIEWS), "/api/fetch-url", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "URL is required");
}
