use async_trait::async_trait;
use prism_common::PrismError;
use prism_config::{FetchSettings, ImagePolicy, LlmSettings};
use prism_image::{GeneratedImages, ImageGenerator, ImageOutcome};
use prism_llm::traits::{LlmClient, LlmError, LlmResponse};
use prism_views::fetch::PageFetcher;
use prism_views::prompt::ViewPrompter;
use prism_views::{ViewInput, ViewPipeline};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const THREE_VIEWS: &str = r#"[
  {"id": 1, "title": "Energy as Sovereignty", "content": "Panels decentralise power.", "imageUrl": "https://example.com/a.jpg", "imageGenerationPrompt": "a flag woven from solar cells"},
  {"id": 2, "title": "The Copper Century", "content": "Mining becomes the story.", "imageGenerationPrompt": "an open-pit mine at dawn"},
  {"id": 3, "title": "Grid Diplomacy", "content": "Interconnectors redraw alliances.", "imageGenerationPrompt": "power lines crossing a border"}
]"#;

struct StubLlm {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl StubLlm {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LlmClient for StubLlm {
    async fn generate(
        &self,
        prompt: &str,
        _system_prompt: Option<&str>,
        _max_tokens: Option<u32>,
        _temperature: Option<f32>,
    ) -> Result<LlmResponse, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(LlmResponse {
            text: self.reply.clone(),
            model: Some("stub-model".into()),
            tokens_used: Some(42),
        })
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }

    fn provider(&self) -> &'static str {
        "stub"
    }
}

/// Answers by prompt: "flag" is ready, "mine" never finishes, anything else fails.
struct StubImages;

#[async_trait]
impl ImageGenerator for StubImages {
    async fn generate(&self, prompt: &str) -> ImageOutcome {
        if prompt.contains("flag") {
            ImageOutcome::Ready(GeneratedImages {
                image_url: "https://cdn.example/flag.jpg".into(),
                all_image_urls: vec!["https://cdn.example/flag.jpg".into()],
            })
        } else if prompt.contains("mine") {
            ImageOutcome::Exhausted { attempts: 10 }
        } else {
            ImageOutcome::Failed {
                reason: "401 unauthorized".into(),
            }
        }
    }

    fn provider(&self) -> &'static str {
        "stub-images"
    }
}

fn pipeline(llm: Arc<StubLlm>) -> ViewPipeline {
    let fetch = FetchSettings {
        allow_private_hosts: true,
        retries: 0,
        ..Default::default()
    };
    let fetcher = PageFetcher::new(&fetch).unwrap();
    let prompter = ViewPrompter::new(llm, &LlmSettings::default(), 12_000);
    ViewPipeline::new(fetcher, prompter)
}

#[tokio::test]
async fn text_to_three_views_with_placeholders() {
    let llm = StubLlm::new(THREE_VIEWS);
    let views = pipeline(llm.clone())
        .run(ViewInput::Text("Example article about renewable energy.".into()))
        .await
        .unwrap();

    assert_eq!(views.len(), 3);
    for (i, view) in views.iter().enumerate() {
        assert_eq!(view.id, i as i64 + 1);
        assert!(!view.title.is_empty());
        assert!(!view.content.is_empty());
        assert!(!view.image_generation_prompt.is_empty());
        assert_eq!(
            view.image_url.as_deref(),
            Some(format!("https://picsum.photos/seed/{}/800/600", i + 1).as_str())
        );
    }

    let prompts = llm.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].ends_with("Source Text: Example article about renewable energy."));
}

#[tokio::test]
async fn chatty_reply_is_recovered() {
    let reply = format!("Here are your perspectives:\n```json\n{THREE_VIEWS}\n```\nEnjoy!");
    let views = pipeline(StubLlm::new(&reply))
        .run(ViewInput::Text("story".into()))
        .await
        .unwrap();
    assert_eq!(views[2].title, "Grid Diplomacy");
}

#[tokio::test]
async fn wrong_count_is_a_parse_error_with_raw_reply() {
    let reply = r#"[{"title": "only one", "content": "x", "imageGenerationPrompt": "y"}]"#;
    let err = pipeline(StubLlm::new(reply))
        .run(ViewInput::Text("story".into()))
        .await
        .unwrap_err();
    match err {
        PrismError::Parse { reason, raw } => {
            assert!(reason.contains("expected 3 views"));
            assert_eq!(raw, reply);
        }
        other => panic!("unexpected {other:?}"),
    }

    let views = pipeline(StubLlm::new(reply))
        .with_expected_views(None)
        .run(ViewInput::Text("story".into()))
        .await
        .unwrap();
    assert_eq!(views.len(), 1);
}

#[tokio::test]
async fn unrecoverable_reply_is_a_parse_error() {
    let err = pipeline(StubLlm::new("Sorry, I can't do that."))
        .run(ViewInput::Text("story".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, PrismError::Parse { ref raw, .. } if raw == "Sorry, I can't do that."));
}

#[tokio::test]
async fn blank_text_never_reaches_the_model() {
    let llm = StubLlm::new(THREE_VIEWS);
    let err = pipeline(llm.clone())
        .views_from_text("   ")
        .await
        .unwrap_err();
    assert!(matches!(err, PrismError::Input(_)));
    assert!(llm.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn image_failures_are_soft() {
    let views = pipeline(StubLlm::new(THREE_VIEWS))
        .with_image_policy(ImagePolicy::Generate, Some(Arc::new(StubImages)))
        .run(ViewInput::Text("story".into()))
        .await
        .unwrap();

    assert_eq!(views[0].image_url.as_deref(), Some("https://cdn.example/flag.jpg"));
    assert_eq!(views[1].image_url, None);
    assert_eq!(views[2].image_url, None);
}

#[tokio::test]
async fn no_image_policy_leaves_urls_absent() {
    let views = pipeline(StubLlm::new(THREE_VIEWS))
        .with_image_policy(ImagePolicy::None, None)
        .run(ViewInput::Text("story".into()))
        .await
        .unwrap();
    assert!(views.iter().all(|v| v.image_url.is_none()));
}

#[tokio::test]
async fn url_input_is_fetched_and_stripped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news/solar"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(
                    "<html><head><title>Solar</title><script>track()</script></head>\
                     <body><h1>Solar   surge</h1><p>Prices&nbsp;fell.</p></body></html>",
                ),
        )
        .expect(1)
        .mount(&server)
        .await;

    let llm = StubLlm::new(THREE_VIEWS);
    let views = pipeline(llm.clone())
        .run(ViewInput::Url(format!("{}/news/solar", server.uri())))
        .await
        .unwrap();
    assert_eq!(views.len(), 3);

    let prompts = llm.prompts.lock().unwrap();
    assert!(prompts[0].ends_with("Source Text: Solar Solar surge Prices fell."));
    assert!(!prompts[0].contains("track()"));
}

#[tokio::test]
async fn missing_page_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&server)
        .await;

    let llm = StubLlm::new(THREE_VIEWS);
    let err = pipeline(llm.clone())
        .run(ViewInput::Url(format!("{}/gone", server.uri())))
        .await
        .unwrap_err();
    assert!(matches!(err, PrismError::Upstream { service: "page", status: Some(404), .. }));
    assert!(llm.prompts.lock().unwrap().is_empty());
}
