//! Submit-then-poll driver for providers that generate asynchronously.
//!
//! The provider half lives behind [`GenerationBackend`]; this module owns the
//! attempt budget and the pacing between polls. A job moves through
//! `Submitting -> Polling -> {Ready | Exhausted | Failed}` and every terminal
//! state is reported as an [`ImageOutcome`].

use crate::sleeper::Sleeper;
use crate::{GeneratedImages, ImageError, ImageGenerator, ImageOutcome};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Snapshot of a provider-side generation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationJob {
    pub id: String,
    /// Image URLs reported so far; empty while the job is still pending.
    pub image_urls: Vec<String>,
}

impl GenerationJob {
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            image_urls: Vec::new(),
        }
    }
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn provider(&self) -> &'static str;

    /// Create a job and return its identifier.
    async fn submit(&self, prompt: &str) -> Result<String, ImageError>;

    /// Fetch the current state of a previously submitted job.
    async fn status(&self, job_id: &str) -> Result<GenerationJob, ImageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between consecutive status requests. No pause precedes the first.
    pub interval: Duration,
    /// Status requests allowed before giving up.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(7),
            max_attempts: 10,
        }
    }
}

#[derive(Debug)]
enum PollState {
    Submitting,
    Polling { job_id: String, attempts: u32 },
    Done(ImageOutcome),
}

pub struct JobPoller<B, S> {
    backend: B,
    sleeper: S,
    policy: PollPolicy,
}

impl<B: GenerationBackend, S: Sleeper> JobPoller<B, S> {
    pub fn new(backend: B, sleeper: S, policy: PollPolicy) -> Self {
        Self {
            backend,
            sleeper,
            policy,
        }
    }

    pub async fn run(&self, prompt: &str) -> ImageOutcome {
        let provider = self.backend.provider();
        let mut state = PollState::Submitting;
        loop {
            state = match state {
                PollState::Submitting => match self.backend.submit(prompt).await {
                    Ok(job_id) => {
                        info!(provider, %job_id, "image job submitted");
                        PollState::Polling {
                            job_id,
                            attempts: 0,
                        }
                    }
                    Err(e) => {
                        warn!(provider, error = %e, "image job submission failed");
                        PollState::Done(ImageOutcome::Failed {
                            reason: e.to_string(),
                        })
                    }
                },
                PollState::Polling { job_id, attempts } => {
                    self.step(provider, job_id, attempts).await
                }
                PollState::Done(outcome) => return outcome,
            };
        }
    }

    async fn step(&self, provider: &'static str, job_id: String, attempts: u32) -> PollState {
        if attempts >= self.policy.max_attempts {
            warn!(provider, %job_id, attempts, "image job still pending, giving up");
            return PollState::Done(ImageOutcome::Exhausted { attempts });
        }
        if attempts > 0 {
            self.sleeper.sleep(self.policy.interval).await;
        }
        let attempts = attempts + 1;

        match self.backend.status(&job_id).await {
            Ok(job) => match GeneratedImages::from_urls(job.image_urls) {
                Some(images) => {
                    info!(provider, %job_id, attempts, count = images.all_image_urls.len(), "image job ready");
                    PollState::Done(ImageOutcome::Ready(images))
                }
                None => {
                    debug!(provider, %job_id, attempts, "image job pending");
                    PollState::Polling { job_id, attempts }
                }
            },
            Err(e) if e.is_transient() => {
                warn!(provider, %job_id, attempts, error = %e, "status poll failed, will retry");
                PollState::Polling { job_id, attempts }
            }
            Err(e) => {
                warn!(provider, %job_id, attempts, error = %e, "image job failed");
                PollState::Done(ImageOutcome::Failed {
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl<B: GenerationBackend, S: Sleeper> ImageGenerator for JobPoller<B, S> {
    async fn generate(&self, prompt: &str) -> ImageOutcome {
        self.run(prompt).await
    }

    fn provider(&self) -> &'static str {
        self.backend.provider()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_http::HttpError;
    use reqwest::StatusCode;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    struct ScriptedBackend {
        submit: Mutex<Option<Result<String, ImageError>>>,
        polls: Mutex<VecDeque<Result<GenerationJob, ImageError>>>,
        status_calls: AtomicU32,
    }

    impl ScriptedBackend {
        fn new(
            submit: Result<String, ImageError>,
            polls: Vec<Result<GenerationJob, ImageError>>,
        ) -> Self {
            Self {
                submit: Mutex::new(Some(submit)),
                polls: Mutex::new(polls.into()),
                status_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        fn provider(&self) -> &'static str {
            "scripted"
        }

        async fn submit(&self, _prompt: &str) -> Result<String, ImageError> {
            self.submit
                .lock()
                .unwrap()
                .take()
                .expect("submit called once")
        }

        async fn status(&self, job_id: &str) -> Result<GenerationJob, ImageError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.polls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(GenerationJob::pending(job_id)))
        }
    }

    fn poller(backend: ScriptedBackend) -> JobPoller<ScriptedBackend, RecordingSleeper> {
        JobPoller::new(backend, RecordingSleeper::default(), PollPolicy::default())
    }

    fn ready(urls: &[&str]) -> Result<GenerationJob, ImageError> {
        Ok(GenerationJob {
            id: "job-1".into(),
            image_urls: urls.iter().map(|u| u.to_string()).collect(),
        })
    }

    fn api_error(status: u16) -> ImageError {
        ImageError::Http(HttpError::Api {
            status: StatusCode::from_u16(status).unwrap(),
            message: "nope".into(),
            body: String::new(),
            request_id: "req".into(),
        })
    }

    #[tokio::test]
    async fn rejected_submission_never_polls() {
        let p = poller(ScriptedBackend::new(
            Err(ImageError::MissingJobId { body: "{}".into() }),
            vec![],
        ));
        let outcome = p.run("a lighthouse").await;

        assert!(matches!(outcome, ImageOutcome::Failed { .. }));
        assert_eq!(p.backend.status_calls.load(Ordering::SeqCst), 0);
        assert!(p.sleeper.slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn never_ready_exhausts_after_ten_polls_and_nine_pauses() {
        let p = poller(ScriptedBackend::new(Ok("job-1".into()), vec![]));
        let outcome = p.run("a lighthouse").await;

        assert_eq!(outcome, ImageOutcome::Exhausted { attempts: 10 });
        assert_eq!(p.backend.status_calls.load(Ordering::SeqCst), 10);
        let slept = p.sleeper.slept.lock().unwrap();
        assert_eq!(slept.len(), 9);
        assert!(slept.iter().all(|d| *d == Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn ready_on_third_poll_returns_all_urls() {
        let p = poller(ScriptedBackend::new(
            Ok("job-1".into()),
            vec![
                Ok(GenerationJob::pending("job-1")),
                Ok(GenerationJob::pending("job-1")),
                ready(&["https://cdn/1.jpg", "https://cdn/2.jpg"]),
            ],
        ));
        let outcome = p.run("a lighthouse").await;

        assert_eq!(outcome.image_url(), Some("https://cdn/1.jpg"));
        match outcome {
            ImageOutcome::Ready(images) => assert_eq!(images.all_image_urls.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(p.backend.status_calls.load(Ordering::SeqCst), 3);
        assert_eq!(p.sleeper.slept.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn transient_poll_errors_consume_attempts() {
        let p = poller(ScriptedBackend::new(
            Ok("job-1".into()),
            vec![Err(api_error(503)), Err(api_error(429)), ready(&["u"])],
        ));
        let outcome = p.run("x").await;

        assert_eq!(outcome.image_url(), Some("u"));
        assert_eq!(p.backend.status_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_error_while_polling_fails_fast() {
        let p = poller(ScriptedBackend::new(
            Ok("job-1".into()),
            vec![Ok(GenerationJob::pending("job-1")), Err(api_error(404))],
        ));
        let outcome = p.run("x").await;

        assert!(matches!(outcome, ImageOutcome::Failed { .. }));
        assert_eq!(p.backend.status_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_budget_exhausts_without_polling() {
        let backend = ScriptedBackend::new(Ok("job-1".into()), vec![]);
        let p = JobPoller::new(
            backend,
            RecordingSleeper::default(),
            PollPolicy {
                interval: Duration::from_millis(1),
                max_attempts: 0,
            },
        );
        assert_eq!(p.run("x").await, ImageOutcome::Exhausted { attempts: 0 });
        assert_eq!(p.backend.status_calls.load(Ordering::SeqCst), 0);
    }
}
