//! Minimal HTTP client with safe logging, retries, and flexible auth.
//!
//! - Request options: headers, [`Auth`], timeout, retries
//! - Never logs secret values; only the auth kind is recorded
//! - Retries network failures, 429 and 5xx with exponential backoff and
//!   `Retry-After` support, up to a per-request budget (zero disables)
//! - Optional *raw* request/response logging via `PRISM_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), prism_http::HttpError> {
//! let client = prism_http::HttpClient::new("https://api.example.com")?;
//! let got: serde_json::Value = client
//!     .get_json("v1/items", prism_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers, body snippets (truncated), retries and final errors, plus
//! a curl-style dump under target `http.raw` when `PRISM_HTTP_RAW=1`.

use prism_common::PrismError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, ClientBuilder, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

const RAW_ENV: &str = "PRISM_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_MAX: usize = 500;

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        body: String,
        request_id: String,
    },
}

impl HttpError {
    /// HTTP status of the final response, if one was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether another attempt at the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Decode(..) => true,
            Self::Api { status, .. } => is_retryable(*status),
            Self::Url(_) | Self::Build(_) => false,
        }
    }

    /// Convert into the shared taxonomy, keeping status and body for diagnosis.
    pub fn into_upstream(self, service: &'static str) -> PrismError {
        match self {
            Self::Api {
                status,
                message,
                body,
                ..
            } => PrismError::Upstream {
                service,
                status: Some(status.as_u16()),
                message,
                body: Some(body),
            },
            Self::Decode(msg, snippet) => PrismError::Upstream {
                service,
                status: None,
                message: format!("unexpected response body: {msg}"),
                body: Some(snippet),
            },
            other => PrismError::upstream(service, other.to_string()),
        }
    }
}

// ==============================
// Auth & Request Options
// ==============================

/// Authentication strategies supported by the HTTP client helpers.
///
/// ```
/// use prism_http::Auth;
///
/// let bearer = Auth::Bearer("token");
/// match bearer {
///     Auth::Bearer(value) => assert_eq!(value, "token"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// Authorization: Bearer <token>
    Bearer(&'a str),
    /// Custom header (e.g., Anthropic: x-api-key)
    Header {
        name: HeaderName,
        value: HeaderValue,
    },
    None,
}

impl Auth<'_> {
    /// Build a custom-header auth, rejecting values that are not valid header text.
    pub fn header(name: &'static str, value: &str) -> Result<Self, HttpError> {
        let value = HeaderValue::from_str(&sanitize_api_key(value)?)
            .map_err(|e| HttpError::Build(format!("invalid {name} header: {e}")))?;
        Ok(Auth::Header {
            name: HeaderName::from_static(name),
            value,
        })
    }

    fn kind(&self) -> &'static str {
        match self {
            Auth::Bearer(_) => "bearer",
            Auth::Header { .. } => "header",
            Auth::None => "none",
        }
    }
}

/// Per-request tuning knobs for the HTTP client.
///
/// ```
/// use prism_http::{Auth, RequestOpts};
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(0),
///     auth: Some(Auth::Bearer("demo")),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(opts.allow_absolute == false);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    /// If true and `path` is an absolute URL, use it as-is (ignore base).
    pub allow_absolute: bool,
}

/// A successful non-JSON response.
#[derive(Debug, Clone)]
pub struct TextResponse {
    /// Final URL after redirects.
    pub url: Url,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

struct Received {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    bytes: Vec<u8>,
}

struct RawResponse {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    bytes: Vec<u8>,
    req_id: String,
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    base: Option<Url>,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// A trailing slash is added to the base so relative paths are appended
    /// rather than replacing its last segment.
    ///
    /// ```no_run
    /// use prism_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com/v1")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let mut normalized = base.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base = Url::parse(&normalized).map_err(|e| HttpError::Url(e.to_string()))?;
        Ok(Self {
            base: Some(base),
            ..Self::unanchored()?
        })
    }

    /// Construct a client without a base; every path must be an absolute URL.
    pub fn unanchored() -> Result<Self, HttpError> {
        Self::unanchored_with(|builder| builder)
    }

    /// Like [`unanchored`](Self::unanchored), with a hook over the reqwest
    /// builder for redirect policy, DNS pinning and the like.
    pub fn unanchored_with(
        configure: impl FnOnce(ClientBuilder) -> ClientBuilder,
    ) -> Result<Self, HttpError> {
        let builder = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("prism/", env!("CARGO_PKG_VERSION")));
        let inner = configure(builder)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base: None,
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 2,
        })
    }

    /// Override the default timeout.
    ///
    /// ```no_run
    /// use prism_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com")?
    ///     .with_timeout(Duration::from_secs(2));
    /// assert_eq!(client.default_timeout, Duration::from_secs(2));
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Override the default retry budget.
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    /// GET JSON with per-request options.
    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let raw = self.execute(Method::GET, path, None, &opts).await?;
        decode_json(&raw)
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let bytes = serde_json::to_vec(body).map_err(|e| HttpError::Build(e.to_string()))?;
        let raw = self.execute(Method::POST, path, Some(bytes), &opts).await?;
        decode_json(&raw)
    }

    /// GET a text body (HTML, plain text). Invalid UTF-8 is replaced lossily.
    pub async fn get_text(
        &self,
        path: &str,
        opts: RequestOpts<'_>,
    ) -> Result<TextResponse, HttpError> {
        let raw = self.execute(Method::GET, path, None, &opts).await?;
        let content_type = raw
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(TextResponse {
            url: raw.url,
            status: raw.status,
            content_type,
            body: String::from_utf8_lossy(&raw.bytes).into_owned(),
        })
    }

    fn resolve(&self, path: &str, allow_absolute: bool) -> Result<Url, HttpError> {
        match &self.base {
            Some(base) => {
                if allow_absolute {
                    if let Ok(abs) = Url::parse(path) {
                        return Ok(abs);
                    }
                }
                base.join(path.trim_start_matches('/'))
                    .map_err(|e| HttpError::Url(e.to_string()))
            }
            None => Url::parse(path).map_err(|e| HttpError::Url(e.to_string())),
        }
    }

    /// One round-trip: send, then read the whole body.
    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&[u8]>,
        opts: &RequestOpts<'_>,
        bearer: Option<&str>,
        timeout: Duration,
    ) -> Result<Received, reqwest::Error> {
        let mut rb = self
            .inner
            .request(method.clone(), url.clone())
            .timeout(timeout);
        if let Some(bytes) = body {
            rb = rb
                .header(CONTENT_TYPE, "application/json")
                .body(bytes.to_vec());
        }
        if let Some(extra) = &opts.headers {
            rb = rb.headers(extra.clone());
        }
        if let Some(token) = bearer {
            rb = rb.bearer_auth(token);
        }
        if let Some(Auth::Header { name, value }) = &opts.auth {
            rb = rb.header(name, value);
        }

        let resp = rb.send().await?;
        let status = resp.status();
        let url = resp.url().clone();
        let headers = resp.headers().clone();
        let bytes = resp.bytes().await?.to_vec();
        Ok(Received {
            url,
            status,
            headers,
            bytes,
        })
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        opts: &RequestOpts<'_>,
    ) -> Result<RawResponse, HttpError> {
        let url = self.resolve(path, opts.allow_absolute)?;
        let budget = opts.retries.unwrap_or(self.max_retries);
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let auth_kind = opts.auth.as_ref().map(Auth::kind).unwrap_or("none");
        let bearer = match &opts.auth {
            Some(Auth::Bearer(token)) => Some(sanitize_api_key(token)?),
            _ => None,
        };
        let req_id = uuid::Uuid::new_v4().simple().to_string();
        let target = format!("{}{}", url.host_str().unwrap_or("-"), url.path());

        if raw_enabled() {
            let headers = opts.headers.clone().unwrap_or_default();
            let curl = make_curl(&method, &url, &headers, body.as_deref());
            tracing::debug!(target: "http.raw", %req_id, %curl, "request");
        }

        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let can_retry = attempt <= budget;
            tracing::debug!(
                %req_id,
                attempt,
                budget,
                %method,
                %target,
                timeout_ms = timeout.as_millis() as u64,
                auth_kind,
                has_body = body.is_some(),
                "http.request.start"
            );

            let started = Instant::now();
            let received = match self
                .send_once(&method, &url, body.as_deref(), opts, bearer.as_deref(), timeout)
                .await
            {
                Ok(received) => received,
                Err(err) if can_retry => {
                    let delay = backoff(attempt);
                    tracing::warn!(
                        %req_id,
                        attempt,
                        budget,
                        backoff_ms = delay.as_millis() as u64,
                        message = %err,
                        "http.retrying.network"
                    );
                    sleep(delay).await;
                    continue;
                }
                Err(err) => {
                    tracing::warn!(%req_id, attempt, message = %err, "http.network_error");
                    return Err(HttpError::Network(err.to_string()));
                }
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;
            let Received {
                url: final_url,
                status,
                headers,
                bytes,
            } = received;

            let upstream_id = headers
                .get("x-request-id")
                .or_else(|| headers.get("request-id"))
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();
            tracing::debug!(
                %req_id,
                %status,
                elapsed_ms,
                body_len = bytes.len(),
                x_request_id = %upstream_id,
                "http.response.headers"
            );
            if raw_enabled() {
                log_raw_response(&req_id, status, elapsed_ms, &headers, &bytes);
            }

            let snippet = snip_body(&bytes);
            tracing::trace!(%req_id, body_snippet = %snippet, "http.response.body_snippet");

            if status.is_success() {
                return Ok(RawResponse {
                    url: final_url,
                    status,
                    headers,
                    bytes,
                    req_id,
                });
            }

            let message = extract_error_message(&bytes);
            if can_retry && is_retryable(status) {
                let delay = retry_delay(status, &headers, attempt);
                tracing::warn!(
                    %req_id,
                    %status,
                    attempt,
                    budget,
                    backoff_ms = delay.as_millis() as u64,
                    %message,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                %req_id,
                %status,
                %message,
                x_request_id = %upstream_id,
                body_snippet = %snippet,
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                message,
                body: snippet,
                request_id: upstream_id,
            });
        }
    }
}

// ==============================
// Helpers
// ==============================

fn decode_json<T: DeserializeOwned>(raw: &RawResponse) -> Result<T, HttpError> {
    serde_json::from_slice::<T>(&raw.bytes).map_err(|e| {
        let snippet = snip_body(&raw.bytes);
        tracing::warn!(
            req_id=%raw.req_id,
            serde_line=%e.line(),
            serde_col=%e.column(),
            serde_err=%e,
            body_snippet=%snippet,
            "http.response.decode_error"
        );
        HttpError::Decode(e.to_string(), snippet)
    })
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// `Retry-After` when the server sends one; 429s wait at least 1.1 s.
fn retry_delay(status: StatusCode, headers: &HeaderMap, attempt: usize) -> Duration {
    match retry_after_delay_secs(headers) {
        Some(secs) => Duration::from_secs(secs),
        None if status == StatusCode::TOO_MANY_REQUESTS => {
            backoff(attempt).max(Duration::from_millis(1100))
        }
        None => backoff(attempt),
    }
}

fn log_raw_response(
    req_id: &str,
    status: StatusCode,
    elapsed_ms: u64,
    headers: &HeaderMap,
    bytes: &[u8],
) {
    let truncated = bytes.len() > RAW_MAX_BODY;
    let text = String::from_utf8_lossy(&bytes[..bytes.len().min(RAW_MAX_BODY)]);
    tracing::info!(
        target: "http.raw",
        %req_id,
        %status,
        elapsed_ms,
        headers = ?redact_headers(headers),
        body = %text,
        truncated
    );
}

fn backoff(attempt: usize) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1 << (attempt.saturating_sub(1)).min(16)))
}

/// Render a best-effort curl command for repro/debug, with secrets redacted.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap, body: Option<&[u8]>) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", method)];
    for (name, val) in redact_headers(headers) {
        parts.push(format!("-H '{}: {}'", name, val.replace('\'', r"'\''")));
    }
    if let Some(bytes) = body {
        match std::str::from_utf8(bytes) {
            Ok(s) => {
                let s = truncate_chars(s, RAW_MAX_BODY);
                parts.push(format!("-d '{}'", s.replace('\'', r"'\''")));
            }
            Err(_) => parts.push(format!("--data-binary @- # ({} bytes)", bytes.len())),
        }
    }
    parts.push(format!("'{}'", url.as_str()));
    parts.join(" ")
}

fn is_secret_header(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "authorization" | "x-api-key" | "api-key" | "cookie" | "set-cookie"
    )
}

fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let val = if is_secret_header(&key) {
                "<redacted>".to_string()
            } else {
                v.to_str().unwrap_or("").to_string()
            };
            (key, val)
        })
        .collect()
}

/// Pull a human-readable message out of the common provider error envelopes.
fn extract_error_message(body: &[u8]) -> String {
    // {"error":{"message":"..."}} (OpenAI, Anthropic)
    #[derive(Deserialize)]
    struct Nested {
        error: NestedDetail,
    }
    #[derive(Deserialize)]
    struct NestedDetail {
        message: String,
    }

    // {"errors":[{"message":"..."}]} (Runware)
    #[derive(Deserialize)]
    struct ErrorList {
        errors: Vec<ListedErr>,
    }
    #[derive(Deserialize)]
    struct ListedErr {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
    }

    // {"message":"..."} | {"detail":"..."} | {"error":"..."} (Leonardo, generic)
    #[derive(Deserialize)]
    struct Flat {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(env) = serde_json::from_slice::<Nested>(body) {
        return env.error.message;
    }
    if let Ok(list) = serde_json::from_slice::<ErrorList>(body) {
        if let Some(first) = list.errors.into_iter().next() {
            if !first.message.is_empty() {
                return first.message;
            }
            if !first.detail.is_empty() {
                return first.detail;
            }
        }
    }
    if let Ok(m) = serde_json::from_slice::<Flat>(body) {
        for s in [m.message, m.detail, m.error] {
            if !s.is_empty() {
                return s;
            }
        }
    }
    snip_body(body)
}

fn retry_after_delay_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .trim()
        .parse()
        .ok()
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

fn snip_body(body: &[u8]) -> String {
    truncate_chars(&String::from_utf8_lossy(body), SNIPPET_MAX)
}

fn sanitize_api_key(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if s.is_empty() {
        return Err(HttpError::Build("API key is empty".into()));
    }
    if !s.is_ascii() {
        return Err(HttpError::Build("API key contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "API key contains control characters".into(),
        ));
    }
    Ok(s)
}
