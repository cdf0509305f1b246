use prism_common::PrismError;
use prism_config::FetchSettings;
use prism_http::{HttpClient, RequestOpts};
use reqwest::ClientBuilder;
use reqwest::redirect::{Attempt, Policy};
use std::net::IpAddr;
use tracing::{info, warn};
use url::{Host, Url};

pub const MAX_URL_LEN: usize = 2048;
const MAX_REDIRECTS: usize = 10;

/// Raw page as downloaded.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: Url,
    pub content_type: Option<String>,
    pub html: String,
}

/// Parse and vet a caller-supplied article URL.
pub fn validate_url(raw: &str, allow_private_hosts: bool) -> Result<Url, PrismError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(PrismError::Input("url is required".into()));
    }
    if raw.len() > MAX_URL_LEN {
        return Err(PrismError::Input(format!(
            "URL too long (max {MAX_URL_LEN} characters)"
        )));
    }
    let url = Url::parse(raw).map_err(|e| PrismError::Input(format!("invalid URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(PrismError::Input("URL must use http or https scheme".into()));
    }
    if !allow_private_hosts && is_internal_host(&url) {
        return Err(PrismError::Input(
            "URLs pointing to private or internal hosts are not allowed".into(),
        ));
    }
    Ok(url)
}

fn is_internal_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => is_private_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_private_ip(IpAddr::V6(ip)),
        Some(Host::Domain(host)) => {
            let host = host.to_ascii_lowercase();
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_private_ip(IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
        }
    }
}

/// Follow redirects only to hosts that would pass [`validate_url`]. A refused
/// hop stops with the redirect response itself.
fn redirect_policy(allow_private_hosts: bool) -> Policy {
    Policy::custom(move |attempt: Attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        match validate_url(attempt.url().as_str(), allow_private_hosts) {
            Ok(_) => attempt.follow(),
            Err(e) => {
                warn!(target_url = %attempt.url(), error = %e, "redirect refused");
                attempt.stop()
            }
        }
    })
}

/// Downloads article pages over plain GET.
#[derive(Clone)]
pub struct PageFetcher {
    client: HttpClient,
    allow_private_hosts: bool,
}

impl PageFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, PrismError> {
        Self::with_builder(settings, |builder| builder)
    }

    /// Build with extra reqwest configuration. The redirect policy is always
    /// the fetcher's own: every hop goes through [`validate_url`].
    pub fn with_builder(
        settings: &FetchSettings,
        configure: impl FnOnce(ClientBuilder) -> ClientBuilder,
    ) -> Result<Self, PrismError> {
        let allow_private_hosts = settings.allow_private_hosts;
        let client = HttpClient::unanchored_with(|builder| {
            configure(builder).redirect(redirect_policy(allow_private_hosts))
        })
        .map_err(|e| PrismError::Config(format!("page fetcher init failed: {e}")))?
        .with_timeout(settings.timeout())
        .with_retries(settings.retries);
        Ok(Self {
            client,
            allow_private_hosts,
        })
    }

    pub async fn fetch(&self, raw_url: &str) -> Result<FetchedPage, PrismError> {
        let url = validate_url(raw_url, self.allow_private_hosts)?;
        let resp = self
            .client
            .get_text(url.as_str(), RequestOpts::default())
            .await
            .map_err(|e| match e.status() {
                // Only a refused hop leaves a redirect status unfollowed.
                Some(status) if status.is_redirection() => PrismError::Input(
                    "URL redirects to a private or internal host, which is not allowed".into(),
                ),
                _ => e.into_upstream("page"),
            })?;

        info!(
            url = %resp.url,
            status = resp.status.as_u16(),
            bytes = resp.body.len(),
            content_type = resp.content_type.as_deref().unwrap_or("-"),
            "page fetched"
        );
        Ok(FetchedPage {
            url: resp.url,
            content_type: resp.content_type,
            html: resp.body,
        })
    }
}
