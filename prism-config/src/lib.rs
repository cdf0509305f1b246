//! Loader for service configuration with YAML + environment overlays.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults (every section is optional),
//! 2. an optional YAML/TOML/JSON file (`prism.yaml` for the server binary),
//! 3. `PRISM__SECTION__KEY` environment variables.
//!
//! After merging, every string is run through `${VAR}` expansion. Provider
//! credentials additionally fall back to their conventional environment
//! variables (`ANTHROPIC_API_KEY`, `LEONARDO_API_KEY`, ...), so a bare
//! environment is enough to run the service.
use config::{Config, ConfigError, Environment, File};
use prism_common::observability::{LogConfig, LogFormat};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrismConfig {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub llm: LlmSettings,
    pub images: ImageSettings,
    pub pipeline: PipelineSettings,
    pub fetch: FetchSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    /// Echo upstream status/body and configuration specifics to callers.
    pub expose_diagnostics: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".into(),
            expose_diagnostics: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    pub dir: Option<PathBuf>,
    pub stderr: bool,
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            dir: None,
            stderr: true,
            filter: "info".into(),
        }
    }
}

impl LoggingSettings {
    pub fn to_log_config(&self, app_name: &str) -> LogConfig {
        LogConfig {
            app_name: app_name.to_string(),
            log_dir: self.dir.clone(),
            emit_stderr: self.stderr,
            format: self.format,
            default_filter: self.filter.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Anthropic,
    Openai,
}

impl LlmProvider {
    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Openai => "OPENAI_API_KEY",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::Anthropic => "claude-3-5-haiku-20241022",
            Self::Openai => "gpt-4o-mini",
        }
    }

    pub fn default_endpoint(self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::Openai => "https://api.openai.com/v1",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Anthropic,
            model: None,
            api_key: None,
            endpoint: None,
            max_tokens: 600,
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

impl LlmSettings {
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(self.provider.default_model())
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(self.provider.default_endpoint())
    }

    pub fn api_key(&self) -> Option<String> {
        credential(self.api_key.as_deref(), self.provider.api_key_env())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// How the pipeline fills `imageUrl` on each view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImagePolicy {
    /// Leave `imageUrl` absent.
    None,
    /// Stable placeholder URL keyed by the view's position.
    #[default]
    Placeholder,
    /// Generate one image per view; failures leave `imageUrl` absent.
    Generate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageProvider {
    #[default]
    Leonardo,
    Runware,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub policy: ImagePolicy,
    /// Provider used by the pipeline when `policy` is `generate`.
    pub provider: ImageProvider,
    pub leonardo: LeonardoSettings,
    pub runware: RunwareSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LeonardoSettings {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model_id: String,
    pub style_uuid: Option<String>,
    pub width: u32,
    pub height: u32,
    pub num_images: u32,
    pub contrast: f32,
    pub alchemy: bool,
    pub enhance_prompt: bool,
    pub poll_interval_secs: u64,
    pub max_attempts: u32,
    pub timeout_secs: u64,
}

impl Default for LeonardoSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://cloud.leonardo.ai/api/rest/v1".into(),
            model_id: "6b645e3a-d64f-4341-a6d8-7a3690fbf042".into(),
            style_uuid: Some("111dc692-d470-4eec-b791-3475abac4c46".into()),
            width: 1472,
            height: 832,
            num_images: 4,
            contrast: 3.5,
            alchemy: true,
            enhance_prompt: false,
            poll_interval_secs: 7,
            max_attempts: 10,
            timeout_secs: 30,
        }
    }
}

impl LeonardoSettings {
    pub fn api_key(&self) -> Option<String> {
        credential(self.api_key.as_deref(), "LEONARDO_API_KEY")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunwareSettings {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub number_results: u32,
    pub timeout_secs: u64,
}

impl Default for RunwareSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.runware.ai/v1".into(),
            model: "civitai:102438@133677".into(),
            width: 1024,
            height: 704,
            number_results: 1,
            timeout_secs: 60,
        }
    }
}

impl RunwareSettings {
    pub fn api_key(&self) -> Option<String> {
        credential(self.api_key.as_deref(), "RUNWARE_API_KEY")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Exact number of views a generation must yield; `None` accepts 1..=6.
    pub expected_views: Option<usize>,
    /// Article text is cut to this many characters before prompting.
    pub max_input_chars: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            expected_views: Some(3),
            max_input_chars: 12_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    pub retries: usize,
    /// Permit loopback, private and `.local`/`.internal` hosts.
    pub allow_private_hosts: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            retries: 1,
            allow_private_hosts: false,
        }
    }
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// A configured secret counts only if it is non-empty and fully expanded;
/// otherwise the conventional environment variable is consulted.
///
/// ```
/// use prism_config::credential;
///
/// assert_eq!(credential(Some("sk-1"), "PRISM_DOCTEST_UNSET"), Some("sk-1".into()));
/// assert_eq!(credential(Some("${PRISM_DOCTEST_UNSET}"), "PRISM_DOCTEST_UNSET"), None);
/// assert_eq!(credential(Some("   "), "PRISM_DOCTEST_UNSET"), None);
/// ```
pub fn credential(configured: Option<&str>, env_var: &str) -> Option<String> {
    fn usable(s: &str) -> Option<String> {
        let t = s.trim();
        (!t.is_empty() && !t.contains("${")).then(|| t.to_string())
    }

    configured
        .and_then(usable)
        .or_else(|| std::env::var(env_var).ok().as_deref().and_then(usable))
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (files + env overrides).
pub struct PrismConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_prefix: String,
}

impl Default for PrismConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PrismConfigLoader {
    /// Start with built-in defaults; `PRISM__` env overrides are applied last.
    ///
    /// ```
    /// use prism_config::PrismConfigLoader;
    ///
    /// let config = PrismConfigLoader::new().load().expect("defaults load");
    /// assert_eq!(config.server.bind, "0.0.0.0:3000");
    /// assert_eq!(config.pipeline.expected_views, Some(3));
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            env_prefix: "PRISM".into(),
        }
    }

    /// Use a different environment prefix (tests isolate themselves this way).
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    /// Attach a required file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be absent (headless deployments rely on env).
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use prism_config::{ImagePolicy, PrismConfigLoader};
    ///
    /// let cfg = PrismConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// images:
    ///   policy: generate
    ///   leonardo:
    ///     max_attempts: 4
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.images.policy, ImagePolicy::Generate);
    /// assert_eq!(cfg.images.leonardo.max_attempts, 4);
    /// assert_eq!(cfg.images.leonardo.poll_interval_secs, 7);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into typed settings.
    pub fn load(self) -> Result<PrismConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
