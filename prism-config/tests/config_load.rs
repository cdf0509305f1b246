use prism_config::{ImagePolicy, ImageProvider, LlmProvider, PrismConfigLoader};
use prism_common::observability::LogFormat;
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

#[test]
#[serial]
fn test_config_load() {
    let tmp = TempDir::new().unwrap();

    let file_yaml = r#"
server:
  bind: "127.0.0.1:8080"
logging:
  format: json
llm:
  provider: openai
  model: "gpt-4o-mini"
  api_key: "${PRISM_TEST_OPENAI_KEY}"
  temperature: 0.2
  max_tokens: 512
images:
  policy: generate
  provider: runware
  runware:
    api_key: "${PRISM_TEST_RUNWARE_KEY}"
    width: 512
pipeline:
  expected_views: 4
"#;
    let p = write_yaml(&tmp, "prism.yaml", file_yaml);

    temp_env::with_vars(
        [
            ("PRISM_TEST_OPENAI_KEY", Some("sk-from-env")),
            ("PRISM_TEST_RUNWARE_KEY", Some("rw-from-env")),
        ],
        || {
            let config = PrismConfigLoader::new()
                .with_env_prefix("PRISM_TEST_LOAD")
                .with_file(&p)
                .load()
                .expect("load system config");

            assert_eq!(config.server.bind, "127.0.0.1:8080");
            assert_eq!(config.logging.format, LogFormat::Json);
            assert_eq!(config.llm.provider, LlmProvider::Openai);
            assert_eq!(config.llm.api_key().as_deref(), Some("sk-from-env"));
            assert_eq!(config.llm.max_tokens, 512);
            assert_eq!(config.images.policy, ImagePolicy::Generate);
            assert_eq!(config.images.provider, ImageProvider::Runware);
            assert_eq!(config.images.runware.api_key().as_deref(), Some("rw-from-env"));
            assert_eq!(config.images.runware.width, 512);
            assert_eq!(config.images.runware.height, 704);
            assert_eq!(config.pipeline.expected_views, Some(4));
            assert_eq!(config.pipeline.max_input_chars, 12_000);
        },
    );
}

#[test]
#[serial]
fn env_overrides_file_values() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(
        &tmp,
        "prism.yaml",
        "server:\n  bind: \"127.0.0.1:8080\"\nimages:\n  leonardo:\n    max_attempts: 3\n",
    );

    temp_env::with_vars(
        [
            ("PRISM_ENV_OVR__SERVER__BIND", Some("0.0.0.0:9999")),
            ("PRISM_ENV_OVR__IMAGES__LEONARDO__MAX_ATTEMPTS", Some("12")),
        ],
        || {
            let config = PrismConfigLoader::new()
                .with_env_prefix("PRISM_ENV_OVR")
                .with_file(&p)
                .load()
                .expect("load");
            assert_eq!(config.server.bind, "0.0.0.0:9999");
            assert_eq!(config.images.leonardo.max_attempts, 12);
        },
    );
}

#[test]
#[serial]
fn missing_optional_file_falls_back_to_defaults() {
    let tmp = TempDir::new().unwrap();
    let config = PrismConfigLoader::new()
        .with_env_prefix("PRISM_TEST_MISSING")
        .with_optional_file(tmp.path().join("absent.yaml"))
        .load()
        .expect("defaults");

    assert_eq!(config.images.policy, ImagePolicy::Placeholder);
    assert_eq!(config.images.provider, ImageProvider::Leonardo);
    assert_eq!(config.images.leonardo.poll_interval_secs, 7);
    assert_eq!(config.images.leonardo.max_attempts, 10);
    assert!(!config.server.expose_diagnostics);
}

#[test]
#[serial]
fn missing_required_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let result = PrismConfigLoader::new()
        .with_env_prefix("PRISM_TEST_REQUIRED")
        .with_file(tmp.path().join("absent.yaml"))
        .load();
    assert!(result.is_err());
}
