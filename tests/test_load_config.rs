use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

use notion_kb_export::config::{DEFAULT_BASE_URL, DEFAULT_MAX_DEPTH};
use notion_kb_export::load_config::{load_config, API_KEY_VAR, BASE_URL_VAR};
use notion_kb_export::ExportError;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

/// A static config file plus the key from the environment gives a full config.
#[test]
#[serial]
fn test_load_config_merges_file_and_env() {
    let yaml = r#"
notion:
  rate_limit_delay_ms: 500
  page_size: 50
  retry:
    max_retries: 1
export:
  output_dir: ./tmp/exports
  max_depth: 2
  table_of_contents: true
"#;
    let file = config_file(yaml);
    env::set_var(API_KEY_VAR, "secret_from_env");
    env::remove_var(BASE_URL_VAR);

    let config = load_config(Some(file.path())).expect("Config should load");

    assert_eq!(config.notion.api_key, "secret_from_env");
    assert_eq!(config.notion.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.notion.rate_limit_delay, Duration::from_millis(500));
    assert_eq!(config.notion.page_size, 50);
    assert_eq!(config.notion.retry.max_retries, 1);
    assert_eq!(config.export.output_dir, PathBuf::from("./tmp/exports"));
    assert_eq!(config.export.max_depth, 2);
    assert!(config.export.table_of_contents);
    assert!(!config.export.page_metadata);
}

#[test]
#[serial]
fn test_load_config_without_file_uses_defaults() {
    env::set_var(API_KEY_VAR, "secret");
    env::remove_var(BASE_URL_VAR);

    let config = load_config(None).unwrap();
    assert_eq!(config.export.max_depth, DEFAULT_MAX_DEPTH);
    assert_eq!(config.export.output_dir, PathBuf::from("output"));
}

#[test]
#[serial]
fn test_missing_api_key_is_configuration_error() {
    env::remove_var(API_KEY_VAR);
    let err = load_config(None).unwrap_err();
    assert!(matches!(err, ExportError::Configuration(ref msg) if msg.contains(API_KEY_VAR)));

    env::set_var(API_KEY_VAR, "   ");
    let err = load_config(None).unwrap_err();
    assert!(matches!(err, ExportError::Configuration(_)));
}

#[test]
#[serial]
fn test_api_key_in_file_is_ignored() {
    let file = config_file("notion:\n  api_key: from_file\n");
    env::set_var(API_KEY_VAR, "from_env");
    env::remove_var(BASE_URL_VAR);

    let config = load_config(Some(file.path())).unwrap();
    assert_eq!(config.notion.api_key, "from_env");
}

#[test]
#[serial]
fn test_base_url_env_override() {
    env::set_var(API_KEY_VAR, "secret");
    env::set_var(BASE_URL_VAR, "http://127.0.0.1:9999/v1");

    let config = load_config(None).unwrap();
    assert_eq!(config.notion.base_url, "http://127.0.0.1:9999/v1");
    env::remove_var(BASE_URL_VAR);
}

#[test]
#[serial]
fn test_invalid_values_are_rejected() {
    env::set_var(API_KEY_VAR, "secret");
    env::remove_var(BASE_URL_VAR);

    let too_deep = config_file("export:\n  max_depth: 40\n");
    assert!(matches!(
        load_config(Some(too_deep.path())),
        Err(ExportError::Configuration(_))
    ));

    let bad_page_size = config_file("notion:\n  page_size: 0\n");
    assert!(matches!(
        load_config(Some(bad_page_size.path())),
        Err(ExportError::Configuration(_))
    ));

    let not_yaml = config_file("export: [unterminated");
    assert!(matches!(
        load_config(Some(not_yaml.path())),
        Err(ExportError::Configuration(_))
    ));
}

#[test]
#[serial]
fn test_unusable_retry_settings_are_rejected() {
    env::set_var(API_KEY_VAR, "secret");
    env::remove_var(BASE_URL_VAR);

    for multiplier in ["-2.0", ".nan", ".inf", "0.5"] {
        let file = config_file(&format!(
            "notion:\n  retry:\n    backoff_multiplier: {multiplier}\n"
        ));
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(
            matches!(err, ExportError::Configuration(ref msg) if msg.contains("backoff_multiplier")),
            "multiplier {multiplier} should be rejected, got {err:?}"
        );
    }

    let file = config_file("notion:\n  retry:\n    max_retries: 2000\n    backoff_multiplier: 3.0\n");
    let config = load_config(Some(file.path())).expect("large retry counts are allowed");
    assert_eq!(
        config.notion.retry.backoff(1100),
        config.notion.retry.max_delay
    );
}

#[test]
#[serial]
fn test_missing_config_file_is_reported() {
    env::set_var(API_KEY_VAR, "secret");
    let err = load_config(Some(std::path::Path::new("/no/such/config.yaml"))).unwrap_err();
    assert!(matches!(err, ExportError::Configuration(ref msg) if msg.contains("config.yaml")));
}
