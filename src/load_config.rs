use std::fs;
use std::path::Path;

use tracing::{error, info};

use crate::config::{AppConfig, MAX_DEPTH_LIMIT};
use crate::error::{ExportError, Result};

pub const API_KEY_VAR: &str = "NOTION_API_KEY";
pub const BASE_URL_VAR: &str = "NOTION_BASE_URL";

/// Loads an optional static YAML config file (no secrets) and injects the API
/// key from the environment. Fails with [`ExportError::Configuration`] before
/// anything talks to the network.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path_ref) => read_config_file(path_ref)?,
        None => {
            info!("No config file given, using defaults");
            AppConfig::default()
        }
    };

    config.notion.api_key = match std::env::var(API_KEY_VAR) {
        Ok(key) if !key.trim().is_empty() => {
            info!("{API_KEY_VAR} found in env");
            key.trim().to_string()
        }
        Ok(_) => {
            error!("{API_KEY_VAR} environment variable is empty");
            return Err(ExportError::Configuration(format!(
                "{API_KEY_VAR} is empty; set it in the environment or a .env file"
            )));
        }
        Err(e) => {
            error!(error = ?e, "{API_KEY_VAR} environment variable not set");
            return Err(ExportError::Configuration(format!(
                "{API_KEY_VAR} not found; create a .env file or export the variable: {e}"
            )));
        }
    };

    if let Ok(base_url) = std::env::var(BASE_URL_VAR) {
        if !base_url.trim().is_empty() {
            info!(base_url = %base_url, "Overriding Notion base URL from env");
            config.notion.base_url = base_url.trim().to_string();
        }
    }

    validate(&config)?;
    config.trace_loaded();
    Ok(config)
}

fn read_config_file(path_ref: &Path) -> Result<AppConfig> {
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(ExportError::Configuration(format!(
                "failed to read config file {}: {e}",
                path_ref.display()
            )));
        }
    };

    match serde_yaml::from_str::<AppConfig>(&content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(ExportError::Configuration(format!(
                "failed to parse config YAML: {e}"
            )))
        }
    }
}

fn validate(config: &AppConfig) -> Result<()> {
    if config.export.max_depth > MAX_DEPTH_LIMIT {
        return Err(ExportError::Configuration(format!(
            "export.max_depth {} exceeds the limit of {MAX_DEPTH_LIMIT}",
            config.export.max_depth
        )));
    }
    if !(1..=100).contains(&config.notion.page_size) {
        return Err(ExportError::Configuration(format!(
            "notion.page_size must be between 1 and 100, got {}",
            config.notion.page_size
        )));
    }
    if config.notion.base_url.trim().is_empty() {
        return Err(ExportError::Configuration(
            "notion.base_url must not be empty".to_string(),
        ));
    }
    config.notion.retry.validate()
}
