use crate::error::{Result, TranslateError};
use crate::providers::Provider;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "relay-translate";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslatorConfig {
    /// Default provider when the CLI is not given `--provider`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Model aliases: requested id -> upstream id.
    #[serde(default)]
    pub models: HashMap<String, String>,
    #[serde(default)]
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Log skipped SSE lines at debug level.
    #[serde(default = "default_log_skipped")]
    pub log_skipped: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            log_skipped: default_log_skipped(),
        }
    }
}

fn default_log_skipped() -> bool {
    true
}

impl TranslatorConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TranslateError::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: CLI arg > CWD > XDG config > home dir. Finding nothing is fine.
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Apply the model alias map; unknown ids pass through.
    pub fn resolve_model<'a>(&'a self, requested: &'a str) -> &'a str {
        self.models
            .get(requested)
            .map_or(requested, String::as_str)
    }

    /// The configured default provider, if any.
    pub fn default_provider(&self) -> Result<Option<Provider>> {
        self.provider
            .as_deref()
            .map(|name| {
                Provider::from_name(name)
                    .ok_or_else(|| TranslateError::UnknownProvider(name.to_string()))
            })
            .transpose()
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // CWD
    paths.push(PathBuf::from(format!("{APP_DIR}.toml")));

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join(APP_DIR).join("config.toml"));
    }
    if let Some(home) = home_dir() {
        paths.push(home.join(".config").join(APP_DIR).join("config.toml"));
        paths.push(home.join(format!(".{APP_DIR}.toml")));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
