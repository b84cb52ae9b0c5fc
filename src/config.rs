//! Configuration for waldur-os
//!
//! Handles loading and merging settings from multiple sources:
//! - Default values
//! - System configuration (/etc/waldur/waldur.yml)
//! - User configuration (~/.waldur.yml)
//! - Project configuration (./waldur.yml)
//! - Environment variables
//!
//! Settings only supply defaults; parameters given to a task always win.

use crate::error::{Error, Result};
use crate::modules::ModuleParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Waldur API connection defaults
    pub waldur: WaldurSettings,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Waldur API connection defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaldurSettings {
    /// API URL used when a task does not give `api_url`
    pub api_url: Option<String>,

    /// Token used when a task does not give `access_token`
    pub access_token: Option<String>,

    /// Timeout of a single HTTP request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Verify the API's TLS certificate
    pub validate_certs: bool,
}

impl Default for WaldurSettings {
    fn default() -> Self {
        Self {
            api_url: None,
            access_token: None,
            request_timeout: Duration::from_secs(30),
            validate_certs: true,
        }
    }
}

impl WaldurSettings {
    /// Fill in connection parameters the task left out.
    pub fn apply_defaults(&self, params: &mut ModuleParams) {
        if let Some(ref url) = self.api_url {
            params
                .entry("api_url".to_string())
                .or_insert_with(|| serde_json::json!(url));
        }
        if let Some(ref token) = self.access_token {
            params
                .entry("access_token".to_string())
                .or_insert_with(|| serde_json::json!(token));
        }
        params
            .entry("validate_certs".to_string())
            .or_insert_with(|| serde_json::json!(self.validate_certs));
        params
            .entry("request_timeout".to_string())
            .or_insert_with(|| serde_json::json!(self.request_timeout.as_secs()));
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when neither `-v` nor `RUST_LOG` is given
    pub level: Option<String>,

    /// Output format for log lines on stderr
    pub format: LogFormat,
}

/// Contents of one configuration file.
///
/// Every key is optional so that a file only overrides what it sets, even
/// when it sets a value back to its default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SettingsLayer {
    pub waldur: WaldurLayer,
    pub logging: LoggingLayer,
}

/// `waldur` section of a configuration file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WaldurLayer {
    pub api_url: Option<String>,
    pub access_token: Option<String>,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
    pub validate_certs: Option<bool>,
}

/// `logging` section of a configuration file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingLayer {
    pub level: Option<String>,
    pub format: Option<LogFormat>,
}

impl Settings {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut settings = Settings::default();

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                settings = settings.merge(Self::from_file(&path)?);
            }
        }

        settings.apply_env_overrides();

        Ok(settings)
    }

    /// Get the list of configuration file paths to check
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        // Explicit path takes priority
        if let Some(path) = explicit_path {
            return vec![path.clone()];
        }

        let mut paths = vec![PathBuf::from("/etc/waldur/waldur.yml")];

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".waldur.yml"));
            paths.push(home.join(".config/waldur/waldur.yml"));
        }

        paths.push(PathBuf::from("waldur.yml"));

        if let Ok(env_config) = std::env::var("WALDUR_CONFIG") {
            paths.push(PathBuf::from(env_config));
        }

        paths
    }

    /// Read a single configuration file
    pub fn from_file(path: &Path) -> Result<SettingsLayer> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let parsed = match extension {
            "json" => serde_json::from_str(&content).map_err(|e| e.to_string()),
            "toml" => toml::from_str(&content).map_err(|e| e.to_string()),
            _ => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
        };

        parsed.map_err(|message| Error::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Merge a configuration file into these settings; keys set in `layer` win
    fn merge(self, layer: SettingsLayer) -> Settings {
        let SettingsLayer { waldur, logging } = layer;

        Settings {
            waldur: WaldurSettings {
                api_url: waldur.api_url.or(self.waldur.api_url),
                access_token: waldur.access_token.or(self.waldur.access_token),
                request_timeout: waldur
                    .request_timeout
                    .unwrap_or(self.waldur.request_timeout),
                validate_certs: waldur.validate_certs.unwrap_or(self.waldur.validate_certs),
            },
            logging: LoggingConfig {
                level: logging.level.or(self.logging.level),
                format: logging.format.unwrap_or(self.logging.format),
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("WALDUR_API_URL") {
            self.waldur.api_url = Some(url);
        }

        if let Ok(token) = std::env::var("WALDUR_ACCESS_TOKEN") {
            self.waldur.access_token = Some(token);
        }

        // Whole seconds
        if let Ok(timeout) = std::env::var("WALDUR_REQUEST_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.waldur.request_timeout = Duration::from_secs(secs);
            }
        }

        if let Ok(validate) = std::env::var("WALDUR_VALIDATE_CERTS") {
            match validate.to_lowercase().as_str() {
                "false" | "no" | "0" | "off" => self.waldur.validate_certs = false,
                "true" | "yes" | "1" | "on" => self.waldur.validate_certs = true,
                _ => tracing::warn!("Ignoring WALDUR_VALIDATE_CERTS={}", validate),
            }
        }
    }
}
