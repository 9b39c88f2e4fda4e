use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-user and per-project configuration directory
pub const CONFIG_DIR: &str = ".towerdash";

/// A validation error in the configuration
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.field, self.message)
    }
}

/// How the container list is printed. Unset values fall back to defaults,
/// so a config layer only overrides what it names.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DisplayConfig {
    /// Characters of an image timestamp to show (10 = the date part)
    #[serde(default)]
    pub date_width: Option<usize>,
    #[serde(default)]
    pub show_up_to_date: Option<bool>,
}

impl DisplayConfig {
    pub fn date_width(&self) -> usize {
        self.date_width.unwrap_or(10)
    }

    pub fn show_up_to_date(&self) -> bool {
        self.show_up_to_date.unwrap_or(true)
    }

    fn merge(&mut self, other: DisplayConfig) {
        if other.date_width.is_some() {
            self.date_width = other.date_width;
        }
        if other.show_up_to_date.is_some() {
            self.show_up_to_date = other.show_up_to_date;
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Base URL of the watchtower HTTP API, e.g. `http://host:8080/v1`
    #[serde(default)]
    pub api_url: Option<String>,
    /// Where a remembered token is kept
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    /// Where activity logs are written
    #[serde(default)]
    pub activity_dir: Option<PathBuf>,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl Config {
    /// Load configuration from default paths
    /// Priority: local (.towerdash/config.local.toml) > project (.towerdash/config.toml) > user (~/.towerdash/config.toml)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(CONFIG_DIR).join("config.toml");
            if user_config.exists() {
                config.merge(Self::load_from(&user_config)?);
            }
        }

        let project_config = Path::new(CONFIG_DIR).join("config.toml");
        if project_config.exists() {
            config.merge(Self::load_from(&project_config)?);
        }

        // Should be gitignored
        let local_config = Path::new(CONFIG_DIR).join("config.local.toml");
        if local_config.exists() {
            config.merge(Self::load_from(&local_config)?);
        }

        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Merge another config into this one (other takes priority for set values)
    pub fn merge(&mut self, other: Config) {
        if other.api_url.is_some() {
            self.api_url = other.api_url;
        }
        if other.storage_dir.is_some() {
            self.storage_dir = other.storage_dir;
        }
        if other.activity_dir.is_some() {
            self.activity_dir = other.activity_dir;
        }
        if other.request_timeout_ms.is_some() {
            self.request_timeout_ms = other.request_timeout_ms;
        }
        self.display.merge(other.display);
    }

    /// Directory for remembered credentials, defaulting to ~/.towerdash/storage
    pub fn storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .unwrap_or_else(|| base_dir().join("storage"))
    }

    /// Directory for activity logs, defaulting to ~/.towerdash/activity
    pub fn activity_dir(&self) -> PathBuf {
        self.activity_dir
            .clone()
            .unwrap_or_else(|| base_dir().join("activity"))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Validate configuration and return any errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Some(url) = &self.api_url {
            if let Err(message) = validate_api_url(url) {
                errors.push(ValidationError {
                    field: "api_url".to_string(),
                    message,
                });
            }
        }

        if self.request_timeout_ms == Some(0) {
            errors.push(ValidationError {
                field: "request_timeout_ms".to_string(),
                message: "Must be greater than 0 (omit it for no timeout)".to_string(),
            });
        }

        if self.display.date_width == Some(0) {
            errors.push(ValidationError {
                field: "display.date_width".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn base_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR))
        .unwrap_or_else(|| PathBuf::from(CONFIG_DIR))
}

/// Check that an API base path looks like an http(s) URL
pub fn validate_api_url(url: &str) -> Result<(), String> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| format!("Expected an http:// or https:// URL, got '{}'", url))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(format!("Missing host in '{}'", url));
    }
    Ok(())
}
