//! Application configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::store::ConfigStore;
use crate::error::ConfigError;
use crate::scanner::plugin::{AlertThreshold, AttackStrength};
use crate::scanner::ScannerParam;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Transport settings
    pub http: HttpConfig,

    /// Scan engine and injectable locations
    pub scanner: ScannerParam,

    /// Policy defaults
    pub policy: PolicyConfig,

    /// Per-plugin tunables (`[plugins.p<id>]` tables)
    pub plugins: toml::Table,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub request_timeout: u64,

    /// Follow redirects
    pub follow_redirects: bool,

    /// Maximum redirect depth
    pub max_redirects: usize,

    /// User agent string
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Policy preset name (standard, quick, full, api)
    pub name: String,

    /// Threshold used by plugins left at DEFAULT
    pub default_threshold: AlertThreshold,

    /// Strength used by plugins left at DEFAULT
    pub default_strength: AttackStrength,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: 30,
            follow_redirects: false,
            max_redirects: 10,
            user_agent: format!("ascan/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            name: "standard".to_string(),
            default_threshold: AlertThreshold::Medium,
            default_strength: AttackStrength::Medium,
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing default file yields the defaults; a missing explicit path is an error.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) => {
                let p = PathBuf::from(p);
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.display().to_string()).into());
                }
                p
            }
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).map_err(|source| ConfigError::ReadError {
                    path: config_path.display().to_string(),
                    source,
                })?;

            let config: Config = toml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;

            tracing::info!("Loaded configuration from {:?}", config_path);
            Ok(config)
        } else {
            tracing::info!("No configuration file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: Option<&str>) -> Result<()> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, contents)?;

        tracing::info!("Saved configuration to {:?}", config_path);
        Ok(())
    }

    /// Plugin tunables as a dotted-key store (`plugins.p<id>.<key>`)
    pub fn plugin_store(&self) -> ConfigStore {
        ConfigStore::from_toml("plugins", &self.plugins)
    }

    /// Validate values that serde cannot check on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scanner.hosts_per_scan == 0 {
            return Err(ConfigError::ValidationError {
                field: "scanner.hosts_per_scan".into(),
                reason: "must be at least 1".into(),
            });
        }
        for excluded in &self.scanner.excluded_params {
            if let Err(e) = regex::Regex::new(&excluded.name) {
                return Err(ConfigError::ValidationError {
                    field: "scanner.excluded_params".into(),
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Get default configuration file path
    fn default_config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("io", "ascan", "ascan")
            .context("Failed to determine config directory")?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Directory for logs and reports
    pub fn data_dir() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("io", "ascan", "ascan")
            .context("Failed to determine data directory")?;

        Ok(dirs.data_dir().to_path_buf())
    }
}
