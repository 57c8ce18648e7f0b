use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vulnsieve_core::config::DEFAULT_MAX_FILES;
use vulnsieve_core::ScanConfig;

use crate::cve::NVD_API_BASE;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown config key: {0}")]
    UnknownKey(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Scanner defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Maximum files visited per scan
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Descend into subdirectories
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            recursive: default_recursive(),
        }
    }
}

/// CVE lookup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CveSettings {
    /// NVD CVE API base URL
    #[serde(default = "default_cve_url")]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CveSettings {
    fn default() -> Self {
        Self {
            url: default_cve_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogSettings {
    /// Filter directive used when RUST_LOG is unset
    #[serde(default)]
    pub level: Option<String>,
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanSettings,

    #[serde(default)]
    pub cve: CveSettings,

    #[serde(default)]
    pub log: LogSettings,
}

fn default_max_files() -> usize {
    DEFAULT_MAX_FILES
}

fn default_recursive() -> bool {
    true
}

fn default_cve_url() -> String {
    NVD_API_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Config {
    /// Load configuration from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get the config file path
    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("vulnsieve").join("config.toml"))
    }

    /// Merge with environment variables (env vars take precedence)
    pub fn merge_with_env(mut self) -> Self {
        if let Ok(raw) = std::env::var("VULNSIEVE_SCAN_MAX_FILES") {
            match raw.trim().parse() {
                Ok(max_files) => self.scan.max_files = max_files,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid VULNSIEVE_SCAN_MAX_FILES"),
            }
        }

        if let Ok(raw) = std::env::var("VULNSIEVE_SCAN_RECURSIVE") {
            self.scan.recursive = parse_bool(&raw);
        }

        if let Ok(url) = std::env::var("VULNSIEVE_CVE_URL") {
            self.cve.url = url;
        }

        if let Ok(raw) = std::env::var("VULNSIEVE_CVE_TIMEOUT_SECS") {
            if let Ok(secs) = raw.trim().parse() {
                self.cve.timeout_secs = secs;
            }
        }

        if let Ok(level) = std::env::var("VULNSIEVE_LOG") {
            self.log.level = Some(level);
        }

        self
    }

    /// Set a configuration value by dot-notation key
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "scan.max_files" => {
                self.scan.max_files = value.trim().parse().map_err(|_| invalid())?;
            }
            "scan.recursive" => {
                self.scan.recursive = parse_bool(value);
            }
            "cve.url" => {
                self.cve.url = value.to_string();
            }
            "cve.timeout_secs" => {
                self.cve.timeout_secs = value.trim().parse().map_err(|_| invalid())?;
            }
            "log.level" => {
                self.log.level = Some(value.to_string());
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Get a configuration value by dot-notation key
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "scan.max_files" => Some(self.scan.max_files.to_string()),
            "scan.recursive" => Some(self.scan.recursive.to_string()),
            "cve.url" => Some(self.cve.url.clone()),
            "cve.timeout_secs" => Some(self.cve.timeout_secs.to_string()),
            "log.level" => self.log.level.clone(),
            _ => None,
        }
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig::default()
            .with_max_files(self.scan.max_files)
            .with_recursive(self.scan.recursive)
    }
}

fn parse_bool(raw: &str) -> bool {
    let raw = raw.trim();
    raw.eq_ignore_ascii_case("true") || raw == "1"
}
