//! Configuration management for confluent-ops
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (confluent-ops.toml)
//! - Environment variables (CONFLUENT_OPS__*)
//!
//! ## Example config file (confluent-ops.toml):
//! ```toml
//! [source]
//! url = "https://psrc-dev.us-east-2.aws.confluent.cloud"
//! api_key = "SRCKEY"
//! api_secret = "SRCSECRET"
//!
//! [target]
//! url = "https://psrc-prod.us-east-2.aws.confluent.cloud"
//! api_key = "TGTKEY"
//! api_secret = "TGTSECRET"
//!
//! [promotion]
//! compatibility = "BACKWARD"
//! subjects = ["orders-value", "users-value"]
//! delay_ms = 500
//! log_file = "schema_promotion.log"
//!
//! [cli]
//! binary = "confluent"
//! environment = "env-a1b2c3"
//! cluster = "lkc-x9y8z7"
//! ```
//!
//! Environment variables use `__` between segments, e.g.
//! `CONFLUENT_OPS__TARGET__API_SECRET`. `CONFLUENT_OPS__PROMOTION__SUBJECTS`
//! is a space separated list.

use config_crate::{Config, Environment, File};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

use crate::compatibility::CompatibilityLevel;
use crate::error::{OpsError, Result};
use crate::promotion::SubjectSource;

const MASK: &str = "********";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpsConfig {
    /// Registry schemas are read from
    #[serde(default)]
    pub source: RegistryConfig,

    /// Registry schemas are promoted to
    #[serde(default)]
    pub target: RegistryConfig,

    /// Promotion run settings
    #[serde(default)]
    pub promotion: PromotionConfig,

    /// Confluent CLI settings for topic and ACL management
    #[serde(default)]
    pub cli: CliConfig,
}

/// Connection parameters for one Schema Registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL, e.g. https://psrc-123.us-east-2.aws.confluent.cloud
    #[serde(default)]
    pub url: String,

    /// Basic-Auth API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Basic-Auth API secret
    #[serde(default)]
    pub api_secret: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Promotion run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionConfig {
    /// Compatibility level applied to each target subject before checking
    #[serde(default, deserialize_with = "deserialize_compatibility")]
    pub compatibility: CompatibilityLevel,

    /// Subjects to promote, in order. Empty means every source subject.
    #[serde(default)]
    pub subjects: Vec<String>,

    /// Regex restricting discovered subjects
    #[serde(default)]
    pub subject_filter: Option<String>,

    /// Pause between subjects, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Append-only run log
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Echo every log line to the terminal, not only errors
    #[serde(default)]
    pub debug: bool,
}

/// Confluent CLI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Path or name of the confluent binary
    #[serde(default = "default_binary")]
    pub binary: PathBuf,

    /// Environment id passed as --environment
    #[serde(default)]
    pub environment: Option<String>,

    /// Kafka cluster id passed as --cluster
    #[serde(default)]
    pub cluster: Option<String>,
}

// Default value functions
fn default_timeout_secs() -> u64 {
    30
}

fn default_delay_ms() -> u64 {
    500
}

fn default_log_file() -> PathBuf {
    PathBuf::from("schema_promotion.log")
}

fn default_binary() -> PathBuf {
    PathBuf::from("confluent")
}

fn deserialize_compatibility<'de, D>(deserializer: D) -> std::result::Result<CompatibilityLevel, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: None,
            api_secret: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            compatibility: CompatibilityLevel::default(),
            subjects: Vec::new(),
            subject_filter: None,
            delay_ms: default_delay_ms(),
            log_file: default_log_file(),
            debug: false,
        }
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            environment: None,
            cluster: None,
        }
    }
}

impl RegistryConfig {
    /// Key/secret pair, if both are set
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.api_key.as_deref(), self.api_secret.as_deref()) {
            (Some(key), Some(secret)) if !key.is_empty() => Some((key, secret)),
            _ => None,
        }
    }

    fn validate(&self, role: &str) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(OpsError::InvalidConfig(format!("{role}.url is not set")));
        }
        reqwest::Url::parse(&self.url)
            .map_err(|e| OpsError::InvalidConfig(format!("{role}.url '{}': {e}", self.url)))?;

        let has_key = self.api_key.as_deref().is_some_and(|k| !k.is_empty());
        let has_secret = self.api_secret.as_deref().is_some_and(|s| !s.is_empty());
        if has_key != has_secret {
            return Err(OpsError::InvalidConfig(format!(
                "{role}.api_key and {role}.api_secret must be set together"
            )));
        }
        Ok(())
    }

    fn masked(&self) -> Self {
        Self {
            api_secret: self.api_secret.as_ref().map(|_| MASK.to_string()),
            ..self.clone()
        }
    }
}

impl PromotionConfig {
    /// Which subjects a run should process
    pub fn subject_source(&self) -> SubjectSource {
        if self.subjects.is_empty() {
            SubjectSource::Discover
        } else {
            SubjectSource::Explicit(self.subjects.clone())
        }
    }

    /// Compiled subject filter, if configured
    pub fn filter(&self) -> Result<Option<Regex>> {
        self.subject_filter
            .as_deref()
            .filter(|pattern| !pattern.is_empty())
            .map(Regex::new)
            .transpose()
            .map_err(OpsError::from)
    }

    /// Log file path (resolves relative paths)
    pub fn log_path(&self) -> PathBuf {
        if self.log_file.is_absolute() {
            self.log_file.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.log_file)
        }
    }
}

impl OpsConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load a single file with no default locations and no environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(true))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Load configuration, layering an explicit file over the default locations.
    ///
    /// `CONFLUENT_OPS__*` variables are applied last and override every file.
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = [
            "confluent-ops.toml",
            ".confluent-ops.toml",
            "config/confluent-ops.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("io", "confluent-ops", "confluent-ops") {
            let xdg_config = config_dir.config_dir().join("confluent-ops.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("CONFLUENT_OPS")
                .separator("__")
                .try_parsing(true)
                .list_separator(" ")
                .with_list_parse_key("promotion.subjects"),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| OpsError::InvalidConfig(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check everything a promotion run needs
    pub fn validate_promotion(&self) -> Result<()> {
        self.source.validate("source")?;
        self.target.validate("target")?;
        if self.promotion.filter()?.is_some() && !self.promotion.subjects.is_empty() {
            return Err(OpsError::InvalidConfig(
                "promotion.subject_filter only applies to discovered subjects; \
                 clear promotion.subjects or drop the filter"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Copy with secrets replaced, for display
    pub fn masked(&self) -> Self {
        Self {
            source: self.source.masked(),
            target: self.target.masked(),
            ..self.clone()
        }
    }
}
