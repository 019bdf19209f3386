//! Configuration for gcprov
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - User configuration (~/.config/gcprov/config.toml)
//! - Project configuration (./gcprov.toml)
//! - An explicit `--config` file
//! - Environment variables
//!
//! Files are TOML. Tables are merged deeply, so a later file only needs to
//! name the keys it changes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::resource::Manifest;
use crate::retry::{BackoffStrategy, JitterStrategy, RetryPolicy};

/// Region used when no source names one.
pub const DEFAULT_REGION: &str = "us-central1";

/// Name of the project-local config file.
pub const PROJECT_CONFIG_FILE: &str = "gcprov.toml";

/// Project and region a run provisions into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionTarget {
    /// Target project ID
    pub project_id: String,
    /// Default region for regional resources
    pub region: String,
}

impl ProvisionTarget {
    /// Create a target.
    pub fn new(project_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            region: region.into(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default target
    pub defaults: Defaults,

    /// gcloud CLI settings
    pub gcloud: GcloudConfig,

    /// Retry settings for adapter calls
    pub retry: RetryConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Output settings
    pub output: OutputConfig,
}

/// Default target values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Project ID to provision into
    pub project_id: Option<String>,

    /// Default region
    pub region: Option<String>,
}

/// gcloud CLI settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcloudConfig {
    /// Path or name of the gcloud binary
    pub binary: PathBuf,

    /// Timeout for a single gcloud invocation
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,
}

impl Default for GcloudConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("gcloud"),
            command_timeout: Duration::from_secs(300),
        }
    }
}

/// Retry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per adapter call, first one included
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Upper bound on any single delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Jitter applied to each delay
    pub jitter: JitterStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: JitterStrategy::Full,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Logging settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when neither -v nor RUST_LOG is given
    pub level: Option<String>,

    /// Output format
    pub format: LogFormat,
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Colorize human output
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut merged = toml::Value::Table(toml::map::Map::new());

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                debug!(path = %path.display(), "Loading config file");
                let layer = Self::read_layer(&path)?;
                merge_values(&mut merged, layer);
            } else if Some(&path) == config_path {
                return Err(Error::FileNotFound(path));
            }
        }

        let mut config: Config = merged
            .try_into()
            .map_err(|e: toml::de::Error| Error::Config(e.to_string()))?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from a single file, ignoring other sources
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let value = Self::read_layer(path.as_ref())?;
        value
            .try_into()
            .map_err(|e: toml::de::Error| Error::Config(e.to_string()))
    }

    /// Get the list of configuration file paths to check, lowest precedence first
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("gcprov").join("config.toml"));
        }

        paths.push(PathBuf::from(PROJECT_CONFIG_FILE));

        if let Some(path) = explicit_path {
            paths.push(path.clone());
        }

        paths
    }

    fn read_layer(path: &Path) -> Result<toml::Value> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Some(project) =
            env_value("GCPROV_PROJECT_ID").or_else(|| env_value("GOOGLE_CLOUD_PROJECT"))
        {
            self.defaults.project_id = Some(project);
        }

        if let Some(region) = env_value("GCPROV_REGION") {
            self.defaults.region = Some(region);
        }

        if let Ok(binary) = std::env::var("GCPROV_GCLOUD") {
            self.gcloud.binary = PathBuf::from(binary);
        }

        if std::env::var("NO_COLOR").is_ok() {
            self.output.color = false;
        }
    }

    /// Retry policy built from the `retry` section.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(self.retry.max_attempts)
            .initial_delay(self.retry.initial_delay)
            .max_delay(self.retry.max_delay)
            .backoff(BackoffStrategy::default())
            .jitter(self.retry.jitter)
            .build()
    }

    /// Resolve the target project and region.
    ///
    /// Precedence: command-line value, then this config (which already
    /// carries environment overrides), then the manifest. The region falls
    /// back to [`DEFAULT_REGION`].
    pub fn resolve_target(
        &self,
        cli_project: Option<&str>,
        cli_region: Option<&str>,
        manifest: &Manifest,
    ) -> Result<ProvisionTarget> {
        let project_id = non_empty(cli_project)
            .or_else(|| non_empty(self.defaults.project_id.as_deref()))
            .or_else(|| non_empty(manifest.project_id.as_deref()))
            .ok_or_else(|| {
                Error::missing_setting(
                    "project_id",
                    "pass --project-id, set GCPROV_PROJECT_ID, or add project_id to the manifest",
                )
            })?;

        let region = non_empty(cli_region)
            .or_else(|| non_empty(self.defaults.region.as_deref()))
            .or_else(|| non_empty(manifest.region.as_deref()))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        Ok(ProvisionTarget::new(project_id, region))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Set, non-blank environment variable.
fn env_value(name: &str) -> Option<String> {
    non_empty(std::env::var(name).ok().as_deref())
}

/// Deep-merge `overlay` into `base`. Tables merge key by key; any other
/// value in `overlay` replaces the one in `base`.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
