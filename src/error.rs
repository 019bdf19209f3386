//! Error types for gcprov.
//!
//! This module defines the top-level error type used by the library. Errors
//! raised by individual cloud calls are *not* represented here: those are
//! [`AdapterError`](crate::adapter::AdapterError)s, which the engine records
//! into the provisioning report instead of aborting the run.

use std::path::PathBuf;
use thiserror::Error;

use crate::planner::PlanningError;

/// Result type alias for gcprov operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for gcprov.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Manifest Errors
    // ========================================================================
    /// Error parsing a manifest file.
    #[error("Failed to parse manifest '{path}': {message}")]
    ManifestParse {
        /// Path to the manifest file
        path: PathBuf,
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Manifest content is structurally valid but semantically wrong.
    #[error("Manifest validation failed: {0}")]
    ManifestValidation(String),

    /// Malformed resource identity (expected `kind/name`).
    #[error("Invalid resource identity '{0}': expected 'kind/name'")]
    InvalidResourceId(String),

    /// Unknown resource kind.
    #[error("Unknown resource kind '{0}': expected project, service or bucket")]
    UnknownResourceKind(String),

    // ========================================================================
    // Planning Errors
    // ========================================================================
    /// The descriptor set cannot be ordered.
    #[error(transparent)]
    Planning(#[from] PlanningError),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required setting was not supplied by any source.
    #[error("Missing required setting '{key}': {hint}")]
    MissingSetting {
        /// Setting name
        key: String,
        /// How the user can supply it
        hint: String,
    },

    // ========================================================================
    // IO and Serialization Errors
    // ========================================================================
    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Error {
    /// Creates a new manifest parse error.
    pub fn manifest_parse(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ManifestParse {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    /// Creates a new missing setting error.
    pub fn missing_setting(key: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::MissingSetting {
            key: key.into(),
            hint: hint.into(),
        }
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Planning(_)
            | Error::ManifestParse { .. }
            | Error::ManifestValidation(_)
            | Error::InvalidResourceId(_)
            | Error::UnknownResourceKind(_)
            | Error::YamlParse(_)
            | Error::JsonParse(_) => 4,
            Error::Config(_) | Error::MissingSetting { .. } | Error::TomlParse(_) => 5,
            _ => 1,
        }
    }
}
