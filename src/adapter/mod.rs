//! Provider adapters: the boundary to the cloud control plane.
//!
//! The provisioning engine never talks to the cloud directly. It consumes the
//! [`ProviderAdapter`] trait, which exposes one existence check and one create
//! operation per resource kind. Two implementations ship with the crate:
//!
//! - [`GcloudAdapter`](gcloud::GcloudAdapter) drives the `gcloud` CLI
//! - [`InMemoryAdapter`](memory::InMemoryAdapter) simulates a control plane
//!   in process, with scriptable failures
//!
//! Adapter failures are classified by [`AdapterErrorKind`]. Transient kinds
//! are retried by the engine; everything else is recorded as a failure
//! straight away.

pub mod gcloud;
pub mod memory;

pub use gcloud::{GcloudAdapter, GcloudSettings};
pub use memory::InMemoryAdapter;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::resource::ResourceDescriptor;
use crate::retry::{is_transient_error_message, TransientError};

/// Classification of an adapter failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterErrorKind {
    /// The API throttled the request
    RateLimited,
    /// The call did not finish in time
    Timeout,
    /// The backend was temporarily unavailable
    Unavailable,
    /// The resource name was rejected
    InvalidName,
    /// The caller lacks permission
    PermissionDenied,
    /// A quota would be exceeded
    QuotaExceeded,
    /// A referenced resource does not exist
    NotFound,
    /// The resource already exists
    AlreadyExists,
    /// The name is taken by a resource the caller does not own
    Conflict,
    /// Anything else
    Other,
}

impl AdapterErrorKind {
    /// Whether errors of this kind may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AdapterErrorKind::RateLimited | AdapterErrorKind::Timeout | AdapterErrorKind::Unavailable
        )
    }

    /// Snake-case name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterErrorKind::RateLimited => "rate_limited",
            AdapterErrorKind::Timeout => "timeout",
            AdapterErrorKind::Unavailable => "unavailable",
            AdapterErrorKind::InvalidName => "invalid_name",
            AdapterErrorKind::PermissionDenied => "permission_denied",
            AdapterErrorKind::QuotaExceeded => "quota_exceeded",
            AdapterErrorKind::NotFound => "not_found",
            AdapterErrorKind::AlreadyExists => "already_exists",
            AdapterErrorKind::Conflict => "conflict",
            AdapterErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for AdapterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a provider adapter call.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct AdapterError {
    /// Failure classification
    pub kind: AdapterErrorKind,
    /// Provider message
    pub message: String,
}

impl AdapterError {
    /// Create a new adapter error.
    pub fn new(kind: AdapterErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a rate-limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::RateLimited, message)
    }

    /// Shorthand for a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Timeout, message)
    }

    /// Shorthand for a permission error.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::PermissionDenied, message)
    }

    /// Shorthand for an invalid-name error.
    pub fn invalid_name(message: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::InvalidName, message)
    }

    /// Build an error by classifying a provider message.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(classify_message(&message), message)
    }
}

impl TransientError for AdapterError {
    fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// Result type for adapter calls.
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// Classify a provider error message into an [`AdapterErrorKind`].
///
/// Patterns cover the status names and HTTP codes the Google APIs and the
/// `gcloud` CLI print on failure. Status codes win over the generic transient
/// wording, so a 409 that says "try again" is still a conflict.
pub fn classify_message(message: &str) -> AdapterErrorKind {
    let lower = message.to_lowercase();
    let has = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));
    let status = http_status(&lower);
    let code = |c: u16| status == Some(c);

    if has(&["already_exists", "already exists", "you already own"]) {
        AdapterErrorKind::AlreadyExists
    } else if code(409) || has(&["already in use", "name is not available"]) {
        AdapterErrorKind::Conflict
    } else if code(429) || has(&["rate limit", "ratelimit", "too many requests"]) {
        AdapterErrorKind::RateLimited
    } else if has(&["quota"]) {
        AdapterErrorKind::QuotaExceeded
    } else if code(403) || has(&["permission_denied", "permission denied", "forbidden"]) {
        AdapterErrorKind::PermissionDenied
    } else if code(400) || has(&["invalid_argument", "invalid name", "invalid bucket name"]) {
        AdapterErrorKind::InvalidName
    } else if code(404) || has(&["not_found", "not found"]) {
        AdapterErrorKind::NotFound
    } else if has(&["timed out", "timeout", "deadline_exceeded", "deadline exceeded"]) {
        AdapterErrorKind::Timeout
    } else if is_transient_error_message(&lower) {
        AdapterErrorKind::Unavailable
    } else {
        AdapterErrorKind::Other
    }
}

/// HTTP status code following `httperror `, `http ` or `code=` in a
/// lowercased message.
fn http_status(lower: &str) -> Option<u16> {
    ["httperror ", "http ", "code="].iter().find_map(|prefix| {
        lower.match_indices(prefix).find_map(|(at, _)| {
            let digits: String = lower[at + prefix.len()..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if digits.len() == 3 {
                digits.parse().ok()
            } else {
                None
            }
        })
    })
}

/// Interface to a cloud control plane.
///
/// Each create operation must be safe to call for a resource that already
/// exists: either the provider deduplicates, or it reports
/// [`AdapterErrorKind::AlreadyExists`], which the engine treats as success.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Short name of the adapter, used in logs.
    fn name(&self) -> &str;

    /// Whether the resource described already exists.
    async fn resource_exists(&self, descriptor: &ResourceDescriptor) -> AdapterResult<bool>;

    /// Create a project.
    async fn create_project(
        &self,
        name: &str,
        params: &IndexMap<String, String>,
    ) -> AdapterResult<()>;

    /// Enable an API on the target project.
    async fn enable_service(&self, name: &str) -> AdapterResult<()>;

    /// Create a storage bucket.
    async fn create_bucket(&self, name: &str, params: &IndexMap<String, String>)
        -> AdapterResult<()>;
}
