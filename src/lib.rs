//! # gcprov - Idempotent, dependency-ordered GCP provisioning
//!
//! gcprov takes a small declarative list of cloud resources (a project, the
//! APIs it needs, its storage buckets), orders them so that every resource
//! comes after the resources it depends on, and creates each one through a
//! provider adapter. Resources that already exist are left alone, transient
//! provider errors are retried with bounded backoff, and one failure never
//! aborts unrelated branches of the plan.
//!
//! ## Core Concepts
//!
//! - **Resource descriptors**: one resource to provision, identified by kind + name
//! - **Manifest**: YAML/JSON file listing descriptors for one target project
//! - **Execution plan**: descriptors in dependency order
//! - **Provider adapter**: the boundary to the cloud control plane
//! - **Provisioning report**: one step result per descriptor, plus overall success
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     CLI Interface                        │
//! │              (clap-based command parsing)                │
//! └──────────────────────────────────────────────────────────┘
//!                             │
//!                             ▼
//! ┌──────────────┐   ┌──────────────────┐   ┌────────────────┐
//! │   Manifest   │──▶│ Dependency       │──▶│ Provisioning   │
//! │ (descriptors)│   │ Planner          │   │ Engine         │
//! └──────────────┘   └──────────────────┘   └────────────────┘
//!                                                   │
//!                             ┌─────────────────────┼──────────┐
//!                             ▼                     ▼          ▼
//!                   ┌──────────────────┐   ┌────────────┐  ┌────────┐
//!                   │ Provider Adapter │   │   Retry    │  │ Report │
//!                   │ (gcloud, memory) │   │   Policy   │  │        │
//!                   └──────────────────┘   └────────────┘  └────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use gcprov::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let plan = plan(vec![
//!         ResourceDescriptor::project("p1"),
//!         ResourceDescriptor::service("documentai.googleapis.com")
//!             .with_dependency(ResourceId::project("p1")),
//!         ResourceDescriptor::bucket("p1-pdf-input")
//!             .with_dependency(ResourceId::project("p1")),
//!     ])?;
//!
//!     let adapter = InMemoryAdapter::new();
//!     let report = ProvisioningEngine::default().execute(&plan, &adapter).await;
//!     assert!(report.success);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::adapter::{
        AdapterError, AdapterErrorKind, AdapterResult, GcloudAdapter, GcloudSettings,
        InMemoryAdapter, ProviderAdapter,
    };
    pub use crate::config::{Config, ProvisionTarget};
    pub use crate::engine::{ProvisionObserver, ProvisioningEngine};
    pub use crate::error::{Error, Result};
    pub use crate::planner::{plan, ExecutionPlan, PlanningError};
    pub use crate::report::{ProvisioningReport, SkipCause, StepOutcome, StepResult};
    pub use crate::resource::{Manifest, ResourceDescriptor, ResourceId, ResourceKind};
    pub use crate::retry::{JitterStrategy, RetryPolicy};
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases for gcprov operations.
pub mod error;

/// Resource descriptors, identities and manifests.
pub mod resource;

/// Dependency ordering of descriptors into an execution plan.
///
/// Planning is pure: it never contacts the provider, so a plan that cannot
/// be built fails before any resource is touched.
pub mod planner;

/// Execution of a plan against a provider adapter.
pub mod engine;

/// Per-step results and the final report.
pub mod report;

// ============================================================================
// Infrastructure
// ============================================================================

/// Provider adapters: the `gcloud` CLI and an in-memory control plane.
pub mod adapter;

/// Bounded retry with exponential backoff and jitter.
pub mod retry;

/// Configuration loading from files and the environment.
pub mod config;
