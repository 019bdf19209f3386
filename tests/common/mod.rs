//! Shared test utilities and fixtures for the gcprov test suite.
//!
//! This module provides:
//! - Descriptor sets used across scenarios
//! - An engine with fast retries
//! - Temporary manifest and fake `gcloud` helpers for CLI tests
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use gcprov::engine::ProvisioningEngine;
use gcprov::planner::{plan, ExecutionPlan};
use gcprov::resource::{ResourceDescriptor, ResourceId};
use gcprov::retry::RetryPolicy;

pub const PROJECT: &str = "p1";
pub const SERVICE: &str = "documentai.googleapis.com";
pub const BUCKET: &str = "p1-pdf-input";

/// The minimal three-resource setup: a project, one API and one bucket,
/// both depending on the project.
pub fn minimal_descriptors() -> Vec<ResourceDescriptor> {
    vec![
        ResourceDescriptor::project(PROJECT),
        ResourceDescriptor::service(SERVICE).with_dependency(ResourceId::project(PROJECT)),
        ResourceDescriptor::bucket(BUCKET).with_dependency(ResourceId::project(PROJECT)),
    ]
}

/// Plan for [`minimal_descriptors`].
pub fn minimal_plan() -> ExecutionPlan {
    plan(minimal_descriptors()).expect("minimal plan is acyclic")
}

/// Engine retrying up to `max_attempts` times with a 1ms constant delay.
pub fn fast_engine(max_attempts: u32) -> ProvisioningEngine {
    ProvisioningEngine::new(RetryPolicy::constant(max_attempts, Duration::from_millis(1)))
}

/// Write a manifest into a fresh temporary directory.
pub fn write_manifest(content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("create temp dir");
    let path = dir.path().join("gcprov.yaml");
    std::fs::write(&path, content).expect("write manifest");
    (dir, path)
}

pub const MINIMAL_MANIFEST: &str = r#"
project_id: p1
region: europe-west1
resources:
  - kind: project
    name: ${PROJECT_ID}
  - kind: service
    name: documentai.googleapis.com
  - kind: bucket
    name: ${PROJECT_ID}-pdf-input
"#;

pub const CYCLIC_MANIFEST: &str = r#"
project_id: p1
resources:
  - kind: service
    name: a.googleapis.com
    depends_on: [service/b.googleapis.com]
  - kind: service
    name: b.googleapis.com
    depends_on: [service/a.googleapis.com]
"#;

/// Write an executable shell script standing in for `gcloud`.
///
/// `describe` commands report NOT_FOUND, `services list` prints nothing and
/// every other command succeeds. Each invocation is appended to `calls.log`
/// in the same directory.
#[cfg(unix)]
pub fn fake_gcloud(dir: &TempDir) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let log = dir.path().join("calls.log");
    let script = format!(
        r#"#!/bin/sh
echo "$*" >> "{log}"
case "$*" in
  *describe*)
    echo "ERROR: NOT_FOUND: resource not found" >&2
    exit 1
    ;;
  *"services list"*)
    exit 0
    ;;
esac
exit 0
"#,
        log = log.display()
    );

    let path = dir.path().join("gcloud");
    std::fs::write(&path, script).expect("write fake gcloud");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake gcloud");
    path
}
