//! Resource descriptors and the manifest they are loaded from.
//!
//! A [`ResourceDescriptor`] is a declarative statement that one cloud
//! resource should exist. Descriptors are identified by a [`ResourceId`]
//! (kind + name) and may declare prerequisites by identity.
//!
//! Descriptors are normally produced from a [`Manifest`], a YAML or JSON
//! document listing resources for one target project:
//!
//! ```yaml
//! project_id: pdf-qa-generator
//! region: us-central1
//! resources:
//!   - kind: project
//!     name: ${PROJECT_ID}
//!     parameters:
//!       display_name: PDF QA Generator
//!   - kind: service
//!     name: documentai.googleapis.com
//!   - kind: bucket
//!     name: ${PROJECT_ID}-pdf-input
//!     depends_on: [service/storage.googleapis.com]
//! ```
//!
//! When the manifest is turned into descriptors, `${PROJECT_ID}` and
//! `${REGION}` are expanded, buckets without a `location` get the target
//! region, and every service and bucket gains an implicit dependency on the
//! target project's descriptor if the manifest declares one.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProvisionTarget;
use crate::error::{Error, Result};

/// Parameter holding a project's human-readable name.
pub const PARAM_DISPLAY_NAME: &str = "display_name";

/// Parameter holding a bucket's location.
pub const PARAM_LOCATION: &str = "location";

/// APIs the PDF question-answering pipeline needs.
pub const PDF_QA_SERVICES: &[&str] = &[
    "documentai.googleapis.com",
    "cloudfunctions.googleapis.com",
    "storage.googleapis.com",
    "bigquery.googleapis.com",
    "aiplatform.googleapis.com",
    "cloudbuild.googleapis.com",
    "eventarc.googleapis.com",
];

/// Bucket name suffixes the PDF question-answering pipeline needs.
pub const PDF_QA_BUCKET_SUFFIXES: &[&str] = &["pdf-input", "qa-output", "function-source"];

// ============================================================================
// Identity
// ============================================================================

/// Kind of cloud resource a descriptor provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// A cloud project
    Project,
    /// An enabled API, e.g. `documentai.googleapis.com`
    Service,
    /// A storage bucket
    Bucket,
}

impl ResourceKind {
    /// Lowercase name used in identities and manifests.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Project => "project",
            ResourceKind::Service => "service",
            ResourceKind::Bucket => "bucket",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "project" => Ok(ResourceKind::Project),
            "service" | "api" => Ok(ResourceKind::Service),
            "bucket" => Ok(ResourceKind::Bucket),
            other => Err(Error::UnknownResourceKind(other.to_string())),
        }
    }
}

/// Unique key of a descriptor inside a plan: kind plus name.
///
/// The textual form is `kind/name`, e.g. `bucket/p1-pdf-input`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId {
    kind: ResourceKind,
    name: String,
}

impl ResourceId {
    /// Create an identity from its parts.
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Identity of a project.
    pub fn project(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Project, name)
    }

    /// Identity of a service.
    pub fn service(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Service, name)
    }

    /// Identity of a bucket.
    pub fn bucket(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Bucket, name)
    }

    /// The resource kind.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// The resource name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, name) = s
            .split_once('/')
            .ok_or_else(|| Error::InvalidResourceId(s.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidResourceId(s.to_string()));
        }
        Ok(Self::new(kind.parse()?, name))
    }
}

impl TryFrom<String> for ResourceId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.to_string()
    }
}

// ============================================================================
// Descriptor
// ============================================================================

/// Declarative description of one resource to provision.
///
/// Descriptors are immutable once built; the builder methods consume `self`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDescriptor {
    id: ResourceId,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    parameters: IndexMap<String, String>,
    #[serde(skip_serializing_if = "IndexSet::is_empty")]
    depends_on: IndexSet<ResourceId>,
}

impl ResourceDescriptor {
    /// Create a descriptor with no parameters and no dependencies.
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(kind, name),
            parameters: IndexMap::new(),
            depends_on: IndexSet::new(),
        }
    }

    /// Descriptor for a project.
    pub fn project(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Project, name)
    }

    /// Descriptor for an API to enable.
    pub fn service(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Service, name)
    }

    /// Descriptor for a storage bucket.
    pub fn bucket(name: impl Into<String>) -> Self {
        Self::new(ResourceKind::Bucket, name)
    }

    /// Set a creation parameter.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Declare a prerequisite.
    pub fn with_dependency(mut self, id: ResourceId) -> Self {
        self.depends_on.insert(id);
        self
    }

    /// The identity of this descriptor.
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// The resource kind.
    pub fn kind(&self) -> ResourceKind {
        self.id.kind
    }

    /// The resource name.
    pub fn name(&self) -> &str {
        &self.id.name
    }

    /// All creation parameters.
    pub fn parameters(&self) -> &IndexMap<String, String> {
        &self.parameters
    }

    /// Look up one creation parameter.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    /// Prerequisites, in declaration order.
    pub fn depends_on(&self) -> &IndexSet<ResourceId> {
        &self.depends_on
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}

// ============================================================================
// Manifest
// ============================================================================

/// One resource entry as written in a manifest file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceEntry {
    /// Resource kind
    pub kind: ResourceKind,
    /// Resource name, may contain `${PROJECT_ID}` / `${REGION}`
    pub name: String,
    /// Creation parameters
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, String>,
    /// Explicit prerequisites as `kind/name`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ResourceId>,
}

impl ResourceEntry {
    /// Create an entry with no parameters and no explicit dependencies.
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            parameters: IndexMap::new(),
            depends_on: Vec::new(),
        }
    }
}

/// Declarative list of resources for one target project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Default target project ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Default region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Resources to provision
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

impl Manifest {
    /// Load a manifest from a YAML or JSON file (chosen by extension).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let parsed = if is_json {
            serde_json::from_str(&content)
                .map_err(|e| Error::manifest_parse(path, e.to_string(), Some(Box::new(e))))
        } else {
            serde_yaml::from_str(&content)
                .map_err(|e| Error::manifest_parse(path, e.to_string(), Some(Box::new(e))))
        }?;

        debug!(path = %path.display(), "Loaded manifest");
        Ok(parsed)
    }

    /// Parse a manifest from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Render the manifest as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Manifest reproducing the PDF question-answering setup: the project,
    /// the APIs the pipeline uses, and its input, output and function-source
    /// buckets.
    pub fn pdf_qa_pipeline(project_id: Option<String>, region: Option<String>) -> Self {
        let mut resources = Vec::with_capacity(1 + PDF_QA_SERVICES.len() + 3);

        let mut project = ResourceEntry::new(ResourceKind::Project, "${PROJECT_ID}");
        project
            .parameters
            .insert(PARAM_DISPLAY_NAME.to_string(), "PDF QA Generator".to_string());
        resources.push(project);

        for service in PDF_QA_SERVICES {
            resources.push(ResourceEntry::new(ResourceKind::Service, *service));
        }

        for suffix in PDF_QA_BUCKET_SUFFIXES {
            let mut bucket =
                ResourceEntry::new(ResourceKind::Bucket, format!("${{PROJECT_ID}}-{suffix}"));
            bucket
                .parameters
                .insert(PARAM_LOCATION.to_string(), "${REGION}".to_string());
            resources.push(bucket);
        }

        Self {
            project_id,
            region,
            resources,
        }
    }

    /// Turn the manifest into descriptors for the given target.
    ///
    /// Order of the returned descriptors follows the manifest, which the
    /// planner uses as its tie-break.
    pub fn descriptors(&self, target: &ProvisionTarget) -> Result<Vec<ResourceDescriptor>> {
        let expand = |input: &str| -> String {
            shellexpand::env_with_context_no_errors(input, |var: &str| match var {
                "PROJECT_ID" => Some(target.project_id.as_str()),
                "REGION" => Some(target.region.as_str()),
                _ => None,
            })
            .into_owned()
        };

        let target_project = ResourceId::project(&target.project_id);
        let declares_target_project = self
            .resources
            .iter()
            .any(|e| e.kind == ResourceKind::Project && expand(&e.name) == target.project_id);

        let mut descriptors = Vec::with_capacity(self.resources.len());
        for (index, entry) in self.resources.iter().enumerate() {
            let name = expand(&entry.name);
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::ManifestValidation(format!(
                    "resource #{} ({}) has an empty name",
                    index + 1,
                    entry.kind
                )));
            }

            let mut descriptor = ResourceDescriptor::new(entry.kind, name);
            for (key, value) in &entry.parameters {
                descriptor = descriptor.with_parameter(key.clone(), expand(value));
            }
            if entry.kind == ResourceKind::Bucket && descriptor.parameter(PARAM_LOCATION).is_none()
            {
                descriptor = descriptor.with_parameter(PARAM_LOCATION, target.region.clone());
            }

            if entry.kind != ResourceKind::Project && declares_target_project {
                descriptor = descriptor.with_dependency(target_project.clone());
            }
            for dep in &entry.depends_on {
                descriptor = descriptor.with_dependency(ResourceId::new(dep.kind(), expand(dep.name())));
            }

            descriptors.push(descriptor);
        }

        Ok(descriptors)
    }
}
