//! Provider adapter backed by the `gcloud` command-line tool.
//!
//! Every operation is a single `gcloud` invocation run through
//! `tokio::process`, with a per-command timeout. Failures are classified from
//! the tool's stderr so the engine can tell throttling and outages apart from
//! permission or naming problems.
//!
//! | Operation | Command |
//! |-----------|---------|
//! | project exists | `gcloud projects describe NAME` |
//! | create project | `gcloud projects create NAME --name=DISPLAY_NAME` |
//! | service enabled | `gcloud services list --enabled --filter=config.name=NAME` |
//! | enable service | `gcloud services enable NAME` |
//! | bucket exists | `gcloud storage buckets describe gs://NAME` |
//! | create bucket | `gcloud storage buckets create gs://NAME --location=LOCATION` |
//!
//! Credentials come from whatever `gcloud` is already logged in with.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace};

use super::{classify_message, AdapterError, AdapterErrorKind, AdapterResult, ProviderAdapter};
use crate::config::ProvisionTarget;
use crate::resource::{ResourceDescriptor, ResourceKind, PARAM_DISPLAY_NAME, PARAM_LOCATION};

/// Settings the gcloud adapter is constructed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcloudSettings {
    /// Project that services are enabled on and buckets are billed to
    pub project_id: String,
    /// Location for buckets that do not name one
    pub region: String,
    /// Path or name of the gcloud executable
    pub binary: PathBuf,
    /// Maximum time a single command may run
    pub command_timeout: Duration,
}

impl GcloudSettings {
    /// Settings for a target with the default binary and timeout.
    pub fn new(target: &ProvisionTarget) -> Self {
        Self {
            project_id: target.project_id.clone(),
            region: target.region.clone(),
            binary: PathBuf::from("gcloud"),
            command_timeout: Duration::from_secs(300),
        }
    }

    /// Use a different gcloud executable.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Use a different per-command timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

/// Captured result of one gcloud invocation.
#[derive(Debug)]
struct CommandOutput {
    success: bool,
    exit_code: i32,
    stdout: String,
    stderr: String,
}

impl CommandOutput {
    fn into_error(self) -> AdapterError {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            AdapterError::new(
                AdapterErrorKind::Other,
                format!("gcloud exited with status {}", self.exit_code),
            )
        } else {
            AdapterError::from_message(stderr)
        }
    }
}

/// Provider adapter that shells out to `gcloud`.
#[derive(Debug, Clone)]
pub struct GcloudAdapter {
    settings: GcloudSettings,
}

impl GcloudAdapter {
    /// Create an adapter from settings.
    pub fn new(settings: GcloudSettings) -> Self {
        Self { settings }
    }

    async fn run(&self, args: Vec<String>) -> AdapterResult<CommandOutput> {
        debug!(binary = %self.settings.binary.display(), args = ?args, "Running gcloud");

        let mut cmd = Command::new(&self.settings.binary);
        cmd.args(&args)
            .arg("--quiet")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            AdapterError::new(
                AdapterErrorKind::Other,
                format!(
                    "Failed to spawn '{}': {}",
                    self.settings.binary.display(),
                    e
                ),
            )
        })?;

        let output =
            match tokio::time::timeout(self.settings.command_timeout, child.wait_with_output())
                .await
            {
                Ok(result) => result.map_err(|e| {
                    AdapterError::new(
                        AdapterErrorKind::Other,
                        format!("Failed to wait for gcloud: {}", e),
                    )
                })?,
                Err(_) => {
                    return Err(AdapterError::timeout(format!(
                        "gcloud {} timed out after {:?}",
                        args.first().map(String::as_str).unwrap_or_default(),
                        self.settings.command_timeout
                    )));
                }
            };

        let result = CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        trace!(
            exit_code = result.exit_code,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "gcloud completed"
        );

        Ok(result)
    }

    /// Run a `describe`-style command; absence maps to `Ok(false)`.
    async fn describe(&self, args: Vec<String>) -> AdapterResult<bool> {
        let output = self.run(args).await?;
        if output.success {
            return Ok(true);
        }

        let stderr = output.stderr.to_lowercase();
        // Projects the caller cannot see are reported as a permission error
        // that says "(or it may not exist)".
        if classify_message(&stderr) == AdapterErrorKind::NotFound
            || stderr.contains("may not exist")
        {
            return Ok(false);
        }
        Err(output.into_error())
    }

    /// Run a mutating command.
    async fn apply(&self, args: Vec<String>) -> AdapterResult<()> {
        let output = self.run(args).await?;
        if output.success {
            Ok(())
        } else {
            Err(output.into_error())
        }
    }

    fn project_flag(&self) -> String {
        format!("--project={}", self.settings.project_id)
    }

    fn describe_project_args(name: &str) -> Vec<String> {
        vec![
            "projects".into(),
            "describe".into(),
            name.into(),
            "--format=value(projectId)".into(),
        ]
    }

    fn create_project_args(name: &str, params: &IndexMap<String, String>) -> Vec<String> {
        let mut args = vec!["projects".into(), "create".into(), name.into()];
        if let Some(display_name) = params.get(PARAM_DISPLAY_NAME) {
            args.push(format!("--name={}", display_name));
        }
        if let Some(org) = params.get("organization") {
            args.push(format!("--organization={}", org));
        }
        if let Some(folder) = params.get("folder") {
            args.push(format!("--folder={}", folder));
        }
        args
    }

    fn list_service_args(&self, name: &str) -> Vec<String> {
        vec![
            "services".into(),
            "list".into(),
            "--enabled".into(),
            self.project_flag(),
            format!("--filter=config.name={}", name),
            "--format=value(config.name)".into(),
        ]
    }

    fn enable_service_args(&self, name: &str) -> Vec<String> {
        vec![
            "services".into(),
            "enable".into(),
            name.into(),
            self.project_flag(),
        ]
    }

    fn describe_bucket_args(name: &str) -> Vec<String> {
        vec![
            "storage".into(),
            "buckets".into(),
            "describe".into(),
            format!("gs://{}", name),
            "--format=value(name)".into(),
        ]
    }

    fn create_bucket_args(&self, name: &str, params: &IndexMap<String, String>) -> Vec<String> {
        let location = params
            .get(PARAM_LOCATION)
            .map(String::as_str)
            .unwrap_or(self.settings.region.as_str());

        let mut args = vec![
            "storage".into(),
            "buckets".into(),
            "create".into(),
            format!("gs://{}", name),
            self.project_flag(),
            format!("--location={}", location),
        ];
        if let Some(class) = params.get("storage_class") {
            args.push(format!("--default-storage-class={}", class));
        }
        if params
            .get("uniform_access")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            args.push("--uniform-bucket-level-access".into());
        }
        args
    }
}

#[async_trait]
impl ProviderAdapter for GcloudAdapter {
    fn name(&self) -> &str {
        "gcloud"
    }

    async fn resource_exists(&self, descriptor: &ResourceDescriptor) -> AdapterResult<bool> {
        match descriptor.kind() {
            ResourceKind::Project => {
                self.describe(Self::describe_project_args(descriptor.name()))
                    .await
            }
            ResourceKind::Service => {
                let output = self.run(self.list_service_args(descriptor.name())).await?;
                if !output.success {
                    return Err(output.into_error());
                }
                Ok(output
                    .stdout
                    .lines()
                    .any(|line| line.trim() == descriptor.name()))
            }
            ResourceKind::Bucket => {
                self.describe(Self::describe_bucket_args(descriptor.name()))
                    .await
            }
        }
    }

    async fn create_project(
        &self,
        name: &str,
        params: &IndexMap<String, String>,
    ) -> AdapterResult<()> {
        self.apply(Self::create_project_args(name, params)).await
    }

    async fn enable_service(&self, name: &str) -> AdapterResult<()> {
        self.apply(self.enable_service_args(name)).await
    }

    async fn create_bucket(
        &self,
        name: &str,
        params: &IndexMap<String, String>,
    ) -> AdapterResult<()> {
        self.apply(self.create_bucket_args(name, params)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> GcloudAdapter {
        GcloudAdapter::new(GcloudSettings::new(&ProvisionTarget::new(
            "p1",
            "us-central1",
        )))
    }

    #[test]
    fn test_create_project_args() {
        let mut params = IndexMap::new();
        params.insert(PARAM_DISPLAY_NAME.to_string(), "PDF QA Generator".to_string());
        assert_eq!(
            GcloudAdapter::create_project_args("p1", &params),
            vec!["projects", "create", "p1", "--name=PDF QA Generator"]
        );
    }

    #[test]
    fn test_service_args_carry_project() {
        let adapter = adapter();
        assert_eq!(
            adapter.enable_service_args("documentai.googleapis.com"),
            vec![
                "services",
                "enable",
                "documentai.googleapis.com",
                "--project=p1"
            ]
        );
        assert!(adapter
            .list_service_args("storage.googleapis.com")
            .contains(&"--filter=config.name=storage.googleapis.com".to_string()));
    }

    #[test]
    fn test_bucket_location_defaults_to_region() {
        let adapter = adapter();
        let args = adapter.create_bucket_args("p1-pdf-input", &IndexMap::new());
        assert!(args.contains(&"gs://p1-pdf-input".to_string()));
        assert!(args.contains(&"--location=us-central1".to_string()));

        let mut params = IndexMap::new();
        params.insert(PARAM_LOCATION.to_string(), "EU".to_string());
        params.insert("uniform_access".to_string(), "true".to_string());
        let args = adapter.create_bucket_args("p1-pdf-input", &params);
        assert!(args.contains(&"--location=EU".to_string()));
        assert!(args.contains(&"--uniform-bucket-level-access".to_string()));
    }

    #[tokio::test]
    async fn test_missing_binary_is_permanent() {
        let adapter = GcloudAdapter::new(
            GcloudSettings::new(&ProvisionTarget::new("p1", "us-central1"))
                .with_binary("/nonexistent/gcloud-binary"),
        );
        let err = adapter.enable_service("storage.googleapis.com").await.unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Other);
        assert!(err.message.contains("Failed to spawn"));
    }

    #[cfg(unix)]
    mod fake_gcloud {
        use super::*;
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        /// Write an executable shell script standing in for gcloud.
        fn fake(dir: &TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("gcloud");
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "#!/bin/sh\n{}", body).unwrap();
            drop(file);
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn adapter_with(binary: PathBuf) -> GcloudAdapter {
            GcloudAdapter::new(
                GcloudSettings::new(&ProvisionTarget::new("p1", "us-central1"))
                    .with_binary(binary)
                    .with_command_timeout(Duration::from_secs(5)),
            )
        }

        #[tokio::test]
        async fn test_not_found_means_absent() {
            let dir = TempDir::new().unwrap();
            let bin = fake(
                &dir,
                "echo 'ERROR: (gcloud.storage.buckets.describe) NOT_FOUND: 404' >&2\nexit 1",
            );
            let exists = adapter_with(bin)
                .resource_exists(&ResourceDescriptor::bucket("b"))
                .await
                .unwrap();
            assert!(!exists);
        }

        #[tokio::test]
        async fn test_service_listing() {
            let dir = TempDir::new().unwrap();
            let bin = fake(&dir, "echo storage.googleapis.com");
            let adapter = adapter_with(bin);
            assert!(adapter
                .resource_exists(&ResourceDescriptor::service("storage.googleapis.com"))
                .await
                .unwrap());
            assert!(!adapter
                .resource_exists(&ResourceDescriptor::service("bigquery.googleapis.com"))
                .await
                .unwrap());
        }

        #[tokio::test]
        async fn test_failure_is_classified() {
            let dir = TempDir::new().unwrap();
            let bin = fake(
                &dir,
                "echo 'ERROR: (gcloud.services.enable) PERMISSION_DENIED: nope' >&2\nexit 1",
            );
            let err = adapter_with(bin)
                .enable_service("documentai.googleapis.com")
                .await
                .unwrap_err();
            assert_eq!(err.kind, AdapterErrorKind::PermissionDenied);
        }

        #[tokio::test]
        async fn test_slow_command_times_out() {
            let dir = TempDir::new().unwrap();
            let bin = fake(&dir, "sleep 5");
            let adapter = GcloudAdapter::new(
                GcloudSettings::new(&ProvisionTarget::new("p1", "us-central1"))
                    .with_binary(bin)
                    .with_command_timeout(Duration::from_millis(100)),
            );
            let err = adapter
                .create_bucket("b", &IndexMap::new())
                .await
                .unwrap_err();
            assert_eq!(err.kind, AdapterErrorKind::Timeout);
        }
    }
}
