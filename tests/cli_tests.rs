//! CLI tests for gcprov
//!
//! This test suite covers:
//! - Argument parsing and help output
//! - `init`, `plan` and `provision` end to end
//! - Exit codes for planning, configuration and provisioning failures
//!
//! No real `gcloud` is needed: provisioning runs against a shell script
//! standing in for it.

mod common;

use assert_cmd::Command;
use common::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// A gcprov command isolated from the caller's environment and config files.
fn gcprov_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("gcprov").unwrap();
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join(".config"))
        .env_remove("GCPROV_PROJECT_ID")
        .env_remove("GCPROV_REGION")
        .env_remove("GCPROV_GCLOUD")
        .env_remove("GCPROV_CONFIG")
        .env_remove("GOOGLE_CLOUD_PROJECT")
        .env_remove("RUST_LOG")
        .arg("--no-color");
    cmd
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    gcprov_cmd(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("gcprov"));
}

#[test]
fn test_help_flag() {
    let dir = TempDir::new().unwrap();
    gcprov_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("provision"))
        .stdout(predicate::str::contains("plan"));
}

#[test]
fn test_no_command_fails() {
    let dir = TempDir::new().unwrap();
    gcprov_cmd(&dir).assert().failure();
}

// =============================================================================
// init
// =============================================================================

#[test]
fn test_init_writes_pipeline_manifest() {
    let dir = TempDir::new().unwrap();
    gcprov_cmd(&dir)
        .args(["init", "infra/gcprov.yaml", "--project-id", "p1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("11 resources for project p1"));

    let content = std::fs::read_to_string(dir.path().join("infra/gcprov.yaml")).unwrap();
    assert!(content.contains("project_id: p1"));
    assert!(content.contains("documentai.googleapis.com"));
    assert!(content.contains("${PROJECT_ID}-function-source"));
}

#[test]
fn test_init_default_project_id_is_timestamped() {
    let dir = TempDir::new().unwrap();
    gcprov_cmd(&dir).args(["init"]).assert().success();

    let content = std::fs::read_to_string(dir.path().join("gcprov.yaml")).unwrap();
    assert!(content.contains("project_id: pdf-qa-generator-"));
    assert!(content.contains("region: us-central1"));
}

#[test]
fn test_init_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("gcprov.yaml"), "keep me").unwrap();

    gcprov_cmd(&dir)
        .args(["init", "gcprov.yaml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("gcprov.yaml")).unwrap(),
        "keep me"
    );

    gcprov_cmd(&dir)
        .args(["init", "gcprov.yaml", "--force", "--project-id", "p2"])
        .assert()
        .success();
}

// =============================================================================
// plan
// =============================================================================

#[test]
fn test_plan_lists_project_first() {
    let (dir, path) = write_manifest(MINIMAL_MANIFEST);
    gcprov_cmd(&dir)
        .arg("plan")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("1. project/p1"))
        .stdout(predicate::str::contains(
            "3. bucket/p1-pdf-input  (after project/p1)",
        ));
}

#[test]
fn test_plan_after_init() {
    let dir = TempDir::new().unwrap();
    gcprov_cmd(&dir)
        .args(["init", "gcprov.yaml", "--project-id", "p9"])
        .assert()
        .success();

    gcprov_cmd(&dir)
        .args(["plan", "gcprov.yaml", "--format", "mermaid"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("graph TD"))
        .stdout(predicate::str::contains("project_p9 --> bucket_p9_pdf_input"));
}

#[test]
fn test_plan_dot_format() {
    let (dir, path) = write_manifest(MINIMAL_MANIFEST);
    gcprov_cmd(&dir)
        .arg("plan")
        .arg(&path)
        .args(["--format", "dot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("digraph ExecutionPlan"));
}

#[test]
fn test_plan_json_output() {
    let (dir, path) = write_manifest(MINIMAL_MANIFEST);
    let output = gcprov_cmd(&dir)
        .arg("plan")
        .arg(&path)
        .args(["--output", "json", "--region", "us-east1"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["project_id"], "p1");
    assert_eq!(json["region"], "us-east1");
    assert_eq!(json["steps"][0]["id"], "project/p1");
    assert_eq!(json["steps"][2]["parameters"]["location"], "us-east1");
}

#[test]
fn test_plan_cycle_exits_4() {
    let (dir, path) = write_manifest(CYCLIC_MANIFEST);
    gcprov_cmd(&dir)
        .arg("plan")
        .arg(&path)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Circular dependency"));
}

#[test]
fn test_unknown_dependency_exits_4() {
    let (dir, path) = write_manifest(
        "project_id: p1\nresources:\n  - kind: bucket\n    name: b\n    depends_on: [service/x.googleapis.com]\n",
    );
    gcprov_cmd(&dir)
        .arg("plan")
        .arg(&path)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("which is not declared"));
}

#[test]
fn test_malformed_manifest_exits_4() {
    let (dir, path) = write_manifest("resources:\n  - kind: disk\n    name: d\n");
    gcprov_cmd(&dir)
        .args(["plan"])
        .arg(&path)
        .args(["--project-id", "p1"])
        .assert()
        .code(4);
}

#[test]
fn test_missing_project_exits_5() {
    let (dir, path) = write_manifest("resources:\n  - kind: service\n    name: storage.googleapis.com\n");
    gcprov_cmd(&dir)
        .arg("plan")
        .arg(&path)
        .assert()
        .code(5)
        .stderr(predicate::str::contains("project_id"));
}

#[test]
fn test_project_from_environment() {
    let (dir, path) = write_manifest("resources:\n  - kind: service\n    name: storage.googleapis.com\n");
    gcprov_cmd(&dir)
        .env("GCPROV_PROJECT_ID", "from-env")
        .args(["plan", "--output", "json"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"project_id\": \"from-env\""));
}

#[test]
fn test_project_config_file_is_read() {
    let (dir, path) = write_manifest("resources:\n  - kind: service\n    name: storage.googleapis.com\n");
    std::fs::write(
        dir.path().join("gcprov.toml"),
        "[defaults]\nproject_id = \"from-config\"\nregion = \"asia-east1\"\n",
    )
    .unwrap();

    gcprov_cmd(&dir)
        .args(["plan", "--output", "json"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"project_id\": \"from-config\""))
        .stdout(predicate::str::contains("\"region\": \"asia-east1\""));
}

#[test]
fn test_invalid_config_exits_5() {
    let (dir, path) = write_manifest(MINIMAL_MANIFEST);
    std::fs::write(dir.path().join("bad.toml"), "[retry]\nmax_attempts = \"x\"\n").unwrap();

    gcprov_cmd(&dir)
        .args(["-c", "bad.toml", "plan"])
        .arg(&path)
        .assert()
        .code(5);
}

#[test]
fn test_missing_manifest_fails() {
    let dir = TempDir::new().unwrap();
    gcprov_cmd(&dir)
        .args(["plan", "nope.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.yaml"));
}

// =============================================================================
// provision
// =============================================================================

#[cfg(unix)]
#[test]
fn test_provision_with_fake_gcloud() {
    let (dir, path) = write_manifest(MINIMAL_MANIFEST);
    let gcloud = fake_gcloud(&dir);
    let report_path = dir.path().join("report.json");

    gcprov_cmd(&dir)
        .arg("provision")
        .arg(&path)
        .arg("--gcloud")
        .arg(&gcloud)
        .arg("--report")
        .arg(&report_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("created: [project/p1]"))
        .stdout(predicate::str::contains("created: [bucket/p1-pdf-input]"))
        .stdout(predicate::str::contains("gs://p1-pdf-input"))
        .stdout(predicate::str::contains("Provisioning completed successfully."));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["success"], true);
    assert_eq!(report["summary"]["created"], 3);

    let calls = std::fs::read_to_string(dir.path().join("calls.log")).unwrap();
    assert!(calls.contains("services enable documentai.googleapis.com --project=p1"));
    assert!(calls.contains("storage buckets create gs://p1-pdf-input --project=p1 --location=europe-west1"));
}

#[cfg(unix)]
#[test]
fn test_provision_cycle_makes_no_gcloud_calls() {
    let (dir, path) = write_manifest(CYCLIC_MANIFEST);
    let gcloud = fake_gcloud(&dir);

    gcprov_cmd(&dir)
        .arg("provision")
        .arg(&path)
        .arg("--gcloud")
        .arg(&gcloud)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Circular dependency"));

    assert!(!dir.path().join("calls.log").exists());
}

#[cfg(unix)]
#[test]
fn test_provision_failure_exits_2() {
    use std::os::unix::fs::PermissionsExt;

    let (dir, path) = write_manifest(MINIMAL_MANIFEST);
    let gcloud = dir.path().join("gcloud");
    std::fs::write(
        &gcloud,
        "#!/bin/sh\necho 'ERROR: PERMISSION_DENIED: caller lacks permission' >&2\nexit 1\n",
    )
    .unwrap();
    std::fs::set_permissions(&gcloud, std::fs::Permissions::from_mode(0o755)).unwrap();

    let output = gcprov_cmd(&dir)
        .args(["--output", "json", "provision"])
        .arg(&path)
        .arg("--gcloud")
        .arg(&gcloud)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["success"], false);
    assert_eq!(report["steps"][0]["result"]["status"], "failed");
    assert_eq!(report["steps"][1]["result"]["status"], "skipped");
    assert_eq!(report["steps"][2]["result"]["status"], "skipped");
}
