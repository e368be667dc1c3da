//! CLI smoke tests for graft.
//!
//! These tests verify that all CLI commands run without panicking and
//! return appropriate exit codes.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::TempDir;

/// Get a Command for the graft binary.
fn graft_cmd() -> Command {
  cargo_bin_cmd!("graft")
}

/// Create a temp directory holding `spec.yaml` with `content`.
fn temp_spec(content: &str) -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("spec.yaml"), content).unwrap();
  temp
}

fn spec_path(temp: &TempDir) -> String {
  temp.path().join("spec.yaml").to_string_lossy().to_string()
}

const PATCHED_SPEC: &str = r#"
name: hello
sources:
  main:
    git:
      url: https://example.com/hello.git
      commit: v1.0.0
  fix:
    inline:
      file:
        contents: "--- a/x\n+++ b/x\n"
patches:
  main: [fix]
"#;

const BROKEN_PATCH_SPEC: &str = r#"
sources:
  main:
    git:
      url: https://example.com/hello.git
      commit: v1.0.0
patches:
  main: [missing]
"#;

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  graft_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  graft_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("graft"));
}

// =============================================================================
// Sources
// =============================================================================

#[test]
fn sources_lists_artifacts() {
  let temp = temp_spec(PATCHED_SPEC);
  graft_cmd()
    .args(["sources", &spec_path(&temp)])
    .assert()
    .success()
    .stdout(predicate::str::contains("main.tar.gz"))
    .stdout(predicate::str::contains("(patch)"));
}

#[test]
fn sources_json_output() {
  let temp = temp_spec(PATCHED_SPEC);
  let output = graft_cmd()
    .args(["--output", "json", "sources", &spec_path(&temp)])
    .output()
    .unwrap();
  assert!(output.status.success());

  let items: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let items = items.as_array().unwrap();
  assert_eq!(items.len(), 2);
  assert_eq!(items[0]["name"], "fix");
  assert!(items[0]["output"].is_null());
  assert_eq!(items[1]["output"], "main.tar.gz");
  assert_eq!(items[1]["patches"][0], "fix");
}

#[test]
fn missing_spec_fails() {
  graft_cmd()
    .args(["sources", "/nonexistent/spec.yaml"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to read spec"));
}

#[test]
fn unknown_patch_fails() {
  let temp = temp_spec(BROKEN_PATCH_SPEC);
  graft_cmd()
    .args(["sources", &spec_path(&temp)])
    .assert()
    .failure()
    .stderr(predicate::str::contains("missing"));
}

// =============================================================================
// Plan
// =============================================================================

#[test]
#[serial]
fn plan_shows_operations() {
  let temp = temp_spec(PATCHED_SPEC);
  graft_cmd()
    .env_remove("GRAFT_TAR_IMAGE")
    .env_remove("GRAFT_PATCH_IMAGE")
    .args(["plan", &spec_path(&temp)])
    .assert()
    .success()
    .stdout(predicate::str::contains("Plan:"))
    .stdout(predicate::str::contains("Artifacts: 1"))
    .stdout(predicate::str::contains("Patch spec source: main"));
}

#[test]
#[serial]
fn plan_json_is_a_definition() {
  let temp = temp_spec(PATCHED_SPEC);
  let output = graft_cmd()
    .args(["-o", "json", "plan", &spec_path(&temp)])
    .output()
    .unwrap();
  assert!(output.status.success());

  let def: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert!(def["ops"].as_array().is_some_and(|ops| !ops.is_empty()));
  assert!(def["output"]["digest"].as_str().unwrap().starts_with("sha256:"));
}

#[test]
#[serial]
fn plan_uses_tool_image_override() {
  let temp = temp_spec(PATCHED_SPEC);
  graft_cmd()
    .env("GRAFT_TAR_IMAGE", "registry.local/tar:1")
    .args(["-o", "json", "plan", &spec_path(&temp)])
    .assert()
    .success()
    .stdout(predicate::str::contains("docker-image://registry.local/tar:1"));
}
