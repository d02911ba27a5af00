#![allow(deprecated)] // Command::cargo_bin

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SMALL_STACK: &str = r#"
stack "demo" {
    region "eu-west-1"
}

resource "code-bucket" kind="bucket" {
    properties {
        bucket-name "demo-bucket"
    }
}

resource "code" kind="object" {
    properties {
        bucket "${code-bucket.name}"
        key "echo.zip"
        source "echo.zip"
    }
}
"#;

const CYCLIC_STACK: &str = r#"
resource "a" kind="bucket" {
    depends-on "b"
    properties {
        bucket-name "a"
    }
}

resource "b" kind="bucket" {
    depends-on "a"
    properties {
        bucket-name "b"
    }
}
"#;

/// `stackflow` run in an empty directory with no global config
fn stackflow(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("stackflow").unwrap();
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("STACKFLOW_FILE")
        .env_remove("STACKFLOW_REGION")
        .env_remove("AWS_PROFILE");
    cmd
}

fn with_stack(content: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("stack.kdl"), content).unwrap();
    dir
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8(output.stdout).unwrap()
}

/// Line number of the plan entry for `resource`
fn action_index(plan: &str, resource: &str) -> usize {
    plan.lines()
        .position(|line| line.split_whitespace().nth(3) == Some(resource))
        .unwrap_or_else(|| panic!("{} not in plan:\n{}", resource, plan))
}

#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    stackflow(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--delete"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("export"));
}

#[test]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();
    stackflow(&dir)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stackflow"));
}

#[test]
fn test_validate_builtin_stack() {
    let dir = TempDir::new().unwrap();
    stackflow(&dir)
        .arg("validate")
        .assert()
        .success()
        .stderr(predicate::str::contains("built-in"))
        .stdout(predicate::str::contains("Stack is valid"))
        .stdout(predicate::str::contains("echo-function"))
        .stdout(predicate::str::contains("resources: 10"));
}

#[test]
fn test_validate_discovers_stack_file() {
    let dir = with_stack(SMALL_STACK);
    stackflow(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("stack: demo"))
        .stdout(predicate::str::contains("region: eu-west-1"))
        .stdout(predicate::str::contains("(object) <- code-bucket"));
}

#[test]
fn test_validate_rejects_cycle() {
    let dir = with_stack(CYCLIC_STACK);
    stackflow(&dir)
        .arg("validate")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_missing_explicit_file() {
    let dir = TempDir::new().unwrap();
    stackflow(&dir)
        .args(["validate", "--file", "nope.kdl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_file_from_environment() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("elsewhere.kdl");
    std::fs::write(&path, SMALL_STACK).unwrap();

    stackflow(&dir)
        .env("STACKFLOW_FILE", &path)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("stack: demo"));
}

#[test]
fn test_plan_creates_code_before_function() {
    let dir = TempDir::new().unwrap();
    let plan = stdout_of(stackflow(&dir).arg("plan"));

    let bucket = action_index(&plan, "code-bucket");
    let code = action_index(&plan, "function-code");
    let function = action_index(&plan, "echo-function");
    let deployment = action_index(&plan, "api-deployment");
    assert!(bucket < code && code < function && function < deployment);
    assert!(plan.contains("10 to create, 0 to delete"));
}

#[test]
fn test_plan_delete_is_reversed() {
    let dir = TempDir::new().unwrap();
    let plan = stdout_of(stackflow(&dir).args(["plan", "-d"]));

    let bucket = action_index(&plan, "code-bucket");
    let code = action_index(&plan, "function-code");
    let function = action_index(&plan, "echo-function");
    assert!(function < code && code < bucket);
    assert!(plan.contains("0 to create, 10 to delete"));
}

#[test]
fn test_export_json() {
    let dir = TempDir::new().unwrap();
    let out = stdout_of(stackflow(&dir).arg("export"));

    let doc: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(doc["AWSTemplateFormatVersion"], "2010-09-09");
    assert_eq!(doc["Resources"]["EchoFunction"]["Type"], "AWS::Lambda::Function");
}

#[test]
fn test_export_yaml() {
    let dir = TempDir::new().unwrap();
    stackflow(&dir)
        .args(["export", "--format", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("AWSTemplateFormatVersion:"));
}

#[test]
fn test_export_unknown_format() {
    let dir = TempDir::new().unwrap();
    stackflow(&dir)
        .args(["export", "--format", "toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown export format"));
}

#[test]
fn test_dry_run_create_prints_endpoint() {
    let dir = TempDir::new().unwrap();
    stackflow(&dir)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("in-memory"))
        .stdout(predicate::str::contains("10 resource(s) created"))
        .stdout(predicate::str::contains(
            ".execute-api.us-east-1.amazonaws.com/v1/users",
        ))
        .stdout(predicate::str::contains("GET https://"));
}

#[test]
fn test_dry_run_region_override() {
    let dir = TempDir::new().unwrap();
    stackflow(&dir)
        .args(["--dry-run", "--region", "ap-northeast-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            ".execute-api.ap-northeast-1.amazonaws.com/v1/users",
        ));
}

#[test]
fn test_dry_run_file_stack() {
    let dir = with_stack(SMALL_STACK);
    stackflow(&dir)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Creating stack 'demo'"))
        .stdout(predicate::str::contains("2 resource(s) created"));
}

#[test]
fn test_dry_run_delete_is_noop() {
    let dir = TempDir::new().unwrap();
    stackflow(&dir)
        .args(["--dry-run", "-d"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to delete"));
}

#[test]
fn test_dry_run_outputs_not_deployed() {
    let dir = TempDir::new().unwrap();
    stackflow(&dir)
        .args(["--dry-run", "outputs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not deployed"));
}

#[test]
fn test_dry_run_create_rejects_cycle() {
    let dir = with_stack(CYCLIC_STACK);
    stackflow(&dir)
        .arg("--dry-run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}
