//! Integration tests for the prehook CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn prehook() -> Command {
    let mut cmd = Command::cargo_bin("prehook").unwrap();
    cmd.env_remove("SKIP").env_remove("RUST_LOG");
    cmd
}

/// A plain directory with a config file and a couple of sources
fn project(config: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".prehook.yaml"), config).unwrap();
    fs::write(dir.path().join("main.py"), "print('hi')\n").unwrap();
    fs::write(dir.path().join("notes.txt"), "todo\n").unwrap();
    dir
}

const CONFIG: &str = r#"
hooks:
  - id: no-python
    name: Forbid python
    language: fail
    entry: python is not allowed here
    types: [python]
  - id: no-rust
    name: Forbid rust
    language: fail
    entry: rust is not allowed here
    types: [rust]
"#;

#[test]
fn test_cli_help() {
    prehook()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Run the configured hooks"));
}

#[test]
fn test_cli_version() {
    prehook()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("prehook "));
}

#[test]
fn test_invalid_subcommand() {
    prehook()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_run_without_git_reports_each_hook() {
    let dir = project(CONFIG);

    prehook()
        .args(["run", "--without-git", "--all-files", "--color", "never", "--root"])
        .arg(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Forbid python"))
        .stdout(predicate::str::contains("Failed"))
        .stdout(predicate::str::contains("hookid: no-python"))
        .stdout(predicate::str::contains("python is not allowed here\n\nmain.py"))
        .stdout(predicate::str::contains("(no files to check)Skipped"));
}

#[test]
fn test_skip_env_turns_failure_into_success() {
    let dir = project(CONFIG);

    prehook()
        .env("SKIP", "no-python")
        .args(["run", "--without-git", "--all-files", "--color", "never", "--root"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Forbid python").and(predicate::str::contains("Skipped")))
        .stdout(predicate::str::contains("hookid").not());
}

#[test]
fn test_run_single_hook_by_id() {
    let dir = project(CONFIG);

    prehook()
        .args(["run", "no-rust", "--without-git", "--all-files", "--root"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Forbid python").not());

    prehook()
        .args(["run", "missing", "--without-git", "--all-files", "--root"])
        .arg(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("No hook with id `missing`"));
}

#[test]
fn test_origin_requires_source() {
    let dir = project(CONFIG);

    prehook()
        .args(["run", "--without-git", "--origin", "main", "--root"])
        .arg(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Specify both --origin and --source."));
}

#[test]
fn test_explicit_files_and_custom_config() {
    let dir = project("hooks: []\n");
    let config = dir.path().join("hooks.toml");
    fs::write(
        &config,
        r#"
[[hooks]]
id = "no-text"
language = "fail"
entry = "text files found"
types = ["text"]
"#,
    )
    .unwrap();

    prehook()
        .current_dir(dir.path())
        .args(["run", "--without-git", "--color", "never", "--config", "hooks.toml"])
        .args(["--files", "notes.txt"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("text files found\n\nnotes.txt"))
        .stdout(predicate::str::contains("main.py").not());
}

#[test]
fn test_missing_config_fails() {
    let dir = TempDir::new().unwrap();

    prehook()
        .args(["run", "--without-git", "--all-files", "--root"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No configuration file found"));
}

#[test]
fn test_relative_root_is_resolved_once() {
    let parent = TempDir::new().unwrap();
    let sub = parent.path().join("sub");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join(".prehook.yaml"), CONFIG).unwrap();
    fs::write(sub.join("main.py"), "print('hi')\n").unwrap();

    prehook()
        .current_dir(parent.path())
        .args(["run", "--without-git", "--all-files", "--color", "never", "--root", "sub"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("python is not allowed here\n\nmain.py"));
}
