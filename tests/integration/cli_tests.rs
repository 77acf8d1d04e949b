//! CLI integration tests
//!
//! These tests run the binary against a small project written to a
//! temporary directory.

mod common;

use assert_cmd::Command;
use common::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const V: &str = "()V";

const CONFIG: &str = r#"
state_dir: state
streams:
  - name: app
    root: classes
    outputs:
      full: out
keep:
  - shrink_type: full
    class: "com/example/Main"
    method: main
"#;

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let classes = dir.path().join("classes");
    write_class(&classes, "com/example/Main", &[method("main", V, &[("com/example/A", "a1", V)])]);
    write_class(&classes, "com/example/A", &[method("a1", V, &[]), method("a2", V, &[])]);
    write_class(&classes, "com/example/Dead", &[method("d", V, &[])]);
    fs::write(dir.path().join("shrinker.yml"), CONFIG).unwrap();
    dir
}

fn cli(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("class-shrinker").unwrap();
    cmd.current_dir(dir);
    cmd
}

#[test]
fn test_cli_help() {
    Command::cargo_bin("class-shrinker")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--incremental"))
        .stdout(predicate::str::contains("--watch"))
        .stdout(predicate::str::contains("--debounce-ms"));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("class-shrinker")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("class-shrinker"));
}

#[test]
fn test_full_run_with_default_config() {
    let dir = project();

    cli(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Full shrink finished"));

    let out = dir.path().join("out/com/example");
    assert_eq!(method_names(&out.join("A.class")), vec!["a1"]);
    assert!(out.join("Main.class").exists());
    assert!(!out.join("Dead.class").exists());

    let usage = fs::read_to_string(dir.path().join("state/usage-full.txt")).unwrap();
    assert_eq!(usage, "com.example.A\n    void a2()\ncom.example.Dead\n");
    assert!(dir.path().join("state/reachability-graph.json").exists());
    assert!(dir.path().join("state/fingerprints.json").exists());
}

#[test]
fn test_explicit_config_and_json_output() {
    let dir = project();
    let config = dir.path().join("shrinker.yml");

    cli(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["--format", "json", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"mode\": \"full\""))
        .stdout(predicate::str::contains("\"kept_classes\": 2"));
}

#[test]
fn test_incremental_run() {
    let dir = project();
    cli(dir.path()).arg("--quiet").assert().success();

    write_class(
        &dir.path().join("classes"),
        "com/example/Main",
        &[method("main", V, &[("com/example/A", "a1", V), ("com/example/A", "a2", V)])],
    );

    cli(dir.path())
        .arg("--incremental")
        .assert()
        .success()
        .stdout(predicate::str::contains("Incremental shrink finished"));

    assert_eq!(
        method_names(&dir.path().join("out/com/example/A.class")),
        vec!["a1", "a2"]
    );
}

#[test]
fn test_missing_streams_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("shrinker.yml"), "keep: []\n").unwrap();

    cli(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No class streams configured"));
}
