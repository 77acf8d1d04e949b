//! Incremental runs replaying edits of class files against a saved graph

mod common;

use class_shrinker::graph::GraphStore;
use class_shrinker::shrinker::ShrinkError;
use class_shrinker::{Config, FileStatus, NodeRef, ShrinkSession, Shrinker, ShrinkType};
use common::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const V: &str = "()V";

/// A, B with B.b1 -> A.a2, shrunk once with B.b1 as the entry point
fn initial_run(dir: &Path) -> (PathBuf, PathBuf) {
    let classes = dir.join("classes");
    let a = write_class(&classes, "A", &[method("a1", V, &[]), method("a2", V, &[])]);
    let b = write_class(&classes, "B", &[method("b1", V, &[("A", "a2", V)])]);

    let streams = vec![stream("app", &classes, &dir.join("out"), vec![a.clone(), b.clone()])];
    let rules = keep_rules(vec![(ShrinkType::Full, keep_method("B", "b1"))]);
    Shrinker::new(GraphStore::new(dir.join("state")), streams, rules)
        .unwrap()
        .run()
        .unwrap();

    (a, b)
}

fn incremental_shrinker(dir: &Path, files: Vec<PathBuf>, changed: BTreeMap<PathBuf, FileStatus>) -> Shrinker {
    let classes = dir.join("classes");
    let streams = vec![stream("app", &classes, &dir.join("out"), files).with_changed_files(changed)];
    let rules = keep_rules(vec![(ShrinkType::Full, keep_method("B", "b1"))]);
    Shrinker::new(GraphStore::new(dir.join("state")), streams, rules).unwrap()
}

fn changed(file: &Path, status: FileStatus) -> BTreeMap<PathBuf, FileStatus> {
    let mut map = BTreeMap::new();
    map.insert(file.to_path_buf(), status);
    map
}

#[test]
fn test_retargeted_call_rewrites_callee() {
    let dir = TempDir::new().unwrap();
    let (a, b) = initial_run(dir.path());
    assert_eq!(method_names(&dir.path().join("out/A.class")), vec!["a2"]);

    // B.b1 now calls a1 instead of a2
    write_class(&dir.path().join("classes"), "B", &[method("b1", V, &[("A", "a1", V)])]);

    let shrinker = incremental_shrinker(dir.path(), vec![a, b.clone()], changed(&b, FileStatus::Changed));
    let summary = shrinker.handle_file_changes().unwrap();

    assert_eq!(summary.classes_scanned, 1);
    assert_eq!(method_names(&dir.path().join("out/A.class")), vec!["a1"]);
    assert_eq!(method_names(&dir.path().join("out/B.class")), vec!["b1"]);

    let graph = shrinker.graph();
    assert_eq!(graph.counter(&NodeRef::member("A", "a1", V), ShrinkType::Full), 1);
    assert_eq!(graph.counter(&NodeRef::member("A", "a2", V), ShrinkType::Full), 0);
}

#[test]
fn test_dropped_call_removes_unkept_class_output() {
    let dir = TempDir::new().unwrap();
    let (a, b) = initial_run(dir.path());
    assert!(dir.path().join("out/A.class").exists());

    write_class(&dir.path().join("classes"), "B", &[method("b1", V, &[])]);

    let shrinker = incremental_shrinker(dir.path(), vec![a, b.clone()], changed(&b, FileStatus::Changed));
    let summary = shrinker.handle_file_changes().unwrap();

    assert!(!dir.path().join("out/A.class").exists());
    assert_eq!(summary.shrink_types[&ShrinkType::Full].removed_files, 1);
}

#[test]
fn test_kept_classes_counts_whole_graph() {
    let dir = TempDir::new().unwrap();
    let (a, b) = initial_run(dir.path());

    // Only A changes; B stays kept without being rewritten
    write_class(&dir.path().join("classes"), "A", &[method("a1", V, &[("A", "a2", V)]), method("a2", V, &[])]);

    let shrinker = incremental_shrinker(dir.path(), vec![a.clone(), b], changed(&a, FileStatus::Changed));
    let summary = shrinker.handle_file_changes().unwrap();

    let full = &summary.shrink_types[&ShrinkType::Full];
    assert_eq!(full.rewritten_files, 1);
    assert_eq!(full.kept_classes, 2);
    assert_eq!(method_names(&dir.path().join("out/A.class")), vec!["a2"]);
}

#[test]
fn test_incremental_matches_full_run() {
    let dir = TempDir::new().unwrap();
    let (a, b) = initial_run(dir.path());

    write_class(&dir.path().join("classes"), "B", &[method("b1", V, &[("A", "a1", V), ("A", "a2", V)])]);
    let shrinker = incremental_shrinker(dir.path(), vec![a.clone(), b.clone()], changed(&b, FileStatus::Changed));
    shrinker.handle_file_changes().unwrap();
    let incremental = shrinker.graph().snapshot();

    let fresh_dir = TempDir::new().unwrap();
    let streams = vec![stream("app", &dir.path().join("classes"), &fresh_dir.path().join("out"), vec![a, b])];
    let rules = keep_rules(vec![(ShrinkType::Full, keep_method("B", "b1"))]);
    let full = Shrinker::new(GraphStore::new(fresh_dir.path().join("state")), streams, rules).unwrap();
    full.run().unwrap();

    assert_eq!(incremental, full.graph().snapshot());
}

#[test]
fn test_added_file_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let (a, b) = initial_run(dir.path());
    let c = write_class(&dir.path().join("classes"), "C", &[method("c", V, &[])]);

    let shrinker = incremental_shrinker(dir.path(), vec![a, b, c.clone()], changed(&c, FileStatus::Added));
    assert!(matches!(shrinker.handle_file_changes(), Err(ShrinkError::Unsupported(_))));
}

#[test]
fn test_removed_file_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let (a, b) = initial_run(dir.path());
    fs::remove_file(&a).unwrap();

    let shrinker = incremental_shrinker(dir.path(), vec![b], changed(&a, FileStatus::Removed));
    assert!(matches!(shrinker.handle_file_changes(), Err(ShrinkError::Unsupported(_))));
}

#[test]
fn test_removed_method_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let (a, b) = initial_run(dir.path());
    write_class(&dir.path().join("classes"), "A", &[method("a1", V, &[])]);

    let shrinker = incremental_shrinker(dir.path(), vec![a.clone(), b], changed(&a, FileStatus::Changed));
    assert!(matches!(shrinker.handle_file_changes(), Err(ShrinkError::Unsupported(_))));
}

#[test]
fn test_added_method_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let (a, b) = initial_run(dir.path());
    write_class(
        &dir.path().join("classes"),
        "A",
        &[method("a1", V, &[]), method("a2", V, &[]), method("a3", V, &[])],
    );

    let shrinker = incremental_shrinker(dir.path(), vec![a.clone(), b], changed(&a, FileStatus::Changed));
    assert!(matches!(shrinker.handle_file_changes(), Err(ShrinkError::Unsupported(_))));
}

#[test]
fn test_missing_state_is_an_error() {
    let dir = TempDir::new().unwrap();
    let classes = dir.path().join("classes");
    let b = write_class(&classes, "B", &[method("b1", V, &[])]);

    let shrinker = incremental_shrinker(dir.path(), vec![b.clone()], changed(&b, FileStatus::Changed));
    assert!(shrinker.handle_file_changes().is_err());
}

fn session_config(dir: &Path) -> Config {
    let path = dir.join("shrinker.yml");
    fs::write(
        &path,
        r#"
state_dir: state
streams:
  - name: app
    root: classes
    outputs:
      full: out
keep:
  - shrink_type: full
    class: B
    method: b1
"#,
    )
    .unwrap();
    Config::from_file(&path).unwrap()
}

#[test]
fn test_session_replays_edits() {
    let dir = TempDir::new().unwrap();
    let classes = dir.path().join("classes");
    write_class(&classes, "A", &[method("a1", V, &[]), method("a2", V, &[])]);
    write_class(&classes, "B", &[method("b1", V, &[("A", "a2", V)])]);
    let config = session_config(dir.path());
    let session = ShrinkSession::new(&config);

    // No saved state yet
    let first = session.run_incremental().unwrap();
    assert!(!first.incremental);
    assert!(dir.path().join("state/usage-full.txt").exists());

    // Nothing changed
    let idle = session.run_incremental().unwrap();
    assert!(idle.incremental);
    assert_eq!(idle.summary.classes_scanned, 0);

    write_class(&classes, "B", &[method("b1", V, &[("A", "a1", V), ("A", "a2", V)])]);
    let edited = session.run_incremental().unwrap();
    assert!(edited.incremental);
    assert_eq!(edited.summary.classes_scanned, 1);
    assert_eq!(method_names(&dir.path().join("out/A.class")), vec!["a1", "a2"]);

    // New classes need a full run
    write_class(&classes, "C", &[method("c", V, &[])]);
    let fallback = session.run_incremental().unwrap();
    assert!(!fallback.incremental);
    assert_eq!(fallback.summary.classes_scanned, 3);
}
