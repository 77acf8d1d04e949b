//! Full shrink runs over class files on disk

mod common;

use class_shrinker::graph::GraphStore;
use class_shrinker::{ClassStream, ShrinkError, Shrinker, ShrinkType, UsageReport};
use common::*;
use std::fs;
use tempfile::TempDir;

const V: &str = "()V";

struct Project {
    dir: TempDir,
}

impl Project {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn classes(&self) -> std::path::PathBuf {
        self.dir.path().join("classes")
    }

    fn out(&self) -> std::path::PathBuf {
        self.dir.path().join("out")
    }

    fn state(&self) -> std::path::PathBuf {
        self.dir.path().join("state")
    }
}

#[test]
fn test_single_class_keeps_entry_point_only() {
    let project = Project::new();
    let a = write_class(
        &project.classes(),
        "A",
        &[method("a1", V, &[]), method("a2", V, &[])],
    );

    let streams = vec![stream("app", &project.classes(), &project.out(), vec![a])];
    let rules = keep_rules(vec![(ShrinkType::Full, keep_method("A", "a1"))]);
    let shrinker = Shrinker::new(GraphStore::new(project.state()), streams, rules).unwrap();
    let summary = shrinker.run().unwrap();

    assert_eq!(method_names(&project.out().join("A.class")), vec!["a1"]);
    let full = &summary.shrink_types[&ShrinkType::Full];
    assert_eq!(full.entry_points, 1);
    assert_eq!(full.kept_classes, 1);
    assert_eq!(full.kept_methods, 1);
    assert_eq!(full.removed_methods, 1);
}

#[test]
fn test_call_keeps_target_method() {
    let project = Project::new();
    let a = write_class(
        &project.classes(),
        "A",
        &[method("a1", V, &[]), method("a2", V, &[])],
    );
    let b = write_class(&project.classes(), "B", &[method("b1", V, &[("A", "a2", V)])]);

    let streams = vec![stream("app", &project.classes(), &project.out(), vec![a, b])];
    let rules = keep_rules(vec![(ShrinkType::Full, keep_method("B", "b1"))]);
    let shrinker = Shrinker::new(GraphStore::new(project.state()), streams, rules).unwrap();
    shrinker.run().unwrap();

    assert_eq!(method_names(&project.out().join("A.class")), vec!["a2"]);
    assert_eq!(method_names(&project.out().join("B.class")), vec!["b1"]);
}

#[test]
fn test_transitive_calls_and_unreachable_class() {
    let project = Project::new();
    let files = vec![
        write_class(&project.classes(), "com/example/Main", &[method("main", V, &[("com/example/A", "a", V)])]),
        write_class(&project.classes(), "com/example/A", &[method("a", V, &[("com/example/B", "b", V)])]),
        write_class(&project.classes(), "com/example/B", &[method("b", V, &[]), method("unused", V, &[])]),
        write_class(&project.classes(), "com/example/Dead", &[method("d", V, &[("com/example/B", "b", V)])]),
    ];

    let streams = vec![stream("app", &project.classes(), &project.out(), files)];
    let rules = keep_rules(vec![(ShrinkType::Full, keep_method("com/example/Main", "main"))]);
    let shrinker = Shrinker::new(GraphStore::new(project.state()), streams, rules).unwrap();
    let summary = shrinker.run().unwrap();

    let out = project.out().join("com/example");
    assert_eq!(method_names(&out.join("B.class")), vec!["b"]);
    assert!(!out.join("Dead.class").exists());
    assert_eq!(summary.shrink_types[&ShrinkType::Full].kept_classes, 3);

    let graph = shrinker.graph();
    let b = class_shrinker::NodeRef::member("com/example/B", "b", V);
    assert_eq!(graph.counter(&b, ShrinkType::Full), 1);
}

#[test]
fn test_parameter_type_keeps_class() {
    let project = Project::new();
    let files = vec![
        write_class(&project.classes(), "a/Main", &[method("run", "(La/Param;)V", &[])]),
        write_class(&project.classes(), "a/Param", &[method("p", V, &[])]),
    ];

    let streams = vec![stream("app", &project.classes(), &project.out(), files)];
    let rules = keep_rules(vec![(ShrinkType::Full, keep_method("a/Main", "run"))]);
    let shrinker = Shrinker::new(GraphStore::new(project.state()), streams, rules).unwrap();
    shrinker.run().unwrap();

    let param = project.out().join("a/Param.class");
    assert!(param.exists());
    assert!(method_names(&param).is_empty());
}

#[test]
fn test_shrink_types_are_independent() {
    let project = Project::new();
    let multidex_out = project.dir.path().join("main-dex");
    let a = write_class(
        &project.classes(),
        "A",
        &[method("a1", V, &[]), method("a2", V, &[])],
    );

    let streams = vec![stream("app", &project.classes(), &project.out(), vec![a])
        .with_output(ShrinkType::LegacyMultidex, &multidex_out)];
    let rules = keep_rules(vec![
        (ShrinkType::Full, keep_method("A", "a1")),
        (ShrinkType::LegacyMultidex, keep_method("A", "a2")),
    ]);
    let shrinker = Shrinker::new(GraphStore::new(project.state()), streams, rules).unwrap();
    let summary = shrinker.run().unwrap();

    assert_eq!(summary.shrink_types.len(), 2);
    assert_eq!(method_names(&project.out().join("A.class")), vec!["a1"]);
    assert_eq!(method_names(&multidex_out.join("A.class")), vec!["a2"]);
}

#[test]
fn test_multiple_streams_write_to_their_own_outputs() {
    let project = Project::new();
    let lib_root = project.dir.path().join("lib");
    let lib_out = project.dir.path().join("lib-out");
    let app = write_class(&project.classes(), "app/Main", &[method("main", V, &[("lib/Util", "help", V)])]);
    let lib = write_class(&lib_root, "lib/Util", &[method("help", V, &[]), method("other", V, &[])]);

    let streams = vec![
        stream("app", &project.classes(), &project.out(), vec![app]),
        stream("lib", &lib_root, &lib_out, vec![lib]),
    ];
    let rules = keep_rules(vec![(ShrinkType::Full, keep_method("app/Main", "main"))]);
    let shrinker = Shrinker::new(GraphStore::new(project.state()), streams, rules).unwrap();
    shrinker.run().unwrap();

    assert!(project.out().join("app/Main.class").exists());
    assert_eq!(method_names(&lib_out.join("lib/Util.class")), vec!["help"]);
    assert!(!project.out().join("lib/Util.class").exists());
}

#[test]
fn test_missing_output_is_an_error() {
    let project = Project::new();
    let a = write_class(&project.classes(), "A", &[method("a1", V, &[])]);

    let streams = vec![ClassStream::new("app", project.classes()).with_files(vec![a])];
    let rules = keep_rules(vec![(ShrinkType::Full, keep_method("A", "a1"))]);
    let shrinker = Shrinker::new(GraphStore::new(project.state()), streams, rules).unwrap();

    assert!(shrinker.run().is_err());
}

#[test]
fn test_rerun_clears_stale_output() {
    let project = Project::new();
    let a = write_class(&project.classes(), "A", &[method("a1", V, &[])]);
    fs::create_dir_all(project.out()).unwrap();
    fs::write(project.out().join("Stale.class"), b"old").unwrap();

    let streams = vec![stream("app", &project.classes(), &project.out(), vec![a])];
    let rules = keep_rules(vec![(ShrinkType::Full, keep_method("A", "a1"))]);
    let shrinker = Shrinker::new(GraphStore::new(project.state()), streams, rules).unwrap();
    shrinker.run().unwrap();

    assert!(!project.out().join("Stale.class").exists());
    assert!(project.out().join("A.class").exists());
}

#[test]
fn test_state_dir_shared_with_inputs_keeps_them() {
    let project = Project::new();
    let a = write_class(&project.classes(), "A", &[method("a1", V, &[])]);
    let config = project.dir.path().join("shrinker.yml");
    fs::write(&config, "streams: []").unwrap();

    let streams = vec![stream("app", &project.classes(), &project.out(), vec![a.clone()])];
    let rules = keep_rules(vec![(ShrinkType::Full, keep_method("A", "a1"))]);
    let shrinker = Shrinker::new(GraphStore::new(project.dir.path()), streams, rules).unwrap();
    shrinker.run().unwrap();
    shrinker.run().unwrap();

    assert!(a.exists());
    assert!(config.exists());
    assert!(project.out().join("A.class").exists());
}

#[test]
fn test_output_over_class_root_is_rejected() {
    let project = Project::new();
    let a = write_class(&project.classes(), "A", &[method("a1", V, &[])]);

    let streams = vec![stream("app", &project.classes(), project.dir.path(), vec![a.clone()])];
    let rules = keep_rules(vec![(ShrinkType::Full, keep_method("A", "a1"))]);
    let shrinker = Shrinker::new(GraphStore::new(project.state()), streams, rules).unwrap();

    assert!(matches!(
        shrinker.run(),
        Err(ShrinkError::OverlappingOutput { .. })
    ));
    assert!(a.exists());
}

#[test]
fn test_saved_graph_round_trips() {
    let project = Project::new();
    let files = vec![
        write_class(&project.classes(), "A", &[method("a1", V, &[]), method("a2", V, &[])]),
        write_class(&project.classes(), "B", &[method("b1", V, &[("A", "a2", V)])]),
    ];

    let streams = vec![stream("app", &project.classes(), &project.out(), files)];
    let rules = keep_rules(vec![(ShrinkType::Full, keep_method("B", "b1"))]);
    let shrinker = Shrinker::new(GraphStore::new(project.state()), streams, rules).unwrap();
    shrinker.run().unwrap();

    let loaded = GraphStore::new(project.state());
    loaded.load_state().unwrap();
    assert_eq!(loaded.snapshot(), shrinker.graph().snapshot());
}

#[test]
fn test_usage_report_lists_removed_code() {
    let project = Project::new();
    let files = vec![
        write_class(&project.classes(), "com/example/A", &[method("a1", V, &[]), method("a2", "(I)Ljava/lang/String;", &[])]),
        write_class(&project.classes(), "com/example/Dead", &[method("d", V, &[])]),
    ];

    let streams = vec![stream("app", &project.classes(), &project.out(), files)];
    let rules = keep_rules(vec![(ShrinkType::Full, keep_method("com/example/A", "a1"))]);
    let shrinker = Shrinker::new(GraphStore::new(project.state()), streams, rules).unwrap();
    shrinker.run().unwrap();

    let report = UsageReport::from_graph(shrinker.graph(), ShrinkType::Full);
    assert_eq!(
        report.to_text(),
        "com.example.A\n    java.lang.String a2(int)\ncom.example.Dead\n"
    );
}
