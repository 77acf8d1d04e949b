//! The shrinking engine
//!
//! A full [`Shrinker::run`] scans every class into the graph in parallel,
//! counts reachability from the entry points of each configured shrink type
//! and writes filtered classes to the per-type output directories.
//! [`Shrinker::handle_file_changes`] replays edge changes of edited classes
//! against a previously saved graph.

mod counting;
mod error;
mod keep;
mod scanner;
mod stream;

pub use counting::{decrement_counter, increment_counter, ModifiedClasses};
pub use error::ShrinkError;
pub use keep::{AnyKeepRule, KeepRule, KeepRules, PatternKeepRule};
pub use scanner::{scan_class, ClassScanner, EntryPoints, ScannedClass, ScannedMethod};
pub use stream::{ClassStream, FileStatus};

use crate::analysis::CycleDetector;
use crate::graph::{GraphError, GraphStore, NodeRef, ShrinkType};
use crate::rewriter::ClassRewriter;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Per shrink type results of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeSummary {
    pub entry_points: usize,
    /// Classes kept across the whole graph after the run
    pub kept_classes: usize,
    /// Methods kept in the files this run wrote
    pub kept_methods: usize,
    pub removed_methods: usize,
    pub rewritten_files: usize,
    pub removed_files: usize,
}

/// Results of a full or incremental run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShrinkSummary {
    /// Class files scanned (full run) or re-scanned (incremental run)
    pub classes_scanned: usize,
    pub shrink_types: BTreeMap<ShrinkType, TypeSummary>,
}

impl fmt::Display for ShrinkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} class files processed", self.classes_scanned)?;
        for (shrink_type, summary) in &self.shrink_types {
            write!(
                f,
                "; {}: {} classes kept, {} methods kept, {} removed",
                shrink_type, summary.kept_classes, summary.kept_methods, summary.removed_methods
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RewriteOutcome {
    kept_methods: usize,
    removed_methods: usize,
}

/// Dead code shrinker over a set of class streams
pub struct Shrinker {
    graph: GraphStore,
    streams: Vec<ClassStream>,
    keep_rules: KeepRules,
    pool: ThreadPool,
}

impl Shrinker {
    /// Create a shrinker using the default number of worker threads
    pub fn new(graph: GraphStore, streams: Vec<ClassStream>, keep_rules: KeepRules) -> Result<Self, ShrinkError> {
        Self::with_threads(graph, streams, keep_rules, 0)
    }

    /// Create a shrinker with `threads` workers; zero picks the rayon default
    pub fn with_threads(
        graph: GraphStore,
        streams: Vec<ClassStream>,
        keep_rules: KeepRules,
        threads: usize,
    ) -> Result<Self, ShrinkError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("shrinker-{}", i))
            .build()?;

        Ok(Self {
            graph,
            streams,
            keep_rules,
            pool,
        })
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn into_graph(self) -> GraphStore {
        self.graph
    }

    pub fn streams(&self) -> &[ClassStream] {
        &self.streams
    }

    /// Shrink types that have a keep rule, in a fixed order
    pub fn shrink_types(&self) -> Vec<ShrinkType> {
        ShrinkType::ALL
            .into_iter()
            .filter(|t| self.keep_rules.contains_key(t))
            .collect()
    }

    /// Output directories are wiped by a full run, so none may be or contain
    /// a stream root
    fn check_output_dirs(&self) -> Result<(), ShrinkError> {
        for stream in &self.streams {
            for (_, dir) in stream.output_dirs() {
                if let Some(input) = self.streams.iter().find(|s| s.root().starts_with(dir)) {
                    return Err(ShrinkError::OverlappingOutput {
                        stream: stream.name().to_string(),
                        dir: dir.to_path_buf(),
                        root: input.root().to_path_buf(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Build the graph from scratch, shrink every configured type and persist
    /// the graph
    pub fn run(&self) -> Result<ShrinkSummary, ShrinkError> {
        info!("Starting full shrink of {} streams", self.streams.len());

        self.check_output_dirs()?;
        self.graph.remove_stored_state()?;
        self.graph.clear();
        for stream in &self.streams {
            for (_, dir) in stream.output_dirs() {
                clear_directory(dir)?;
            }
        }

        let files: Vec<&Path> = self
            .streams
            .iter()
            .flat_map(|s| s.files().iter().map(PathBuf::as_path))
            .collect();

        info!("Scanning {} class files...", files.len());
        let entry_points = EntryPoints::new();
        let scanner = ClassScanner::new(&self.graph, &self.keep_rules, &entry_points);
        self.pool
            .install(|| files.par_iter().try_for_each(|file| scanner.scan_file(file)))?;
        info!(
            "Graph has {} nodes, {} edges",
            self.graph.node_count(),
            self.graph.edge_count()
        );

        let mut summary = ShrinkSummary {
            classes_scanned: files.len(),
            ..Default::default()
        };

        for shrink_type in self.shrink_types() {
            let roots = entry_points.get(shrink_type);
            for root in &roots {
                increment_counter(&self.graph, root, shrink_type, None);
            }

            let kept = self.graph.classes_to_keep(shrink_type);
            info!(
                "{}: {} entry points, keeping {} of {} classes",
                shrink_type,
                roots.len(),
                kept.len(),
                files.len()
            );
            self.warn_pinned_cycles(shrink_type);

            let mut type_summary = self.rewrite_classes(&kept, shrink_type)?;
            type_summary.entry_points = roots.len();
            summary.shrink_types.insert(shrink_type, type_summary);
        }

        self.graph.save_state()?;
        info!("Shrink complete: {}", summary);
        Ok(summary)
    }

    /// Apply edits of changed class files to the saved graph and rewrite
    /// every class whose kept methods changed
    ///
    /// The updated graph stays in memory; call [`GraphStore::save_state`] to
    /// persist it.
    pub fn handle_file_changes(&self) -> Result<ShrinkSummary, ShrinkError> {
        self.graph.load_state()?;

        let mut changed: Vec<&Path> = Vec::new();
        for stream in &self.streams {
            for (file, status) in stream.changed_files() {
                match status {
                    FileStatus::Changed => changed.push(file),
                    FileStatus::Added => {
                        return Err(ShrinkError::Unsupported(format!(
                            "incremental handling of new class file {}",
                            file.display()
                        )))
                    }
                    FileStatus::Removed => {
                        return Err(ShrinkError::Unsupported(format!(
                            "incremental handling of removed class file {}",
                            file.display()
                        )))
                    }
                }
            }
        }
        info!("Processing {} changed class files", changed.len());

        let shrink_types = self.shrink_types();
        let modified: HashMap<ShrinkType, ModifiedClasses> = shrink_types
            .iter()
            .map(|&t| (t, ModifiedClasses::new()))
            .collect();
        self.pool.install(|| {
            changed
                .par_iter()
                .try_for_each(|file| self.apply_changed_file(file, &modified))
        })?;

        let mut summary = ShrinkSummary {
            classes_scanned: changed.len(),
            ..Default::default()
        };

        for shrink_type in shrink_types {
            let mut classes: Vec<NodeRef> = modified[&shrink_type]
                .iter()
                .map(|c| c.key().clone())
                .filter(|c| self.graph.is_registered_class(c))
                .collect();
            classes.sort();

            let kept: HashSet<NodeRef> = self.graph.classes_to_keep(shrink_type).into_iter().collect();
            let (to_rewrite, to_remove): (Vec<NodeRef>, Vec<NodeRef>) =
                classes.into_iter().partition(|c| kept.contains(c));
            info!(
                "{}: {} modified classes to rewrite, {} no longer kept",
                shrink_type,
                to_rewrite.len(),
                to_remove.len()
            );

            let mut type_summary = self.rewrite_classes(&to_rewrite, shrink_type)?;
            type_summary.kept_classes = kept.len();
            for class in &to_remove {
                if self.remove_output(class, shrink_type)? {
                    type_summary.removed_files += 1;
                }
            }
            summary.shrink_types.insert(shrink_type, type_summary);
        }

        Ok(summary)
    }

    /// Diff one changed class against its recorded dependencies
    fn apply_changed_file(
        &self,
        file: &Path,
        modified: &HashMap<ShrinkType, ModifiedClasses>,
    ) -> Result<(), ShrinkError> {
        let bytes = fs::read(file).map_err(|e| ShrinkError::io(file, e))?;
        let scanned = scan_class(&bytes).map_err(|e| ShrinkError::class_file(file, e))?;

        let previous = self.graph.members_of(&scanned.reference).ok_or_else(|| {
            ShrinkError::Unsupported(format!(
                "changed file {} declares unknown class {}",
                file.display(),
                scanned.name
            ))
        })?;
        let current: BTreeSet<&NodeRef> = scanned.methods.iter().map(|m| &m.reference).collect();
        if let Some(removed) = previous.keys().find(|r| !current.contains(r)) {
            return Err(ShrinkError::Unsupported(format!(
                "removing method {} from a changed class",
                removed
            )));
        }
        if let Some(added) = scanned.methods.iter().find(|m| !previous.contains_key(&m.reference)) {
            return Err(ShrinkError::Unsupported(format!(
                "adding method {} to a changed class",
                added.reference
            )));
        }

        // The edited class itself needs fresh output wherever it is kept
        for classes in modified.values() {
            classes.insert(scanned.reference.clone());
        }

        for method in &scanned.methods {
            let old: BTreeSet<NodeRef> = self.graph.dependencies(&method.reference).into_iter().collect();

            for added in method.dependencies.difference(&old) {
                debug!("New edge {} -> {}", method.reference, added);
                self.graph.add_dependency(&method.reference, added);
                for (&shrink_type, classes) in modified {
                    if self.graph.counter(&method.reference, shrink_type) > 0 {
                        increment_counter(&self.graph, added, shrink_type, Some(classes));
                    }
                }
            }

            for removed in old.difference(&method.dependencies) {
                debug!("Dropped edge {} -> {}", method.reference, removed);
                self.graph.remove_dependency(&method.reference, removed);
                for (&shrink_type, classes) in modified {
                    if self.graph.counter(&method.reference, shrink_type) > 0 {
                        decrement_counter(&self.graph, removed, shrink_type, Some(classes))?;
                    }
                }
            }
        }

        Ok(())
    }

    fn rewrite_classes(&self, classes: &[NodeRef], shrink_type: ShrinkType) -> Result<TypeSummary, ShrinkError> {
        let outcomes: Vec<RewriteOutcome> = self.pool.install(|| {
            classes
                .par_iter()
                .map(|class| self.rewrite_class(class, shrink_type))
                .collect::<Result<Vec<_>, _>>()
        })?;

        Ok(TypeSummary {
            kept_classes: classes.len(),
            kept_methods: outcomes.iter().map(|o| o.kept_methods).sum(),
            removed_methods: outcomes.iter().map(|o| o.removed_methods).sum(),
            rewritten_files: outcomes.len(),
            ..Default::default()
        })
    }

    fn rewrite_class(&self, class: &NodeRef, shrink_type: ShrinkType) -> Result<RewriteOutcome, ShrinkError> {
        let (file, output) = self.output_path(class, shrink_type)?;
        let keep = self.graph.members_to_keep(class, shrink_type);

        let bytes = fs::read(&file).map_err(|e| ShrinkError::io(&file, e))?;
        let rewritten = ClassRewriter::new(&keep)
            .rewrite(&bytes)
            .map_err(|e| ShrinkError::class_file(&file, e))?;

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|e| ShrinkError::io(parent, e))?;
        }
        fs::write(&output, rewritten).map_err(|e| ShrinkError::io(&output, e))?;
        debug!("Wrote {}", output.display());

        let total = self.graph.members_of(class).map_or(0, |m| m.len());
        Ok(RewriteOutcome {
            kept_methods: keep.len(),
            removed_methods: total.saturating_sub(keep.len()),
        })
    }

    /// Delete the output of a class that is no longer kept. Returns whether
    /// a file was removed.
    fn remove_output(&self, class: &NodeRef, shrink_type: ShrinkType) -> Result<bool, ShrinkError> {
        let (_, output) = self.output_path(class, shrink_type)?;
        if !output.exists() {
            return Ok(false);
        }
        fs::remove_file(&output).map_err(|e| ShrinkError::io(&output, e))?;
        debug!("Removed {}", output.display());
        Ok(true)
    }

    /// Source file of a class and where its filtered copy goes
    fn output_path(&self, class: &NodeRef, shrink_type: ShrinkType) -> Result<(PathBuf, PathBuf), ShrinkError> {
        let file = self
            .graph
            .class_file(class)
            .ok_or_else(|| GraphError::UnknownClass(class.clone()))?;
        let unresolved = || ShrinkError::UnresolvedStream {
            class: class.clone(),
            file: file.clone(),
        };

        let stream = self
            .streams
            .iter()
            .find(|s| s.contains(&file))
            .ok_or_else(unresolved)?;
        let dir = stream.output_dir(shrink_type).ok_or_else(|| ShrinkError::MissingOutput {
            stream: stream.name().to_string(),
            shrink_type,
        })?;
        let relative = stream.relative_path(&file).ok_or_else(unresolved)?;

        let output = dir.join(relative);
        Ok((file, output))
    }

    fn warn_pinned_cycles(&self, shrink_type: ShrinkType) {
        let cycles = CycleDetector::new().find_pinned_cycles(&self.graph, shrink_type);
        if cycles.is_empty() {
            return;
        }
        let nodes: usize = cycles.iter().map(|c| c.size).sum();
        warn!(
            "{}: {} dependency cycles ({} nodes) hold their own counts; \
             incremental runs cannot release them",
            shrink_type,
            cycles.len(),
            nodes
        );
    }
}

fn clear_directory(dir: &Path) -> Result<(), ShrinkError> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| ShrinkError::io(dir, e))?;
    }
    fs::create_dir_all(dir).map_err(|e| ShrinkError::io(dir, e))
}
