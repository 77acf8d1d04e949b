// Input streams of class files and their per-shrink-type outputs

use crate::graph::ShrinkType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Status of a file in an incremental run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileStatus {
    Changed,
    Added,
    Removed,
}

/// A group of class files sharing a source root, such as project classes
/// or an external library
#[derive(Debug, Clone)]
pub struct ClassStream {
    name: String,
    root: PathBuf,
    files: Vec<PathBuf>,
    outputs: HashMap<ShrinkType, PathBuf>,
    changed_files: BTreeMap<PathBuf, FileStatus>,
}

impl ClassStream {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            files: Vec::new(),
            outputs: HashMap::new(),
            changed_files: BTreeMap::new(),
        }
    }

    /// Set the class files belonging to this stream; relative paths are
    /// taken relative to `root`
    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = files.into_iter().map(|f| self.root.join(f)).collect();
        self
    }

    pub fn with_output(mut self, shrink_type: ShrinkType, dir: impl Into<PathBuf>) -> Self {
        self.outputs.insert(shrink_type, dir.into());
        self
    }

    /// Set the status of files touched since the last run; relative paths
    /// are taken relative to `root`
    pub fn with_changed_files(mut self, changed: BTreeMap<PathBuf, FileStatus>) -> Self {
        self.changed_files = changed
            .into_iter()
            .map(|(file, status)| (self.root.join(file), status))
            .collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn changed_files(&self) -> &BTreeMap<PathBuf, FileStatus> {
        &self.changed_files
    }

    pub fn output_dir(&self, shrink_type: ShrinkType) -> Option<&Path> {
        self.outputs.get(&shrink_type).map(PathBuf::as_path)
    }

    pub fn output_dirs(&self) -> impl Iterator<Item = (&ShrinkType, &PathBuf)> {
        self.outputs.iter()
    }

    /// Whether `file` lives under this stream's root
    pub fn contains(&self, file: &Path) -> bool {
        file.starts_with(&self.root)
    }

    /// Path of `file` relative to the stream root
    pub fn relative_path<'a>(&self, file: &'a Path) -> Option<&'a Path> {
        file.strip_prefix(&self.root).ok()
    }
}
