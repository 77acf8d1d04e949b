use crate::config::Config;
use crate::shrinker::ClassStream;
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Finds the `.class` files of the configured streams
pub struct ClassFinder<'a> {
    config: &'a Config,
    output_dirs: Vec<PathBuf>,
}

impl<'a> ClassFinder<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            output_dirs: config.output_dirs(),
        }
    }

    /// Discover the files of every configured stream
    pub fn find_streams(&self) -> Vec<ClassStream> {
        self.config
            .streams
            .par_iter()
            .map(|stream| stream.to_stream(self.find_class_files(&stream.root)))
            .collect()
    }

    /// Every class file under `root`, sorted
    pub fn find_class_files(&self, root: &Path) -> Vec<PathBuf> {
        debug!("Scanning for class files in: {}", root.display());

        if !root.exists() {
            warn!("Class root does not exist: {}", root.display());
            return Vec::new();
        }

        // Build outputs are usually gitignored, so the standard filters
        // would hide the very files we need
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .build();

        let mut files: Vec<PathBuf> = walker
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| {
                let path = entry.path();

                if path.extension().and_then(|e| e.to_str()) != Some("class") {
                    return None;
                }

                if self.output_dirs.iter().any(|dir| path.starts_with(dir)) {
                    trace!("Skipping output: {}", path.display());
                    return None;
                }

                if self.config.should_exclude(path) {
                    trace!("Excluding: {}", path.display());
                    return None;
                }

                Some(path.to_path_buf())
            })
            .collect();

        files.sort();
        debug!("Found {} class files", files.len());
        files
    }
}
