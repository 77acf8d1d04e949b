//! One shrinker invocation driven by a [`Config`]
//!
//! Ties discovery, the engine, fingerprints and usage reports together the
//! way the command line runs them.

use crate::cache::{FingerprintCache, FINGERPRINT_FILE_NAME};
use crate::config::Config;
use crate::discovery::ClassFinder;
use crate::graph::{GraphStore, ShrinkType, STATE_FILE_NAME};
use crate::report::UsageReport;
use crate::shrinker::{ClassStream, FileStatus, ShrinkError, ShrinkSummary, Shrinker};
use miette::{IntoDiagnostic, Result, WrapErr};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// What a session did
#[derive(Debug)]
pub struct RunOutcome {
    pub summary: ShrinkSummary,
    /// False when a full run was made, including incremental fallbacks
    pub incremental: bool,
    /// Usage report of each processed shrink type and where it was written
    pub usage: Vec<(ShrinkType, UsageReport, PathBuf)>,
}

pub struct ShrinkSession<'a> {
    config: &'a Config,
}

impl<'a> ShrinkSession<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Forget the saved graph, fingerprints and usage reports
    ///
    /// Only files this crate writes are deleted. The state directory itself
    /// goes away once nothing else is left in it.
    pub fn clear_state(&self) -> Result<()> {
        let dir = &self.config.state_dir;
        if !dir.exists() {
            return Ok(());
        }

        let owned = [STATE_FILE_NAME.to_string(), FINGERPRINT_FILE_NAME.to_string()]
            .into_iter()
            .chain(ShrinkType::ALL.into_iter().map(UsageReport::file_name));
        for name in owned {
            let path = dir.join(name);
            if path.exists() {
                std::fs::remove_file(&path)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("Failed to remove {}", path.display()))?;
            }
        }

        let empty = std::fs::read_dir(dir).into_diagnostic()?.next().is_none();
        if empty {
            std::fs::remove_dir(dir)
                .into_diagnostic()
                .wrap_err_with(|| format!("Failed to clear {}", dir.display()))?;
        }
        info!("Cleared state in {}", dir.display());
        Ok(())
    }

    /// Rebuild everything from scratch
    pub fn run_full(&self) -> Result<RunOutcome> {
        let streams = ClassFinder::new(self.config).find_streams();
        let all_files = all_files(&streams);
        let shrinker = self.shrinker(streams)?;

        let summary = shrinker.run().into_diagnostic().wrap_err("Full shrink failed")?;
        self.finish(&shrinker, summary, &all_files, false)
    }

    /// Replay changes since the last run, falling back to a full run when
    /// there is no usable state or the changes cannot be applied in place
    pub fn run_incremental(&self) -> Result<RunOutcome> {
        let state_file = GraphStore::new(&self.config.state_dir).state_file();
        let fingerprints = FingerprintCache::load_or_default(&self.config.state_dir);
        if !state_file.exists() || fingerprints.is_empty() {
            info!("No previous state found, running a full shrink");
            return self.run_full();
        }

        let streams = ClassFinder::new(self.config).find_streams();
        let all_files = all_files(&streams);
        let changes = fingerprints.diff(&all_files);
        if changes.is_empty() {
            info!("No class files changed");
            return Ok(RunOutcome {
                summary: ShrinkSummary::default(),
                incremental: true,
                usage: Vec::new(),
            });
        }
        info!("{} class files changed since the last run", changes.len());

        let streams = attach_changes(streams, changes);
        let shrinker = self.shrinker(streams)?;

        match shrinker.handle_file_changes() {
            Ok(summary) => {
                shrinker
                    .graph()
                    .save_state()
                    .into_diagnostic()
                    .wrap_err("Failed to save graph state")?;
                self.finish(&shrinker, summary, &all_files, true)
            }
            Err(ShrinkError::Unsupported(reason)) => {
                warn!("Falling back to a full shrink: {} is not supported", reason);
                let summary = shrinker.run().into_diagnostic().wrap_err("Full shrink failed")?;
                self.finish(&shrinker, summary, &all_files, false)
            }
            Err(e) => Err(e).into_diagnostic().wrap_err("Incremental shrink failed"),
        }
    }

    fn shrinker(&self, streams: Vec<ClassStream>) -> Result<Shrinker> {
        let graph = GraphStore::new(&self.config.state_dir);
        Shrinker::with_threads(graph, streams, self.config.keep_rules()?, self.config.threads)
            .into_diagnostic()
            .wrap_err("Failed to start shrinker")
    }

    fn finish(
        &self,
        shrinker: &Shrinker,
        summary: ShrinkSummary,
        all_files: &[PathBuf],
        incremental: bool,
    ) -> Result<RunOutcome> {
        let mut usage = Vec::new();
        for shrink_type in shrinker.shrink_types() {
            let report = UsageReport::from_graph(shrinker.graph(), shrink_type);
            let path = self.config.state_dir.join(UsageReport::file_name(shrink_type));
            report
                .write(&path)
                .into_diagnostic()
                .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
            usage.push((shrink_type, report, path));
        }

        let mut fingerprints = FingerprintCache::new(&self.config.state_dir);
        fingerprints
            .record(all_files)
            .into_diagnostic()
            .wrap_err("Failed to fingerprint class files")?;
        fingerprints
            .save()
            .into_diagnostic()
            .wrap_err("Failed to save fingerprints")?;

        Ok(RunOutcome {
            summary,
            incremental,
            usage,
        })
    }
}

fn all_files(streams: &[ClassStream]) -> Vec<PathBuf> {
    streams.iter().flat_map(|s| s.files().iter().cloned()).collect()
}

/// Hand each changed file to the stream whose root contains it
fn attach_changes(streams: Vec<ClassStream>, mut changes: BTreeMap<PathBuf, FileStatus>) -> Vec<ClassStream> {
    streams
        .into_iter()
        .map(|stream| {
            let (mine, rest): (BTreeMap<_, _>, BTreeMap<_, _>) =
                std::mem::take(&mut changes)
                    .into_iter()
                    .partition(|(file, _)| stream.contains(file));
            changes = rest;
            stream.with_changed_files(mine)
        })
        .collect()
}
