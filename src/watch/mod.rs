//! Watch mode
//!
//! Monitors the class roots of every stream and re-runs the incremental
//! shrinker when class files change.

use colored::Colorize;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;
use thiserror::Error;

/// Watch mode errors
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to create file watcher: {0}")]
    WatcherError(#[from] notify::Error),
    #[error("Failed to receive events: {0}")]
    RecvError(#[from] std::sync::mpsc::RecvError),
}

/// Watches class roots for changes
pub struct ClassWatcher {
    /// Debounce duration in milliseconds
    debounce_ms: u64,
    /// Directories whose changes are our own writes
    ignored_dirs: Vec<PathBuf>,
}

impl ClassWatcher {
    pub fn new() -> Self {
        Self {
            debounce_ms: 500,
            ignored_dirs: Vec::new(),
        }
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Ignore changes below `dirs`, e.g. output and state directories
    pub fn with_ignored_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.ignored_dirs = dirs;
        self
    }

    /// Check if a path should trigger a rerun
    fn should_trigger(&self, path: &Path) -> bool {
        let is_class = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("class"))
            .unwrap_or(false);
        is_class && !self.ignored_dirs.iter().any(|dir| path.starts_with(dir))
    }

    /// Watch `roots` and call `on_change` with the changed class files.
    /// The callback runs once up front with no files and returns false to
    /// stop watching.
    pub fn watch<F>(&self, roots: &[PathBuf], mut on_change: F) -> Result<(), WatchError>
    where
        F: FnMut(&[PathBuf]) -> bool,
    {
        let (tx, rx) = channel();

        let mut debouncer = new_debouncer(Duration::from_millis(self.debounce_ms), tx)?;

        for root in roots {
            debouncer.watcher().watch(root, RecursiveMode::Recursive)?;
        }

        println!();
        println!("{}", "Watch mode active. Press Ctrl+C to stop.".cyan().bold());
        for root in roots {
            println!("{}", format!("   Watching: {}", root.display()).dimmed());
        }
        println!();

        if !on_change(&[]) {
            return Ok(());
        }

        loop {
            match rx.recv()? {
                Ok(events) => {
                    let relevant: BTreeSet<PathBuf> = events
                        .iter()
                        .filter(|e| {
                            matches!(e.kind, DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous)
                                && self.should_trigger(&e.path)
                        })
                        .map(|e| e.path.clone())
                        .collect();

                    if relevant.is_empty() {
                        continue;
                    }

                    println!();
                    println!(
                        "{}",
                        format!("Changes detected in {} class file(s), shrinking...", relevant.len()).yellow()
                    );

                    for path in relevant.iter().take(5) {
                        if let Some(name) = path.file_name() {
                            println!("   • {}", name.to_string_lossy().dimmed());
                        }
                    }
                    if relevant.len() > 5 {
                        println!("   • ... and {} more", relevant.len() - 5);
                    }
                    println!();

                    let changed: Vec<PathBuf> = relevant.into_iter().collect();
                    if !on_change(&changed) {
                        break;
                    }
                }
                Err(e) => {
                    eprintln!("{}: {:?}", "Watch error".red(), e);
                }
            }
        }

        Ok(())
    }
}

impl Default for ClassWatcher {
    fn default() -> Self {
        Self::new()
    }
}
