//! Class file fingerprints for incremental runs
//!
//! Records size, modification time and a content hash of every input class
//! after a run, so the next incremental run can tell which files changed,
//! appeared or disappeared.

use crate::shrinker::FileStatus;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::debug;

/// Cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to read fingerprint file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse fingerprints: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Fingerprint version mismatch")]
    VersionMismatch,
}

/// Current fingerprint format version
const CACHE_VERSION: u32 = 1;

/// Name of the fingerprint file inside the state directory
pub const FINGERPRINT_FILE_NAME: &str = "fingerprints.json";

/// File metadata for change detection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileFingerprint {
    /// File modification time (as seconds since UNIX epoch)
    pub mtime: u64,
    /// File size in bytes
    pub size: u64,
    /// Content hash as hex
    pub content_hash: String,
}

impl FileFingerprint {
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let mtime = metadata
            .modified()?
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let content = fs::read(path)?;

        Ok(Self {
            mtime,
            size: metadata.len(),
            content_hash: Self::compute_hash(&content),
        })
    }

    /// Quick check if file might have changed (fast path)
    pub fn quick_changed(&self, path: &Path) -> bool {
        match fs::metadata(path) {
            Ok(metadata) => {
                let mtime = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                mtime != self.mtime || metadata.len() != self.size
            }
            Err(_) => true,
        }
    }

    /// Full check with content hash (slow path, only if quick check fails)
    pub fn content_changed(&self, path: &Path) -> bool {
        match fs::read(path) {
            Ok(content) => Self::compute_hash(&content) != self.content_hash,
            Err(_) => true,
        }
    }

    fn compute_hash(content: &[u8]) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

/// Fingerprints of every input class of the last run
#[derive(Debug, Serialize, Deserialize)]
pub struct FingerprintCache {
    version: u32,
    files: BTreeMap<PathBuf, FileFingerprint>,
    #[serde(skip)]
    path: PathBuf,
}

impl FingerprintCache {
    /// Empty cache stored in `state_dir`
    pub fn new(state_dir: &Path) -> Self {
        Self {
            version: CACHE_VERSION,
            files: BTreeMap::new(),
            path: state_dir.join(FINGERPRINT_FILE_NAME),
        }
    }

    /// Load the cache saved in `state_dir`
    pub fn load(state_dir: &Path) -> Result<Self, CacheError> {
        let path = state_dir.join(FINGERPRINT_FILE_NAME);
        let reader = BufReader::new(fs::File::open(&path)?);
        let mut cache: Self = serde_json::from_reader(reader)?;

        if cache.version != CACHE_VERSION {
            return Err(CacheError::VersionMismatch);
        }
        cache.path = path;
        Ok(cache)
    }

    /// Load the cache from `state_dir`, or start empty when none is usable
    pub fn load_or_default(state_dir: &Path) -> Self {
        Self::load(state_dir).unwrap_or_else(|e| {
            debug!("Starting with empty fingerprints: {}", e);
            Self::new(state_dir)
        })
    }

    pub fn save(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(fs::File::create(&self.path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace all fingerprints with those of `files`
    pub fn record(&mut self, files: &[PathBuf]) -> Result<(), CacheError> {
        let mut recorded = BTreeMap::new();
        for file in files {
            recorded.insert(file.clone(), FileFingerprint::from_path(file)?);
        }
        self.files = recorded;
        Ok(())
    }

    /// Compare `files` against the recorded fingerprints
    pub fn diff(&self, files: &[PathBuf]) -> BTreeMap<PathBuf, FileStatus> {
        let mut changes = BTreeMap::new();
        let current: BTreeSet<&PathBuf> = files.iter().collect();

        for file in files {
            match self.files.get(file) {
                None => {
                    changes.insert(file.clone(), FileStatus::Added);
                }
                Some(fingerprint) => {
                    if fingerprint.quick_changed(file) && fingerprint.content_changed(file) {
                        changes.insert(file.clone(), FileStatus::Changed);
                    }
                }
            }
        }

        for file in self.files.keys() {
            if !current.contains(file) {
                changes.insert(file.clone(), FileStatus::Removed);
            }
        }

        changes
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
