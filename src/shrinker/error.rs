use crate::classfile::ClassFileError;
use crate::graph::{GraphError, NodeRef, ShrinkType};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a shrink run
#[derive(Error, Debug)]
pub enum ShrinkError {
    #[error("Failed to read class file {path}: {source}")]
    ClassFile {
        path: PathBuf,
        #[source]
        source: ClassFileError,
    },
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("No input stream contains {file} (class {class})")]
    UnresolvedStream { class: NodeRef, file: PathBuf },
    #[error("Stream '{stream}' has no output directory for {shrink_type}")]
    MissingOutput { stream: String, shrink_type: ShrinkType },
    #[error("Output directory {dir} of stream '{stream}' overlaps class root {root}")]
    OverlappingOutput {
        stream: String,
        dir: PathBuf,
        root: PathBuf,
    },
    #[error("Not supported: {0}")]
    Unsupported(String),
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl ShrinkError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ShrinkError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn class_file(path: impl Into<PathBuf>, source: ClassFileError) -> Self {
        ShrinkError::ClassFile {
            path: path.into(),
            source,
        }
    }
}
