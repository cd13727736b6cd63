//! Error types for the tree-diff scanner.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Baseline database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Cannot read {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),
}

pub type ScanResult<T> = Result<T, ScanError>;
