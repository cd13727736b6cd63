//! Error types for the monitoring subsystem.

use std::path::PathBuf;
use thiserror::Error;

use crate::scanner::ScanError;

/// Errors from monitor operations.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Failed to initialize backend: {reason}")]
    InitFailed { reason: String },

    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("Event mask 0x{bits:02x} is not a single file event")]
    NotAFileEvent { bits: u32 },

    #[error("Event callback failed for {path}: {source}")]
    Callback {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Scanner error: {0}")]
    Scan(#[from] ScanError),

    #[error("Monitoring thread panicked")]
    ThreadPanicked,
}

impl From<notify::Error> for MonitorError {
    fn from(e: notify::Error) -> Self {
        MonitorError::InitFailed {
            reason: e.to_string(),
        }
    }
}
