//! Error types for the reconciliation subsystem.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Synced files database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Non-existing event set: 0x{bits:02x} is not CREATED, MODIFIED or DELETED")]
    UnknownEventType { bits: u32 },

    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    #[error("Output file has no file name: {0}")]
    NoBasename(PathBuf),

    #[error("Failed to start reconciler: {reason}")]
    SpawnFailed { reason: String },

    #[error("Reconciler thread panicked")]
    ThreadPanicked,
}

impl SyncError {
    /// Errors caused by one queue item's data rather than by the store.
    ///
    /// The reconciler drops such an item and keeps going.
    pub fn is_item_error(&self) -> bool {
        matches!(self, Self::NonUtf8Path(_) | Self::NoBasename(_))
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
