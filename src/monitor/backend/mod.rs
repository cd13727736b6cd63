//! Change-detection backends.
//!
//! Every backend exposes the same capability set: watch and unwatch
//! directory trees, and yield raw observations when polled. The concrete
//! variant is chosen once at startup from [`BackendKind`].

mod native;
mod polling;

pub use native::NotifyBackend;
pub use polling::PollingBackend;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::MonitorError;
use super::event::FileEvent;
use crate::scanner::PathScanner;

/// A raw observation from a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// A file-level change.
    File { path: PathBuf, event: FileEvent },
    /// A watched root itself was moved or renamed.
    DirMoved { path: PathBuf },
    /// The backend lost events; affected paths need a rescan.
    ///
    /// An empty `paths` list means every watched path is affected.
    Dropped { paths: Vec<PathBuf>, reason: String },
}

/// Capability interface shared by all backends.
pub trait Backend: Send {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Start watching a directory tree.
    fn watch(&mut self, path: &std::path::Path) -> Result<(), MonitorError>;

    /// Stop watching a directory tree.
    fn unwatch(&mut self, path: &std::path::Path) -> Result<(), MonitorError>;

    /// Wait up to `timeout` and return whatever was observed.
    ///
    /// Returning early with an empty list is allowed.
    fn poll(&mut self, timeout: Duration) -> Vec<BackendEvent>;

    /// Whether live events should refresh the persisted baseline.
    ///
    /// Backends that diff against the baseline themselves return `false`.
    fn refreshes_baseline(&self) -> bool {
        true
    }
}

/// Which backend to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Platform notifications (inotify, FSEvents, ReadDirectoryChangesW).
    #[default]
    Native,
    /// Periodic tree diffs.
    Polling,
}

impl BackendKind {
    /// Construct the selected backend.
    pub fn build(
        self,
        scanner: &PathScanner,
        poll_interval: Duration,
    ) -> Result<Box<dyn Backend>, MonitorError> {
        match self {
            BackendKind::Native => Ok(Box::new(NotifyBackend::new()?)),
            BackendKind::Polling => Ok(Box::new(PollingBackend::new(
                scanner.clone(),
                poll_interval,
            ))),
        }
    }
}
