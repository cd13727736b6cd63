//! Tree-diff scanning against a persisted baseline.
//!
//! The monitor uses a [`TreeScanner`] to recompute events it could not
//! observe live: after downtime, after the backend dropped events, and on
//! every tick of the polling backend.

mod error;
mod path_scanner;

pub use error::{ScanError, ScanResult};
pub use path_scanner::PathScanner;

use std::path::{Path, PathBuf};

/// Changes found in one directory, as file names relative to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeDiff {
    pub created: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.created.len() + self.modified.len() + self.deleted.len()
    }
}

/// Compares on-disk state with a recorded baseline.
///
/// Implementations update their own baseline after each scan, so scanning
/// twice without filesystem changes yields empty diffs the second time.
pub trait TreeScanner: Send {
    /// Diff the tree under `root`, grouped per directory.
    fn scan_tree(&self, root: &Path) -> ScanResult<Vec<(PathBuf, TreeDiff)>>;

    /// Same diff as [`scan_tree`](Self::scan_tree), without recording it.
    fn diff_tree(&self, root: &Path) -> ScanResult<Vec<(PathBuf, TreeDiff)>>;

    /// Forget the baseline recorded for `root`.
    fn purge_path(&self, root: &Path) -> ScanResult<()>;

    /// Whether a baseline has ever been recorded for `root`.
    fn has_baseline(&self, root: &Path) -> ScanResult<bool>;

    /// Bring a single file's baseline entry in line with disk.
    fn refresh_file(&self, root: &Path, file: &Path) -> ScanResult<()>;
}
