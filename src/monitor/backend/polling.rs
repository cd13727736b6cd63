//! Polling backend: periodic tree diffs through the shared scanner.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use indexmap::IndexSet;

use super::{Backend, BackendEvent};
use crate::monitor::MonitorError;
use crate::monitor::event::FileEvent;
use crate::scanner::{PathScanner, TreeScanner};

/// Rescans every watched root once per interval.
#[derive(Debug)]
pub struct PollingBackend {
    scanner: PathScanner,
    roots: IndexSet<PathBuf>,
    interval: Duration,
    next_scan: Instant,
}

impl PollingBackend {
    pub fn new(scanner: PathScanner, interval: Duration) -> Self {
        Self {
            scanner,
            roots: IndexSet::new(),
            interval,
            next_scan: Instant::now() + interval,
        }
    }

    fn scan_root(&self, root: &Path, out: &mut Vec<BackendEvent>) {
        match self.scanner.scan_tree(root) {
            Ok(diffs) => {
                for (dir, diff) in diffs {
                    let file = |name: &String, event| BackendEvent::File {
                        path: dir.join(name),
                        event,
                    };
                    out.extend(diff.created.iter().map(|n| file(n, FileEvent::Created)));
                    out.extend(diff.modified.iter().map(|n| file(n, FileEvent::Modified)));
                    out.extend(diff.deleted.iter().map(|n| file(n, FileEvent::Deleted)));
                }
            }
            Err(e) => {
                tracing::error!("[polling] scan of {} failed: {e}", root.display());
                out.push(BackendEvent::Dropped {
                    paths: vec![root.to_path_buf()],
                    reason: e.to_string(),
                });
            }
        }
    }
}

impl Backend for PollingBackend {
    fn name(&self) -> &str {
        "polling"
    }

    fn watch(&mut self, path: &Path) -> Result<(), MonitorError> {
        if !path.is_dir() {
            return Err(MonitorError::PathWatchFailed {
                path: path.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }
        self.roots.insert(path.to_path_buf());
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) -> Result<(), MonitorError> {
        self.roots.shift_remove(path);
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Vec<BackendEvent> {
        let now = Instant::now();
        if now < self.next_scan {
            std::thread::sleep(timeout.min(self.next_scan - now));
            if Instant::now() < self.next_scan {
                return Vec::new();
            }
        }
        self.next_scan = Instant::now() + self.interval;

        let mut out = Vec::new();
        for root in &self.roots {
            if !root.exists() {
                out.push(BackendEvent::DirMoved { path: root.clone() });
                continue;
            }
            self.scan_root(root, &mut out);
        }
        out
    }

    fn refreshes_baseline(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_poll_reports_changes_after_interval() {
        let temp = TempDir::new().unwrap();
        let scanner = PathScanner::in_memory(Vec::new()).unwrap();
        scanner.scan_tree(temp.path()).unwrap();

        let mut backend = PollingBackend::new(scanner, Duration::from_millis(20));
        backend.watch(temp.path()).unwrap();

        fs::write(temp.path().join("a.txt"), "a").unwrap();

        let mut events = Vec::new();
        for _ in 0..10 {
            events = backend.poll(Duration::from_millis(20));
            if !events.is_empty() {
                break;
            }
        }

        assert_eq!(
            events,
            vec![BackendEvent::File {
                path: temp.path().join("a.txt"),
                event: FileEvent::Created
            }]
        );
        assert!(!backend.refreshes_baseline());
    }

    #[test]
    fn test_watch_rejects_missing_dir() {
        let scanner = PathScanner::in_memory(Vec::new()).unwrap();
        let mut backend = PollingBackend::new(scanner, Duration::from_millis(20));
        assert!(backend.watch(Path::new("/definitely/not/here")).is_err());
    }
}
