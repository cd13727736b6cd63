//! Platform notification backend built on `notify`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, unbounded};
use notify::event::{MetadataKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};

use super::{Backend, BackendEvent};
use crate::monitor::MonitorError;
use crate::monitor::event::FileEvent;

/// Recursive watcher using the platform's recommended notify implementation.
pub struct NotifyBackend {
    /// Channel for receiving file events.
    event_rx: Receiver<notify::Result<Event>>,
    /// The underlying file watcher (kept alive by storing it).
    watcher: notify::RecommendedWatcher,
    roots: HashSet<PathBuf>,
}

impl NotifyBackend {
    pub fn new() -> Result<Self, MonitorError> {
        let (tx, rx) = unbounded();

        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })?;

        Ok(Self {
            event_rx: rx,
            watcher,
            roots: HashSet::new(),
        })
    }

    fn collect(&self, res: notify::Result<Event>, out: &mut Vec<BackendEvent>) {
        match res {
            Ok(event) => out.extend(convert(event, &self.roots)),
            Err(e) => {
                tracing::error!("[native] file watch error: {e}");
                out.push(BackendEvent::Dropped {
                    paths: e.paths.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

impl Backend for NotifyBackend {
    fn name(&self) -> &str {
        "native"
    }

    fn watch(&mut self, path: &Path) -> Result<(), MonitorError> {
        self.watcher
            .watch(path, RecursiveMode::Recursive)
            .map_err(|e| MonitorError::PathWatchFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        self.roots.insert(path.to_path_buf());
        crate::debug_event!("native", "watching", "{}", path.display());
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) -> Result<(), MonitorError> {
        self.roots.remove(path);
        self.watcher
            .unwatch(path)
            .map_err(|e| MonitorError::PathWatchFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    fn poll(&mut self, timeout: Duration) -> Vec<BackendEvent> {
        let mut out = Vec::new();

        match self.event_rx.recv_timeout(timeout) {
            Ok(res) => self.collect(res, &mut out),
            Err(RecvTimeoutError::Timeout) => return out,
            Err(RecvTimeoutError::Disconnected) => {
                tracing::warn!("[native] event channel closed");
                return out;
            }
        }

        // Drain whatever else is already queued
        while let Ok(res) = self.event_rx.try_recv() {
            self.collect(res, &mut out);
        }

        out
    }
}

/// Translate one notify event into backend events.
///
/// Directories are not synced, so create/modify on a directory is dropped.
/// Renaming one reports `Dropped` so its contents are recovered by diff.
fn convert(event: Event, roots: &HashSet<PathBuf>) -> Vec<BackendEvent> {
    if event.need_rescan() {
        return vec![BackendEvent::Dropped {
            paths: event.paths,
            reason: "notification queue overflowed".to_string(),
        }];
    }

    let file = |path: PathBuf, event: FileEvent| BackendEvent::File { path, event };
    let not_dir = |path: &PathBuf| !path.is_dir();
    let root_gone = |path: &PathBuf| roots.contains(path);
    // A renamed directory carries files no single event names; the monitor
    // recovers them from a tree diff instead.
    let renamed_dir = |paths: Vec<PathBuf>| BackendEvent::Dropped {
        paths,
        reason: "directory renamed".to_string(),
    };
    let moved_in = |path: PathBuf| {
        if path.is_dir() {
            renamed_dir(vec![path])
        } else {
            file(path, FileEvent::Created)
        }
    };
    let moved_out = |path: PathBuf| {
        if root_gone(&path) {
            BackendEvent::DirMoved { path }
        } else {
            file(path, FileEvent::Deleted)
        }
    };

    match event.kind {
        EventKind::Create(_) => event
            .paths
            .into_iter()
            .filter(not_dir)
            .map(|p| file(p, FileEvent::Created))
            .collect(),

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.into_iter();
            let Some(from) = paths.next() else {
                return Vec::new();
            };
            let Some(to) = paths.next() else {
                return vec![moved_out(from)];
            };
            if root_gone(&from) {
                vec![BackendEvent::DirMoved { path: from }, moved_in(to)]
            } else if to.is_dir() {
                vec![renamed_dir(vec![from, to])]
            } else {
                vec![file(from, FileEvent::Deleted), file(to, FileEvent::Created)]
            }
        }

        // A directory leaving the tree looks like a file delete here; the
        // monitor tells them apart through the baseline.
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            event.paths.into_iter().map(moved_out).collect()
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.into_iter().map(moved_in).collect()
        }

        // Rename halves the platform could not pair up
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .into_iter()
            .map(|p| if p.exists() { moved_in(p) } else { moved_out(p) })
            .collect(),

        EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => Vec::new(),

        EventKind::Modify(_) => event
            .paths
            .into_iter()
            .filter(not_dir)
            .map(|p| file(p, FileEvent::Modified))
            .collect(),

        EventKind::Remove(RemoveKind::Folder) => event
            .paths
            .into_iter()
            .filter(root_gone)
            .map(|p| BackendEvent::DirMoved { path: p })
            .collect(),

        EventKind::Remove(_) => event.paths.into_iter().map(moved_out).collect(),

        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}
