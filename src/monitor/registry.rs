//! Monitored-path registry with thread-safe add/remove intents.
//!
//! Callers never touch the registry directly. [`RegistryHandle`] queues
//! intents under a mutex; the monitoring thread drains them with
//! [`Registry::take_intents`] at a point of its choosing and is the only
//! writer of [`MonitoredPath::monitoring`].
//!
//! Lifecycle per path:
//!
//! ```text
//! Unmonitored -> PendingAdd -> Monitoring -> PendingRemove -> Unmonitored
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use super::event::EventMask;

/// Metadata for one monitored path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredPath {
    pub path: PathBuf,
    pub event_mask: EventMask,
    /// Set once the backend accepted the path.
    pub monitoring: bool,
}

impl MonitoredPath {
    pub fn new(path: PathBuf, event_mask: EventMask) -> Self {
        Self {
            path,
            event_mask,
            monitoring: false,
        }
    }

    /// Whether the subscriber wants this event delivered.
    pub fn wants(&self, event: EventMask) -> bool {
        self.event_mask.contains(event)
    }
}

/// Observable lifecycle state of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathState {
    Unmonitored,
    PendingAdd,
    Monitoring,
    PendingRemove,
}

/// Work queued by callers for the monitoring thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Add { path: PathBuf, event_mask: EventMask },
    Remove { path: PathBuf },
    GenerateMissedEvents { path: PathBuf },
    Purge { path: PathBuf },
}

impl Intent {
    pub fn path(&self) -> &Path {
        match self {
            Intent::Add { path, .. }
            | Intent::Remove { path }
            | Intent::GenerateMissedEvents { path }
            | Intent::Purge { path } => path,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    intents: Mutex<Vec<Intent>>,
    /// Published by the monitoring thread after applying intents.
    active: RwLock<HashMap<PathBuf, bool>>,
}

/// Cloneable, thread-safe front door to the registry.
#[derive(Debug, Clone, Default)]
pub struct RegistryHandle {
    shared: Arc<Shared>,
}

impl RegistryHandle {
    /// Queue a path to be monitored with the given mask.
    pub fn add_dir(&self, path: impl Into<PathBuf>, event_mask: EventMask) {
        let path = path.into();
        crate::debug_event!("registry", "queued add", "{} ({event_mask:?})", path.display());
        self.shared.intents.lock().push(Intent::Add { path, event_mask });
    }

    /// Queue a path to stop being monitored.
    pub fn remove_dir(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        crate::log_event!("registry", "queued remove", "{}", path.display());
        self.shared.intents.lock().push(Intent::Remove { path });
    }

    /// Queue a missed-event pass for a monitored path.
    pub fn generate_missed_events(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.shared
            .intents
            .lock()
            .push(Intent::GenerateMissedEvents { path });
    }

    /// Queue a purge of the persisted baseline for a path.
    pub fn purge_dir(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.shared.intents.lock().push(Intent::Purge { path });
    }

    /// Current lifecycle state of a path.
    ///
    /// The latest queued add/remove wins over the published state.
    pub fn state(&self, path: &Path) -> PathState {
        let queued = self
            .shared
            .intents
            .lock()
            .iter()
            .rev()
            .find_map(|intent| match intent {
                Intent::Add { path: p, .. } if p == path => Some(PathState::PendingAdd),
                Intent::Remove { path: p } if p == path => Some(PathState::PendingRemove),
                _ => None,
            });
        if let Some(state) = queued {
            return state;
        }

        match self.shared.active.read().get(path) {
            Some(true) => PathState::Monitoring,
            Some(false) => PathState::PendingAdd,
            None => PathState::Unmonitored,
        }
    }

    /// Number of intents not yet applied.
    pub fn pending_intents(&self) -> usize {
        self.shared.intents.lock().len()
    }
}

/// Registry owned by the monitoring thread.
///
/// Holds at most one [`MonitoredPath`] per distinct path.
#[derive(Debug, Default)]
pub struct Registry {
    paths: IndexMap<PathBuf, MonitoredPath>,
    handle: RegistryHandle,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry fed by an existing handle.
    pub fn with_handle(handle: RegistryHandle) -> Self {
        Self {
            paths: IndexMap::new(),
            handle,
        }
    }

    /// Handle for queueing intents from other threads.
    pub fn handle(&self) -> RegistryHandle {
        self.handle.clone()
    }

    /// Take all queued intents in submission order.
    pub fn take_intents(&mut self) -> Vec<Intent> {
        std::mem::take(&mut *self.handle.shared.intents.lock())
    }

    /// Register a path, or replace the mask of an existing one.
    ///
    /// Returns `true` if the path was not registered before.
    pub fn insert(&mut self, path: PathBuf, event_mask: EventMask) -> bool {
        match self.paths.get_mut(&path) {
            Some(existing) => {
                existing.event_mask = event_mask;
                false
            }
            None => {
                self.paths
                    .insert(path.clone(), MonitoredPath::new(path, event_mask));
                self.publish();
                true
            }
        }
    }

    /// Mark a path as active (or not) after the backend responded.
    pub fn set_monitoring(&mut self, path: &Path, monitoring: bool) {
        if let Some(entry) = self.paths.get_mut(path) {
            entry.monitoring = monitoring;
        }
        self.publish();
    }

    /// Remove a path. Returns the removed entry, if any.
    pub fn remove(&mut self, path: &Path) -> Option<MonitoredPath> {
        let removed = self.paths.shift_remove(path);
        self.publish();
        removed
    }

    pub fn get(&self, path: &Path) -> Option<&MonitoredPath> {
        self.paths.get(path)
    }

    /// Check if a path is registered.
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains_key(path)
    }

    /// Find the active monitored path that owns `event_path`.
    ///
    /// Nested monitored paths resolve to the deepest one.
    pub fn owner_of(&self, event_path: &Path) -> Option<&MonitoredPath> {
        self.paths
            .values()
            .filter(|entry| entry.monitoring && event_path.starts_with(&entry.path))
            .max_by_key(|entry| entry.path.components().count())
    }

    /// Get all registered paths.
    pub fn paths(&self) -> impl Iterator<Item = &MonitoredPath> {
        self.paths.values()
    }

    /// Get count of registered paths.
    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    fn publish(&self) {
        let snapshot = self
            .paths
            .values()
            .map(|entry| (entry.path.clone(), entry.monitoring))
            .collect();
        *self.handle.shared.active.write() = snapshot;
    }
}
