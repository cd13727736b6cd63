//! The monitoring thread: registry owner, live-detection loop and dispatch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use super::MonitorError;
use super::backend::{Backend, BackendEvent, BackendKind};
use super::coalescer::{Coalesced, Coalescer};
use super::dispatcher::{Dispatcher, EventCallback};
use super::event::{DiscoveredThrough, EventMask, FileEvent, RawEvent};
use super::recovery;
use super::registry::{Intent, PathState, Registry, RegistryHandle};
use crate::config::MonitorConfig;
use crate::scanner::{PathScanner, TreeScanner};

/// Cross-platform file system monitor.
///
/// Built with [`FsMonitor::builder`], then moved onto its own thread with
/// [`FsMonitor::start`]. From then on all interaction goes through the
/// returned [`MonitorHandle`].
pub struct FsMonitor {
    registry: Registry,
    coalescer: Coalescer,
    dispatcher: Dispatcher,
    backend: Box<dyn Backend>,
    scanner: PathScanner,
    persistent: bool,
    trigger_events_for_initial_scan: bool,
    tick: Duration,
    shutdown: Arc<AtomicBool>,
}

impl FsMonitor {
    /// Create a builder for configuring the monitor.
    pub fn builder() -> FsMonitorBuilder {
        FsMonitorBuilder::new()
    }

    /// Spawn the monitoring thread.
    pub fn start(self) -> Result<MonitorHandle, MonitorError> {
        let registry = self.registry.handle();
        let shutdown = self.shutdown.clone();

        let thread = std::thread::Builder::new()
            .name("fsmonitor".to_string())
            .spawn(move || self.run())
            .map_err(|e| MonitorError::InitFailed {
                reason: format!("cannot spawn monitoring thread: {e}"),
            })?;

        Ok(MonitorHandle {
            registry,
            shutdown,
            thread: Some(thread),
        })
    }

    /// Main loop. Returns when shut down or when a callback fails.
    fn run(mut self) -> Result<(), MonitorError> {
        crate::log_event!("monitor", "started", "backend {}", self.backend.name());

        while !self.shutdown.load(Ordering::Acquire) {
            self.apply_intents()?;

            for event in self.backend.poll(self.tick) {
                self.route(event)?;
            }

            for raw in self.coalescer.take_ready() {
                self.deliver(raw)?;
            }
        }

        // Undispatched state is re-derived by recovery on the next start
        let discarded = self.coalescer.pending_count();
        let unapplied = self.registry.take_intents().len();
        if discarded > 0 || unapplied > 0 {
            tracing::warn!(
                "[monitor] shutting down with {discarded} pending events and {unapplied} queued intents"
            );
        }
        crate::log_event!("monitor", "stopped");
        Ok(())
    }

    fn apply_intents(&mut self) -> Result<(), MonitorError> {
        for intent in self.registry.take_intents() {
            match intent {
                Intent::Add { path, event_mask } => self.add_path(path, event_mask)?,
                Intent::Remove { path } => self.remove_path(&path),
                Intent::GenerateMissedEvents { path } => {
                    self.recover(&path, DiscoveredThrough::Recovery)?
                }
                Intent::Purge { path } => self.purge(&path),
            }
        }
        Ok(())
    }

    fn add_path(&mut self, path: PathBuf, event_mask: EventMask) -> Result<(), MonitorError> {
        if let Some(existing) = self.registry.get(&path) {
            if existing.monitoring {
                self.registry.insert(path.clone(), event_mask);
                crate::log_event!(
                    "monitor",
                    "updated mask",
                    "{} ({event_mask:?})",
                    path.display()
                );
                return Ok(());
            }
        }

        self.registry.insert(path.clone(), event_mask);

        if let Err(e) = self.backend.watch(&path) {
            tracing::error!("[monitor] {e}");
            return self.notify_dropped(&path, &e.to_string());
        }
        self.registry.set_monitoring(&path, true);
        crate::log_event!("monitor", "monitoring", "{}", path.display());

        let had_baseline = match self.scanner.has_baseline(&path) {
            Ok(had) => had,
            Err(e) => {
                tracing::error!("[monitor] baseline lookup for {} failed: {e}", path.display());
                return self.notify_dropped(&path, &e.to_string());
            }
        };

        if had_baseline {
            self.recover(&path, DiscoveredThrough::Recovery)
        } else if self.trigger_events_for_initial_scan {
            self.recover(&path, DiscoveredThrough::InitialScan)
        } else {
            // Build the baseline without telling anyone
            if let Err(e) = self.scanner.scan_tree(&path) {
                tracing::error!("[monitor] initial scan of {} failed: {e}", path.display());
                return self.notify_dropped(&path, &e.to_string());
            }
            crate::debug_event!("monitor", "baseline built", "{}", path.display());
            Ok(())
        }
    }

    fn remove_path(&mut self, path: &Path) {
        let Some(entry) = self.registry.get(path) else {
            tracing::warn!(
                "[monitor] remove requested for {} which is not monitored",
                path.display()
            );
            return;
        };

        if entry.monitoring {
            if let Err(e) = self.backend.unwatch(path) {
                tracing::warn!("[monitor] {e}");
            }
        }

        let discarded = self.coalescer.discard_monitored(path);
        self.registry.remove(path);

        if !self.persistent {
            if let Err(e) = self.scanner.purge_path(path) {
                tracing::warn!("[monitor] dropping baseline for {} failed: {e}", path.display());
            }
        }

        crate::log_event!(
            "monitor",
            "stopped monitoring",
            "{} ({discarded} pending events discarded)",
            path.display()
        );
    }

    /// Run a tree diff for a monitored path and dispatch the result at once.
    fn recover(
        &mut self,
        path: &Path,
        discovered_through: DiscoveredThrough,
    ) -> Result<(), MonitorError> {
        let event_mask = match self.registry.get(path) {
            Some(entry) if entry.monitoring => entry.event_mask,
            _ => {
                tracing::warn!(
                    "[monitor] cannot generate missed events for {}: not monitored",
                    path.display()
                );
                return Ok(());
            }
        };

        let events = match recovery::generate_missed_events(
            &self.scanner,
            path,
            event_mask,
            discovered_through,
        ) {
            Ok(events) => events,
            Err(e) => {
                tracing::error!("[monitor] recovery for {} failed: {e}", path.display());
                return self.notify_dropped(path, &e.to_string());
            }
        };

        for raw in events {
            self.record(raw);
        }
        for raw in self.coalescer.take_all() {
            self.deliver(raw)?;
        }
        Ok(())
    }

    fn purge(&mut self, path: &Path) {
        if !self.persistent {
            crate::debug_event!("monitor", "purge skipped (not persistent)", "{}", path.display());
            return;
        }
        match self.scanner.purge_path(path) {
            Ok(()) => crate::log_event!("monitor", "purged", "{}", path.display()),
            Err(e) => tracing::error!("[monitor] purge of {} failed: {e}", path.display()),
        }
    }

    fn route(&mut self, event: BackendEvent) -> Result<(), MonitorError> {
        match event {
            BackendEvent::File { path, event } => {
                let Some(owner) = self.registry.owner_of(&path) else {
                    crate::debug_event!("monitor", "unmatched", "{event} {}", path.display());
                    return Ok(());
                };
                let relative = path.strip_prefix(&owner.path).unwrap_or(path.as_path());
                if self.scanner.is_ignored(relative) {
                    return Ok(());
                }
                let root = owner.path.clone();

                // A subdirectory that vanished: its files are only known to
                // the baseline, so let recovery re-derive them.
                if event == FileEvent::Deleted
                    && self.scanner.has_files_under(&root, &path).unwrap_or(false)
                {
                    return self.notify_dropped(
                        &root,
                        &format!("directory {} moved away", path.display()),
                    );
                }

                let raw = RawEvent::new(root, path, event, DiscoveredThrough::Live);
                self.record(raw);
                Ok(())
            }

            BackendEvent::DirMoved { path } => {
                let wants = self
                    .registry
                    .get(&path)
                    .is_some_and(|entry| entry.wants(EventMask::MONITORED_DIR_MOVED));
                if !self.registry.contains(&path) {
                    return Ok(());
                }

                // The tree is gone from where we watched it; a new add_dir
                // for the path re-arms it.
                if let Err(e) = self.backend.unwatch(&path) {
                    crate::debug_event!("monitor", "unwatch after move", "{e}");
                }
                self.registry.set_monitoring(&path, false);
                self.coalescer.discard_monitored(&path);
                tracing::warn!("[monitor] monitored directory {} moved", path.display());

                if wants {
                    self.dispatcher.trigger_event(
                        &path,
                        &path,
                        EventMask::MONITORED_DIR_MOVED,
                        DiscoveredThrough::Live,
                    )?;
                }
                Ok(())
            }

            BackendEvent::Dropped { paths, reason } => {
                let mut affected: Vec<PathBuf> = if paths.is_empty() {
                    self.registry
                        .paths()
                        .filter(|entry| entry.monitoring)
                        .map(|entry| entry.path.clone())
                        .collect()
                } else {
                    paths
                        .iter()
                        .filter_map(|p| self.registry.owner_of(p))
                        .map(|entry| entry.path.clone())
                        .collect()
                };
                affected.sort();
                affected.dedup();

                for path in affected {
                    self.notify_dropped(&path, &reason)?;
                }
                Ok(())
            }
        }
    }

    fn record(&mut self, raw: RawEvent) {
        let event_path = raw.event_path.clone();
        if self.coalescer.record(raw) == Coalesced::Cancelled {
            crate::debug_event!("coalescer", "cancelled", "{}", event_path.display());
        }
    }

    /// Dispatch a coalesced event if the path's mask asks for it.
    fn deliver(&mut self, raw: RawEvent) -> Result<(), MonitorError> {
        let Some(wants) = self
            .registry
            .get(&raw.monitored_path)
            .map(|entry| entry.wants(raw.event.mask()))
        else {
            // Path was removed while the event was pending
            return Ok(());
        };

        // The baseline is what recovery diffs against, persistent or not
        if raw.discovered_through == DiscoveredThrough::Live && self.backend.refreshes_baseline() {
            if let Err(e) = self
                .scanner
                .refresh_file(&raw.monitored_path, &raw.event_path)
            {
                tracing::warn!(
                    "[monitor] baseline refresh for {} failed: {e}",
                    raw.event_path.display()
                );
            }
        }

        if !wants {
            crate::debug_event!(
                "monitor",
                "masked",
                "{} {}",
                raw.event,
                raw.event_path.display()
            );
            return Ok(());
        }

        self.dispatcher.trigger_event(
            &raw.monitored_path,
            &raw.event_path,
            raw.event.mask(),
            raw.discovered_through,
        )
    }

    fn notify_dropped(&mut self, path: &Path, reason: &str) -> Result<(), MonitorError> {
        tracing::warn!("[monitor] events dropped for {}: {reason}", path.display());
        let wants = self
            .registry
            .get(path)
            .is_some_and(|entry| entry.wants(EventMask::DROPPED_EVENTS));
        if !wants {
            return Ok(());
        }
        self.dispatcher.trigger_event(
            path,
            path,
            EventMask::DROPPED_EVENTS,
            DiscoveredThrough::Live,
        )
    }
}

/// Handle to a running monitor.
#[derive(Debug)]
pub struct MonitorHandle {
    registry: RegistryHandle,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<(), MonitorError>>>,
}

impl MonitorHandle {
    /// Queue a directory to be monitored.
    pub fn add_dir(&self, path: impl Into<PathBuf>, event_mask: EventMask) {
        self.registry.add_dir(path, event_mask);
    }

    /// Queue a directory to stop being monitored.
    pub fn remove_dir(&self, path: impl Into<PathBuf>) {
        self.registry.remove_dir(path);
    }

    /// Queue a missed-event pass for a monitored directory.
    pub fn generate_missed_events(&self, path: impl Into<PathBuf>) {
        self.registry.generate_missed_events(path);
    }

    /// Queue a purge of the persisted baseline for a directory.
    pub fn purge_dir(&self, path: impl Into<PathBuf>) {
        self.registry.purge_dir(path);
    }

    pub fn state(&self, path: &Path) -> PathState {
        self.registry.state(path)
    }

    pub fn registry(&self) -> RegistryHandle {
        self.registry.clone()
    }

    /// Whether the monitoring thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signal shutdown and wait for the thread to exit.
    ///
    /// Returns the error that ended the thread, if any.
    pub fn stop(&mut self) -> Result<(), MonitorError> {
        self.shutdown.store(true, Ordering::Release);
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| MonitorError::ThreadPanicked)?,
            None => Ok(()),
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

/// Builder for constructing an FsMonitor.
pub struct FsMonitorBuilder {
    callback: Option<EventCallback>,
    registry: Option<RegistryHandle>,
    backend: Option<Box<dyn Backend>>,
    backend_kind: BackendKind,
    scanner: Option<PathScanner>,
    persistent: bool,
    trigger_events_for_initial_scan: bool,
    ignored_dirs: Vec<String>,
    baseline_db: PathBuf,
    settle_ms: u64,
    tick_ms: u64,
    poll_interval_ms: u64,
}

impl FsMonitorBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            callback: None,
            registry: None,
            backend: None,
            backend_kind: BackendKind::default(),
            scanner: None,
            persistent: false,
            trigger_events_for_initial_scan: false,
            ignored_dirs: Vec::new(),
            baseline_db: PathBuf::from(".treesync/baseline.db"),
            settle_ms: 250,
            tick_ms: 100,
            poll_interval_ms: 1000,
        }
    }

    /// Apply every monitor setting from configuration.
    pub fn config(mut self, config: &MonitorConfig) -> Self {
        self.backend_kind = config.backend;
        self.persistent = config.persistent;
        self.trigger_events_for_initial_scan = config.trigger_events_for_initial_scan;
        self.ignored_dirs = config.ignored_dirs.clone();
        self.baseline_db = config.baseline_db.clone();
        self.settle_ms = config.settle_ms;
        self.tick_ms = config.tick_ms;
        self.poll_interval_ms = config.poll_interval_ms;
        self
    }

    /// Set the event callback.
    pub fn callback(
        mut self,
        callback: impl FnMut(&Path, &Path, EventMask, DiscoveredThrough) -> anyhow::Result<()>
        + Send
        + 'static,
    ) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Share an existing registry handle (e.g. one the callback uses).
    pub fn registry(mut self, handle: RegistryHandle) -> Self {
        self.registry = Some(handle);
        self
    }

    /// Use a specific backend instead of building one from `backend_kind`.
    pub fn backend(mut self, backend: Box<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn backend_kind(mut self, kind: BackendKind) -> Self {
        self.backend_kind = kind;
        self
    }

    /// Use a specific scanner instead of opening one.
    pub fn scanner(mut self, scanner: PathScanner) -> Self {
        self.scanner = Some(scanner);
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn trigger_events_for_initial_scan(mut self, trigger: bool) -> Self {
        self.trigger_events_for_initial_scan = trigger;
        self
    }

    pub fn ignored_dirs(mut self, dirs: impl IntoIterator<Item = String>) -> Self {
        self.ignored_dirs = dirs.into_iter().collect();
        self
    }

    pub fn baseline_db(mut self, path: impl Into<PathBuf>) -> Self {
        self.baseline_db = path.into();
        self
    }

    /// Set the settle window in milliseconds.
    pub fn settle_ms(mut self, ms: u64) -> Self {
        self.settle_ms = ms;
        self
    }

    /// Set the loop wait in milliseconds (shutdown latency).
    pub fn tick_ms(mut self, ms: u64) -> Self {
        self.tick_ms = ms;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Build the FsMonitor.
    pub fn build(self) -> Result<FsMonitor, MonitorError> {
        let scanner = match self.scanner {
            Some(scanner) => scanner,
            None if self.persistent => PathScanner::open(&self.baseline_db, self.ignored_dirs)?,
            None => PathScanner::in_memory(self.ignored_dirs)?,
        };

        let backend = match self.backend {
            Some(backend) => backend,
            None => self
                .backend_kind
                .build(&scanner, Duration::from_millis(self.poll_interval_ms))?,
        };

        let registry = match self.registry {
            Some(handle) => Registry::with_handle(handle),
            None => Registry::new(),
        };

        Ok(FsMonitor {
            registry,
            coalescer: Coalescer::new(self.settle_ms),
            dispatcher: Dispatcher::new(self.callback),
            backend,
            scanner,
            persistent: self.persistent,
            trigger_events_for_initial_scan: self.trigger_events_for_initial_scan,
            tick: Duration::from_millis(self.tick_ms),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl Default for FsMonitorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
