//! Wiring of monitor, queue and reconciler into one running service.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::config::{ConfigError, Settings, SyncConfig};
use crate::monitor::{
    DiscoveredThrough, EventMask, FileEvent, FsMonitor, FsMonitorBuilder, MonitorError,
    MonitorHandle, RegistryHandle,
};
use crate::sync::{
    ReconciliationStore, Reconciler, ReconcilerHandle, RemoteSync, SyncError, SyncQueue,
    SyncQueueItem,
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// A running detection + reconciliation pipeline.
#[derive(Debug)]
pub struct SyncService {
    monitor: MonitorHandle,
    reconciler: ReconcilerHandle,
    queue: SyncQueue,
}

impl SyncService {
    /// Start with backend and baseline taken from `settings`.
    pub fn start<R: RemoteSync + 'static>(
        settings: &Settings,
        remote: R,
    ) -> Result<Self, ServiceError> {
        let monitor = FsMonitor::builder()
            .config(&settings.monitor)
            .baseline_db(settings.resolve(&settings.monitor.baseline_db));
        Self::start_with(settings, remote, monitor)
    }

    /// Start with a caller-prepared monitor builder.
    ///
    /// The builder's callback and registry are replaced by the service's.
    pub fn start_with<R: RemoteSync + 'static>(
        settings: &Settings,
        remote: R,
        monitor: FsMonitorBuilder,
    ) -> Result<Self, ServiceError> {
        let watched = settings.watched_dirs()?;

        let store = ReconciliationStore::open(settings.resolve(&settings.sync.synced_files_db))?;
        let queue = SyncQueue::new();
        let reconciler = Reconciler::new(store, remote, queue.clone())
            .with_batch_size(settings.sync.batch_size)
            .spawn(Duration::from_millis(settings.sync.drain_interval_ms))?;

        let registry = RegistryHandle::default();
        let monitor = monitor
            .registry(registry.clone())
            .callback(enqueue_callback(
                queue.clone(),
                registry,
                settings.sync.clone(),
            ))
            .build()?
            .start()?;

        for (path, mask) in watched {
            monitor.add_dir(path, mask);
        }

        crate::log_event!("service", "started");
        Ok(Self {
            monitor,
            reconciler,
            queue,
        })
    }

    pub fn monitor(&self) -> &MonitorHandle {
        &self.monitor
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    /// Whether both threads are still running.
    pub fn is_running(&self) -> bool {
        self.monitor.is_running() && self.reconciler.is_running()
    }

    /// Stop detection, drain the queue and return the final record count.
    pub fn stop(mut self) -> Result<usize, ServiceError> {
        let monitor_result = self.monitor.stop();
        let count = self.reconciler.stop()?;
        crate::log_event!("service", "stopped", "{count} synced files on record");
        monitor_result?;
        Ok(count)
    }
}

/// Callback that turns file events into queue items.
///
/// `DROPPED_EVENTS` asks the monitor for a missed-event pass instead.
pub fn enqueue_callback(
    queue: SyncQueue,
    registry: RegistryHandle,
    sync: SyncConfig,
) -> impl FnMut(&Path, &Path, EventMask, DiscoveredThrough) -> anyhow::Result<()> + Send + 'static
{
    move |monitored_path, event_path, event, _discovered_through| {
        if event == EventMask::DROPPED_EVENTS {
            registry.generate_missed_events(monitored_path);
            return Ok(());
        }
        if FileEvent::try_from(event).is_err() {
            tracing::warn!(
                "[service] not syncing {:?} for {}",
                event,
                event_path.display()
            );
            return Ok(());
        }

        let relative = event_path.strip_prefix(monitored_path).unwrap_or(event_path);
        let url = format!("{}{}", sync.url_prefix, url_path(relative));
        queue.push(SyncQueueItem::new(event_path, event, url, sync.server.as_str()));
        Ok(())
    }
}

fn url_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
