//! Directory change detection with durable reconciliation against remote
//! storage.
//!
//! [`monitor`] turns filesystem activity into coalesced, masked events and
//! recovers whatever it could not observe live through [`scanner`].
//! [`sync`] drains confirmed changes into a SQLite-backed store and a
//! [`RemoteSync`] adapter. [`service`] wires the two together.

pub mod cli;
pub mod config;
pub mod logging;
pub mod monitor;
pub mod scanner;
pub mod service;
pub mod sync;

pub use config::{ConfigError, Settings};
pub use monitor::{
    DiscoveredThrough, EventMask, FileEvent, FsMonitor, MonitorError, MonitorHandle, RawEvent,
};
pub use scanner::{PathScanner, ScanError, TreeDiff, TreeScanner};
pub use service::{ServiceError, SyncService};
pub use sync::{
    DryRunRemote, ReconciliationStore, Reconciler, RemoteSync, SyncError, SyncQueue,
    SyncQueueItem, SyncedFileRecord,
};
