//! Reconciliation of detected changes against remote storage.
//!
//! Producers push [`SyncQueueItem`]s onto the [`SyncQueue`]; a single
//! [`Reconciler`] thread drains it in bounded batches, updates the
//! [`ReconciliationStore`] and mirrors each change through a [`RemoteSync`]
//! adapter.

mod error;
mod queue;
mod reconciler;
mod remote;
mod store;

pub use error::{SyncError, SyncResult};
pub use queue::{SyncQueue, SyncQueueItem};
pub use reconciler::{QUEUE_PROCESS_BATCH_SIZE, Reconciler, ReconcilerHandle};
pub use remote::{DryRunRemote, RemoteSync};
pub use store::{Applied, ReconciliationStore, StoreChange, SyncedFileRecord};
