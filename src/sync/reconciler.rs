//! Queue drain loop: store update, then remote call, one item at a time.

use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use super::queue::{SyncQueue, SyncQueueItem};
use super::remote::RemoteSync;
use super::store::{Applied, ReconciliationStore};
use super::{SyncError, SyncResult};
use crate::monitor::FileEvent;

/// Default number of items reconciled per drain cycle.
pub const QUEUE_PROCESS_BATCH_SIZE: usize = 20;

/// Sole consumer of the sync queue and sole writer of the store.
#[derive(Debug)]
pub struct Reconciler<R> {
    store: ReconciliationStore,
    remote: R,
    queue: SyncQueue,
    batch_size: usize,
}

impl<R: RemoteSync> Reconciler<R> {
    pub fn new(store: ReconciliationStore, remote: R, queue: SyncQueue) -> Self {
        Self {
            store,
            remote,
            queue,
            batch_size: QUEUE_PROCESS_BATCH_SIZE,
        }
    }

    /// Set the per-cycle batch size. Zero is raised to one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn store(&self) -> &ReconciliationStore {
        &self.store
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Reconcile exactly `min(batch_size, queue length)` items, oldest first.
    ///
    /// Returns the number processed. An item whose path cannot be recorded
    /// is logged and dropped. An unknown event type aborts the batch with an
    /// error; the offending item is not requeued.
    pub fn process_queue(&mut self) -> SyncResult<usize> {
        let mut processed = 0;
        while processed < self.batch_size {
            let Some(item) = self.queue.pop() else {
                break;
            };
            processed += 1;
            match self.reconcile(&item) {
                Ok(_) => {}
                Err(e) if e.is_item_error() => {
                    tracing::error!(
                        "[reconciler] dropping {:?} for {}: {e}",
                        item.event,
                        item.input_file.display()
                    );
                }
                Err(e) => return Err(e),
            }
        }

        if processed > 0 {
            crate::debug_event!(
                "reconciler",
                "batch done",
                "{processed} processed, {} remaining",
                self.queue.len()
            );
        }
        Ok(processed)
    }

    /// Run batches until the queue is empty.
    pub fn drain(&mut self) -> SyncResult<usize> {
        let mut total = 0;
        loop {
            let processed = self.process_queue()?;
            if processed == 0 {
                return Ok(total);
            }
            total += processed;
        }
    }

    /// Apply one item to the store, then mirror it to the remote.
    ///
    /// Remote failures are logged and leave the store change in place.
    pub fn reconcile(&self, item: &SyncQueueItem) -> SyncResult<Applied> {
        let applied = self.store.apply(item)?;
        let basename = applied.remote_basename.as_str();

        let ok = match applied.event {
            FileEvent::Created | FileEvent::Modified => {
                self.remote
                    .sync_resource(basename, &item.url, &item.server, &item.transported_file)
            }
            FileEvent::Deleted => self.remote.destroy_resource(basename, &item.server),
        };

        if ok {
            crate::log_event!(
                "reconciler",
                "remote",
                "{} '{basename}' on {} succeeded",
                applied.event,
                item.server
            );
        } else {
            tracing::error!(
                "[reconciler] remote {} of '{basename}' on {} failed (URL '{}')",
                applied.event,
                item.server,
                item.url
            );
        }

        Ok(applied)
    }
}

impl<R: RemoteSync + 'static> Reconciler<R> {
    /// Run the drain loop on its own thread, one batch every `interval`.
    ///
    /// On shutdown the remaining queue is drained before the thread exits.
    pub fn spawn(self, interval: Duration) -> SyncResult<ReconcilerHandle> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let queue = self.queue.clone();

        let thread = std::thread::Builder::new()
            .name("reconciler".to_string())
            .spawn(move || self.run(interval, stop_rx))
            .map_err(|e| SyncError::SpawnFailed {
                reason: e.to_string(),
            })?;

        Ok(ReconcilerHandle {
            stop_tx,
            queue,
            thread: Some(thread),
        })
    }

    fn run(mut self, interval: Duration, stop_rx: Receiver<()>) -> SyncResult<usize> {
        let count = self.store.count()?;
        crate::log_event!("reconciler", "started", "{count} synced files on record");

        loop {
            self.process_queue()?;
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let drained = self.drain()?;
        let count = self.store.count()?;
        crate::log_event!(
            "reconciler",
            "stopped",
            "drained {drained} on shutdown, {count} synced files on record"
        );
        Ok(count)
    }
}

/// Handle to a running reconciler thread.
#[derive(Debug)]
pub struct ReconcilerHandle {
    stop_tx: Sender<()>,
    queue: SyncQueue,
    thread: Option<JoinHandle<SyncResult<usize>>>,
}

impl ReconcilerHandle {
    /// Queue the reconciler consumes from.
    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signal shutdown, wait for the final drain and return the record count.
    pub fn stop(mut self) -> SyncResult<usize> {
        let _ = self.stop_tx.try_send(());
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| SyncError::ThreadPanicked)?,
            None => Ok(0),
        }
    }
}

impl Drop for ReconcilerHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.try_send(());
    }
}
