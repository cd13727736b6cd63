//! FIFO hand-off from detection to reconciliation.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{SyncError, SyncResult};
use crate::monitor::EventMask;

/// One confirmed change waiting to be reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncQueueItem {
    pub input_file: PathBuf,
    pub event: EventMask,
    pub target_server: String,
    pub output_file: PathBuf,
    pub transported_file: PathBuf,
    pub url: String,
    pub server: String,
}

impl SyncQueueItem {
    /// Item for a file that is transported unchanged.
    pub fn new(
        input_file: impl Into<PathBuf>,
        event: EventMask,
        url: impl Into<String>,
        server: impl Into<String>,
    ) -> Self {
        let input_file = input_file.into();
        let server = server.into();
        Self {
            output_file: input_file.clone(),
            transported_file: input_file.clone(),
            input_file,
            event,
            target_server: server.clone(),
            url: url.into(),
            server,
        }
    }

    /// The input file as stored in the synced-files table.
    pub fn input_key(&self) -> SyncResult<&str> {
        path_str(&self.input_file)
    }

    /// Base name of the output file, which may differ from the input's.
    pub fn transported_basename(&self) -> SyncResult<&str> {
        let name = self
            .output_file
            .file_name()
            .ok_or_else(|| SyncError::NoBasename(self.output_file.clone()))?;
        name.to_str()
            .ok_or_else(|| SyncError::NonUtf8Path(self.output_file.clone()))
    }
}

fn path_str(path: &Path) -> SyncResult<&str> {
    path.to_str()
        .ok_or_else(|| SyncError::NonUtf8Path(path.to_path_buf()))
}

/// Strictly FIFO, lock-protected queue shared by producers and the
/// single reconciling consumer.
#[derive(Debug, Clone, Default)]
pub struct SyncQueue {
    items: Arc<Mutex<VecDeque<SyncQueueItem>>>,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: SyncQueueItem) {
        self.items.lock().push_back(item);
    }

    /// Take the oldest item.
    pub fn pop(&self) -> Option<SyncQueueItem> {
        self.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Copy of the queued items, oldest first.
    pub fn snapshot(&self) -> Vec<SyncQueueItem> {
        self.items.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str) -> SyncQueueItem {
        SyncQueueItem::new(format!("/data/{name}"), EventMask::CREATED, "u", "s1")
    }

    #[test]
    fn test_fifo_order() {
        let queue = SyncQueue::new();
        queue.push(item("a"));
        queue.push(item("b"));
        queue.push(item("c"));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().unwrap().input_file, PathBuf::from("/data/a"));
        assert_eq!(queue.pop().unwrap().input_file, PathBuf::from("/data/b"));
        assert_eq!(queue.pop().unwrap().input_file, PathBuf::from("/data/c"));
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clones_share_items() {
        let producer = SyncQueue::new();
        let consumer = producer.clone();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let producer = producer.clone();
                std::thread::spawn(move || producer.push(item(&format!("f{i}"))))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(consumer.len(), 8);
    }

    #[test]
    fn test_transported_basename_comes_from_output_file() {
        let mut item = item("photo.raw");
        item.output_file = PathBuf::from("/tmp/processed/photo.jpg");

        assert_eq!(item.transported_basename().unwrap(), "photo.jpg");
        assert_eq!(item.input_key().unwrap(), "/data/photo.raw");

        item.output_file = PathBuf::from("/");
        assert!(matches!(
            item.transported_basename(),
            Err(SyncError::NoBasename(_))
        ));
    }
}
