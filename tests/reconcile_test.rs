//! Reconciliation through the public API.

mod common;

use std::time::Duration;

use common::{RecordingRemote, RemoteCall, WAIT, wait_until};
use treesync::{
    EventMask, ReconciliationStore, Reconciler, SyncError, SyncQueue, SyncQueueItem,
};

fn item(name: &str, event: EventMask) -> SyncQueueItem {
    SyncQueueItem::new(
        format!("/data/{name}"),
        event,
        format!("https://cdn/{name}"),
        "s1",
    )
}

#[test]
fn test_batch_of_two_with_five_pending() {
    let queue = SyncQueue::new();
    for name in ["1", "2", "3", "4", "5"] {
        queue.push(item(name, EventMask::CREATED));
    }
    let store = ReconciliationStore::in_memory().unwrap();
    let mut reconciler =
        Reconciler::new(store, RecordingRemote::default(), queue.clone()).with_batch_size(2);

    assert_eq!(reconciler.process_queue().unwrap(), 2);
    let rest: Vec<String> = queue
        .snapshot()
        .iter()
        .map(|i| i.input_file.display().to_string())
        .collect();
    assert_eq!(rest, vec!["/data/3", "/data/4", "/data/5"]);
}

#[test]
fn test_duplicate_create_yields_one_record() {
    let queue = SyncQueue::new();
    queue.push(item("a.txt", EventMask::CREATED));
    queue.push(item("a.txt", EventMask::CREATED));
    let store = ReconciliationStore::in_memory().unwrap();
    let mut reconciler = Reconciler::new(store, RecordingRemote::default(), queue);

    assert_eq!(reconciler.drain().unwrap(), 2);
    assert_eq!(reconciler.store().count().unwrap(), 1);
}

#[test]
fn test_delete_twice_is_idempotent() {
    let queue = SyncQueue::new();
    queue.push(item("a.txt", EventMask::CREATED));
    queue.push(item("a.txt", EventMask::DELETED));
    queue.push(item("a.txt", EventMask::DELETED));
    let remote = RecordingRemote::shared();
    let store = ReconciliationStore::in_memory().unwrap();
    let mut reconciler = Reconciler::new(store, remote.clone(), queue);

    reconciler.drain().unwrap();

    assert!(
        reconciler
            .store()
            .get("/data/a.txt", "s1")
            .unwrap()
            .is_none()
    );
    // The remote is still told on the second delete; it tolerates absence
    let destroys = remote
        .calls()
        .into_iter()
        .filter(|c| matches!(c, RemoteCall::Destroy { .. }))
        .count();
    assert_eq!(destroys, 2);
}

#[test]
fn test_non_file_event_fails_loudly() {
    let queue = SyncQueue::new();
    queue.push(item("a.txt", EventMask::DROPPED_EVENTS));
    let store = ReconciliationStore::in_memory().unwrap();
    let mut reconciler = Reconciler::new(store, RecordingRemote::default(), queue);

    assert!(matches!(
        reconciler.process_queue(),
        Err(SyncError::UnknownEventType { bits: 0x10 })
    ));
}

#[cfg(unix)]
#[test]
fn test_non_utf8_path_does_not_stop_reconciliation() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    use std::path::PathBuf;

    let queue = SyncQueue::new();
    let remote = RecordingRemote::shared();
    let store = ReconciliationStore::in_memory().unwrap();
    let handle = Reconciler::new(store, remote.clone(), queue.clone())
        .spawn(Duration::from_millis(10))
        .unwrap();

    let latin1 = PathBuf::from(OsStr::from_bytes(b"/data/caf\xe9.txt"));
    queue.push(SyncQueueItem::new(latin1, EventMask::CREATED, "https://cdn/cafe", "s1"));
    queue.push(item("good.txt", EventMask::CREATED));

    assert!(wait_until(WAIT, || remote.calls().len() == 1));
    assert!(handle.is_running());
    assert!(queue.is_empty());
    assert_eq!(handle.stop().unwrap(), 1);
}
