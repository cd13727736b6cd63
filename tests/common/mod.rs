//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use treesync::monitor::{Backend, BackendEvent, MonitorError};
use treesync::{DiscoveredThrough, EventMask, RemoteSync};

/// Backend driven by the test through a channel.
pub struct ScriptedBackend {
    rx: Receiver<BackendEvent>,
}

impl ScriptedBackend {
    pub fn new() -> (Sender<BackendEvent>, Self) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (tx, Self { rx })
    }
}

impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn watch(&mut self, _path: &Path) -> Result<(), MonitorError> {
        Ok(())
    }

    fn unwatch(&mut self, _path: &Path) -> Result<(), MonitorError> {
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Vec<BackendEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(first) => {
                let mut events = vec![first];
                events.extend(self.rx.try_iter());
                events
            }
            Err(RecvTimeoutError::Timeout) => Vec::new(),
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(timeout);
                Vec::new()
            }
        }
    }
}

/// One callback invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub monitored_path: PathBuf,
    pub event_path: PathBuf,
    pub event: EventMask,
    pub discovered_through: DiscoveredThrough,
}

/// Callback that forwards every invocation to a channel.
pub fn channel_callback() -> (
    impl FnMut(&Path, &Path, EventMask, DiscoveredThrough) -> anyhow::Result<()> + Send + 'static,
    Receiver<Delivered>,
) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let callback = move |monitored: &Path, event_path: &Path, event, through| {
        tx.send(Delivered {
            monitored_path: monitored.to_path_buf(),
            event_path: event_path.to_path_buf(),
            event,
            discovered_through: through,
        })?;
        Ok(())
    };
    (callback, rx)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Sync {
        basename: String,
        url: String,
        server: String,
    },
    Destroy {
        basename: String,
        server: String,
    },
}

/// Remote adapter that records calls.
#[derive(Default)]
pub struct RecordingRemote {
    pub calls: Mutex<Vec<RemoteCall>>,
    /// Report every call as failed.
    pub fail: bool,
}

impl RecordingRemote {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }
}

impl RemoteSync for RecordingRemote {
    fn sync_resource(&self, basename: &str, url: &str, server: &str, _local: &Path) -> bool {
        self.calls.lock().push(RemoteCall::Sync {
            basename: basename.to_string(),
            url: url.to_string(),
            server: server.to_string(),
        });
        !self.fail
    }

    fn destroy_resource(&self, basename: &str, server: &str) -> bool {
        self.calls.lock().push(RemoteCall::Destroy {
            basename: basename.to_string(),
            server: server.to_string(),
        });
        !self.fail
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

pub const WAIT: Duration = Duration::from_secs(5);
