//! Delivery of coalesced events to the registered callback.

use std::path::Path;

use super::MonitorError;
use super::event::{DiscoveredThrough, EventMask, event_name};

/// Callback invoked for every delivered event.
///
/// Arguments: monitored path, event path, event bit, discovery source. Runs
/// synchronously on the monitoring thread, so it must not block for long.
pub type EventCallback =
    Box<dyn FnMut(&Path, &Path, EventMask, DiscoveredThrough) -> anyhow::Result<()> + Send>;

/// Pure delivery step between the monitor and the caller.
#[derive(Default)]
pub struct Dispatcher {
    callback: Option<EventCallback>,
}

impl Dispatcher {
    pub fn new(callback: Option<EventCallback>) -> Self {
        Self { callback }
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Log the event by its canonical name and hand it to the callback.
    ///
    /// Callback errors are returned unchanged in meaning; this layer does not
    /// swallow them.
    pub fn trigger_event(
        &mut self,
        monitored_path: &Path,
        event_path: &Path,
        event: EventMask,
        discovered_through: DiscoveredThrough,
    ) -> Result<(), MonitorError> {
        let Some(callback) = self.callback.as_mut() else {
            return Ok(());
        };

        crate::log_event!(
            "monitor",
            event_name(event).unwrap_or("UNKNOWN"),
            "{} through {discovered_through} (monitored path {})",
            event_path.display(),
            monitored_path.display()
        );

        callback(monitored_path, event_path, event, discovered_through).map_err(|source| {
            MonitorError::Callback {
                path: event_path.to_path_buf(),
                source,
            }
        })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(PathBuf, PathBuf, EventMask, DiscoveredThrough)>>>;

    fn recording() -> (Dispatcher, Seen) {
        let seen: Seen = Arc::default();
        let sink = seen.clone();
        let dispatcher = Dispatcher::new(Some(Box::new(move |m, p, e, d| {
            sink.lock()
                .unwrap()
                .push((m.to_path_buf(), p.to_path_buf(), e, d));
            Ok(())
        })));
        (dispatcher, seen)
    }

    #[test]
    fn test_trigger_invokes_callback_once() {
        let (mut dispatcher, seen) = recording();

        dispatcher
            .trigger_event(
                Path::new("/data"),
                Path::new("/data/a.txt"),
                EventMask::CREATED,
                DiscoveredThrough::Live,
            )
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, PathBuf::from("/data/a.txt"));
        assert_eq!(seen[0].2, EventMask::CREATED);
        assert_eq!(seen[0].3, DiscoveredThrough::Live);
    }

    #[test]
    fn test_without_callback_is_noop() {
        let mut dispatcher = Dispatcher::default();
        assert!(!dispatcher.has_callback());
        dispatcher
            .trigger_event(
                Path::new("/data"),
                Path::new("/data/a.txt"),
                EventMask::DELETED,
                DiscoveredThrough::Recovery,
            )
            .unwrap();
    }

    #[test]
    fn test_callback_error_propagates() {
        let mut dispatcher = Dispatcher::new(Some(Box::new(|_, _, _, _| {
            anyhow::bail!("queue is gone")
        })));

        let err = dispatcher
            .trigger_event(
                Path::new("/data"),
                Path::new("/data/a.txt"),
                EventMask::MODIFIED,
                DiscoveredThrough::Live,
            )
            .unwrap_err();

        assert!(matches!(err, MonitorError::Callback { .. }));
        assert!(err.to_string().contains("/data/a.txt"));
    }
}
