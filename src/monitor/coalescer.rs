//! Per-path event coalescing.
//!
//! Bursty filesystem activity (editor saves, lockfiles, atomic-rename temp
//! files) produces several events for one file within a short window. The
//! coalescer folds them into a single pending event per `event_path` using
//! the merge table, and only releases an event once it has been quiet for
//! the settle window.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use indexmap::IndexMap;

use super::event::{DiscoveredThrough, FileEvent, RawEvent, merge};

/// What happened to an observed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coalesced {
    /// No event was pending for the path; this one is now pending.
    Pending(FileEvent),
    /// Merged with a pending event into the given event.
    Merged(FileEvent),
    /// The new event cancelled the pending one; nothing is pending anymore.
    Cancelled,
}

#[derive(Debug)]
struct PendingEvent {
    monitored_path: PathBuf,
    event: FileEvent,
    discovered_through: DiscoveredThrough,
    last_seen: Instant,
}

/// Holds at most one uncommitted event per event path.
///
/// Iteration order is first-observation order, so events for different
/// files leave the coalescer in the order they were first seen.
#[derive(Debug)]
pub struct Coalescer {
    pending: IndexMap<PathBuf, PendingEvent>,
    settle: Duration,
}

impl Coalescer {
    /// Create a coalescer with the given settle window in milliseconds.
    pub fn new(settle_ms: u64) -> Self {
        Self {
            pending: IndexMap::new(),
            settle: Duration::from_millis(settle_ms),
        }
    }

    /// Fold a newly observed event into the pending state for its path.
    ///
    /// Resets the settle timer for the path unless the events cancelled.
    pub fn record(&mut self, raw: RawEvent) -> Coalesced {
        let now = Instant::now();

        let Some(existing) = self.pending.get_mut(&raw.event_path) else {
            let event = raw.event;
            self.pending.insert(
                raw.event_path,
                PendingEvent {
                    monitored_path: raw.monitored_path,
                    event,
                    discovered_through: raw.discovered_through,
                    last_seen: now,
                },
            );
            return Coalesced::Pending(event);
        };

        match merge(existing.event, raw.event) {
            Some(merged) => {
                existing.event = merged;
                existing.last_seen = now;
                // A live observation supersedes a recovered one.
                if raw.discovered_through == DiscoveredThrough::Live {
                    existing.discovered_through = DiscoveredThrough::Live;
                }
                Coalesced::Merged(merged)
            }
            None => {
                self.pending.shift_remove(&raw.event_path);
                Coalesced::Cancelled
            }
        }
    }

    /// Take events that have been stable for the settle window.
    pub fn take_ready(&mut self) -> Vec<RawEvent> {
        let now = Instant::now();
        let settle = self.settle;
        self.take_where(|pending| now.duration_since(pending.last_seen) >= settle)
    }

    /// Take every pending event regardless of age.
    pub fn take_all(&mut self) -> Vec<RawEvent> {
        self.take_where(|_| true)
    }

    /// Drop pending events that belong to a monitored path.
    ///
    /// Returns how many were discarded.
    pub fn discard_monitored(&mut self, monitored_path: &Path) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|_, pending| pending.monitored_path != monitored_path);
        before - self.pending.len()
    }

    /// Check if there are any pending events.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Get the number of pending events.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn take_where(&mut self, mut ready: impl FnMut(&PendingEvent) -> bool) -> Vec<RawEvent> {
        let mut out = Vec::new();
        let mut keep = IndexMap::with_capacity(self.pending.len());

        for (event_path, pending) in self.pending.drain(..) {
            if ready(&pending) {
                out.push(RawEvent {
                    monitored_path: pending.monitored_path,
                    event_path,
                    event: pending.event,
                    discovered_through: pending.discovered_through,
                });
            } else {
                keep.insert(event_path, pending);
            }
        }

        self.pending = keep;
        out
    }
}
