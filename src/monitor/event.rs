//! Event identities, canonical names and the coalescing merge table.
//!
//! Everything here is a compile-time constant. The names used in log lines
//! and configuration files come from [`EVENT_NAMES`], never from ad hoc
//! strings at call sites.

use std::fmt;
use std::path::PathBuf;

use bitflags::bitflags;

use super::MonitorError;

bitflags! {
    /// Event subscription bits. A monitored path's subscriber picks any
    /// combination; events outside the mask are never delivered.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u32 {
        const CREATED = 0x01;
        const MODIFIED = 0x02;
        const DELETED = 0x04;
        const MONITORED_DIR_MOVED = 0x08;
        const DROPPED_EVENTS = 0x10;
    }
}

/// Canonical name for every single-bit event.
pub const EVENT_NAMES: [(EventMask, &str); 5] = [
    (EventMask::CREATED, "CREATED"),
    (EventMask::MODIFIED, "MODIFIED"),
    (EventMask::DELETED, "DELETED"),
    (EventMask::MONITORED_DIR_MOVED, "MONITORED_DIR_MOVED"),
    (EventMask::DROPPED_EVENTS, "DROPPED_EVENTS"),
];

/// Look up the canonical name of a single event bit.
///
/// Returns `None` for combined masks or the empty mask.
pub fn event_name(event: EventMask) -> Option<&'static str> {
    EVENT_NAMES
        .iter()
        .find(|(mask, _)| *mask == event)
        .map(|(_, name)| *name)
}

/// Parse a canonical event name (case-insensitive).
pub fn event_from_name(name: &str) -> Option<EventMask> {
    let wanted = name.trim();
    EVENT_NAMES
        .iter()
        .find(|(_, known)| known.eq_ignore_ascii_case(wanted))
        .map(|(mask, _)| *mask)
}

/// The file-level events that take part in coalescing and reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileEvent {
    Created,
    Modified,
    Deleted,
}

impl FileEvent {
    pub const ALL: [FileEvent; 3] = [FileEvent::Created, FileEvent::Modified, FileEvent::Deleted];

    /// The subscription bit for this event.
    pub const fn mask(self) -> EventMask {
        match self {
            FileEvent::Created => EventMask::CREATED,
            FileEvent::Modified => EventMask::MODIFIED,
            FileEvent::Deleted => EventMask::DELETED,
        }
    }

    /// Canonical name, taken from [`EVENT_NAMES`].
    pub const fn name(self) -> &'static str {
        // File events occupy the first three table rows, in index order
        EVENT_NAMES[self.index()].1
    }

    const fn index(self) -> usize {
        match self {
            FileEvent::Created => 0,
            FileEvent::Modified => 1,
            FileEvent::Deleted => 2,
        }
    }
}

impl fmt::Display for FileEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<FileEvent> for EventMask {
    fn from(event: FileEvent) -> Self {
        event.mask()
    }
}

impl TryFrom<EventMask> for FileEvent {
    type Error = MonitorError;

    fn try_from(mask: EventMask) -> Result<Self, Self::Error> {
        FileEvent::ALL
            .into_iter()
            .find(|event| event.mask() == mask)
            .ok_or(MonitorError::NotAFileEvent { bits: mask.bits() })
    }
}

/// `MERGE_TABLE[pending][new]`; `None` means the two events cancel out.
///
/// Some combinations should not happen on a well-behaved platform but are
/// listed anyway, since notification APIs do deliver them.
pub const MERGE_TABLE: [[Option<FileEvent>; 3]; 3] = [
    // pending CREATED
    [Some(FileEvent::Created), Some(FileEvent::Created), None],
    // pending MODIFIED
    [
        Some(FileEvent::Modified),
        Some(FileEvent::Modified),
        Some(FileEvent::Deleted),
    ],
    // pending DELETED
    [
        Some(FileEvent::Modified),
        Some(FileEvent::Modified),
        Some(FileEvent::Deleted),
    ],
];

/// Merge a newly observed event into a pending one.
pub const fn merge(pending: FileEvent, new: FileEvent) -> Option<FileEvent> {
    MERGE_TABLE[pending.index()][new.index()]
}

/// How an event was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveredThrough {
    /// Reported by the running backend.
    Live,
    /// Recomputed from the persisted baseline after downtime.
    Recovery,
    /// Found while building a first baseline for a newly added path.
    InitialScan,
}

impl DiscoveredThrough {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscoveredThrough::Live => "live",
            DiscoveredThrough::Recovery => "recovery",
            DiscoveredThrough::InitialScan => "initial_scan",
        }
    }
}

impl fmt::Display for DiscoveredThrough {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file event between detection and dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub monitored_path: PathBuf,
    pub event_path: PathBuf,
    pub event: FileEvent,
    pub discovered_through: DiscoveredThrough,
}

impl RawEvent {
    pub fn new(
        monitored_path: impl Into<PathBuf>,
        event_path: impl Into<PathBuf>,
        event: FileEvent,
        discovered_through: DiscoveredThrough,
    ) -> Self {
        Self {
            monitored_path: monitored_path.into(),
            event_path: event_path.into(),
            event,
            discovered_through,
        }
    }
}
