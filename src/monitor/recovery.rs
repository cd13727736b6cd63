//! Missed-event recovery through the tree-diff scanner.

use std::path::Path;

use super::event::{DiscoveredThrough, EventMask, FileEvent, RawEvent};
use crate::scanner::{ScanResult, TreeDiff, TreeScanner};

/// Turn one directory's diff into raw events, keeping only masked types.
pub fn events_for_diff(
    monitored_path: &Path,
    event_dir: &Path,
    diff: &TreeDiff,
    event_mask: EventMask,
    discovered_through: DiscoveredThrough,
) -> Vec<RawEvent> {
    let groups = [
        (FileEvent::Created, &diff.created),
        (FileEvent::Modified, &diff.modified),
        (FileEvent::Deleted, &diff.deleted),
    ];

    groups
        .into_iter()
        .filter(|(event, _)| event_mask.contains(event.mask()))
        .flat_map(|(event, names)| {
            names.iter().map(move |name| {
                RawEvent::new(
                    monitored_path,
                    event_dir.join(name),
                    event,
                    discovered_through,
                )
            })
        })
        .collect()
}

/// Re-derive the events missed for `monitored_path` since its last scan.
///
/// The scanner advances its baseline as part of the scan, so calling this
/// twice without filesystem changes yields nothing the second time.
pub fn generate_missed_events(
    scanner: &dyn TreeScanner,
    monitored_path: &Path,
    event_mask: EventMask,
    discovered_through: DiscoveredThrough,
) -> ScanResult<Vec<RawEvent>> {
    crate::log_event!(
        "recovery",
        "generating missed events",
        "{} (mask {:#04x})",
        monitored_path.display(),
        event_mask.bits()
    );

    let mut events = Vec::new();
    for (event_dir, diff) in scanner.scan_tree(monitored_path)? {
        events.extend(events_for_diff(
            monitored_path,
            &event_dir,
            &diff,
            event_mask,
            discovered_through,
        ));
    }

    crate::log_event!(
        "recovery",
        "done",
        "{}: {} events",
        monitored_path.display(),
        events.len()
    );
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::PathScanner;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_events_for_diff_applies_mask() {
        let diff = TreeDiff {
            created: vec!["new.txt".into()],
            modified: vec!["changed.txt".into()],
            deleted: vec!["gone.txt".into()],
        };

        let events = events_for_diff(
            Path::new("/data"),
            Path::new("/data/sub"),
            &diff,
            EventMask::CREATED | EventMask::DELETED,
            DiscoveredThrough::Recovery,
        );

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, FileEvent::Created);
        assert_eq!(events[0].event_path, PathBuf::from("/data/sub/new.txt"));
        assert_eq!(events[1].event, FileEvent::Deleted);
        assert!(events.iter().all(|e| e.event != FileEvent::Modified));
        assert!(
            events
                .iter()
                .all(|e| e.discovered_through == DiscoveredThrough::Recovery)
        );
    }

    #[test]
    fn test_recovery_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let scanner = PathScanner::in_memory(Vec::new()).unwrap();
        scanner.scan_tree(temp.path()).unwrap();

        fs::write(temp.path().join("offline.txt"), "written while down").unwrap();

        let all = EventMask::all();
        let first =
            generate_missed_events(&scanner, temp.path(), all, DiscoveredThrough::Recovery)
                .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].event, FileEvent::Created);

        let second =
            generate_missed_events(&scanner, temp.path(), all, DiscoveredThrough::Recovery)
                .unwrap();
        assert!(second.is_empty());
    }
}
