//! Tree-diff scanner against real directories.

use std::fs;

use tempfile::TempDir;
use treesync::{PathScanner, TreeScanner};

#[test]
fn test_second_scan_without_changes_is_empty() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    fs::write(dir.path().join("sub").join("b.txt"), "b").unwrap();

    let scanner = PathScanner::in_memory(Vec::new()).unwrap();
    let first = scanner.scan_tree(dir.path()).unwrap();
    let created: usize = first.iter().map(|(_, diff)| diff.created.len()).sum();
    assert_eq!(created, 2);

    let second = scanner.scan_tree(dir.path()).unwrap();
    assert!(second.iter().all(|(_, diff)| diff.is_empty()));
}

#[test]
fn test_diff_is_grouped_per_directory() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    let scanner = PathScanner::in_memory(Vec::new()).unwrap();
    scanner.scan_tree(dir.path()).unwrap();

    fs::write(dir.path().join("sub").join("new.txt"), "n").unwrap();
    let results = scanner.scan_tree(dir.path()).unwrap();

    let (event_dir, diff) = results
        .iter()
        .find(|(_, diff)| !diff.is_empty())
        .unwrap();
    assert_eq!(event_dir, &dir.path().join("sub"));
    assert_eq!(diff.created, vec!["new.txt".to_string()]);
}

#[test]
fn test_baseline_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    let db = state.path().join("baseline.db");
    fs::write(dir.path().join("a.txt"), "a").unwrap();

    {
        let scanner = PathScanner::open(&db, Vec::new()).unwrap();
        scanner.scan_tree(dir.path()).unwrap();
    }

    let scanner = PathScanner::open(&db, Vec::new()).unwrap();
    assert!(scanner.has_baseline(dir.path()).unwrap());
    let results = scanner.scan_tree(dir.path()).unwrap();
    assert!(results.iter().all(|(_, diff)| diff.is_empty()));

    scanner.purge_path(dir.path()).unwrap();
    assert!(!scanner.has_baseline(dir.path()).unwrap());
}
