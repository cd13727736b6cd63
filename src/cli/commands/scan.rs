//! Scan and Purge commands against the on-disk baseline.

use std::path::Path;

use crate::config::Settings;
use crate::scanner::{PathScanner, TreeScanner};

fn open_scanner(settings: &Settings) -> anyhow::Result<PathScanner> {
    let db = settings.resolve(&settings.monitor.baseline_db);
    Ok(PathScanner::open(
        db,
        settings.monitor.ignored_dirs.iter().cloned(),
    )?)
}

/// Run scan command - print the diff per directory.
///
/// Read-only: the baseline is what the next `watch` recovers against, so
/// consuming its diff here would hide those changes from the store.
pub fn run_scan(settings: &Settings, path: &Path) -> anyhow::Result<()> {
    let path = std::path::absolute(path)?;
    let scanner = open_scanner(settings)?;
    if !scanner.has_baseline(&path)? {
        println!("No baseline recorded for {}", path.display());
    }

    let results = scanner.diff_tree(&path)?;

    let mut total = 0;
    for (dir, diff) in &results {
        if diff.is_empty() {
            continue;
        }
        println!("{}", dir.display());
        for name in &diff.created {
            println!("  + {name}");
        }
        for name in &diff.modified {
            println!("  ~ {name}");
        }
        for name in &diff.deleted {
            println!("  - {name}");
        }
        total += diff.len();
    }

    if total == 0 {
        println!("No changes.");
    }
    Ok(())
}

/// Run purge command - drop the baseline for a path.
pub fn run_purge(settings: &Settings, path: &Path) -> anyhow::Result<()> {
    let path = std::path::absolute(path)?;
    open_scanner(settings)?.purge_path(&path)?;
    println!("Purged baseline for {}", path.display());
    Ok(())
}
