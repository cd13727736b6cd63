//! SQLite-backed tree scanner.
//!
//! The baseline is one row per file (`size`, `mtime_ns`) plus one row per
//! scanned root, so an empty tree still counts as having a baseline.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction, params};
use walkdir::WalkDir;

use super::{ScanError, ScanResult, TreeDiff, TreeScanner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    size: i64,
    mtime_ns: i64,
}

impl FileStamp {
    fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        let mtime_ns = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as i64)
            .unwrap_or_default();
        Self {
            size: metadata.len() as i64,
            mtime_ns,
        }
    }
}

/// Tree scanner with a SQLite baseline.
///
/// Cloning shares the underlying connection, so the polling backend and
/// missed-event recovery see the same baseline.
#[derive(Clone)]
pub struct PathScanner {
    conn: Arc<Mutex<Connection>>,
    ignored_dirs: Arc<HashSet<String>>,
}

impl PathScanner {
    /// Open (or create) a baseline database at the given path.
    pub fn open(
        db_path: impl AsRef<Path>,
        ignored_dirs: impl IntoIterator<Item = String>,
    ) -> ScanResult<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::with_connection(Connection::open(db_path)?, ignored_dirs)
    }

    /// Baseline that lives only as long as the process.
    pub fn in_memory(ignored_dirs: impl IntoIterator<Item = String>) -> ScanResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, ignored_dirs)
    }

    fn with_connection(
        conn: Connection,
        ignored_dirs: impl IntoIterator<Item = String>,
    ) -> ScanResult<Self> {
        let scanner = Self {
            conn: Arc::new(Mutex::new(conn)),
            ignored_dirs: Arc::new(ignored_dirs.into_iter().collect()),
        };
        scanner.init_schema()?;
        Ok(scanner)
    }

    fn init_schema(&self) -> ScanResult<()> {
        let conn = self.conn.lock();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS scanned_roots (
                root TEXT PRIMARY KEY,
                scanned_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS scanned_files (
                root TEXT NOT NULL,
                path TEXT NOT NULL,
                size INTEGER NOT NULL,
                mtime_ns INTEGER NOT NULL,
                PRIMARY KEY (root, path)
            )",
            [],
        )?;

        Ok(())
    }

    /// Whether any component of `path` is an ignored directory name.
    pub fn is_ignored(&self, path: &Path) -> bool {
        path.components().any(|c| {
            c.as_os_str()
                .to_str()
                .is_some_and(|name| self.ignored_dirs.contains(name))
        })
    }

    /// Walk `root` and stamp every regular file, keyed by relative path.
    fn walk(&self, root: &Path) -> BTreeMap<String, FileStamp> {
        let mut files = BTreeMap::new();
        if !root.exists() {
            return files;
        }

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| self.ignored_dirs.contains(name))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("[scanner] skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let Some(relative) = relative.to_str() else {
                tracing::warn!(
                    "[scanner] skipping non UTF-8 path {}",
                    entry.path().display()
                );
                continue;
            };

            match entry.metadata() {
                Ok(metadata) => {
                    files.insert(relative.to_string(), FileStamp::from_metadata(&metadata));
                }
                Err(e) => {
                    tracing::warn!("[scanner] cannot stat {}: {e}", entry.path().display());
                }
            }
        }

        files
    }

    fn load_baseline(tx: &Transaction<'_>, root: &str) -> ScanResult<BTreeMap<String, FileStamp>> {
        let mut stmt =
            tx.prepare("SELECT path, size, mtime_ns FROM scanned_files WHERE root = ?1")?;
        let rows = stmt.query_map(params![root], |row| {
            Ok((
                row.get::<_, String>(0)?,
                FileStamp {
                    size: row.get(1)?,
                    mtime_ns: row.get(2)?,
                },
            ))
        })?;

        let mut baseline = BTreeMap::new();
        for row in rows {
            let (path, stamp) = row?;
            baseline.insert(path, stamp);
        }
        Ok(baseline)
    }

    /// Number of files recorded for `root`.
    pub fn baseline_len(&self, root: &Path) -> ScanResult<usize> {
        let key = root_key(root)?;
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM scanned_files WHERE root = ?1",
            params![key],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl PathScanner {
    /// Diff `root` against the baseline inside `tx`, returning the walked
    /// tree alongside the per-directory changes.
    fn diff_in(
        &self,
        tx: &Transaction<'_>,
        root: &Path,
    ) -> ScanResult<(BTreeMap<String, FileStamp>, Vec<(PathBuf, TreeDiff)>)> {
        let key = root_key(root)?;
        let current = self.walk(root);
        let previous = Self::load_baseline(tx, key)?;

        let mut diffs: BTreeMap<PathBuf, TreeDiff> = BTreeMap::new();
        let entry_for = |relative: &str| {
            let relative = Path::new(relative);
            let dir = match relative.parent() {
                Some(parent) => root.join(parent),
                None => root.to_path_buf(),
            };
            let name = relative
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            (dir, name)
        };

        for (relative, stamp) in &current {
            match previous.get(relative) {
                None => {
                    let (dir, name) = entry_for(relative);
                    diffs.entry(dir).or_default().created.push(name);
                }
                Some(old) if old != stamp => {
                    let (dir, name) = entry_for(relative);
                    diffs.entry(dir).or_default().modified.push(name);
                }
                Some(_) => {}
            }
        }

        for relative in previous.keys().filter(|r| !current.contains_key(*r)) {
            let (dir, name) = entry_for(relative);
            diffs.entry(dir).or_default().deleted.push(name);
        }

        Ok((current, diffs.into_iter().collect()))
    }

    /// Whether the baseline for `root` holds any file below `dir`.
    ///
    /// Used to tell a vanished directory apart from a vanished file.
    pub fn has_files_under(&self, root: &Path, dir: &Path) -> ScanResult<bool> {
        let key = root_key(root)?;
        let Ok(relative) = dir.strip_prefix(root) else {
            return Ok(false);
        };
        let Some(relative) = relative.to_str().filter(|r| !r.is_empty()) else {
            return Ok(false);
        };
        let prefix = format!("{relative}{}", std::path::MAIN_SEPARATOR);

        let conn = self.conn.lock();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM scanned_files
             WHERE root = ?1 AND substr(path, 1, length(?2)) = ?2)",
            params![key, prefix],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

impl TreeScanner for PathScanner {
    fn scan_tree(&self, root: &Path) -> ScanResult<Vec<(PathBuf, TreeDiff)>> {
        let key = root_key(root)?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let (current, diffs) = self.diff_in(&tx, root)?;

        tx.execute("DELETE FROM scanned_files WHERE root = ?1", params![key])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO scanned_files (root, path, size, mtime_ns) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (relative, stamp) in &current {
                insert.execute(params![key, relative, stamp.size, stamp.mtime_ns])?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO scanned_roots (root, scanned_at) VALUES (?1, ?2)",
            params![key, chrono::Utc::now().timestamp()],
        )?;
        tx.commit()?;

        crate::debug_event!(
            "scanner",
            "scanned",
            "{}: {} files, {} changed directories",
            root.display(),
            current.len(),
            diffs.len()
        );

        Ok(diffs)
    }

    fn diff_tree(&self, root: &Path) -> ScanResult<Vec<(PathBuf, TreeDiff)>> {
        let mut conn = self.conn.lock();
        // Dropped without commit: the baseline is left untouched
        let tx = conn.transaction()?;
        let (_, diffs) = self.diff_in(&tx, root)?;
        Ok(diffs)
    }

    fn purge_path(&self, root: &Path) -> ScanResult<()> {
        let key = root_key(root)?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM scanned_files WHERE root = ?1", params![key])?;
        tx.execute("DELETE FROM scanned_roots WHERE root = ?1", params![key])?;
        tx.commit()?;
        Ok(())
    }

    fn has_baseline(&self, root: &Path) -> ScanResult<bool> {
        let key = root_key(root)?;
        let conn = self.conn.lock();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM scanned_roots WHERE root = ?1)",
            params![key],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn refresh_file(&self, root: &Path, file: &Path) -> ScanResult<()> {
        let key = root_key(root)?;
        let Ok(relative) = file.strip_prefix(root) else {
            return Ok(());
        };
        if self.is_ignored(relative) {
            return Ok(());
        }
        let relative = relative
            .to_str()
            .ok_or_else(|| ScanError::NonUtf8Path(file.to_path_buf()))?;

        let conn = self.conn.lock();
        match std::fs::metadata(file) {
            Ok(metadata) if metadata.is_file() => {
                let stamp = FileStamp::from_metadata(&metadata);
                conn.execute(
                    "INSERT OR REPLACE INTO scanned_files (root, path, size, mtime_ns)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![key, relative, stamp.size, stamp.mtime_ns],
                )?;
            }
            _ => {
                conn.execute(
                    "DELETE FROM scanned_files WHERE root = ?1 AND path = ?2",
                    params![key, relative],
                )?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PathScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathScanner")
            .field("ignored_dirs", &self.ignored_dirs)
            .finish_non_exhaustive()
    }
}

fn root_key(root: &Path) -> ScanResult<&str> {
    root.to_str()
        .ok_or_else(|| ScanError::NonUtf8Path(root.to_path_buf()))
}
