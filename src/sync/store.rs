//! Durable local-file to remote-record mapping.
//!
//! One row per `(input_file, server)`; a single local file may be synced to
//! several servers independently.

use std::path::Path;

use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use serde::Serialize;

use super::queue::SyncQueueItem;
use super::{SyncError, SyncResult};
use crate::monitor::FileEvent;

/// A previously synchronized file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncedFileRecord {
    pub input_file: String,
    pub transported_file_basename: String,
    pub url: String,
    pub server: String,
}

/// What a reconciliation step did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Inserted,
    /// A CREATE for an existing key; the stored record was kept.
    Duplicate,
    Updated { previous_basename: String },
    Deleted { record: SyncedFileRecord },
    AlreadyAbsent,
}

/// Outcome of applying one queue item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub event: FileEvent,
    pub change: StoreChange,
    /// Base name the remote adapter should act on.
    pub remote_basename: String,
}

/// SQLite-backed reconciliation store.
///
/// Owned by the reconciling thread, which is the only writer.
pub struct ReconciliationStore {
    conn: Connection,
}

impl ReconciliationStore {
    /// Open (or create) the synced-files database at the given path.
    pub fn open(db_path: impl AsRef<Path>) -> SyncResult<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Self {
            conn: Connection::open(db_path)?,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> SyncResult<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> SyncResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS synced_files (
                input_file TEXT NOT NULL,
                transported_file_basename TEXT NOT NULL,
                url TEXT NOT NULL,
                server TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS file_unique_per_server
             ON synced_files (input_file, server)",
            [],
        )?;

        Ok(())
    }

    /// Insert a record. A second insert for the same key is rejected.
    pub fn insert(&self, record: &SyncedFileRecord) -> SyncResult<StoreChange> {
        let result = self.conn.execute(
            "INSERT INTO synced_files (input_file, transported_file_basename, url, server)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.input_file,
                record.transported_file_basename,
                record.url,
                record.server
            ],
        );

        match result {
            Ok(_) => Ok(StoreChange::Inserted),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Ok(StoreChange::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Update basename and URL in place, or insert when no record exists.
    pub fn update_or_insert(&self, record: &SyncedFileRecord) -> SyncResult<StoreChange> {
        let previous: Option<String> = self
            .conn
            .query_row(
                "SELECT transported_file_basename FROM synced_files
                 WHERE input_file = ?1 AND server = ?2",
                params![record.input_file, record.server],
                |row| row.get(0),
            )
            .optional()?;

        match previous {
            Some(previous_basename) => {
                self.conn.execute(
                    "UPDATE synced_files SET transported_file_basename = ?1, url = ?2
                     WHERE input_file = ?3 AND server = ?4",
                    params![
                        record.transported_file_basename,
                        record.url,
                        record.input_file,
                        record.server
                    ],
                )?;
                Ok(StoreChange::Updated { previous_basename })
            }
            None => self.insert(record),
        }
    }

    /// Delete the record for a key. Absence is not an error.
    pub fn delete(&self, input_file: &str, server: &str) -> SyncResult<StoreChange> {
        match self.get(input_file, server)? {
            Some(record) => {
                self.conn.execute(
                    "DELETE FROM synced_files WHERE input_file = ?1 AND server = ?2",
                    params![input_file, server],
                )?;
                Ok(StoreChange::Deleted { record })
            }
            None => Ok(StoreChange::AlreadyAbsent),
        }
    }

    pub fn get(&self, input_file: &str, server: &str) -> SyncResult<Option<SyncedFileRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT input_file, transported_file_basename, url, server
                 FROM synced_files WHERE input_file = ?1 AND server = ?2",
                params![input_file, server],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// All records, ordered by input file then server.
    pub fn records(&self) -> SyncResult<Vec<SyncedFileRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT input_file, transported_file_basename, url, server
             FROM synced_files ORDER BY input_file, server",
        )?;
        let rows = stmt.query_map([], row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Number of stored records.
    pub fn count(&self) -> SyncResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(input_file) FROM synced_files", [], |row| {
                row.get(0)
            })?;
        Ok(count as usize)
    }

    /// Apply one queue item with create/modify/delete semantics.
    ///
    /// Fails with [`SyncError::UnknownEventType`] for anything that is not a
    /// file event.
    pub fn apply(&self, item: &SyncQueueItem) -> SyncResult<Applied> {
        let event = FileEvent::try_from(item.event).map_err(|_| SyncError::UnknownEventType {
            bits: item.event.bits(),
        })?;
        let input_file = item.input_key()?;
        let basename = item.transported_basename()?;
        let record = SyncedFileRecord {
            input_file: input_file.to_string(),
            transported_file_basename: basename.to_string(),
            url: item.url.clone(),
            server: item.server.clone(),
        };

        let change = match event {
            FileEvent::Created => self.insert(&record)?,
            FileEvent::Modified => self.update_or_insert(&record)?,
            FileEvent::Deleted => self.delete(input_file, &item.server)?,
        };

        if change == StoreChange::Duplicate {
            tracing::error!(
                "[store] integrity error: duplicate key input_file = '{input_file}', server = '{}'",
                item.server
            );
        }

        let remote_basename = match &change {
            StoreChange::Deleted { record } => record.transported_file_basename.clone(),
            _ => record.transported_file_basename,
        };

        crate::debug_event!(
            "store",
            "queue -> synced files",
            "{event} '{input_file}' (URL '{}')",
            item.url
        );

        Ok(Applied {
            event,
            change,
            remote_basename,
        })
    }
}

impl std::fmt::Debug for ReconciliationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationStore")
            .field("path", &self.conn.path())
            .finish()
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncedFileRecord> {
    Ok(SyncedFileRecord {
        input_file: row.get(0)?,
        transported_file_basename: row.get(1)?,
        url: row.get(2)?,
        server: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::EventMask;
    use std::path::PathBuf;

    fn item(event: EventMask, url: &str, server: &str) -> SyncQueueItem {
        SyncQueueItem::new("/data/a.txt", event, url, server)
    }

    #[test]
    fn test_duplicate_create_keeps_first_record() {
        let store = ReconciliationStore::in_memory().unwrap();

        let first = store
            .apply(&item(EventMask::CREATED, "https://cdn/one", "s1"))
            .unwrap();
        assert_eq!(first.change, StoreChange::Inserted);

        let second = store
            .apply(&item(EventMask::CREATED, "https://cdn/two", "s1"))
            .unwrap();
        assert_eq!(second.change, StoreChange::Duplicate);

        assert_eq!(store.count().unwrap(), 1);
        let record = store.get("/data/a.txt", "s1").unwrap().unwrap();
        assert_eq!(record.url, "https://cdn/one");
    }

    #[test]
    fn test_same_file_on_two_servers() {
        let store = ReconciliationStore::in_memory().unwrap();

        store.apply(&item(EventMask::CREATED, "u1", "s1")).unwrap();
        store.apply(&item(EventMask::CREATED, "u2", "s2")).unwrap();

        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_modify_updates_in_place() {
        let store = ReconciliationStore::in_memory().unwrap();
        store.apply(&item(EventMask::CREATED, "u1", "s1")).unwrap();

        let mut modified = item(EventMask::MODIFIED, "u2", "s1");
        modified.output_file = PathBuf::from("/out/a.v2.txt");
        let applied = store.apply(&modified).unwrap();

        assert_eq!(
            applied.change,
            StoreChange::Updated {
                previous_basename: "a.txt".to_string()
            }
        );
        assert_eq!(store.count().unwrap(), 1);
        let record = store.get("/data/a.txt", "s1").unwrap().unwrap();
        assert_eq!(record.url, "u2");
        assert_eq!(record.transported_file_basename, "a.v2.txt");
    }

    #[test]
    fn test_modify_without_record_inserts() {
        let store = ReconciliationStore::in_memory().unwrap();

        let applied = store.apply(&item(EventMask::MODIFIED, "u", "s1")).unwrap();

        assert_eq!(applied.change, StoreChange::Inserted);
        assert!(store.get("/data/a.txt", "s1").unwrap().is_some());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = ReconciliationStore::in_memory().unwrap();
        store.apply(&item(EventMask::CREATED, "u", "s1")).unwrap();

        let first = store.apply(&item(EventMask::DELETED, "u", "s1")).unwrap();
        assert!(matches!(first.change, StoreChange::Deleted { .. }));

        let second = store.apply(&item(EventMask::DELETED, "u", "s1")).unwrap();
        assert_eq!(second.change, StoreChange::AlreadyAbsent);

        assert!(store.get("/data/a.txt", "s1").unwrap().is_none());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_delete_uses_stored_basename() {
        let store = ReconciliationStore::in_memory().unwrap();
        let mut created = item(EventMask::CREATED, "u", "s1");
        created.output_file = PathBuf::from("/out/a.processed.txt");
        store.apply(&created).unwrap();

        let applied = store.apply(&item(EventMask::DELETED, "u", "s1")).unwrap();
        assert_eq!(applied.remote_basename, "a.processed.txt");
    }

    #[test]
    fn test_unknown_event_fails_loudly() {
        let store = ReconciliationStore::in_memory().unwrap();

        let err = store
            .apply(&item(EventMask::DROPPED_EVENTS, "u", "s1"))
            .unwrap_err();
        assert!(matches!(err, SyncError::UnknownEventType { bits: 16 }));

        let err = store
            .apply(&item(EventMask::CREATED | EventMask::MODIFIED, "u", "s1"))
            .unwrap_err();
        assert!(matches!(err, SyncError::UnknownEventType { bits: 3 }));
    }

    #[test]
    fn test_records_survive_reopen() {
        let temp = tempfile::TempDir::new().unwrap();
        let db = temp.path().join("synced_files.db");

        {
            let store = ReconciliationStore::open(&db).unwrap();
            store.apply(&item(EventMask::CREATED, "u", "s1")).unwrap();
        }

        let store = ReconciliationStore::open(&db).unwrap();
        assert_eq!(store.records().unwrap().len(), 1);
    }
}
