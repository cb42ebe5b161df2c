//! Read-only access to the chat application's SQLite files
//!
//! This module provides:
//! - [`Store`]: one validated, read-only database handle
//! - [`layout`]: discovery of contact/session/shard files under a storage root
//! - [`account`]: the local user's identifier from `info.json`
//!
//! Handles are closed when dropped, so every exit path releases them.

pub mod account;
pub mod layout;

pub use account::local_wxid;
pub use layout::{Storage, StorageLayout};

use crate::error::{Error, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, RowIndex};
use std::path::{Path, PathBuf};

/// A read-only database handle with the path it was opened from.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    conn: Connection,
}

impl Store {
    /// Open a database file read-only and check that it is readable.
    ///
    /// SQLite opens lazily, so a probe against `sqlite_master` is run to
    /// surface corrupt or non-database files here rather than mid-query.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| Error::UnreadableStore {
            path: path.to_path_buf(),
            source,
        })?;

        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|source| Error::UnreadableStore {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            conn,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Whether a table with this exact name exists.
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Column names of a table, empty if the table does not exist.
    pub fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1)")?;
        let columns = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(columns)
    }
}

/// Read a column as text whatever its storage class.
///
/// The stores are loosely typed; a name column is occasionally a BLOB or a
/// number, which a plain `String` read would reject.
pub(crate) fn column_text<I: RowIndex>(row: &Row, idx: I) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_db(path: &Path, sql: &str) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(sql).unwrap();
    }

    #[test]
    fn test_open_valid_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.db");
        create_db(&path, "CREATE TABLE t (id INTEGER, name TEXT);");

        let store = Store::open(&path).unwrap();
        assert_eq!(store.path(), path);
        assert!(store.table_exists("t").unwrap());
        assert!(!store.table_exists("missing").unwrap());
        assert_eq!(store.table_columns("t").unwrap(), vec!["id", "name"]);
        assert!(store.table_columns("missing").unwrap().is_empty());
    }

    #[test]
    fn test_open_rejects_garbage_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, b"not a database ".repeat(300)).unwrap();

        let err = Store::open(&path).unwrap_err();
        assert!(matches!(err, Error::UnreadableStore { .. }));
    }

    #[test]
    fn test_open_rejects_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = Store::open(&dir.path().join("nope.db")).unwrap_err();
        assert!(matches!(err, Error::UnreadableStore { .. }));
    }

    #[test]
    fn test_table_exists_is_not_injectable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.db");
        create_db(&path, "CREATE TABLE t (id INTEGER);");

        let store = Store::open(&path).unwrap();
        assert!(!store.table_exists("t' OR '1'='1").unwrap());
    }

    #[test]
    fn test_column_text_accepts_any_storage_class() {
        let conn = Connection::open_in_memory().unwrap();
        let values = conn
            .query_row("SELECT NULL, X'6869', 42, 'txt'", [], |row| {
                Ok((
                    column_text(row, 0)?,
                    column_text(row, 1)?,
                    column_text(row, 2)?,
                    column_text(row, 3)?,
                ))
            })
            .unwrap();

        assert_eq!(values.0, None);
        assert_eq!(values.1.as_deref(), Some("hi"));
        assert_eq!(values.2.as_deref(), Some("42"));
        assert_eq!(values.3.as_deref(), Some("txt"));
    }
}
