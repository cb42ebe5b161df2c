//! Error types for wxreader-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the wxreader-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// None of the known contact store locations exist under the root
    #[error("no contact database found under {}", .0.display())]
    ContactStoreNotFound(PathBuf),

    /// A store could be opened but failed the metadata probe
    #[error("unreadable database {}: {source}", path.display())]
    UnreadableStore {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// The contact store matches no known schema generation
    #[error("contact database matches no known schema")]
    UnsupportedSchema,

    /// A shard table name does not have the `Msg_<32 hex>` shape
    #[error("invalid shard table name: {0:?}")]
    InvalidTableName(String),
}

impl Error {
    /// Whether this error means a table or column the query expected is
    /// missing from the store.
    ///
    /// This is the only error class that schema and query fallbacks are
    /// allowed to swallow.
    pub fn is_schema_mismatch(&self) -> bool {
        match self {
            Error::Database(e) => is_schema_mismatch(e),
            _ => false,
        }
    }
}

/// See [`Error::is_schema_mismatch`].
pub(crate) fn is_schema_mismatch(err: &rusqlite::Error) -> bool {
    // Prepare failures surface as either `SqliteFailure` or `SqlInputError`
    // depending on the SQLite build, both carry the engine message.
    let msg = err.to_string();
    msg.contains("no such table") || msg.contains("no such column")
}

/// Result type alias for wxreader-core
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_missing_table_is_schema_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.prepare("SELECT * FROM nope").unwrap_err();
        assert!(Error::from(err).is_schema_mismatch());
    }

    #[test]
    fn test_missing_column_is_schema_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (a INTEGER)").unwrap();
        let err = conn.prepare("SELECT b FROM t").unwrap_err();
        assert!(Error::from(err).is_schema_mismatch());
    }

    #[test]
    fn test_syntax_error_is_not_schema_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.prepare("SELEC 1").unwrap_err();
        assert!(!Error::from(err).is_schema_mismatch());
        assert!(!Error::UnsupportedSchema.is_schema_mismatch());
    }
}
