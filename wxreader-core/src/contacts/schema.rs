//! Contact table schema generations
//!
//! Each generation is a [`ContactSchema`]: a capability probe (table plus
//! required columns) and pure row mappers. [`SCHEMAS`] lists them newest
//! first; the adapter uses the first one the store supports.

use crate::error::Result;
use crate::store::{column_text as text_column, Store};
use crate::types::Contact;
use rusqlite::Row;
use serde::Serialize;

/// Known contact schema generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    /// Lower-snake `contact` table (4.x stores)
    V4,
    /// PascalCase `Contact` table in `MicroMsg.db`
    Legacy,
}

impl SchemaVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVersion::V4 => "v4",
            SchemaVersion::Legacy => "legacy",
        }
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which listing a query produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    Contacts,
    Groups,
}

/// One schema generation of the contact store.
pub struct ContactSchema {
    pub version: SchemaVersion,
    /// Table name (SQLite matches it case-insensitively)
    pub table: &'static str,
    /// Columns that must all be present for this schema to apply
    pub required_columns: &'static [&'static str],
    contacts_sql: &'static str,
    groups_sql: &'static str,
    map_row: fn(&Row) -> rusqlite::Result<Contact>,
    /// Whether groups carry a `chat_room` member lookup
    pub resolves_member_count: bool,
}

impl ContactSchema {
    /// Whether the store's table has every required column.
    pub fn supports(&self, store: &Store) -> Result<bool> {
        let columns = store.table_columns(self.table)?;
        Ok(self
            .required_columns
            .iter()
            .all(|required| columns.iter().any(|c| c.eq_ignore_ascii_case(required))))
    }

    pub fn sql(&self, listing: Listing) -> &'static str {
        match listing {
            Listing::Contacts => self.contacts_sql,
            Listing::Groups => self.groups_sql,
        }
    }

    pub fn map_row(&self, row: &Row) -> rusqlite::Result<Contact> {
        (self.map_row)(row)
    }
}

impl std::fmt::Debug for ContactSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactSchema")
            .field("version", &self.version)
            .field("table", &self.table)
            .finish()
    }
}

/// Schema generations, newest first.
pub static SCHEMAS: &[ContactSchema] = &[V4, LEGACY];

const V4: ContactSchema = ContactSchema {
    version: SchemaVersion::V4,
    table: "contact",
    required_columns: &[
        "username",
        "alias",
        "local_type",
        "remark",
        "nick_name",
        "small_head_url",
    ],
    contacts_sql: r#"
        SELECT username, alias, local_type, remark, nick_name, small_head_url
        FROM contact
        WHERE local_type IN (1, 2, 5)
        ORDER BY nick_name
    "#,
    groups_sql: r#"
        SELECT username, alias, local_type, remark, nick_name, small_head_url
        FROM contact
        WHERE username LIKE '%@chatroom'
        ORDER BY nick_name
    "#,
    map_row: map_v4_row,
    resolves_member_count: true,
};

// `_` is a LIKE wildcard, so the official-account prefix is escaped.
const LEGACY: ContactSchema = ContactSchema {
    version: SchemaVersion::Legacy,
    table: "Contact",
    required_columns: &["UserName", "Alias", "NickName", "Type", "Remark"],
    contacts_sql: r#"
        SELECT UserName, Alias, NickName, Type, Remark
        FROM Contact
        WHERE Type != 4
          AND UserName NOT LIKE 'gh\_%' ESCAPE '\'
          AND UserName NOT IN ('filehelper', 'floatbottle', 'medianote', 'fmessage')
        ORDER BY NickName
    "#,
    groups_sql: r#"
        SELECT UserName, Alias, NickName, Type, Remark
        FROM Contact
        WHERE UserName LIKE '%@chatroom'
        ORDER BY NickName
    "#,
    map_row: map_legacy_row,
    resolves_member_count: false,
};

fn map_v4_row(row: &Row) -> rusqlite::Result<Contact> {
    let wxid = text_column(row, "username")?.unwrap_or_default();
    Ok(Contact {
        nickname: text_column(row, "nick_name")?.unwrap_or_default(),
        remark: text_column(row, "remark")?.unwrap_or_default(),
        alias: text_column(row, "alias")?.filter(|a| !a.is_empty()),
        avatar_url: text_column(row, "small_head_url")?.filter(|u| !u.is_empty()),
        ..Contact::new(wxid)
    })
}

fn map_legacy_row(row: &Row) -> rusqlite::Result<Contact> {
    let wxid = text_column(row, "UserName")?.unwrap_or_default();
    Ok(Contact {
        nickname: text_column(row, "NickName")?.unwrap_or_default(),
        remark: text_column(row, "Remark")?.unwrap_or_default(),
        alias: text_column(row, "Alias")?.filter(|a| !a.is_empty()),
        ..Contact::new(wxid)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use tempfile::TempDir;

    fn store_with(sql: &str) -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contact.db");
        Connection::open(&path).unwrap().execute_batch(sql).unwrap();
        let store = Store::open(&path).unwrap();
        (dir, store)
    }

    #[test]
    fn test_v4_probe() {
        let (_dir, store) = store_with(
            "CREATE TABLE contact (username TEXT, alias TEXT, local_type INTEGER, flag INTEGER,
                                   remark TEXT, nick_name TEXT, small_head_url TEXT, big_head_url TEXT);",
        );
        assert!(V4.supports(&store).unwrap());
        assert!(!LEGACY.supports(&store).unwrap());
    }

    #[test]
    fn test_legacy_probe() {
        let (_dir, store) = store_with(
            "CREATE TABLE Contact (UserName TEXT, Alias TEXT, NickName TEXT, Type INTEGER, Remark TEXT);",
        );
        assert!(!V4.supports(&store).unwrap());
        assert!(LEGACY.supports(&store).unwrap());
    }

    #[test]
    fn test_probe_without_table() {
        let (_dir, store) = store_with("CREATE TABLE other (id INTEGER);");
        assert!(SCHEMAS.iter().all(|s| !s.supports(&store).unwrap()));
    }
}
