//! Storage layout discovery
//!
//! The application has shipped several on-disk layouts. Discovery tries each
//! known variant in a fixed order:
//!
//! | Store | Candidates (first existing wins) |
//! |-------|----------------------------------|
//! | Contacts | `contact/contact.db`, `contact.db`, `MicroMsg.db`, `Msg/MicroMsg.db` |
//! | Sessions (optional) | `session/session.db`, `session.db` |
//! | Message shards | `message_N.db` in root, else in `message/`, else `Msg/MSG*.db` |
//!
//! Numbered shards are enumerated from 0 and stop at the first missing index.

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::store::Store;
use std::path::{Path, PathBuf};

const CONTACT_CANDIDATES: &[&[&str]] = &[
    &["contact", "contact.db"],
    &["contact.db"],
    &["MicroMsg.db"],
    &["Msg", "MicroMsg.db"],
];

const SESSION_CANDIDATES: &[&[&str]] = &[&["session", "session.db"], &["session.db"]];

/// Which shard layout a storage root uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardLayout {
    /// `message_N.db` directly in the root
    FlatRoot,
    /// `message/message_N.db`
    MessageDir,
    /// `Msg/MSG*.db` from older releases
    LegacyMsgDir,
}

/// Database file locations found under a storage root.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub root: PathBuf,
    pub contact_db: Option<PathBuf>,
    pub session_db: Option<PathBuf>,
    pub shard_layout: Option<ShardLayout>,
    pub shard_dbs: Vec<PathBuf>,
}

impl StorageLayout {
    /// Locate every database file under `root` without opening anything.
    pub fn discover(root: &Path, max_shards: usize) -> Self {
        let contact_db = first_existing(root, CONTACT_CANDIDATES);
        let session_db = first_existing(root, SESSION_CANDIDATES);

        let message_dir = root.join("message");
        let legacy_dir = root.join("Msg");

        let (shard_layout, shard_dbs) = if root.join("message_0.db").is_file() {
            (
                Some(ShardLayout::FlatRoot),
                numbered_shards(root, max_shards),
            )
        } else if message_dir.is_dir() {
            (
                Some(ShardLayout::MessageDir),
                numbered_shards(&message_dir, max_shards),
            )
        } else if legacy_dir.is_dir() {
            (Some(ShardLayout::LegacyMsgDir), legacy_shards(&legacy_dir))
        } else {
            (None, Vec::new())
        };

        tracing::debug!(
            root = %root.display(),
            contact_db = ?contact_db,
            session_db = ?session_db,
            shard_layout = ?shard_layout,
            shards = shard_dbs.len(),
            "Discovered storage layout"
        );

        Self {
            root: root.to_path_buf(),
            contact_db,
            session_db,
            shard_layout,
            shard_dbs,
        }
    }
}

fn first_existing(root: &Path, candidates: &[&[&str]]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|parts| parts.iter().fold(root.to_path_buf(), |p, part| p.join(part)))
        .find(|path| path.is_file())
}

fn numbered_shards(dir: &Path, max_shards: usize) -> Vec<PathBuf> {
    (0..max_shards)
        .map(|i| dir.join(format!("message_{}.db", i)))
        .take_while(|path| path.is_file())
        .collect()
}

fn legacy_shards(dir: &Path) -> Vec<PathBuf> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{}/MSG*.db", escaped);

    let entries = match glob::glob(&pattern) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(pattern = %pattern, error = %e, "Invalid shard glob pattern");
            return Vec::new();
        }
    };

    let mut shards: Vec<PathBuf> = entries
        .flatten()
        .filter(|path| path.is_file())
        .collect();
    shards.sort();
    shards
}

/// Opened handles for one storage root.
///
/// Scoped to a single top-level operation; dropping it closes every handle.
#[derive(Debug)]
pub struct Storage {
    layout: StorageLayout,
    contact: Store,
    session: Option<Store>,
    shards: Vec<Store>,
}

impl Storage {
    /// Discover and open every store under `root`.
    ///
    /// A missing or unreadable contact store fails the call. Unreadable
    /// session or shard files are logged and left out.
    pub fn open(root: &Path, config: &StoreConfig) -> Result<Self> {
        let layout = StorageLayout::discover(root, config.max_shards);

        let contact_path = layout
            .contact_db
            .as_deref()
            .ok_or_else(|| Error::ContactStoreNotFound(root.to_path_buf()))?;
        let contact = Store::open(contact_path)?;

        let session = layout.session_db.as_deref().and_then(|path| {
            Store::open(path)
                .map_err(|e| {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable session database");
                })
                .ok()
        });

        let shards: Vec<Store> = layout
            .shard_dbs
            .iter()
            .filter_map(|path| match Store::open(path) {
                Ok(store) => Some(store),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable message shard");
                    None
                }
            })
            .collect();

        tracing::info!(
            root = %root.display(),
            contact_db = %contact.path().display(),
            has_session_db = session.is_some(),
            shards = shards.len(),
            "Opened storage"
        );

        Ok(Self {
            layout,
            contact,
            session,
            shards,
        })
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn contact_store(&self) -> &Store {
        &self.contact
    }

    pub fn session_store(&self) -> Option<&Store> {
        self.session.as_ref()
    }

    /// Shards that opened successfully, in discovery order.
    pub fn shards(&self) -> &[Store] {
        &self.shards
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use tempfile::TempDir;

    fn touch_db(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let conn = Connection::open(path).unwrap();
        conn.execute_batch("CREATE TABLE IF NOT EXISTS probe (id INTEGER);")
            .unwrap();
    }

    #[test]
    fn test_contact_candidate_order() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch_db(&root.join("Msg/MicroMsg.db"));
        assert_eq!(
            StorageLayout::discover(root, 100).contact_db,
            Some(root.join("Msg/MicroMsg.db"))
        );

        touch_db(&root.join("MicroMsg.db"));
        assert_eq!(
            StorageLayout::discover(root, 100).contact_db,
            Some(root.join("MicroMsg.db"))
        );

        touch_db(&root.join("contact.db"));
        assert_eq!(
            StorageLayout::discover(root, 100).contact_db,
            Some(root.join("contact.db"))
        );

        touch_db(&root.join("contact/contact.db"));
        assert_eq!(
            StorageLayout::discover(root, 100).contact_db,
            Some(root.join("contact/contact.db"))
        );
    }

    #[test]
    fn test_session_candidates() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        assert!(StorageLayout::discover(root, 100).session_db.is_none());

        touch_db(&root.join("session.db"));
        touch_db(&root.join("session/session.db"));
        assert_eq!(
            StorageLayout::discover(root, 100).session_db,
            Some(root.join("session/session.db"))
        );
    }

    #[test]
    fn test_flat_shards_stop_at_gap() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch_db(&root.join("message_0.db"));
        touch_db(&root.join("message_1.db"));
        touch_db(&root.join("message_3.db"));

        let layout = StorageLayout::discover(root, 100);
        assert_eq!(layout.shard_layout, Some(ShardLayout::FlatRoot));
        assert_eq!(
            layout.shard_dbs,
            vec![root.join("message_0.db"), root.join("message_1.db")]
        );
    }

    #[test]
    fn test_flat_shards_respect_cap() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for i in 0..5 {
            touch_db(&root.join(format!("message_{}.db", i)));
        }

        assert_eq!(StorageLayout::discover(root, 3).shard_dbs.len(), 3);
    }

    #[test]
    fn test_flat_shards_take_precedence_over_message_dir() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch_db(&root.join("message_0.db"));
        touch_db(&root.join("message/message_0.db"));
        touch_db(&root.join("message/message_1.db"));

        let layout = StorageLayout::discover(root, 100);
        assert_eq!(layout.shard_dbs, vec![root.join("message_0.db")]);
    }

    #[test]
    fn test_message_dir_shards() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch_db(&root.join("message/message_0.db"));
        touch_db(&root.join("message/message_1.db"));
        touch_db(&root.join("Msg/MSG0.db"));

        let layout = StorageLayout::discover(root, 100);
        assert_eq!(layout.shard_layout, Some(ShardLayout::MessageDir));
        assert_eq!(layout.shard_dbs.len(), 2);
    }

    #[test]
    fn test_legacy_msg_dir_shards() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch_db(&root.join("Msg/MSG1.db"));
        touch_db(&root.join("Msg/MSG0.db"));
        touch_db(&root.join("Msg/MicroMsg.db"));
        std::fs::write(root.join("Msg/MSG0.db-journal"), b"").unwrap();

        let layout = StorageLayout::discover(root, 100);
        assert_eq!(layout.shard_layout, Some(ShardLayout::LegacyMsgDir));
        assert_eq!(
            layout.shard_dbs,
            vec![root.join("Msg/MSG0.db"), root.join("Msg/MSG1.db")]
        );
    }

    #[test]
    fn test_no_shards_is_empty_not_error() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch_db(&root.join("contact.db"));

        let storage = Storage::open(root, &StoreConfig::default()).unwrap();
        assert!(storage.shards().is_empty());
        assert!(storage.session_store().is_none());
    }

    #[test]
    fn test_open_without_contact_store_fails() {
        let dir = TempDir::new().unwrap();
        touch_db(&dir.path().join("message_0.db"));

        let err = Storage::open(dir.path(), &StoreConfig::default()).unwrap_err();
        assert!(matches!(err, Error::ContactStoreNotFound(_)));
    }

    #[test]
    fn test_open_with_corrupt_contact_store_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("contact.db"), b"garbage ".repeat(600)).unwrap();

        let err = Storage::open(dir.path(), &StoreConfig::default()).unwrap_err();
        assert!(matches!(err, Error::UnreadableStore { .. }));
    }

    #[test]
    fn test_corrupt_shard_is_skipped() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch_db(&root.join("contact.db"));
        touch_db(&root.join("message_0.db"));
        std::fs::write(root.join("message_1.db"), b"garbage ".repeat(600)).unwrap();
        touch_db(&root.join("message_2.db"));

        let storage = Storage::open(root, &StoreConfig::default()).unwrap();
        assert_eq!(storage.layout().shard_dbs.len(), 3);
        assert_eq!(storage.shards().len(), 2);
    }

    #[test]
    fn test_root_with_glob_metacharacters() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("wx[id]*");
        touch_db(&root.join("Msg/MSG0.db"));

        let layout = StorageLayout::discover(&root, 100);
        assert_eq!(layout.shard_dbs, vec![root.join("Msg/MSG0.db")]);
    }
}
