//! Top-level read operations
//!
//! Every operation takes a storage root, opens the stores it needs, and
//! closes them before returning. Failures are logged and turned into
//! empty or unsuccessful results, so callers always get a value to
//! serialize.

use crate::config::{Config, StoreConfig};
use crate::contacts;
use crate::messages::ShardAggregator;
use crate::store::{local_wxid, Storage};
use crate::types::{
    ContactDirectory, ContactView, InitReport, MessageList, MessageQuery, MessageView, Status,
    DB_VERSION,
};
use std::path::Path;

/// Read operations bound to a storage configuration.
#[derive(Debug, Clone, Default)]
pub struct Reader {
    storage: StoreConfig,
    wxid_override: Option<String>,
}

impl Reader {
    pub fn new(storage: StoreConfig, wxid_override: Option<String>) -> Self {
        Self {
            storage,
            wxid_override,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.storage.clone(), config.account.wxid.clone())
    }

    /// Open the storage root and report what was found.
    pub fn init(&self, root: &Path) -> InitReport {
        match self.open(root) {
            Some(storage) => InitReport {
                success: true,
                status: build_status(&storage),
            },
            None => InitReport {
                success: false,
                status: uninitialized_status(),
            },
        }
    }

    /// Individual contacts, ordered by nickname. Chatrooms are left out.
    pub fn list_contacts(&self, root: &Path) -> Vec<ContactView> {
        let Some(storage) = self.open(root) else {
            return Vec::new();
        };

        let mut directory = ContactDirectory::new();
        match contacts::load_contacts(storage.contact_store(), &mut directory) {
            Ok(contacts) => contacts
                .iter()
                .filter(|c| !c.is_chatroom)
                .map(ContactView::from)
                .collect(),
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "Failed to list contacts");
                Vec::new()
            }
        }
    }

    /// Group chats, ordered by nickname.
    pub fn list_groups(&self, root: &Path) -> Vec<ContactView> {
        let Some(storage) = self.open(root) else {
            return Vec::new();
        };

        let mut directory = ContactDirectory::new();
        match contacts::load_groups(storage.contact_store(), &mut directory) {
            Ok(groups) => groups.iter().map(ContactView::from).collect(),
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "Failed to list groups");
                Vec::new()
            }
        }
    }

    /// One conversation's messages, oldest first, with sender names
    /// resolved through the contact store.
    pub fn get_messages(&self, root: &Path, conversation: &str, query: &MessageQuery) -> MessageList {
        let Some(storage) = self.open(root) else {
            return MessageList::default();
        };

        let directory = build_directory(&storage);
        let me = local_wxid(root, self.wxid_override.as_deref());
        if me.is_none() {
            tracing::debug!(root = %root.display(), "Local account unknown, no message will be flagged as own");
        }

        let page = ShardAggregator::new(storage.shards(), me.as_deref()).fetch(conversation, query);
        let has_more = page.has_more(query);

        tracing::debug!(
            conversation = %conversation,
            total = page.total,
            has_more,
            "Fetched messages"
        );

        MessageList {
            messages: page
                .messages
                .iter()
                .map(|m| MessageView::new(m, &directory))
                .collect(),
            total: page.total,
            has_more,
        }
    }

    /// Storage summary; zero counts if the root cannot be opened.
    pub fn status(&self, root: &Path) -> Status {
        match self.open(root) {
            Some(storage) => build_status(&storage),
            None => uninitialized_status(),
        }
    }

    fn open(&self, root: &Path) -> Option<Storage> {
        match Storage::open(root, &self.storage) {
            Ok(storage) => Some(storage),
            Err(e) => {
                tracing::error!(root = %root.display(), error = %e, "Failed to open storage");
                None
            }
        }
    }
}

/// Contacts, then groups, so chatroom entries end up as group records.
fn build_directory(storage: &Storage) -> ContactDirectory {
    let store = storage.contact_store();
    let mut directory = ContactDirectory::new();

    if let Err(e) = contacts::load_contacts(store, &mut directory) {
        tracing::warn!(path = %store.path().display(), error = %e, "Failed to load contacts");
    }
    if let Err(e) = contacts::load_groups(store, &mut directory) {
        tracing::warn!(path = %store.path().display(), error = %e, "Failed to load groups");
    }

    directory
}

fn build_status(storage: &Storage) -> Status {
    let directory = build_directory(storage);
    Status {
        initialized: true,
        has_contact_db: true,
        has_session_db: storage.session_store().is_some(),
        message_db_count: storage.shards().len(),
        contact_count: directory.len(),
        db_version: DB_VERSION,
        schema_version: contacts::schema_version(storage.contact_store()),
    }
}

fn uninitialized_status() -> Status {
    Status {
        db_version: DB_VERSION,
        ..Status::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::SchemaVersion;
    use crate::messages::ShardTableName;
    use rusqlite::Connection;
    use tempfile::TempDir;

    fn v4_root() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("contact")).unwrap();
        Connection::open(dir.path().join("contact/contact.db"))
            .unwrap()
            .execute_batch(
                r#"
                CREATE TABLE contact (username TEXT, alias TEXT, local_type INTEGER, remark TEXT,
                                      nick_name TEXT, small_head_url TEXT);
                INSERT INTO contact VALUES ('bob', 'bobby', 1, '', 'Bob', 'http://a/b.png');
                INSERT INTO contact VALUES ('42@chatroom', NULL, 2, 'Team', 'Group', NULL);
                "#,
            )
            .unwrap();
        dir
    }

    fn add_shard(root: &Path, index: usize, sql: &str) {
        std::fs::create_dir_all(root.join("message")).unwrap();
        Connection::open(root.join(format!("message/message_{index}.db")))
            .unwrap()
            .execute_batch(sql)
            .unwrap();
    }

    #[test]
    fn test_status_before_init_is_zero() {
        let dir = TempDir::new().unwrap();
        let status = Reader::default().status(dir.path());
        assert_eq!(
            status,
            Status {
                initialized: false,
                has_contact_db: false,
                has_session_db: false,
                message_db_count: 0,
                contact_count: 0,
                db_version: 4,
                schema_version: None,
            }
        );

        let report = Reader::default().init(dir.path());
        assert!(!report.success);
        assert_eq!(report.status, status);
    }

    #[test]
    fn test_init_reports_found_stores() {
        let dir = v4_root();
        add_shard(dir.path(), 0, "CREATE TABLE Name2Id (user_name TEXT);");
        add_shard(dir.path(), 1, "CREATE TABLE Name2Id (user_name TEXT);");

        let report = Reader::default().init(dir.path());
        assert!(report.success);
        assert!(report.status.initialized);
        assert!(report.status.has_contact_db);
        assert!(!report.status.has_session_db);
        assert_eq!(report.status.message_db_count, 2);
        assert_eq!(report.status.contact_count, 2);
        assert_eq!(report.status.schema_version, Some(SchemaVersion::V4));
    }

    #[test]
    fn test_status_reports_legacy_schema() {
        let dir = TempDir::new().unwrap();
        Connection::open(dir.path().join("MicroMsg.db"))
            .unwrap()
            .execute_batch(
                r#"
                CREATE TABLE Contact (UserName TEXT, Alias TEXT, NickName TEXT, Type INTEGER, Remark TEXT);
                INSERT INTO Contact VALUES ('wxid_bob', NULL, 'Bob', 3, NULL);
                "#,
            )
            .unwrap();

        let status = Reader::default().status(dir.path());
        assert!(status.initialized);
        assert_eq!(status.contact_count, 1);
        assert_eq!(status.schema_version, Some(SchemaVersion::Legacy));
        assert_eq!(status.db_version, 4);
    }

    #[test]
    fn test_status_with_unknown_schema() {
        let dir = TempDir::new().unwrap();
        Connection::open(dir.path().join("contact.db"))
            .unwrap()
            .execute_batch("CREATE TABLE friends (id TEXT);")
            .unwrap();

        let status = Reader::default().status(dir.path());
        assert!(status.initialized);
        assert_eq!(status.contact_count, 0);
        assert_eq!(status.schema_version, None);
    }

    #[test]
    fn test_contacts_and_groups_are_split() {
        let dir = v4_root();
        let reader = Reader::default();

        let contacts = reader.list_contacts(dir.path());
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].id, "bob");
        assert_eq!(contacts[0].alias, "bobby");

        let groups = reader.list_groups(dir.path());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "Team");
    }

    #[test]
    fn test_messages_resolve_names_and_self() {
        let dir = v4_root();
        std::fs::write(dir.path().join("info.json"), r#"{"username": "wxid_me"}"#).unwrap();
        let table = ShardTableName::for_conversation("42@chatroom").unwrap();
        add_shard(
            dir.path(),
            0,
            &format!(
                r#"
                CREATE TABLE Name2Id (user_name TEXT);
                INSERT INTO Name2Id VALUES ('bob'), ('wxid_me'), ('carol');
                CREATE TABLE "{table}" (local_id INTEGER, server_id INTEGER, local_type INTEGER,
                                        real_sender_id INTEGER, create_time INTEGER,
                                        message_content TEXT);
                INSERT INTO "{table}" VALUES (1, 11, 1, 1, 10, 'from bob');
                INSERT INTO "{table}" VALUES (2, 12, 1, 2, 20, 'from me');
                INSERT INTO "{table}" VALUES (3, 13, 49, 3, 30, 'from carol');
                "#
            ),
        );

        let list = Reader::default().get_messages(dir.path(), "42@chatroom", &MessageQuery::default());
        let senders: Vec<_> = list.messages.iter().map(|m| m.sender.as_str()).collect();
        assert_eq!(senders, vec!["Bob", "我", "carol"]);
        assert!(list.messages[1].is_me);
        assert_eq!(list.messages[0].id, "msg_1");
        assert_eq!(list.messages[0].timestamp, 10_000);
        assert_eq!(list.messages[2].kind, "link");
        assert_eq!(list.total, 3);
        assert!(!list.has_more);
    }

    #[test]
    fn test_account_override_wins() {
        let dir = v4_root();
        std::fs::write(dir.path().join("info.json"), r#"{"username": "bob"}"#).unwrap();
        let table = ShardTableName::for_conversation("bob").unwrap();
        add_shard(
            dir.path(),
            0,
            &format!(
                r#"
                CREATE TABLE Name2Id (user_name TEXT);
                INSERT INTO Name2Id VALUES ('bob'), ('wxid_me');
                CREATE TABLE "{table}" (local_id INTEGER, server_id INTEGER, local_type INTEGER,
                                        real_sender_id INTEGER, create_time INTEGER,
                                        message_content TEXT);
                INSERT INTO "{table}" VALUES (1, 0, 1, 2, 10, 'hi');
                "#
            ),
        );

        let reader = Reader::new(StoreConfig::default(), Some("wxid_me".to_string()));
        let list = reader.get_messages(dir.path(), "bob", &MessageQuery::default());
        assert!(list.messages[0].is_me);
    }

    #[test]
    fn test_missing_root_yields_empty_results() {
        let dir = TempDir::new().unwrap();
        let reader = Reader::default();

        assert!(reader.list_contacts(dir.path()).is_empty());
        assert!(reader.list_groups(dir.path()).is_empty());
        assert_eq!(
            reader.get_messages(dir.path(), "bob", &MessageQuery::default()),
            MessageList::default()
        );
    }
}
