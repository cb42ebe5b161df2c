//! Core domain types for wxreader
//!
//! These types normalize rows from every supported storage layout and schema
//! generation into one model, plus the serialized views returned to callers.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Storage root** | The per-account directory holding all database files |
//! | **wxid** | Stable identifier of a person or group within one storage root |
//! | **Chatroom** | A group conversation; its wxid ends with `@chatroom` |
//! | **Shard** | One `message_N.db` / `MSGN.db` file holding per-conversation tables |
//! | **Talker** | The conversation a message belongs to |
//! | **Local user** | The account owner, identified via `info.json` |

use crate::contacts::SchemaVersion;
use serde::Serialize;
use std::collections::HashMap;

/// Identifier suffix that marks group conversations.
pub const CHATROOM_SUFFIX: &str = "@chatroom";

/// Sender label used for messages authored by the local user.
pub const SELF_SENDER_NAME: &str = "我";

/// Storage generation reported by `status`.
pub const DB_VERSION: u32 = 4;

// ============================================
// Contacts
// ============================================

/// A person or group from the contact store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// Stable identifier
    pub wxid: String,
    /// Self-chosen display nickname (may be empty)
    pub nickname: String,
    /// User-set remark (may be empty); wins over the nickname
    pub remark: String,
    /// Optional short alias
    pub alias: Option<String>,
    /// Optional avatar URL (only populated by the v4 schema)
    pub avatar_url: Option<String>,
    /// Whether this is a group conversation
    pub is_chatroom: bool,
    /// Member count, 0 unless resolved
    pub member_count: u32,
}

impl Contact {
    /// Build a contact, deriving the chatroom flag from the identifier.
    pub fn new(wxid: impl Into<String>) -> Self {
        let wxid = wxid.into();
        let is_chatroom = is_chatroom_id(&wxid);
        Self {
            wxid,
            nickname: String::new(),
            remark: String::new(),
            alias: None,
            avatar_url: None,
            is_chatroom,
            member_count: 0,
        }
    }

    /// Remark if set, else nickname if set, else the identifier.
    pub fn display_name(&self) -> &str {
        if !self.remark.is_empty() {
            &self.remark
        } else if !self.nickname.is_empty() {
            &self.nickname
        } else {
            &self.wxid
        }
    }

    pub fn kind(&self) -> ContactKind {
        if self.is_chatroom {
            ContactKind::Group
        } else {
            ContactKind::Friend
        }
    }
}

/// Returns true if the identifier names a group conversation.
pub fn is_chatroom_id(wxid: &str) -> bool {
    wxid.ends_with(CHATROOM_SUFFIX)
}

/// Whether a contact is a person or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    Group,
    Friend,
}

impl ContactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactKind::Group => "group",
            ContactKind::Friend => "friend",
        }
    }
}

impl std::fmt::Display for ContactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Contacts known for one storage root, keyed by identifier.
///
/// Owned by the caller for the duration of one operation. Registering an
/// identifier twice keeps only the later record.
#[derive(Debug, Default, Clone)]
pub struct ContactDirectory {
    entries: HashMap<String, Contact>,
}

impl ContactDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a contact, replacing any earlier record with the same wxid.
    pub fn register(&mut self, contact: Contact) {
        self.entries.insert(contact.wxid.clone(), contact);
    }

    pub fn get(&self, wxid: &str) -> Option<&Contact> {
        self.entries.get(wxid)
    }

    /// Display name for a sender identifier, if it is known.
    pub fn display_name(&self, wxid: &str) -> Option<&str> {
        self.get(wxid).map(Contact::display_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================
// Messages
// ============================================

/// Message type codes as stored in the shard tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Text,
    Image,
    Voice,
    ContactCard,
    Video,
    Emoji,
    Location,
    Link,
    Voip,
    System,
    Revoke,
    /// Any code not listed above
    Unknown(i64),
}

impl MessageType {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => MessageType::Text,
            3 => MessageType::Image,
            34 => MessageType::Voice,
            42 => MessageType::ContactCard,
            43 => MessageType::Video,
            47 => MessageType::Emoji,
            48 => MessageType::Location,
            49 => MessageType::Link,
            50 => MessageType::Voip,
            10000 => MessageType::System,
            10002 => MessageType::Revoke,
            other => MessageType::Unknown(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            MessageType::Text => 1,
            MessageType::Image => 3,
            MessageType::Voice => 34,
            MessageType::ContactCard => 42,
            MessageType::Video => 43,
            MessageType::Emoji => 47,
            MessageType::Location => 48,
            MessageType::Link => 49,
            MessageType::Voip => 50,
            MessageType::System => 10000,
            MessageType::Revoke => 10002,
            MessageType::Unknown(code) => *code,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Voice => "voice",
            MessageType::ContactCard => "contact",
            MessageType::Video => "video",
            MessageType::Emoji => "emoji",
            MessageType::Location => "location",
            MessageType::Link => "link",
            MessageType::Voip => "voip",
            MessageType::System => "system",
            MessageType::Revoke => "revoke",
            MessageType::Unknown(_) => "unknown",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One chat event read from a shard table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Shard-local row id
    pub local_id: i64,
    /// Server-assigned id, 0 if absent
    pub server_id: i64,
    pub msg_type: MessageType,
    /// Sender identifier, empty if unresolved
    pub sender: String,
    /// Seconds since the Unix epoch
    pub create_time: i64,
    /// Decoded text, empty if absent or undecodable
    pub content: String,
    /// Authored by the local user
    pub is_sender: bool,
    /// Conversation identifier
    pub talker: String,
}

impl Message {
    /// Sender label: the self sentinel, a directory name, or the raw id.
    pub fn sender_name<'a>(&'a self, directory: &'a ContactDirectory) -> &'a str {
        if self.is_sender {
            SELF_SENDER_NAME
        } else {
            directory.display_name(&self.sender).unwrap_or(&self.sender)
        }
    }
}

/// Paging and filtering for a message read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageQuery {
    pub limit: u32,
    pub offset: u32,
    /// Lower bound on creation time in seconds; 0 disables the filter
    pub since: i64,
}

impl Default for MessageQuery {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
            since: 0,
        }
    }
}

/// Messages merged across shards, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    /// Rows returned by this call, not a full-table count
    pub total: usize,
}

impl MessagePage {
    /// Pagination hint.
    ///
    /// Shards are queried independently, so this only approximates whether
    /// more rows exist.
    pub fn has_more(&self, query: &MessageQuery) -> bool {
        self.total as u64 > u64::from(query.offset) + u64::from(query.limit)
    }
}

// ============================================
// Output views
// ============================================

/// Serialized contact record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactView {
    pub id: String,
    pub name: String,
    pub alias: String,
    pub avatar: Option<String>,
    #[serde(rename = "type")]
    pub kind: ContactKind,
    pub member_count: u32,
}

impl From<&Contact> for ContactView {
    fn from(contact: &Contact) -> Self {
        Self {
            id: contact.wxid.clone(),
            name: contact.display_name().to_string(),
            alias: contact.alias.clone().unwrap_or_default(),
            avatar: contact.avatar_url.clone().filter(|url| !url.is_empty()),
            kind: contact.kind(),
            member_count: contact.member_count,
        }
    }
}

/// Serialized message record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub chat_id: String,
    pub sender: String,
    pub content: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub is_me: bool,
}

impl MessageView {
    pub fn new(message: &Message, directory: &ContactDirectory) -> Self {
        Self {
            id: format!("msg_{}", message.local_id),
            chat_id: message.talker.clone(),
            sender: message.sender_name(directory).to_string(),
            content: message.content.clone(),
            timestamp: message.create_time.saturating_mul(1000),
            kind: message.msg_type.as_str(),
            is_me: message.is_sender,
        }
    }
}

/// Serialized message-list response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    pub messages: Vec<MessageView>,
    pub total: usize,
    pub has_more: bool,
}

/// Storage status summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub initialized: bool,
    pub has_contact_db: bool,
    pub has_session_db: bool,
    pub message_db_count: usize,
    pub contact_count: usize,
    pub db_version: u32,
    /// Detected contact schema generation, `null` if none matched
    pub schema_version: Option<SchemaVersion>,
}

/// Result of the `init` operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InitReport {
    pub success: bool,
    pub status: Status,
}
