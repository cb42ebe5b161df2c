//! Per-conversation shard table names
//!
//! Each conversation's messages live in a table named `Msg_` followed by the
//! lowercase hex MD5 of its identifier. Table names cannot be bound as SQL
//! parameters, so [`ShardTableName`] is the only value allowed into query
//! text, and it can only be built through shape validation.

use crate::error::{Error, Result};
use md5::{Digest, Md5};

/// Prefix shared by every message table.
pub const TABLE_PREFIX: &str = "Msg_";

const DIGEST_HEX_LEN: usize = 32;

/// A validated `Msg_<32 lowercase hex>` table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShardTableName(String);

impl ShardTableName {
    /// Derive the table name for a conversation identifier.
    pub fn for_conversation(conversation: &str) -> Result<Self> {
        let digest = Md5::digest(conversation.as_bytes());
        Self::parse(format!("{}{}", TABLE_PREFIX, hex::encode(digest)))
    }

    /// Validate a table name built elsewhere.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if is_valid(&raw) {
            Ok(Self(raw))
        } else {
            Err(Error::InvalidTableName(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShardTableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_valid(raw: &str) -> bool {
    match raw.strip_prefix(TABLE_PREFIX) {
        Some(digest) => {
            digest.len() == DIGEST_HEX_LEN
                && digest
                    .bytes()
                    .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        }
        None => false,
    }
}
