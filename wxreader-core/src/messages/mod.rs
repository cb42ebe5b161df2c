//! Per-conversation message reads across shards
//!
//! ## Architecture
//!
//! ```text
//! conversation id ──► ShardTableName (Msg_<md5>) ──► every shard
//!                                                      │
//!                     table absent ◄── exists? ────────┤
//!                                                      ▼
//!                          enriched query (Name2Id join) / reduced query
//!                                                      │
//!                                       decode rows + content
//!                                                      ▼
//!                          concatenate ──► stable sort by create_time
//! ```
//!
//! A conversation's table normally lives in exactly one shard, so a missing
//! table is skipped silently. A shard that fails to read is logged and
//! skipped; the call never fails as a whole.

pub mod decode;
pub mod table;

pub use decode::{decode_content, RawContent};
pub use table::ShardTableName;

use crate::error::{Error, Result};
use crate::store::{column_text, Store};
use crate::types::{Message, MessagePage, MessageQuery, MessageType};
use rusqlite::{Row, ToSql};

/// Auxiliary table mapping `real_sender_id` to sender identifiers.
const SENDER_TABLE: &str = "Name2Id";

/// Which query variant a shard supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryForm {
    /// Resolves senders through the `Name2Id` join
    WithSenders,
    /// Empty senders, never flagged as self-authored
    Reduced,
}

impl QueryForm {
    fn sql(&self, table: &ShardTableName, with_since: bool) -> String {
        let mut sql = match self {
            QueryForm::WithSenders => format!(
                r#"
                SELECT msg.local_id, msg.server_id, msg.local_type,
                       {sender}.user_name,
                       msg.create_time, msg.message_content,
                       CASE WHEN {sender}.user_name = :me THEN 1 ELSE 0 END
                FROM "{table}" AS msg
                LEFT JOIN {sender} ON msg.real_sender_id = {sender}.rowid
                "#,
                sender = SENDER_TABLE,
                table = table,
            ),
            QueryForm::Reduced => format!(
                r#"
                SELECT msg.local_id, msg.server_id, msg.local_type,
                       '',
                       msg.create_time, msg.message_content,
                       0
                FROM "{table}" AS msg
                "#,
                table = table,
            ),
        };

        if with_since {
            sql.push_str(" WHERE msg.create_time >= :since");
        }
        sql.push_str(" ORDER BY msg.create_time DESC LIMIT :limit OFFSET :offset");
        sql
    }
}

/// Reads one conversation's messages from a set of shards.
pub struct ShardAggregator<'a> {
    shards: &'a [Store],
    local_wxid: Option<&'a str>,
}

impl<'a> ShardAggregator<'a> {
    /// `local_wxid` is the local user's identifier, if known; without it no
    /// message is flagged as self-authored.
    pub fn new(shards: &'a [Store], local_wxid: Option<&'a str>) -> Self {
        Self { shards, local_wxid }
    }

    /// Fetch messages for `conversation`, oldest first.
    ///
    /// `limit` and `offset` apply per shard. The page total counts rows
    /// returned by this call.
    pub fn fetch(&self, conversation: &str, query: &MessageQuery) -> MessagePage {
        let table = match ShardTableName::for_conversation(conversation) {
            Ok(table) => table,
            Err(e) => {
                tracing::error!(conversation = %conversation, error = %e, "Refusing message query");
                return MessagePage::default();
            }
        };
        self.fetch_table(conversation, &table, query)
    }

    fn fetch_table(
        &self,
        conversation: &str,
        table: &ShardTableName,
        query: &MessageQuery,
    ) -> MessagePage {
        if self.shards.is_empty() {
            tracing::debug!(conversation = %conversation, "No message shards available");
            return MessagePage::default();
        }

        let mut messages = Vec::new();
        let mut failed = 0usize;

        for shard in self.shards {
            match self.read_shard(shard, conversation, table, query) {
                Ok(Some(rows)) => {
                    tracing::debug!(
                        path = %shard.path().display(),
                        table = %table,
                        count = rows.len(),
                        "Read messages from shard"
                    );
                    messages.extend(rows);
                }
                Ok(None) => {}
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        path = %shard.path().display(),
                        table = %table,
                        conversation = %conversation,
                        error = %e,
                        "Skipping shard that failed to read"
                    );
                }
            }
        }

        if failed == self.shards.len() {
            tracing::warn!(conversation = %conversation, table = %table, "Every message shard failed");
        }

        // Each shard returns its own newest-first window; only a global sort
        // gives the merged timeline. `sort_by_key` is stable, so equal
        // timestamps keep shard-scan order.
        messages.sort_by_key(|m| m.create_time);

        let total = messages.len();
        MessagePage { messages, total }
    }

    /// Messages from one shard, or `None` if it lacks the table.
    fn read_shard(
        &self,
        shard: &Store,
        conversation: &str,
        table: &ShardTableName,
        query: &MessageQuery,
    ) -> Result<Option<Vec<Message>>> {
        if !shard.table_exists(table.as_str())? {
            return Ok(None);
        }

        if shard.table_exists(SENDER_TABLE)? {
            match self.run(shard, QueryForm::WithSenders, conversation, table, query) {
                Ok(rows) => return Ok(Some(rows)),
                Err(e) if e.is_schema_mismatch() => {
                    tracing::debug!(
                        path = %shard.path().display(),
                        table = %table,
                        error = %e,
                        "Sender join unavailable, using reduced query"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        self.run(shard, QueryForm::Reduced, conversation, table, query)
            .map(Some)
    }

    fn run(
        &self,
        shard: &Store,
        form: QueryForm,
        conversation: &str,
        table: &ShardTableName,
        query: &MessageQuery,
    ) -> Result<Vec<Message>> {
        let with_since = query.since > 0;
        let sql = form.sql(table, with_since);

        let limit = i64::from(query.limit);
        let offset = i64::from(query.offset);
        let mut params: Vec<(&str, &dyn ToSql)> = vec![
            (":limit", &limit as &dyn ToSql),
            (":offset", &offset as &dyn ToSql),
        ];
        if form == QueryForm::WithSenders {
            params.push((":me", &self.local_wxid as &dyn ToSql));
        }
        if with_since {
            params.push((":since", &query.since as &dyn ToSql));
        }

        let mut stmt = shard.connection().prepare(&sql)?;
        let mut rows = stmt.query(params.as_slice())?;

        let mut messages = Vec::new();
        while let Some(row) = rows.next()? {
            match row_to_message(row, conversation) {
                Ok(message) => messages.push(message),
                Err(e) if is_row_conversion_error(&e) => {
                    tracing::warn!(
                        path = %shard.path().display(),
                        table = %table,
                        error = %e,
                        "Skipping malformed message row"
                    );
                }
                Err(e) => return Err(Error::from(e)),
            }
        }
        Ok(messages)
    }
}

fn row_to_message(row: &Row, conversation: &str) -> rusqlite::Result<Message> {
    Ok(Message {
        local_id: row.get(0)?,
        server_id: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
        msg_type: MessageType::from_code(row.get::<_, Option<i64>>(2)?.unwrap_or(0)),
        sender: column_text(row, 3)?.unwrap_or_default(),
        create_time: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        content: decode_content(RawContent::from_value(row.get_ref(5)?)),
        is_sender: row.get::<_, Option<i64>>(6)?.unwrap_or(0) != 0,
        talker: conversation.to_string(),
    })
}

fn is_row_conversion_error(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
    )
}
