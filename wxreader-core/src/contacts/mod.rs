//! Contact and group listing across schema generations
//!
//! The contact store exists in two incompatible generations (see
//! [`schema::SCHEMAS`]). Listing picks the first generation whose capability
//! probe passes and falls through to the next one only when the query hits a
//! missing table or column; any other database error is returned.
//!
//! Every listed contact is registered into the caller's
//! [`ContactDirectory`]. Listing groups after contacts therefore replaces the
//! contact records of chatrooms with the group records.

pub mod schema;

pub use schema::{ContactSchema, Listing, SchemaVersion, SCHEMAS};

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Contact, ContactDirectory};
use rusqlite::OptionalExtension;

/// List contacts (local types 1, 2 and 5 in v4 stores, non-system entries
/// in legacy stores), ordered by nickname.
pub fn load_contacts(store: &Store, directory: &mut ContactDirectory) -> Result<Vec<Contact>> {
    load(store, directory, Listing::Contacts)
}

/// List group chats, ordered by nickname.
pub fn load_groups(store: &Store, directory: &mut ContactDirectory) -> Result<Vec<Contact>> {
    load(store, directory, Listing::Groups)
}

/// The first schema generation the store supports, if any.
pub fn detect_schema(store: &Store) -> Result<Option<&'static ContactSchema>> {
    for schema in SCHEMAS {
        if schema.supports(store)? {
            return Ok(Some(schema));
        }
    }
    Ok(None)
}

/// Detected schema version, `None` if unknown or the probe fails.
pub fn schema_version(store: &Store) -> Option<SchemaVersion> {
    match detect_schema(store) {
        Ok(schema) => schema.map(|s| s.version),
        Err(e) => {
            tracing::warn!(path = %store.path().display(), error = %e, "Schema probe failed");
            None
        }
    }
}

fn load(store: &Store, directory: &mut ContactDirectory, listing: Listing) -> Result<Vec<Contact>> {
    for schema in SCHEMAS {
        if !schema.supports(store)? {
            continue;
        }

        match query(store, schema, listing) {
            Ok(mut contacts) => {
                if listing == Listing::Groups && schema.resolves_member_count {
                    for group in &mut contacts {
                        group.member_count = chatroom_member_count(store, &group.wxid);
                    }
                }

                tracing::debug!(
                    path = %store.path().display(),
                    schema = %schema.version,
                    listing = ?listing,
                    count = contacts.len(),
                    "Loaded contacts"
                );

                for contact in &contacts {
                    directory.register(contact.clone());
                }
                return Ok(contacts);
            }
            Err(e) if e.is_schema_mismatch() => {
                tracing::warn!(
                    path = %store.path().display(),
                    schema = %schema.version,
                    error = %e,
                    "Contact query does not match store, trying next schema"
                );
            }
            Err(e) => return Err(e),
        }
    }

    Err(Error::UnsupportedSchema)
}

fn query(store: &Store, schema: &ContactSchema, listing: Listing) -> Result<Vec<Contact>> {
    let mut stmt = store.connection().prepare(schema.sql(listing))?;
    let mut rows = stmt.query([])?;

    let mut contacts = Vec::new();
    while let Some(row) = rows.next()? {
        match schema.map_row(row) {
            Ok(contact) if contact.wxid.is_empty() => {
                tracing::debug!(schema = %schema.version, "Skipping contact row without identifier");
            }
            Ok(contact) => contacts.push(contact),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(contacts)
}

/// Member count of a chatroom.
///
/// Counts live in `chat_room.ext_buffer`, a binary blob whose field layout
/// is undocumented. Until it is verified against real stores the count is
/// always 0.
fn chatroom_member_count(store: &Store, wxid: &str) -> u32 {
    let blob = store
        .connection()
        .query_row(
            "SELECT ext_buffer FROM chat_room WHERE username = ?1",
            [wxid],
            |row| row.get::<_, Option<Vec<u8>>>(0),
        )
        .optional();

    match blob {
        Ok(Some(Some(buffer))) if !buffer.is_empty() => {
            tracing::trace!(
                chatroom = %wxid,
                bytes = buffer.len(),
                "Chatroom extension blob present, member count not decoded"
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::debug!(chatroom = %wxid, error = %e, "Chatroom member lookup failed");
        }
    }
    0
}
