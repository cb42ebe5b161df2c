//! # wxreader-core
//!
//! Read-only access to a chat application's decrypted local storage.
//!
//! This library provides:
//! - Storage layout discovery and read-only SQLite handles
//! - Contact and group listing across contact-store schema generations
//! - Per-conversation message reads merged across sharded databases
//! - Message content decoding (plain text, zstd, raw bytes)
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! ```text
//! storage root ──► store::layout ──► Storage (contact, session?, shards)
//!                                       │
//!                 contacts::load_* ◄────┤────► messages::ShardAggregator
//!                       │                              │
//!               ContactDirectory ──── sender names ───►│
//!                                                      ▼
//!                          reader::Reader ──► serializable views
//! ```
//!
//! Nothing is ever written to the stores.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use wxreader_core::{Config, MessageQuery, Reader};
//!
//! let config = Config::load().unwrap_or_default();
//! let reader = Reader::from_config(&config);
//!
//! let root = Path::new("/data/decrypted");
//! println!("{:?}", reader.status(root));
//! let list = reader.get_messages(root, "wxid_friend", &MessageQuery::default());
//! println!("{} messages", list.total);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use reader::Reader;
pub use types::*;

// Public modules
pub mod config;
pub mod contacts;
pub mod error;
pub mod logging;
pub mod messages;
pub mod reader;
pub mod store;
pub mod types;
