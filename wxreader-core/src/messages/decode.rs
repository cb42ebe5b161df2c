//! Message content decoding
//!
//! Text columns pass through unchanged. Binary payloads go through
//! [`DECODERS`] in order and the first decoder that produces a value wins:
//!
//! 1. [`ZstdFrame`]: zstd-compressed payloads (requires the `zstd` feature)
//! 2. [`LossyUtf8`]: raw bytes as UTF-8, invalid sequences dropped
//!
//! If neither applies the content is empty. Decoding never fails.

use rusqlite::types::ValueRef;

/// Raw `message_content` column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawContent {
    Text(String),
    Binary(Vec<u8>),
    /// NULL or a numeric column
    Absent,
}

impl RawContent {
    pub fn from_value(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => RawContent::Text(text.to_string()),
                Err(_) => RawContent::Binary(bytes.to_vec()),
            },
            ValueRef::Blob(bytes) => RawContent::Binary(bytes.to_vec()),
            ValueRef::Null | ValueRef::Integer(_) | ValueRef::Real(_) => RawContent::Absent,
        }
    }
}

/// One strategy for turning a binary payload into text.
pub trait ContentDecoder: Sync {
    fn name(&self) -> &'static str;

    /// Decode the payload, or `None` if this strategy does not apply.
    fn decode(&self, payload: &[u8]) -> Option<String>;
}

/// zstd frame decoder.
pub struct ZstdFrame;

/// Best-effort UTF-8 decoder.
pub struct LossyUtf8;

/// Decoder chain for binary payloads, tried in order.
pub static DECODERS: &[&dyn ContentDecoder] = &[&ZstdFrame, &LossyUtf8];

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Cap on decompressed size per message.
#[cfg(feature = "zstd")]
const MAX_DECOMPRESSED_BYTES: u64 = 16 * 1024 * 1024;

impl ContentDecoder for ZstdFrame {
    fn name(&self) -> &'static str {
        "zstd"
    }

    #[cfg(feature = "zstd")]
    fn decode(&self, payload: &[u8]) -> Option<String> {
        use std::io::Read;

        if !payload.starts_with(&ZSTD_MAGIC) {
            return None;
        }

        let mut decompressed = Vec::new();
        let result = zstd::stream::read::Decoder::new(payload).and_then(|decoder| {
            decoder
                .take(MAX_DECOMPRESSED_BYTES)
                .read_to_end(&mut decompressed)
        });

        match result {
            Ok(_) => Some(utf8_dropping_invalid(&decompressed)),
            Err(e) => {
                tracing::debug!(bytes = payload.len(), error = %e, "zstd payload failed to decompress");
                None
            }
        }
    }

    #[cfg(not(feature = "zstd"))]
    fn decode(&self, payload: &[u8]) -> Option<String> {
        if payload.starts_with(&ZSTD_MAGIC) {
            tracing::debug!(
                bytes = payload.len(),
                "zstd payload found but compression support is not built in"
            );
        }
        None
    }
}

impl ContentDecoder for LossyUtf8 {
    fn name(&self) -> &'static str {
        "utf8"
    }

    fn decode(&self, payload: &[u8]) -> Option<String> {
        Some(utf8_dropping_invalid(payload))
    }
}

/// Decode a message payload to text. Total: never fails, worst case empty.
pub fn decode_content(raw: RawContent) -> String {
    match raw {
        RawContent::Text(text) => text,
        RawContent::Binary(payload) => decode_binary(&payload),
        RawContent::Absent => String::new(),
    }
}

fn decode_binary(payload: &[u8]) -> String {
    if payload.is_empty() {
        return String::new();
    }

    DECODERS
        .iter()
        .find_map(|decoder| {
            let text = decoder.decode(payload)?;
            tracing::trace!(decoder = decoder.name(), "Decoded message payload");
            Some(text)
        })
        .unwrap_or_default()
}

/// UTF-8 decode that drops invalid byte sequences instead of replacing them.
fn utf8_dropping_invalid(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                // `valid_up_to` marks a UTF-8 prefix.
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(len) => bytes = &rest[len..],
                    None => return out,
                }
            }
        }
    }
}
