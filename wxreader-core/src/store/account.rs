//! Local account metadata
//!
//! A storage root may carry an `info.json` whose `username` field is the
//! local user's own wxid. It is only used to flag self-authored messages,
//! so every failure degrades to "unknown".

use crate::error::Result;
use serde::Deserialize;
use std::path::Path;

const INFO_FILE: &str = "info.json";

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct AccountInfo {
    username: Option<String>,
}

/// Resolve the local user's wxid.
///
/// `override_wxid` (from config) wins over `info.json`. Returns `None` when
/// neither source yields a non-empty identifier.
pub fn local_wxid(root: &Path, override_wxid: Option<&str>) -> Option<String> {
    if let Some(wxid) = override_wxid.filter(|w| !w.is_empty()) {
        return Some(wxid.to_string());
    }

    let path = root.join(INFO_FILE);
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "No account info file, local user unknown");
        return None;
    }

    match read_account_info(&path) {
        Ok(info) => info.username.filter(|u| !u.is_empty()),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read account info");
            None
        }
    }
}

fn read_account_info(path: &Path) -> Result<AccountInfo> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
