//! Sync state for incremental deploys.
//!
//! Listing a bucket gives keys and sizes but no reliable content hash (ETags
//! of multipart uploads are not MD5s, and providers differ), so the deploy
//! stage keeps its own record of what it uploaded: a small JSON object stored
//! in the bucket itself, next to the site.
//!
//! ## Keys
//!
//! The state is **content-addressed**: each entry maps an object key to the
//! SHA-256 of the bytes last uploaded under it. A key is unchanged when the
//! artifact's file hashes to the recorded value and the object is still
//! listed remotely. Timestamps play no part, so a fresh CI checkout with
//! reset mtimes still syncs zero objects.
//!
//! ## Storage
//!
//! The object lives at [`STATE_KEY`] in the bucket root. It is never treated
//! as part of the site: the planner neither uploads nor deletes it.
//!
//! A missing, unparseable or out-of-date state loads as empty, which makes
//! the next sync upload everything once.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Object key of the sync state within the bucket.
pub const STATE_KEY: &str = ".sitepress-sync.json";

/// Bump to invalidate every stored state when the format or hashing changes.
const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub version: u32,
    /// Object key → SHA-256 (hex) of the uploaded bytes.
    pub entries: BTreeMap<String, String>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::empty()
    }
}

impl SyncState {
    pub fn empty() -> Self {
        Self {
            version: STATE_VERSION,
            entries: BTreeMap::new(),
        }
    }

    /// Parse a stored state object. `None` (no object) and anything that is
    /// not a current-version state give an empty state.
    pub fn load(bytes: Option<&[u8]>) -> Self {
        let Some(bytes) = bytes else {
            return Self::empty();
        };
        let state: Self = match serde_json::from_slice(bytes) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("ignoring unreadable sync state {STATE_KEY}: {e}");
                return Self::empty();
            }
        };
        if state.version != STATE_VERSION {
            log::warn!(
                "ignoring sync state version {} (expected {STATE_VERSION})",
                state.version
            );
            return Self::empty();
        }
        state
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    pub fn hash_of(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

/// SHA-256 of a byte slice as lowercase hex.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
