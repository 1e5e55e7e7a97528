//! Mapping of request paths onto storage keys.
//!
//! The decoded request path, minus one leading `/`, is the *relative path*. It
//! is what watchers are told about and what routing looks at. The storage key
//! is the relative path percent-encoded into a single file name under the
//! storage root. Every `/` and `\` is encoded, so a key can never reach
//! outside the root. Names made only of dots are the one case encoding alone
//! does not neutralize, so their dots are escaped as `%2E`.

use crate::error::{Error, Result};
use storage::StorageKey;

/// Relative path of the live-update endpoint (compared case-insensitively).
pub const WATCH_PATH: &str = "_watch";

#[derive(Debug, Clone)]
pub struct PathMapper {
    storage_root: String,
}

/// A request path resolved against the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPath {
    relative: String,
    storage_key: StorageKey,
}

impl RequestPath {
    pub fn relative(&self) -> &str {
        &self.relative
    }

    pub fn storage_key(&self) -> &StorageKey {
        &self.storage_key
    }

    pub fn is_watch(&self) -> bool {
        self.relative.to_lowercase() == WATCH_PATH
    }
}

impl PathMapper {
    pub fn new(storage_root: impl Into<String>) -> Self {
        Self {
            storage_root: storage_root.into(),
        }
    }

    /// Resolves the raw (still percent-encoded) path of a request URI.
    pub fn map(&self, raw_path: &str) -> Result<RequestPath> {
        let decoded = urlencoding::decode(raw_path).map_err(Error::unexpected)?;
        let relative = strip_first_slash(&decoded).to_string();
        let storage_key = StorageKey::new(self.storage_root.clone(), encode_name(&relative));

        Ok(RequestPath {
            relative,
            storage_key,
        })
    }
}

pub fn strip_first_slash(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

/// Encodes a relative path into a single storage file name.
pub fn encode_name(relative: &str) -> String {
    let encoded = urlencoding::encode(relative).into_owned();
    if !encoded.is_empty() && encoded.bytes().all(|b| b == b'.') {
        encoded.replace('.', "%2E")
    } else {
        encoded
    }
}

/// Inverse of [`encode_name`], used when logging stored names.
pub fn decode_name(name: &str) -> Result<String> {
    urlencoding::decode(name)
        .map(|decoded| decoded.into_owned())
        .map_err(Error::unexpected)
}
