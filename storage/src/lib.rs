//! Byte-stream storage backend for the file store.
//!
//! The web layer never touches the filesystem directly. It resolves a request
//! path into a [`StorageKey`] and asks a [`Storage`] implementation for a reader
//! or a writer. Both directions are streams, so objects never have to fit in
//! memory.
//!
//! # Write visibility
//!
//! A writer returned by [`Storage::open_write`] is invisible to readers until
//! [`StorageWrite::commit`] succeeds. Dropping an uncommitted writer discards
//! everything written to it. Concurrent writers to the same key therefore never
//! interleave: readers see one complete version, whichever committed last.
//!
//! # Modules
//!
//! - `fs`: [`FsStorage`], the `tokio::fs` backed implementation.

use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};

pub mod fs;

pub use fs::FsStorage;

/// Readable byte stream of a stored object.
pub type ByteReader = Pin<Box<dyn AsyncRead + Send>>;

/// Location of an object in the backend: the storage root followed by an
/// already-encoded file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    root: String,
    name: String,
}

impl StorageKey {
    /// `root` is used verbatim as a prefix, `name` must already be encoded so
    /// that it contains no path separators.
    pub fn new(root: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn to_path(&self) -> PathBuf {
        PathBuf::from(format!("{}{}", self.root, self.name))
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.root, self.name)
    }
}

/// An open, not yet visible, write to a storage key.
#[async_trait]
pub trait StorageWrite: AsyncWrite + Send + Unpin {
    /// Flushes everything written so far and makes it the content of the key,
    /// replacing any previous content in one step.
    async fn commit(self: Box<Self>) -> io::Result<()>;
}

/// Open/read/write/close capability over a flat namespace of keys.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Opens the object stored under `key` for reading.
    async fn open_read(&self, key: &StorageKey) -> io::Result<ByteReader>;

    /// Opens `key` for writing, creating it if absent. Existing content is
    /// replaced on commit.
    async fn open_write(&self, key: &StorageKey) -> io::Result<Box<dyn StorageWrite>>;
}
