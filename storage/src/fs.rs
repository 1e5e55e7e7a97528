use crate::{ByteReader, Storage, StorageKey, StorageWrite};
use async_trait::async_trait;
use log::*;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::{self, File};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

/// Prefix of staging files. Encoded key names escape every `%`, so no key can
/// ever collide with a staging file.
const UPLOAD_PREFIX: &str = "%upload-";

/// Storage backed by regular files, one file per key.
#[derive(Debug, Clone, Default)]
pub struct FsStorage;

impl FsStorage {
    pub fn new() -> Self {
        Self
    }

    /// Creates the storage root directory (and its parents) if it does not exist.
    pub async fn create_root(root: &str) -> io::Result<()> {
        fs::create_dir_all(root).await
    }
}

fn empty_key_error(key: &StorageKey) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("storage key under {} has no file name", key.root()),
    )
}

#[async_trait]
impl Storage for FsStorage {
    async fn open_read(&self, key: &StorageKey) -> io::Result<ByteReader> {
        if key.name().is_empty() {
            return Err(empty_key_error(key));
        }

        let file = File::open(key.to_path()).await?;
        // Directories open fine on unix but fail on the first read.
        if !file.metadata().await?.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{key} is not a regular file"),
            ));
        }

        Ok(Box::pin(file))
    }

    async fn open_write(&self, key: &StorageKey) -> io::Result<Box<dyn StorageWrite>> {
        if key.name().is_empty() {
            return Err(empty_key_error(key));
        }

        // Errors tied to the final name (too long, not a directory on the way)
        // must surface here, before any body is read.
        let final_path = key.to_path();
        match fs::metadata(&final_path).await {
            Ok(metadata) if metadata.is_dir() => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{key} is a directory"),
                ));
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let dir = match final_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let temp_path = dir.join(format!("{UPLOAD_PREFIX}{}", Uuid::new_v4()));
        let file = File::create(&temp_path).await?;
        trace!("Staging write to {key} in {}", temp_path.display());

        Ok(Box::new(FsWriter {
            file,
            temp_path,
            final_path,
            committed: false,
        }))
    }
}

/// Writer staging into a temporary sibling file until committed.
struct FsWriter {
    file: File,
    temp_path: PathBuf,
    final_path: PathBuf,
    committed: bool,
}

impl AsyncWrite for FsWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.file).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_shutdown(cx)
    }
}

#[async_trait]
impl StorageWrite for FsWriter {
    async fn commit(mut self: Box<Self>) -> io::Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        fs::rename(&self.temp_path, &self.final_path).await?;
        self.committed = true;
        debug!("Committed {}", self.final_path.display());
        Ok(())
    }
}

impl Drop for FsWriter {
    fn drop(&mut self) {
        if !self.committed {
            discard(&self.temp_path);
        }
    }
}

fn discard(temp_path: &Path) {
    match std::fs::remove_file(temp_path) {
        Ok(()) => debug!("Discarded uncommitted upload {}", temp_path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            "Failed to remove uncommitted upload {}: {e}",
            temp_path.display()
        ),
    }
}
