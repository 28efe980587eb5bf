//! Filesystem capability used by the render pipeline.
//!
//! The engine never calls `tokio::fs` directly; it goes through
//! [`FileSystem`] so the command builder, stager and cleanup can be exercised
//! against an in-memory implementation in tests. [`LocalFileSystem`] is the
//! real thing.

use async_trait::async_trait;
use std::io;
use std::path::Path;

/// The filesystem operations the pipeline needs, and nothing more.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// True when `path` is a regular file the current user may execute.
    async fn is_executable(&self, path: &Path) -> bool;

    async fn is_dir(&self, path: &Path) -> bool;

    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Write `contents` in one operation, replacing any existing file.
    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Remove a file. `Ok(false)` when it did not exist.
    async fn remove_file_if_exists(&self, path: &Path) -> io::Result<bool>;
}

/// [`FileSystem`] backed by `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn is_executable(&self, path: &Path) -> bool {
        match tokio::fs::metadata(path).await {
            Ok(meta) => meta.is_file() && has_exec_bit(&meta),
            Err(_) => false,
        }
    }

    async fn is_dir(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        tokio::fs::write(path, contents).await
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn remove_file_if_exists(&self, path: &Path) -> io::Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(unix)]
fn has_exec_bit(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn has_exec_bit(_meta: &std::fs::Metadata) -> bool {
    true
}
