//! Filesystem trait definitions

use async_trait::async_trait;
use std::path::Path;
use std::time::SystemTime;

use crate::error::Result;

/// Async filesystem trait.
///
/// Sessions reach the materialized tree only through this trait.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read a file's contents.
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write contents to a file, replacing it if present.
    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<()>;

    /// Create a directory.
    async fn mkdir(&self, path: &Path, recursive: bool) -> Result<()>;

    /// Remove a file or directory.
    async fn remove(&self, path: &Path, recursive: bool) -> Result<()>;

    /// Get file metadata.
    async fn stat(&self, path: &Path) -> Result<Metadata>;

    /// Read directory entries.
    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Change file permissions.
    async fn chmod(&self, path: &Path, mode: u32) -> Result<()>;
}

/// File metadata.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// File type
    pub file_type: FileType,
    /// File size in bytes
    pub size: u64,
    /// File permissions (Unix mode)
    pub mode: u32,
    /// Last modification time
    pub modified: SystemTime,
}

/// File type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link
    Symlink,
}

impl FileType {
    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// Directory entry.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Entry name (not full path)
    pub name: String,
    /// Entry metadata
    pub metadata: Metadata,
}
