//! Host filesystem backend.
//!
//! [`HostFs`] forwards every operation to the real filesystem through
//! `tokio::fs`. Paths are used as given; confinement to a working root is
//! the session's job, not this layer's.

use async_trait::async_trait;
use std::path::Path;
use tokio::fs;

use super::traits::{DirEntry, FileSystem, FileType, Metadata};
use crate::error::Result;

/// Real on-disk filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFs;

impl HostFs {
    /// Create a new host filesystem handle.
    pub fn new() -> Self {
        Self
    }
}

fn convert(meta: &std::fs::Metadata) -> Metadata {
    let ft = meta.file_type();
    let file_type = if ft.is_symlink() {
        FileType::Symlink
    } else if ft.is_dir() {
        FileType::Directory
    } else {
        FileType::File
    };

    #[cfg(unix)]
    let mode = {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o7777
    };
    #[cfg(not(unix))]
    let mode = if file_type.is_dir() { 0o755 } else { 0o644 };

    Metadata {
        file_type,
        size: meta.len(),
        mode,
        modified: meta.modified().unwrap_or(std::time::UNIX_EPOCH),
    }
}

#[async_trait]
impl FileSystem for HostFs {
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(path).await?)
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<()> {
        fs::write(path, content).await?;
        Ok(())
    }

    async fn mkdir(&self, path: &Path, recursive: bool) -> Result<()> {
        if recursive {
            fs::create_dir_all(path).await?;
        } else {
            fs::create_dir(path).await?;
        }
        Ok(())
    }

    async fn remove(&self, path: &Path, recursive: bool) -> Result<()> {
        let meta = fs::symlink_metadata(path).await?;
        if meta.is_dir() {
            if recursive {
                fs::remove_dir_all(path).await?;
            } else {
                fs::remove_dir(path).await?;
            }
        } else {
            fs::remove_file(path).await?;
        }
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<Metadata> {
        // Links are reported as links, never followed
        let meta = fs::symlink_metadata(path).await?;
        Ok(convert(&meta))
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let meta = fs::symlink_metadata(entry.path()).await?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                metadata: convert(&meta),
            });
        }
        Ok(entries)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(fs::try_exists(path).await?)
    }

    #[cfg(unix)]
    async fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777)).await?;
        Ok(())
    }

    // Only the read-only bit is representable off unix
    #[cfg(not(unix))]
    async fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        let mut permissions = fs::metadata(path).await?.permissions();
        permissions.set_readonly(mode & 0o200 == 0);
        fs::set_permissions(path, permissions).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_and_list() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = HostFs::new();
        let dir = tmp.path().join("a/b");

        fs.mkdir(&dir, true).await.unwrap();
        fs.write_file(&dir.join("f.txt"), b"hello").await.unwrap();

        assert_eq!(fs.read_file(&dir.join("f.txt")).await.unwrap(), b"hello");
        let entries = fs.read_dir(&dir).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "f.txt");
        assert!(entries[0].metadata.file_type.is_file());
        assert_eq!(entries[0].metadata.size, 5);
    }

    #[tokio::test]
    async fn test_exists_and_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = HostFs::new();
        let dir = tmp.path().join("tree");
        fs.mkdir(&dir.join("inner"), true).await.unwrap();
        fs.write_file(&dir.join("inner/x"), b"x").await.unwrap();

        assert!(fs.exists(&dir).await.unwrap());
        assert!(fs.stat(&dir).await.unwrap().file_type.is_dir());

        fs.remove(&dir, true).await.unwrap();
        assert!(!fs.exists(&dir).await.unwrap());
    }

    #[tokio::test]
    async fn test_non_recursive_remove_of_full_dir_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = HostFs::new();
        let dir = tmp.path().join("full");
        fs.mkdir(&dir, false).await.unwrap();
        fs.write_file(&dir.join("x"), b"x").await.unwrap();

        assert!(fs.remove(&dir, false).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_chmod_sets_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = HostFs::new();
        let file = tmp.path().join("secret.txt");
        fs.write_file(&file, b"s").await.unwrap();

        fs.chmod(&file, 0o600).await.unwrap();
        assert_eq!(fs.stat(&file).await.unwrap().mode, 0o600);
    }
}
