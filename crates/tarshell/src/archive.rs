//! Tree archives - tar with optional gzip
//!
//! A working tree is persisted as a POSIX ustar archive whose entries are
//! rooted at the tree's base name (`virtual_fs/some_directory/...`).
//! [`pack`] captures a tree, [`unpack`] replaces a tree with an archive's
//! contents. Gzip is chosen on write from the archive path and detected on
//! read from the magic bytes.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::fs::FileSystem;

/// Tar block size; headers and content padding are multiples of it.
const TAR_BLOCK_SIZE: usize = 512;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Archive compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Plain tar
    #[default]
    None,
    /// Tar filtered through gzip
    Gzip,
}

impl Compression {
    /// Pick compression from an archive path (`.gz` / `.tgz` → gzip).
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") | Some("tgz") => Compression::Gzip,
            _ => Compression::None,
        }
    }
}

/// Kind of an archive member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// One decoded archive member.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Relative path inside the archive, without trailing slash
    pub path: PathBuf,
    pub kind: EntryKind,
    pub mode: u32,
    pub content: Vec<u8>,
}

/// Serialize the tree at `root` into archive bytes.
///
/// Entries are named relative to the parent of `root`, so the tree's own base
/// name is the first component of every member. Directories precede their
/// children and siblings are ordered by name.
pub async fn pack(fs: &dyn FileSystem, root: &Path, compression: Compression) -> Result<Vec<u8>> {
    let base = base_name(root)?;
    let mut output: Vec<u8> = Vec::new();

    add_directory(fs, root, &base, &mut output).await?;

    // Two zero blocks terminate the archive
    output.extend_from_slice(&[0u8; TAR_BLOCK_SIZE * 2]);

    match compression {
        Compression::None => Ok(output),
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&output)?;
            Ok(encoder.finish()?)
        }
    }
}

/// Replace the tree at `root` with the archive's contents.
///
/// Every member is re-rooted under `root` by dropping its first path
/// component, so an archive packed from a tree with a different base name
/// loads the same way. The whole archive is decoded before anything on disk
/// changes, so a corrupt or empty archive leaves the existing tree alone.
/// Stored permission bits are restored. Returns the number of members
/// materialized.
pub async fn unpack(fs: &dyn FileSystem, data: &[u8], root: &Path) -> Result<usize> {
    let entries = read_entries(data)?;
    if entries.is_empty() {
        return Err(Error::Archive("archive has no members".to_string()));
    }
    if let Some(entry) = entries
        .iter()
        .find(|e| e.kind == EntryKind::File && e.path.components().count() < 2)
    {
        return Err(Error::Archive(format!(
            "{}: file member outside the tree directory",
            entry.path.display()
        )));
    }

    if fs.exists(root).await? {
        fs.remove(root, true).await?;
    }
    fs.mkdir(root, true).await?;

    // Directory modes are applied last so read-only directories still get
    // their children written
    let mut dir_modes = Vec::new();
    for entry in &entries {
        let target = reroot(&entry.path, root);
        match entry.kind {
            EntryKind::Directory => {
                fs.mkdir(&target, true).await?;
                if entry.mode != 0 {
                    dir_modes.push((target, entry.mode));
                }
            }
            EntryKind::File => {
                if let Some(parent) = target.parent() {
                    fs.mkdir(parent, true).await?;
                }
                fs.write_file(&target, &entry.content).await?;
                if entry.mode != 0 {
                    fs.chmod(&target, entry.mode).await?;
                }
            }
        }
    }

    for (dir, mode) in dir_modes.iter().rev() {
        fs.chmod(dir, *mode).await?;
    }

    Ok(entries.len())
}

/// Decode all members of an archive, decompressing if it is gzipped.
pub fn read_entries(data: &[u8]) -> Result<Vec<Entry>> {
    let tar_data = if data.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| Error::Archive(format!("gzip decompression failed: {}", e)))?;
        decompressed
    } else {
        data.to_vec()
    };

    let mut entries = Vec::new();
    let mut offset = 0;

    while offset + TAR_BLOCK_SIZE <= tar_data.len() {
        let header = &tar_data[offset..offset + TAR_BLOCK_SIZE];

        if header.iter().all(|&b| b == 0) {
            break;
        }

        verify_checksum(header)?;

        let name = header_name(header);
        if name.is_empty() {
            return Err(Error::Archive("member with empty name".to_string()));
        }

        let size = parse_octal(&header[124..136]);
        let mode = parse_octal(&header[100..108]) as u32;
        let type_flag = header[156];
        offset += TAR_BLOCK_SIZE;

        let content_end = offset + size.div_ceil(TAR_BLOCK_SIZE) * TAR_BLOCK_SIZE;
        if content_end > tar_data.len() {
            return Err(Error::Archive(format!("{}: unexpected end of archive", name)));
        }

        let kind = match type_flag {
            b'5' => Some(EntryKind::Directory),
            b'0' | b'\0' if name.ends_with('/') => Some(EntryKind::Directory),
            b'0' | b'\0' => Some(EntryKind::File),
            // Links, devices and extension headers carry nothing we materialize
            _ => None,
        };

        if let Some(kind) = kind {
            let path = safe_relative_path(&name)?;
            let content = match kind {
                EntryKind::File => tar_data[offset..offset + size].to_vec(),
                EntryKind::Directory => Vec::new(),
            };
            entries.push(Entry {
                path,
                kind,
                mode,
                content,
            });
        }

        offset = content_end;
    }

    Ok(entries)
}

/// Replace the first component of a member path with `root`.
fn reroot(member: &Path, root: &Path) -> PathBuf {
    let rest: PathBuf = member.components().skip(1).collect();
    if rest.as_os_str().is_empty() {
        root.to_path_buf()
    } else {
        root.join(rest)
    }
}

fn base_name(root: &Path) -> Result<String> {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Archive(format!("{}: tree root has no name", root.display())))
}

/// Reject absolute paths and `..` so extraction cannot escape the destination.
fn safe_relative_path(name: &str) -> Result<PathBuf> {
    let mut path = PathBuf::new();
    for component in Path::new(name.trim_end_matches('/')).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::RootDir | Component::ParentDir | Component::Prefix(_) => {
                return Err(Error::Archive(format!("{}: unsafe member path", name)));
            }
        }
    }
    if path.as_os_str().is_empty() {
        return Err(Error::Archive(format!("{}: unsafe member path", name)));
    }
    Ok(path)
}

fn add_directory<'a>(
    fs: &'a dyn FileSystem,
    path: &'a Path,
    name: &'a str,
    output: &'a mut Vec<u8>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let metadata = fs.stat(path).await?;
        let mtime = unix_secs(metadata.modified);
        write_header(output, &format!("{}/", name), b'5', metadata.mode, 0, mtime)?;

        let mut entries = fs.read_dir(path).await?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        for entry in entries {
            let child_path = path.join(&entry.name);
            let child_name = format!("{}/{}", name, entry.name);

            if entry.metadata.file_type.is_dir() {
                add_directory(fs, &child_path, &child_name, output).await?;
            } else if entry.metadata.file_type.is_file() {
                let content = fs.read_file(&child_path).await?;
                let mtime = unix_secs(entry.metadata.modified);
                write_header(
                    output,
                    &child_name,
                    b'0',
                    entry.metadata.mode,
                    content.len() as u64,
                    mtime,
                )?;
                output.extend_from_slice(&content);
                let padding = (TAR_BLOCK_SIZE - (content.len() % TAR_BLOCK_SIZE)) % TAR_BLOCK_SIZE;
                output.extend(std::iter::repeat_n(0u8, padding));
            } else {
                tracing::warn!(path = %child_path.display(), "not archiving symbolic link");
            }
        }

        Ok(())
    })
}

fn unix_secs(time: std::time::SystemTime) -> u64 {
    time.duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Append a ustar header block.
fn write_header(
    output: &mut Vec<u8>,
    name: &str,
    type_flag: u8,
    mode: u32,
    size: u64,
    mtime: u64,
) -> Result<()> {
    let mut header = [0u8; TAR_BLOCK_SIZE];

    let (prefix, short) = split_name(name)?;
    header[..short.len()].copy_from_slice(short.as_bytes());
    header[345..345 + prefix.len()].copy_from_slice(prefix.as_bytes());

    write_octal(&mut header[100..108], u64::from(mode), 7);
    write_octal(&mut header[108..116], 0, 7);
    write_octal(&mut header[116..124], 0, 7);
    write_octal(&mut header[124..136], size, 11);
    write_octal(&mut header[136..148], mtime, 11);

    // Checksum is computed with its own field filled with spaces
    header[148..156].copy_from_slice(b"        ");
    header[156] = type_flag;
    header[257..263].copy_from_slice(b"ustar\0");
    header[263..265].copy_from_slice(b"00");

    let checksum: u32 = header.iter().map(|&b| b as u32).sum();
    write_octal(&mut header[148..156], checksum as u64, 7);

    output.extend_from_slice(&header);
    Ok(())
}

/// Split a member name into the ustar (prefix, name) fields.
fn split_name(name: &str) -> Result<(&str, &str)> {
    if name.len() <= 100 {
        return Ok(("", name));
    }
    // Directories keep their trailing slash in the name field
    let search = name.trim_end_matches('/');
    for (idx, _) in search.match_indices('/').rev() {
        let (prefix, rest) = (&name[..idx], &name[idx + 1..]);
        if prefix.len() <= 155 && rest.len() <= 100 && !rest.is_empty() {
            return Ok((prefix, rest));
        }
    }
    Err(Error::Archive(format!("{}: name too long for ustar", name)))
}

fn header_name(header: &[u8]) -> String {
    let name = field_str(&header[..100]);
    let prefix = if &header[257..262] == b"ustar" {
        field_str(&header[345..500])
    } else {
        String::new()
    };
    if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix, name)
    }
}

fn field_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn verify_checksum(header: &[u8]) -> Result<()> {
    let stored = parse_octal(&header[148..156]) as u32;
    let computed: u32 = header
        .iter()
        .enumerate()
        .map(|(i, &b)| if (148..156).contains(&i) { b' ' as u32 } else { b as u32 })
        .sum();
    if stored != computed {
        return Err(Error::Archive(format!(
            "{}: header checksum mismatch",
            header_name(header)
        )));
    }
    Ok(())
}

/// Write octal value to tar header field
fn write_octal(buf: &mut [u8], value: u64, width: usize) {
    let s = format!("{:0>width$o}", value, width = width);
    let bytes = s.as_bytes();
    let len = bytes.len().min(buf.len() - 1);
    buf[..len].copy_from_slice(&bytes[bytes.len() - len..]);
    buf[len] = 0;
}

/// Parse octal value from tar header field
fn parse_octal(buf: &[u8]) -> usize {
    let s: String = buf
        .iter()
        .skip_while(|&&b| b == b' ')
        .take_while(|&&b| b != 0 && b != b' ')
        .map(|&b| b as char)
        .collect();
    usize::from_str_radix(s.trim(), 8).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::HostFs;

    async fn sample_tree(root: &Path) {
        let fs = HostFs::new();
        fs.mkdir(&root.join("docs/empty"), true).await.unwrap();
        fs.write_file(&root.join("docs/readme.txt"), b"read me")
            .await
            .unwrap();
        fs.write_file(&root.join("top.txt"), b"top").await.unwrap();
    }

    #[tokio::test]
    async fn test_pack_names_members_under_base() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("virtual_fs");
        sample_tree(&root).await;

        let data = pack(&HostFs::new(), &root, Compression::None).await.unwrap();
        assert_eq!(data.len() % TAR_BLOCK_SIZE, 0);

        let names: Vec<String> = read_entries(&data)
            .unwrap()
            .iter()
            .map(|e| e.path.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "virtual_fs",
                "virtual_fs/docs",
                "virtual_fs/docs/empty",
                "virtual_fs/docs/readme.txt",
                "virtual_fs/top.txt",
            ]
        );
    }

    #[tokio::test]
    async fn test_unpack_replaces_existing_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("virtual_fs");
        sample_tree(&root).await;
        let fs = HostFs::new();
        let data = pack(&fs, &root, Compression::Gzip).await.unwrap();
        assert!(data.starts_with(&GZIP_MAGIC));

        fs.write_file(&root.join("stray.txt"), b"stray").await.unwrap();
        fs.remove(&root.join("top.txt"), false).await.unwrap();

        let count = unpack(&fs, &data, &root).await.unwrap();
        assert_eq!(count, 5);
        assert!(!fs.exists(&root.join("stray.txt")).await.unwrap());
        assert_eq!(fs.read_file(&root.join("top.txt")).await.unwrap(), b"top");
        assert!(fs.stat(&root.join("docs/empty")).await.unwrap().file_type.is_dir());
    }

    #[tokio::test]
    async fn test_unpack_into_differently_located_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("a/virtual_fs");
        sample_tree(&root).await;
        let fs = HostFs::new();
        let data = pack(&fs, &root, Compression::None).await.unwrap();

        let other = tmp.path().join("b/virtual_fs");
        unpack(&fs, &data, &other).await.unwrap();
        assert_eq!(
            fs.read_file(&other.join("docs/readme.txt")).await.unwrap(),
            b"read me"
        );
    }

    #[tokio::test]
    async fn test_unpack_reroots_foreign_base_name() {
        let tmp = tempfile::tempdir().unwrap();
        let packed_from = tmp.path().join("x/mytree");
        sample_tree(&packed_from).await;
        let fs = HostFs::new();
        let data = pack(&fs, &packed_from, Compression::None).await.unwrap();

        let root = tmp.path().join("y/virtual_fs");
        let count = unpack(&fs, &data, &root).await.unwrap();
        assert_eq!(count, 5);
        assert_eq!(fs.read_file(&root.join("top.txt")).await.unwrap(), b"top");
        assert_eq!(
            fs.read_file(&root.join("docs/readme.txt")).await.unwrap(),
            b"read me"
        );
        assert!(!fs.exists(&root.join("mytree")).await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_archive_leaves_tree_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("virtual_fs");
        sample_tree(&root).await;
        let fs = HostFs::new();

        let empty = vec![0u8; TAR_BLOCK_SIZE * 2];
        let err = unpack(&fs, &empty, &root).await.unwrap_err();
        assert!(err.to_string().contains("no members"));
        assert!(fs.exists(&root.join("top.txt")).await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unpack_restores_modes() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("virtual_fs");
        sample_tree(&root).await;
        let fs = HostFs::new();
        fs.chmod(&root.join("top.txt"), 0o600).await.unwrap();
        fs.chmod(&root.join("docs/empty"), 0o700).await.unwrap();
        let data = pack(&fs, &root, Compression::None).await.unwrap();

        let other = tmp.path().join("copy/virtual_fs");
        unpack(&fs, &data, &other).await.unwrap();
        assert_eq!(fs.stat(&other.join("top.txt")).await.unwrap().mode, 0o600);
        assert_eq!(fs.stat(&other.join("docs/empty")).await.unwrap().mode, 0o700);
    }

    #[test]
    fn test_long_names_use_prefix_field() {
        let dir = "d".repeat(120);
        let name = format!("virtual_fs/{}/file.txt", dir);
        let mut data = Vec::new();
        write_header(&mut data, &name, b'0', 0o644, 0, 0).unwrap();
        data.extend_from_slice(&[0u8; TAR_BLOCK_SIZE * 2]);

        let entries = read_entries(&data).unwrap();
        assert_eq!(entries[0].path, PathBuf::from(&name));
    }

    #[test]
    fn test_unsplittable_name_is_rejected() {
        let name = format!("virtual_fs/{}", "x".repeat(120));
        let mut data = Vec::new();
        assert!(write_header(&mut data, &name, b'0', 0o644, 0, 0).is_err());
    }

    #[test]
    fn test_corrupt_checksum_rejected() {
        let mut data = Vec::new();
        write_header(&mut data, "virtual_fs/", b'5', 0o755, 0, 0).unwrap();
        data[0] = b'w';
        data.extend_from_slice(&[0u8; TAR_BLOCK_SIZE * 2]);

        let err = read_entries(&data).unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_parent_dir_member_rejected() {
        let mut data = Vec::new();
        write_header(&mut data, "virtual_fs/../../etc/passwd", b'0', 0o644, 0, 0).unwrap();
        data.extend_from_slice(&[0u8; TAR_BLOCK_SIZE * 2]);

        assert!(matches!(read_entries(&data), Err(Error::Archive(_))));
    }

    #[test]
    fn test_truncated_content_rejected() {
        let mut data = Vec::new();
        write_header(&mut data, "virtual_fs/big.txt", b'0', 0o644, 4096, 0).unwrap();
        data.extend_from_slice(b"short");

        let err = read_entries(&data).unwrap_err();
        assert!(err.to_string().contains("unexpected end"));
    }

    #[tokio::test]
    async fn test_corrupt_archive_leaves_tree_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("virtual_fs");
        sample_tree(&root).await;
        let fs = HostFs::new();

        let garbage = vec![0x41u8; TAR_BLOCK_SIZE * 3];
        assert!(unpack(&fs, &garbage, &root).await.is_err());
        assert!(fs.exists(&root.join("top.txt")).await.unwrap());
    }

    #[test]
    fn test_compression_for_path() {
        assert_eq!(Compression::for_path(Path::new("fs.tar")), Compression::None);
        assert_eq!(Compression::for_path(Path::new("fs.tar.gz")), Compression::Gzip);
        assert_eq!(Compression::for_path(Path::new("fs.tgz")), Compression::Gzip);
    }
}
