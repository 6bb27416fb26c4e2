//! Primitive session commands
//!
//! Each command operates on the materialized tree through a [`Context`]
//! holding the filesystem, the working root and the cursor. Expected
//! failures (missing paths, no matches) are returned as `Ok` results with
//! an error message; `Err` is reserved for I/O trouble.

mod fileops;
mod ls;
mod navigation;

pub use fileops::chown;
pub use ls::{find, ls};
pub use navigation::cd;

use std::path::{Path, PathBuf};

use crate::fs::FileSystem;

/// Execution context for session commands.
pub struct Context<'a> {
    /// Filesystem holding the materialized tree
    pub fs: &'a dyn FileSystem,
    /// Root of the materialized tree; nothing outside it is reachable
    pub root: &'a Path,
    /// Current working directory (mutated only by `cd`)
    pub cwd: &'a mut PathBuf,
}

impl Context<'_> {
    /// Resolve an argument against the cursor.
    ///
    /// Returns the normalized path and whether it stays inside the tree.
    pub fn resolve(&self, path_str: &str) -> (PathBuf, bool) {
        let path = resolve_path(self.cwd.as_path(), path_str);
        let inside = path.starts_with(self.root);
        (path, inside)
    }
}

/// Resolve a path relative to the current working directory.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the cwd.
///
/// # Example
///
/// ```ignore
/// let rel = resolve_path(Path::new("/tmp/virtual_fs"), "some_directory");
/// assert_eq!(rel, PathBuf::from("/tmp/virtual_fs/some_directory"));
///
/// // Paths are normalized (. and .. resolved)
/// let up = resolve_path(Path::new("/tmp/virtual_fs/some_directory"), "..");
/// assert_eq!(up, PathBuf::from("/tmp/virtual_fs"));
/// ```
pub fn resolve_path(cwd: &Path, path_str: &str) -> PathBuf {
    // `join` already lets an absolute argument replace the cwd
    normalize_path(&cwd.join(path_str))
}

/// Normalize a path by resolving `.` and `..` components lexically.
fn normalize_path(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::RootDir => {
                result.push("/");
            }
            Component::Normal(name) => {
                result.push(name);
            }
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            Component::Prefix(prefix) => {
                result.push(prefix.as_os_str());
            }
        }
    }

    if result.as_os_str().is_empty() {
        result.push("/");
    }

    result
}
