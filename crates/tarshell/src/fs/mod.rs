//! Filesystem access for Tarshell
//!
//! Provides an async filesystem trait and the host-disk implementation
//! the materialized tree lives on:
//! - `HostFs`: passes operations through to the real filesystem

mod host;
mod traits;

pub use host::HostFs;
pub use traits::{DirEntry, FileSystem, FileType, Metadata};
