//! Tarshell - Archive-backed shell emulator
//!
//! A small command interpreter that runs `ls`, `cd`, `find`, `chown` and
//! `exit` against a directory tree persisted as a tar archive. Opening a
//! session materializes the archive (or seeds a new one), startup scripts
//! replay through the same dispatch path as interactive input, and every
//! command returns its result as text.
//!
//! # Example
//!
//! ```rust,no_run
//! use tarshell::Session;
//!
//! #[tokio::main]
//! async fn main() -> tarshell::Result<()> {
//!     let mut session = Session::builder("alice", "/tmp/alice_fs.tar")
//!         .isolated()
//!         .open()
//!         .await?;
//!
//!     let result = session.execute("cd some_directory").await;
//!     assert!(result.is_success());
//!
//!     let result = session.execute("ls").await;
//!     assert_eq!(result.stdout, "another_file.txt\nsome_file.txt");
//!     Ok(())
//! }
//! ```

pub mod archive;
mod builtins;
pub mod config;
mod error;
pub mod fs;
pub mod logging_impl;
mod parser;
mod session;

pub use async_trait::async_trait;
pub use config::{load_records, SessionRecord};
pub use error::{CommandError, Error, Result};
pub use fs::{DirEntry, FileSystem, FileType, HostFs, Metadata};
pub use logging_impl::LogConfig;
pub use parser::{parse, Command, MatchMode};
pub use session::{
    Bootstrap, ControlFlow, ExecResult, ScriptReport, ScriptStep, Session, SessionBuilder,
    DEFAULT_WORK_ROOT,
};
