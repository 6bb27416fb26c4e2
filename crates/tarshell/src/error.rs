//! Error types for Tarshell
//!
//! Two layers of failure exist:
//! - [`Error`]: session-level failures (bootstrap, archive, configuration).
//!   These abort construction or a driver step and are returned as `Err`.
//! - [`CommandError`]: per-command failures. These never leave the dispatch
//!   boundary; [`Session::execute`](crate::Session::execute) turns them into an
//!   [`ExecResult`](crate::ExecResult) whose text is the error's `Display`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using Tarshell's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Tarshell error types.
#[derive(Error, Debug)]
pub enum Error {
    /// The working tree could not be created from, or loaded out of, the archive.
    ///
    /// Fatal to session construction; there is no retry.
    #[error("filesystem unavailable ({}): {source}", archive.display())]
    FilesystemUnavailable {
        archive: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// Archive content is corrupt or uses an unsupported layout.
    #[error("archive error: {0}")]
    Archive(String),

    /// I/O error from filesystem operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Driving configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a bootstrap failure for the given archive.
    pub fn unavailable(archive: impl Into<PathBuf>, source: Error) -> Self {
        Self::FilesystemUnavailable {
            archive: archive.into(),
            source: Box::new(source),
        }
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Per-command failures, reported to the user as result text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// A navigation, search or ownership target does not exist.
    #[error("Path {} not found", .0.display())]
    PathNotFound(PathBuf),

    /// `cd` target exists but is not a directory.
    #[error("Path {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// `find` walked the whole subtree without a match.
    #[error("'{0}' not found")]
    NoMatches(String),

    /// Unrecognized first token; carries the raw input line.
    #[error("Command '{0}' not supported in emulator.")]
    UnsupportedCommand(String),

    /// Wrong number of arguments for a known command.
    #[error("Error: '{command}' requires {usage}")]
    MalformedArguments {
        command: &'static str,
        usage: &'static str,
    },
}

impl CommandError {
    /// Exit status reported alongside the message.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::PathNotFound(_) | Self::NotADirectory(_) | Self::NoMatches(_) => 1,
            Self::MalformedArguments { .. } => 2,
            Self::UnsupportedCommand(_) => 127,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_messages() {
        assert_eq!(
            CommandError::PathNotFound(PathBuf::from("/tmp/virtual_fs/nope")).to_string(),
            "Path /tmp/virtual_fs/nope not found"
        );
        assert_eq!(
            CommandError::MalformedArguments {
                command: "chown",
                usage: "<owner> <path>",
            }
            .to_string(),
            "Error: 'chown' requires <owner> <path>"
        );
        assert_eq!(
            CommandError::UnsupportedCommand("rm -rf".into()).to_string(),
            "Command 'rm -rf' not supported in emulator."
        );
    }

    #[test]
    fn test_unavailable_keeps_source() {
        let err = Error::unavailable("/tmp/fs.tar", Error::Archive("bad checksum".into()));
        let text = err.to_string();
        assert!(text.contains("/tmp/fs.tar"));
        assert!(text.contains("bad checksum"));
    }
}
