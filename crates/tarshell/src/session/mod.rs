//! Interpreter sessions
//!
//! A [`Session`] binds an identity to an archive-backed working tree and a
//! cursor into it. Opening a session materializes the tree (seeding and
//! archiving it on first use), after which command lines are dispatched one
//! at a time through [`Session::execute`].
//!
//! # Shared working roots
//!
//! By default every session materializes into [`DEFAULT_WORK_ROOT`]. Two
//! sessions opened with the same root overwrite each other's tree: the one
//! that loaded last wins, for both. Use [`SessionBuilder::isolated`] (or
//! distinct [`SessionBuilder::work_root`]s) to give each session its own tree.

mod state;

pub use state::{ControlFlow, ExecResult, ScriptReport, ScriptStep};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::archive::{self, Compression};
use crate::builtins::{self, Context};
use crate::error::{Error, Result};
use crate::fs::{FileSystem, HostFs};
use crate::logging_impl::{format_script_for_log, LogConfig};
use crate::parser::{self, Command, MatchMode};

/// Working root used when none is configured.
pub const DEFAULT_WORK_ROOT: &str = "/tmp/virtual_fs";

/// Seed tree written when the archive does not exist yet.
const SEED_DIRECTORIES: &[&str] = &["some_directory", "another_directory"];
const SEED_FILES: &[(&str, &str)] = &[
    ("some_directory/some_file.txt", "This is a test file."),
    ("some_directory/another_file.txt", "This is another test file."),
    (
        "another_directory/file_in_another_directory.txt",
        "This is a file in another directory.",
    ),
];

/// How the working tree was obtained when the session opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    /// No archive existed; the seed tree was written and archived.
    Created,
    /// The archive was extracted over the working root.
    Loaded {
        /// Number of archive members materialized
        entries: usize,
    },
}

/// A stateful interpreter bound to one identity, one archive and one cursor.
pub struct Session {
    identity: String,
    archive_path: PathBuf,
    script_path: Option<PathBuf>,
    work_root: PathBuf,
    cwd: PathBuf,
    match_mode: MatchMode,
    log: LogConfig,
    bootstrap: Bootstrap,
    fs: Arc<dyn FileSystem>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("archive_path", &self.archive_path)
            .field("work_root", &self.work_root)
            .field("cwd", &self.cwd)
            .field("bootstrap", &self.bootstrap)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a new SessionBuilder.
    pub fn builder(identity: impl Into<String>, archive_path: impl Into<PathBuf>) -> SessionBuilder {
        SessionBuilder::new(identity, archive_path)
    }

    /// Open a session with default settings.
    pub async fn open(identity: impl Into<String>, archive_path: impl Into<PathBuf>) -> Result<Self> {
        Self::builder(identity, archive_path).open().await
    }

    /// Identity label of this session.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Archive backing the working tree.
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Root of the materialized tree.
    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    /// Current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// How the tree was obtained at open time.
    pub fn bootstrap(&self) -> Bootstrap {
        self.bootstrap
    }

    /// Prompt shown by interactive drivers.
    pub fn prompt(&self) -> String {
        format!("{}@emulator:~$ ", self.identity)
    }

    /// Create the archive if absent, otherwise materialize it.
    async fn ensure_filesystem(&mut self) -> Result<()> {
        let outcome = match self.check_work_root().await {
            Ok(()) => match self.fs.exists(&self.archive_path).await {
                Ok(true) => self.load_filesystem().await,
                Ok(false) => self.create_filesystem().await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        match outcome {
            Ok(bootstrap) => {
                self.bootstrap = bootstrap;
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    session = %self.identity,
                    archive = %self.archive_path.display(),
                    error = %e,
                    "filesystem bootstrap failed"
                );
                Err(Error::unavailable(&self.archive_path, e))
            }
        }
    }

    /// The working root is replaced wholesale on open, so it must be a
    /// directory (or absent) and must not be a filesystem root.
    async fn check_work_root(&self) -> Result<()> {
        if self.work_root.parent().is_none() || self.work_root.file_name().is_none() {
            return Err(Error::Config(format!(
                "{}: working root must be a named directory",
                self.work_root.display()
            )));
        }
        if self.fs.exists(&self.work_root).await?
            && !self.fs.stat(&self.work_root).await?.file_type.is_dir()
        {
            return Err(Error::Config(format!(
                "{}: working root is not a directory",
                self.work_root.display()
            )));
        }
        Ok(())
    }

    async fn create_filesystem(&self) -> Result<Bootstrap> {
        tracing::info!(
            archive = %self.archive_path.display(),
            "archive not found, creating seed filesystem"
        );
        let fs = self.fs.as_ref();

        if fs.exists(&self.work_root).await? {
            fs.remove(&self.work_root, true).await?;
        }
        for dir in SEED_DIRECTORIES {
            fs.mkdir(&self.work_root.join(dir), true).await?;
        }
        for (file, content) in SEED_FILES {
            fs.write_file(&self.work_root.join(file), content.as_bytes())
                .await?;
        }

        let data = archive::pack(fs, &self.work_root, Compression::for_path(&self.archive_path)).await?;
        fs.write_file(&self.archive_path, &data).await?;

        tracing::info!(archive = %self.archive_path.display(), bytes = data.len(), "archive created");
        Ok(Bootstrap::Created)
    }

    async fn load_filesystem(&self) -> Result<Bootstrap> {
        tracing::info!(archive = %self.archive_path.display(), "loading filesystem");
        let data = self.fs.read_file(&self.archive_path).await?;
        let entries = archive::unpack(self.fs.as_ref(), &data, &self.work_root).await?;
        tracing::info!(
            archive = %self.archive_path.display(),
            entries,
            root = %self.work_root.display(),
            "filesystem loaded"
        );
        Ok(Bootstrap::Loaded { entries })
    }

    /// Replay the startup script configured on the builder, if any.
    pub async fn run_startup_script(&mut self) -> Result<ScriptReport> {
        match self.script_path.clone() {
            Some(path) => self.run_script(&path).await,
            None => Ok(ScriptReport::default()),
        }
    }

    /// Replay a script file through [`execute`](Self::execute).
    ///
    /// Blank lines and lines starting with `#` are skipped. Failing commands
    /// do not stop the replay; an `exit` line does, and the remaining lines
    /// are never dispatched. A missing script is skipped with a warning.
    pub async fn run_script(&mut self, path: &Path) -> Result<ScriptReport> {
        let mut report = ScriptReport::default();

        if !self.fs.exists(path).await? {
            tracing::warn!(
                session = %self.identity,
                script = %path.display(),
                "startup script not found, skipping"
            );
            return Ok(report);
        }

        let bytes = self.fs.read_file(path).await?;
        let script = String::from_utf8_lossy(&bytes);
        tracing::info!(
            session = %self.identity,
            script = %format_script_for_log(&script, &self.log),
            "running startup script"
        );

        for raw in script.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let result = self.execute(line).await;
            let exited = result.is_exit();
            report.steps.push(ScriptStep {
                line: line.to_string(),
                result,
            });
            if exited {
                report.exited = true;
                break;
            }
        }

        tracing::info!(
            session = %self.identity,
            commands = report.steps.len(),
            exited = report.exited,
            "startup script finished"
        );
        Ok(report)
    }

    /// Parse and run one command line.
    ///
    /// Never fails: every problem is reported in the returned result.
    pub async fn execute(&mut self, line: &str) -> ExecResult {
        let command = match parser::parse(line, self.match_mode) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!(
                    session = %self.identity,
                    command = %self.log.command(line),
                    error = %e,
                    "command rejected"
                );
                return e.into();
            }
        };

        let ctx = Context {
            fs: self.fs.as_ref(),
            root: &self.work_root,
            cwd: &mut self.cwd,
        };

        let outcome = match &command {
            Command::Ls => builtins::ls(ctx).await,
            Command::Cd { path } => builtins::cd(ctx, path).await,
            Command::Find { name } => builtins::find(ctx, name).await,
            Command::Chown { owner, path } => builtins::chown(ctx, owner, path).await,
            Command::Exit => Ok(ExecResult::exit()),
        };

        let result = outcome.unwrap_or_else(|e| {
            tracing::warn!(
                session = %self.identity,
                command = %self.log.command(line),
                error = %e,
                "command failed"
            );
            ExecResult::err(e.to_string(), 1)
        });

        tracing::debug!(
            session = %self.identity,
            command = %self.log.command(line),
            exit_code = result.exit_code,
            "command executed"
        );
        result
    }
}

/// Builder for customized Session configuration.
#[derive(Clone)]
pub struct SessionBuilder {
    identity: String,
    archive_path: PathBuf,
    script_path: Option<PathBuf>,
    work_root: PathBuf,
    match_mode: MatchMode,
    log: LogConfig,
    fs: Option<Arc<dyn FileSystem>>,
}

impl SessionBuilder {
    /// Start configuring a session for `identity` backed by `archive_path`.
    pub fn new(identity: impl Into<String>, archive_path: impl Into<PathBuf>) -> Self {
        Self {
            identity: identity.into(),
            archive_path: archive_path.into(),
            script_path: None,
            work_root: PathBuf::from(DEFAULT_WORK_ROOT),
            match_mode: MatchMode::default(),
            log: LogConfig::default(),
            fs: None,
        }
    }

    /// Set the startup script replayed by [`Session::run_startup_script`].
    pub fn script(mut self, path: impl Into<PathBuf>) -> Self {
        self.script_path = Some(path.into());
        self
    }

    /// Set the directory the archive is materialized into.
    ///
    /// Opening the session deletes whatever is at this path and replaces it
    /// with the archive's tree. It must not be a file.
    pub fn work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = root.into();
        self
    }

    /// Materialize into a per-identity directory under the system temp dir.
    pub fn isolated(mut self) -> Self {
        self.work_root = isolated_root(&self.identity);
        self
    }

    /// Set how command words are matched.
    pub fn match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    /// Set logging behavior.
    pub fn log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Set a custom filesystem (defaults to the host filesystem).
    pub fn fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Materialize the tree and return the ready session.
    ///
    /// Fails with [`Error::FilesystemUnavailable`] if the archive cannot be
    /// created or loaded.
    pub async fn open(self) -> Result<Session> {
        let fs = self.fs.unwrap_or_else(|| Arc::new(HostFs::new()));
        let mut session = Session {
            identity: self.identity,
            archive_path: self.archive_path,
            script_path: self.script_path,
            cwd: self.work_root.clone(),
            work_root: self.work_root,
            match_mode: self.match_mode,
            log: self.log,
            bootstrap: Bootstrap::Created,
            fs,
        };

        tracing::info!(
            session = %session.identity,
            archive = %session.archive_path.display(),
            root = %session.work_root.display(),
            "opening session"
        );
        session.ensure_filesystem().await?;
        Ok(session)
    }
}

/// Per-identity working root: `<temp>/tarshell-<identity>/virtual_fs`.
fn isolated_root(identity: &str) -> PathBuf {
    let mut label: String = identity
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if label.is_empty() {
        label.push_str("session");
    }
    std::env::temp_dir()
        .join(format!("tarshell-{}", label))
        .join("virtual_fs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolated_root_sanitizes_identity() {
        let root = isolated_root("alice/../bob");
        assert_eq!(root.file_name().unwrap(), "virtual_fs");
        let parent = root.parent().unwrap().file_name().unwrap();
        assert_eq!(parent, "tarshell-alice____bob");
        assert!(root.starts_with(std::env::temp_dir()));

        assert!(isolated_root("").to_string_lossy().contains("tarshell-session"));
    }

    #[test]
    fn test_builder_defaults() {
        let builder = Session::builder("alice", "/tmp/fs.tar");
        assert_eq!(builder.work_root, PathBuf::from(DEFAULT_WORK_ROOT));
        assert_eq!(builder.match_mode, MatchMode::Exact);
        assert!(builder.script_path.is_none());
    }

    #[tokio::test]
    async fn test_prompt_and_cursor_start_at_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("virtual_fs");
        let session = Session::builder("alice", tmp.path().join("fs.tar"))
            .work_root(&root)
            .open()
            .await
            .unwrap();

        assert_eq!(session.prompt(), "alice@emulator:~$ ");
        assert_eq!(session.cwd(), root.as_path());
        assert_eq!(session.bootstrap(), Bootstrap::Created);
    }

    #[tokio::test]
    async fn test_seed_files_have_fixed_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("virtual_fs");
        Session::builder("alice", tmp.path().join("fs.tar"))
            .work_root(&root)
            .open()
            .await
            .unwrap();

        let fs = HostFs::new();
        for (file, content) in SEED_FILES {
            assert_eq!(
                fs.read_file(&root.join(file)).await.unwrap(),
                content.as_bytes()
            );
        }
    }
}
