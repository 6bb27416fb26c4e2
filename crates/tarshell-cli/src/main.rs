//! Tarshell CLI - Command line driver for archive-backed sessions
//!
//! Usage:
//!   tarshell                                   # sessions listed in ./config.csv
//!   tarshell --config sessions.csv             # sessions listed in a CSV file
//!   tarshell --user alice --archive fs.tar     # one ad-hoc session
//!
//! Each session replays its startup script, then reads commands until end of
//! input. `exit` ends the whole process.

mod driver;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tarshell::{LogConfig, MatchMode, SessionRecord};
use tracing_subscriber::EnvFilter;

use driver::Outcome;

/// Exit status when a session's filesystem cannot be created or loaded.
const EXIT_BOOTSTRAP_FAILED: u8 = 2;

/// Tarshell - archive-backed shell emulator
#[derive(Parser, Debug)]
#[command(name = "tarshell")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CSV file with columns username,virtual_fs,initial_script
    #[arg(long, default_value = "config.csv")]
    config: PathBuf,

    /// Identity of a single ad-hoc session (instead of --config)
    #[arg(long, requires = "archive")]
    user: Option<String>,

    /// Archive backing the ad-hoc session
    #[arg(long, requires = "user")]
    archive: Option<PathBuf>,

    /// Startup script for the ad-hoc session
    #[arg(long, requires = "user")]
    script: Option<PathBuf>,

    /// Directory the archive is materialized into (its contents are replaced)
    #[arg(long, conflicts_with = "isolate")]
    work_root: Option<PathBuf>,

    /// Give every session its own working root derived from its identity
    #[arg(long)]
    isolate: bool,

    /// Match commands by prefix like the legacy emulator (`lsfoo` runs `ls`)
    #[arg(long)]
    prefix_match: bool,

    /// Log startup-script content verbatim
    #[arg(long)]
    log_scripts: bool,
}

impl Args {
    fn records(&self) -> Result<Vec<SessionRecord>> {
        if let (Some(user), Some(archive)) = (&self.user, &self.archive) {
            return Ok(vec![SessionRecord {
                username: user.clone(),
                virtual_fs: archive.clone(),
                initial_script: self.script.clone(),
            }]);
        }
        tarshell::load_records(&self.config)
            .with_context(|| format!("Failed to load config: {}", self.config.display()))
    }

    fn log_config(&self) -> LogConfig {
        if self.log_scripts {
            LogConfig::new().log_scripts()
        } else {
            LogConfig::new()
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tarshell: {:#}", e);
            let bootstrap_failed = matches!(
                e.downcast_ref::<tarshell::Error>(),
                Some(tarshell::Error::FilesystemUnavailable { .. })
            );
            if bootstrap_failed {
                ExitCode::from(EXIT_BOOTSTRAP_FAILED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(args: &Args) -> Result<()> {
    for record in args.records()? {
        let mut builder = record
            .builder()
            .log_config(args.log_config())
            .match_mode(if args.prefix_match {
                MatchMode::Prefix
            } else {
                MatchMode::Exact
            });
        if let Some(root) = &args.work_root {
            builder = builder.work_root(root);
        } else if args.isolate {
            builder = builder.isolated();
        }

        let mut session = builder
            .open()
            .await
            .with_context(|| format!("Failed to open session for {}", record.username))?;

        let report = session
            .run_startup_script()
            .await
            .with_context(|| format!("Failed to run startup script for {}", record.username))?;
        for step in &report.steps {
            println!("Executing command: {}", step.line);
            driver::print_result(&step.result);
        }
        if report.exited {
            return Ok(());
        }

        if driver::run(&mut session).await? == Outcome::Exit {
            return Ok(());
        }
    }
    Ok(())
}
