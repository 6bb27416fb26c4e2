//! Directory listing and search commands (ls, find)

use std::path::{Path, PathBuf};

use super::Context;
use crate::error::{CommandError, Result};
use crate::fs::FileSystem;
use crate::session::ExecResult;

/// List entry names of the current directory, one per line, sorted.
pub async fn ls(ctx: Context<'_>) -> Result<ExecResult> {
    let mut names: Vec<String> = ctx
        .fs
        .read_dir(ctx.cwd.as_path())
        .await?
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    names.sort();
    Ok(ExecResult::ok(names.join("\n")))
}

/// Find every entry named `name` in the current directory and below.
///
/// Directories are visited top-down with siblings in name order; each match
/// is reported as its full path. Symbolic links are matched by name but
/// never descended into.
pub async fn find(ctx: Context<'_>, name: &str) -> Result<ExecResult> {
    let mut matches = Vec::new();
    find_recursive(ctx.fs, ctx.cwd.as_path(), name, &mut matches).await?;

    if matches.is_empty() {
        return Ok(CommandError::NoMatches(name.to_string()).into());
    }

    let lines: Vec<String> = matches
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    Ok(ExecResult::ok(lines.join("\n")))
}

fn find_recursive<'a>(
    fs: &'a dyn FileSystem,
    dir: &'a Path,
    name: &'a str,
    matches: &'a mut Vec<PathBuf>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = fs.read_dir(dir).await?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        if entries.iter().any(|entry| entry.name == name) {
            matches.push(dir.join(name));
        }

        for entry in entries {
            if entry.metadata.file_type.is_dir() {
                let child = dir.join(&entry.name);
                find_recursive(fs, &child, name, matches).await?;
            }
        }

        Ok(())
    })
}
