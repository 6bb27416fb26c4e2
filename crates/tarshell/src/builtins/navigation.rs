//! Navigation command (cd)

use super::Context;
use crate::error::{CommandError, Result};
use crate::session::ExecResult;

/// Change the cursor to `target` resolved against it.
///
/// The cursor only moves onto an existing directory inside the tree; on any
/// failure it is left as it was.
pub async fn cd(ctx: Context<'_>, target: &str) -> Result<ExecResult> {
    let (new_path, inside) = ctx.resolve(target);

    if !inside || !ctx.fs.exists(&new_path).await? {
        return Ok(CommandError::PathNotFound(new_path).into());
    }

    let metadata = ctx.fs.stat(&new_path).await?;
    if !metadata.file_type.is_dir() {
        return Ok(CommandError::NotADirectory(new_path).into());
    }

    *ctx.cwd = new_path;
    Ok(ExecResult::ok(format!(
        "Changed directory to {}",
        ctx.cwd.display()
    )))
}
