//! Ownership command (chown)

use super::Context;
use crate::error::{CommandError, Result};
use crate::session::ExecResult;

/// Acknowledge an ownership change.
///
/// Nothing is written to the tree: the target only has to exist.
pub async fn chown(ctx: Context<'_>, owner: &str, target: &str) -> Result<ExecResult> {
    let (path, inside) = ctx.resolve(target);

    if !inside || !ctx.fs.exists(&path).await? {
        return Ok(CommandError::PathNotFound(path).into());
    }

    Ok(ExecResult::ok(format!(
        "Ownership of '{}' changed to '{}'",
        path.display(),
        owner
    )))
}
