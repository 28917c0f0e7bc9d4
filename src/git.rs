use std::fs;
use std::path::Path;

use anyhow::Context;
use thiserror::Error;

use crate::executor::{CommandRunner, Invocation};

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to clone {url} into {target}")]
    CloneFailed { url: String, target: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Shallow-clone `url` into `target`, then drop its `.git` directory so the
/// checkout no longer tracks the source history.
pub fn clone_detached(
    runner: &dyn CommandRunner,
    url: &str,
    target: &Path,
) -> Result<(), GitError> {
    let target_arg = target.to_string_lossy().to_string();
    let clone = Invocation::new("git", ["clone", "--depth", "1", url, target_arg.as_str()]);

    if !runner.status(&clone)? {
        return Err(GitError::CloneFailed {
            url: url.to_string(),
            target: target_arg,
        });
    }

    strip_metadata(target)?;
    Ok(())
}

fn strip_metadata(target: &Path) -> anyhow::Result<()> {
    let git_dir = target.join(".git");
    if git_dir.exists() {
        fs::remove_dir_all(&git_dir)
            .with_context(|| format!("removing {}", git_dir.display()))?;
    }
    Ok(())
}
