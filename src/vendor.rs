use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use thiserror::Error;
use tracing::info;

use crate::executor::CommandRunner;
use crate::git::{self, GitError};

pub const VENDOR_DIR: &str = "vendor";

#[derive(Debug, Error)]
pub enum VendorError {
    #[error("{0} already exists, use --force to replace it")]
    AlreadyExists(PathBuf),
    #[error("cannot derive a vendor directory name from {0}")]
    InvalidRepository(String),
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Expand GitHub shorthand (`owner/repo`) into a clone URL.
pub fn normalize_repository(repo: &str) -> String {
    if repo.contains("://") || repo.starts_with("git@") {
        return repo.to_string();
    }
    let repo = repo.trim_end_matches(".git");
    format!("git://github.com/{repo}.git")
}

/// Last path segment of `url` without a trailing `.git`.
pub fn directory_name(url: &str) -> Option<String> {
    let last = url.trim_end_matches('/').rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    (!name.is_empty()).then(|| name.to_string())
}

/// Clone `repo` into `<project_root>/vendor/<name>`, returning that path.
pub fn vendor(
    runner: &dyn CommandRunner,
    project_root: &Path,
    repo: &str,
    force: bool,
) -> Result<PathBuf, VendorError> {
    let url = normalize_repository(repo);
    let name = directory_name(&url).ok_or_else(|| VendorError::InvalidRepository(url.clone()))?;
    let target = project_root.join(VENDOR_DIR).join(name);

    if target.exists() {
        if !force {
            return Err(VendorError::AlreadyExists(target));
        }
        info!("removing existing {}", target.display());
        fs::remove_dir_all(&target)
            .with_context(|| format!("removing {}", target.display()))?;
    }

    git::clone_detached(runner, &url, &target)?;
    Ok(target)
}
