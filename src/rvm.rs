use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::executor::{CommandRunner, Invocation};

pub const DEFAULT_RUBY_VERSION: &str = "1.9.2";

const RVM: &str = "rvm";

#[derive(Debug, Error)]
pub enum RvmError {
    #[error(
        "monk needs RVM to manage project environments, but `rvm` was not found.\n\
         Install it with:\n\n    \\curl -sSL https://get.rvm.io | bash -s stable\n\n\
         then open a new shell and try again."
    )]
    NotInstalled,
    #[error("`{0}` failed")]
    CommandFailed(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Fail before doing any work when rvm is unreachable.
pub fn ensure_installed(runner: &dyn CommandRunner) -> Result<(), RvmError> {
    if runner.is_available(RVM) {
        Ok(())
    } else {
        Err(RvmError::NotInstalled)
    }
}

/// `<version>@<gemset>` as understood by `rvm --create`.
pub fn environment_name(version: &str, gemset: &str) -> String {
    format!("{version}@{gemset}")
}

/// Create a trusted `.rvmrc` inside `target` for the given environment.
pub fn create_rvmrc(
    runner: &dyn CommandRunner,
    target: &Path,
    environment: &str,
) -> Result<(), RvmError> {
    info!("creating .rvmrc for {environment} in {}", target.display());
    run(
        runner,
        Invocation::new(RVM, ["--rvmrc", "--create", environment]).current_dir(target),
    )?;
    run(runner, Invocation::new(RVM, ["rvmrc", "trust"]).current_dir(target))
}

/// Write the active gemset's contents to `manifest`.
pub fn export_gemset(runner: &dyn CommandRunner, manifest: &Path) -> Result<(), RvmError> {
    let manifest = manifest.to_string_lossy().into_owned();
    run(runner, Invocation::new(RVM, ["gemset", "export", manifest.as_str()]))
}

pub fn empty_gemset(runner: &dyn CommandRunner) -> Result<(), RvmError> {
    run(runner, Invocation::new(RVM, ["--force", "gemset", "empty"]))
}

/// Unpack every gem of the active gemset into `dest`.
pub fn unpack_gemset(runner: &dyn CommandRunner, dest: &Path) -> Result<(), RvmError> {
    let dest = dest.to_string_lossy().into_owned();
    run(runner, Invocation::new(RVM, ["gemset", "unpack", dest.as_str()]))
}

fn run(runner: &dyn CommandRunner, invocation: Invocation) -> Result<(), RvmError> {
    if runner.status(&invocation)? {
        Ok(())
    } else {
        Err(RvmError::CommandFailed(invocation.command_line()))
    }
}
