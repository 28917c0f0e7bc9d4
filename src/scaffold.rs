use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{AliasStore, DEFAULT_ALIAS};
use crate::executor::CommandRunner;
use crate::git::{self, GitError};
use crate::rvm::{self, DEFAULT_RUBY_VERSION, RvmError};

const README_PATTERN: &str = "README*";

#[derive(Debug, Error)]
pub enum ScaffoldError {
    #[error("{0} is not empty, refusing to initialize it")]
    TargetNotEmpty(PathBuf),
    #[error(transparent)]
    Rvm(#[from] RvmError),
    #[error(transparent)]
    Git(#[from] GitError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Asks the user for the rvm environment, returning `default` on empty input.
pub trait Prompt {
    fn environment(&self, default: &str) -> anyhow::Result<String>;
}

/// Interactive prompt on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn environment(&self, default: &str) -> anyhow::Result<String> {
        let answer: String = dialoguer::Input::new()
            .with_prompt("Ruby version and gemset")
            .default(default.to_string())
            .allow_empty(true)
            .interact_text()
            .context("reading rvm environment")?;

        let answer = answer.trim();
        if answer.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(answer.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub target: PathBuf,
    pub skeleton: Option<String>,
}

/// Result of a successful init.
#[derive(Debug)]
pub struct Scaffold {
    pub source: String,
    pub target: PathBuf,
    pub environment: String,
    pub readme: Option<String>,
}

/// Pick the clone URL: an alias from the store, otherwise the name itself.
pub fn resolve_source(store: &AliasStore, skeleton: Option<&str>) -> String {
    let name = skeleton.unwrap_or(DEFAULT_ALIAS);
    match store.resolve(name) {
        Some(url) => url.to_string(),
        None => {
            debug!("{name} is not an alias, cloning it literally");
            name.to_string()
        }
    }
}

/// Clone a skeleton into `options.target`.
///
/// The alias table under `home` is only opened once rvm is known to be
/// available, so a failed preflight leaves nothing behind.
pub fn init(
    runner: &dyn CommandRunner,
    prompt: &dyn Prompt,
    home: &Path,
    options: &InitOptions,
) -> Result<Scaffold, ScaffoldError> {
    rvm::ensure_installed(runner)?;

    let store = AliasStore::open_in(home)?;
    let source = resolve_source(&store, options.skeleton.as_deref());
    let target = &options.target;
    if !is_absent_or_empty(target)? {
        return Err(ScaffoldError::TargetNotEmpty(target.clone()));
    }
    let default_environment = rvm::environment_name(DEFAULT_RUBY_VERSION, &app_name(target)?);

    git::clone_detached(runner, &source, target)?;

    let environment = prompt.environment(&default_environment)?;
    rvm::create_rvmrc(runner, target, &environment)?;

    let readme = read_readme(target)?;
    if readme.is_none() {
        warn!("no README found in {}", target.display());
    }

    Ok(Scaffold {
        source,
        target: target.clone(),
        environment,
        readme,
    })
}

fn is_absent_or_empty(target: &Path) -> anyhow::Result<bool> {
    if !target.exists() {
        return Ok(true);
    }
    let mut entries = fs::read_dir(target)
        .with_context(|| format!("reading target directory {}", target.display()))?;
    Ok(entries.next().is_none())
}

/// The project name: the target's last component, or the working directory's
/// name when initializing in place.
pub fn app_name(target: &Path) -> anyhow::Result<String> {
    let resolved = if target == Path::new(".") {
        std::env::current_dir().context("resolving current directory")?
    } else {
        target.to_path_buf()
    };
    resolved
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("cannot derive a project name from {}", target.display()))
}

/// First regular file in `target` whose name matches `README*`, by name order.
fn read_readme(target: &Path) -> anyhow::Result<Option<String>> {
    let pattern = glob::Pattern::new(README_PATTERN)?;
    let mut candidates: Vec<PathBuf> = fs::read_dir(target)
        .with_context(|| format!("listing {}", target.display()))?
        .filter_map(Result::ok)
        .filter(|entry| pattern.matches(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    candidates.sort();

    match candidates.into_iter().next() {
        Some(path) => fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("reading {}", path.display())),
        None => Ok(None),
    }
}
