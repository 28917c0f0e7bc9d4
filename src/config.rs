use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::debug;

pub const DEFAULT_ALIAS: &str = "default";
pub const DEFAULT_SKELETON_URL: &str = "git://github.com/monkrb/skeleton.git";

const CONFIG_FILE_NAME: &str = ".monk";
const HOME_ENV: &str = "MONK_HOME";

/// Alias to repository URL table persisted in `<home>/.monk`.
///
/// Every mutation rewrites the whole file before returning.
#[derive(Debug)]
pub struct AliasStore {
    path: PathBuf,
    aliases: BTreeMap<String, String>,
}

impl AliasStore {
    /// Open the store under `MONK_HOME`, or the user's home directory.
    pub fn open() -> anyhow::Result<Self> {
        Self::open_in(&home_dir()?)
    }

    /// Open the store under `home`, creating it with the built-in default
    /// alias when it does not exist yet.
    pub fn open_in(home: &Path) -> anyhow::Result<Self> {
        let path = home.join(CONFIG_FILE_NAME);
        if !path.exists() {
            debug!("creating alias table at {}", path.display());
            fs::create_dir_all(home)
                .with_context(|| format!("creating home directory {}", home.display()))?;
            let mut aliases = BTreeMap::new();
            aliases.insert(DEFAULT_ALIAS.to_string(), DEFAULT_SKELETON_URL.to_string());
            let store = Self { path, aliases };
            store.save()?;
            return Ok(store);
        }

        let data = fs::read_to_string(&path)
            .with_context(|| format!("reading alias table at {}", path.display()))?;
        let aliases: Option<BTreeMap<String, String>> = serde_yaml_ng::from_str(&data)
            .with_context(|| format!("parsing alias table at {}", path.display()))?;

        Ok(Self {
            path,
            aliases: aliases.unwrap_or_default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    /// All aliases in ascending order.
    pub fn list(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases
            .iter()
            .map(|(alias, url)| (alias.as_str(), url.as_str()))
    }

    pub fn set(&mut self, alias: &str, url: &str) -> anyhow::Result<()> {
        if url.trim().is_empty() {
            anyhow::bail!("repository for {alias} must not be empty");
        }
        self.aliases.insert(alias.to_string(), url.to_string());
        self.save()
    }

    /// Removing an unknown alias still rewrites the file.
    pub fn remove(&mut self, alias: &str) -> anyhow::Result<()> {
        self.aliases.remove(alias);
        self.save()
    }

    /// Replace the table on disk with the in-memory one.
    fn save(&self) -> anyhow::Result<()> {
        let rendered = serde_yaml_ng::to_string(&self.aliases)
            .context("serializing alias table")?;
        let staged = self.path.with_file_name(format!("{CONFIG_FILE_NAME}.partial"));

        let mut file = File::create(&staged)
            .with_context(|| format!("staging alias table at {}", staged.display()))?;
        file.write_all(rendered.as_bytes())
            .and_then(|()| file.sync_all())
            .with_context(|| format!("flushing {}", staged.display()))?;
        drop(file);

        fs::rename(&staged, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))
    }
}

/// `MONK_HOME` when set, otherwise the user's home directory.
pub fn home_dir() -> anyhow::Result<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir()
        .ok_or_else(|| anyhow!("could not determine home directory; set {HOME_ENV}"))
}
