use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::{self, AliasStore};
use crate::executor::{CommandRunner, SystemRunner};
use crate::git::GitError;
use crate::install::{InstallOptions, InstallOutcome, VENDORED_GEMS_DIR, install, lock};
use crate::manifest::DEFAULT_MANIFEST;
use crate::rvm::{self, DEFAULT_RUBY_VERSION, RvmError};
use crate::scaffold::{InitOptions, ScaffoldError, TerminalPrompt, init};
use crate::vendor::{VendorError, vendor};

const LOG_ENV: &str = "MONK_LOG";

#[derive(Debug, Parser)]
#[command(
    name = "monk",
    version,
    about = "Bootstrap projects from skeletons and pin their gems"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Clone a skeleton into a new project directory
    Init {
        /// Directory to create the project in
        #[arg(default_value = ".")]
        target: PathBuf,
        /// Skeleton alias or repository URL
        #[arg(long, short)]
        skeleton: Option<String>,
    },
    /// Create a trusted .rvmrc for a gemset
    Rvmrc {
        gemset: String,
        #[arg(default_value = ".")]
        target: PathBuf,
        #[arg(value_name = "VERSION", default_value = DEFAULT_RUBY_VERSION)]
        ruby_version: String,
    },
    /// Install the gems pinned in a manifest
    Install {
        #[arg(default_value = DEFAULT_MANIFEST)]
        manifest: PathBuf,
        /// Empty the gemset before installing
        #[arg(long)]
        clean: bool,
        /// Emit the install report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Snapshot the installed gems into the manifest
    Lock,
    /// Unpack the gemset into vendor/gems
    Unpack,
    /// Clone a repository into vendor/
    Vendor {
        /// Repository URL or owner/repo shorthand
        repo: String,
        /// Replace an existing vendored copy
        #[arg(long)]
        force: bool,
    },
    /// Print the repository an alias points to
    Show {
        name: String,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print every alias
    List {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Add or overwrite an alias
    Add { name: String, repository: String },
    /// Remove an alias
    Rm { name: String },
}

/// Parse arguments, run the command and return the process exit code.
pub fn run() -> i32 {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(cli.command, &SystemRunner) {
        Ok(code) => code,
        Err(err) if is_precondition(&err) => {
            eprintln!("{err}");
            1
        }
        Err(err) => {
            eprintln!("error: {err:?}");
            1
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn dispatch(command: Commands, runner: &dyn CommandRunner) -> anyhow::Result<i32> {
    let project_root = std::env::current_dir().context("resolving current directory")?;

    match command {
        Commands::Init { target, skeleton } => {
            let home = config::home_dir()?;
            let scaffold = init(
                runner,
                &TerminalPrompt,
                &home,
                &InitOptions { target, skeleton },
            )?;
            println!(
                "Initialized {} from {} ({})",
                scaffold.target.display(),
                scaffold.source,
                scaffold.environment
            );
            if let Some(readme) = scaffold.readme {
                println!();
                print!("{readme}");
            }
        }
        Commands::Rvmrc {
            gemset,
            target,
            ruby_version,
        } => {
            rvm::ensure_installed(runner)?;
            let environment = rvm::environment_name(&ruby_version, &gemset);
            rvm::create_rvmrc(runner, &target, &environment)?;
            println!("Created .rvmrc for {environment} in {}", target.display());
        }
        Commands::Install {
            manifest,
            clean,
            json,
        } => {
            let report = install(runner, &project_root, &InstallOptions { manifest, clean })?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{} installed, {} already present, {} vendored",
                    report.count(InstallOutcome::Installed),
                    report.count(InstallOutcome::AlreadyInstalled),
                    report.count(InstallOutcome::Vendored),
                );
            }
            if report.has_failures() {
                for entry in report.failures() {
                    eprintln!("failed to install {} {}", entry.name, entry.version);
                }
                return Ok(1);
            }
        }
        Commands::Lock => {
            let manifest = lock(runner, &project_root)?;
            println!("Locked gems into {}", manifest.display());
        }
        Commands::Unpack => {
            rvm::ensure_installed(runner)?;
            rvm::unpack_gemset(runner, &project_root.join(VENDORED_GEMS_DIR))?;
            println!("Unpacked gems into {VENDORED_GEMS_DIR}");
        }
        Commands::Vendor { repo, force } => {
            let target = vendor(runner, &project_root, &repo, force)?;
            println!("Vendored {repo} into {}", target.display());
        }
        Commands::Show { name, json } => {
            let store = AliasStore::open()?;
            return show(&store, &name, json);
        }
        Commands::List { json } => {
            let store = AliasStore::open()?;
            if json {
                let aliases: BTreeMap<&str, &str> = store.list().collect();
                println!("{}", serde_json::to_string_pretty(&aliases)?);
            } else {
                for (name, _) in store.list() {
                    show(&store, name, false)?;
                }
            }
        }
        Commands::Add { name, repository } => {
            let mut store = AliasStore::open()?;
            store.set(&name, &repository)?;
            show(&store, &name, false)?;
        }
        Commands::Rm { name } => {
            let mut store = AliasStore::open()?;
            store.remove(&name)?;
            println!("Removed {name}");
        }
    }

    Ok(0)
}

fn show(store: &AliasStore, name: &str, json: bool) -> anyhow::Result<i32> {
    let Some(url) = store.resolve(name) else {
        eprintln!("{name}: not found");
        return Ok(1);
    };

    if json {
        let entry = serde_json::json!({ "name": name, "repository": url });
        println!("{}", serde_json::to_string(&entry)?);
    } else {
        println!("{name:<15} {url}");
    }
    Ok(0)
}

/// User-correctable conditions print a plain message instead of an error chain.
fn is_precondition(err: &anyhow::Error) -> bool {
    let rvm_missing = |e: &RvmError| matches!(e, RvmError::NotInstalled);
    let clone_failed = |e: &GitError| matches!(e, GitError::CloneFailed { .. });

    if let Some(e) = err.downcast_ref::<RvmError>() {
        return rvm_missing(e);
    }
    if let Some(e) = err.downcast_ref::<ScaffoldError>() {
        return match e {
            ScaffoldError::TargetNotEmpty(_) => true,
            ScaffoldError::Rvm(inner) => rvm_missing(inner),
            ScaffoldError::Git(inner) => clone_failed(inner),
            ScaffoldError::Other(_) => false,
        };
    }
    if let Some(e) = err.downcast_ref::<VendorError>() {
        return match e {
            VendorError::AlreadyExists(_) | VendorError::InvalidRepository(_) => true,
            VendorError::Git(inner) => clone_failed(inner),
            VendorError::Other(_) => false,
        };
    }
    false
}
