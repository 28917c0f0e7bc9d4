use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::executor::{CommandRunner, Invocation};
use crate::manifest::{DEFAULT_MANIFEST, Dependency, load_manifest, rewrite_locked};
use crate::rvm::{self, RvmError};

pub const VENDORED_GEMS_DIR: &str = "vendor/gems";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallOutcome {
    Installed,
    AlreadyInstalled,
    Vendored,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct InstallEntry {
    pub name: String,
    pub version: String,
    pub outcome: InstallOutcome,
}

#[derive(Debug, Default, Serialize)]
pub struct InstallReport {
    pub entries: Vec<InstallEntry>,
}

impl InstallReport {
    pub fn count(&self, outcome: InstallOutcome) -> usize {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &InstallEntry> {
        self.entries
            .iter()
            .filter(|e| e.outcome == InstallOutcome::Failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub manifest: PathBuf,
    pub clean: bool,
}

/// Installs every manifest entry that is neither installed nor vendored under
/// `project_root`.
///
/// A failed `gem install` is recorded and the remaining entries still run.
pub fn install(
    runner: &dyn CommandRunner,
    project_root: &Path,
    options: &InstallOptions,
) -> Result<InstallReport, RvmError> {
    rvm::ensure_installed(runner)?;

    if options.clean {
        rvm::empty_gemset(runner)?;
    }

    let manifest_path = project_root.join(&options.manifest);
    let dependencies = load_manifest(&manifest_path)?;
    let vendor_root = project_root.join(VENDORED_GEMS_DIR);

    let mut report = InstallReport::default();
    for dep in dependencies {
        let outcome = install_one(runner, &vendor_root, &dep)?;
        report.entries.push(InstallEntry {
            name: dep.name,
            version: dep.version,
            outcome,
        });
    }

    Ok(report)
}

/// Export the active gemset into `<project_root>/.gems` in canonical form.
pub fn lock(runner: &dyn CommandRunner, project_root: &Path) -> Result<PathBuf, RvmError> {
    rvm::ensure_installed(runner)?;

    let manifest = project_root.join(DEFAULT_MANIFEST);
    rvm::export_gemset(runner, &manifest)?;
    rewrite_locked(&manifest)?;
    Ok(manifest)
}

fn install_one(
    runner: &dyn CommandRunner,
    vendor_root: &Path,
    dep: &Dependency,
) -> anyhow::Result<InstallOutcome> {
    let query = Invocation::new(
        "gem",
        ["list", "-i", dep.name.as_str(), "-v", dep.version.as_str()],
    );
    if runner.status(&query)? {
        debug!("{} {} already installed", dep.name, dep.version);
        return Ok(InstallOutcome::AlreadyInstalled);
    }

    if vendor_root.join(dep.vendored_dir_name()).is_dir() {
        debug!("{} {} is vendored", dep.name, dep.version);
        return Ok(InstallOutcome::Vendored);
    }

    let install = Invocation::new(
        "gem",
        ["install", dep.name.as_str(), "--version", dep.version.as_str()],
    );
    if runner.status(&install)? {
        Ok(InstallOutcome::Installed)
    } else {
        warn!("installing {} {} failed, continuing", dep.name, dep.version);
        Ok(InstallOutcome::Failed)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::{InstallOptions, InstallOutcome, install, lock};
    use crate::executor::testing::FakeRunner;
    use crate::rvm::RvmError;

    fn options(clean: bool) -> InstallOptions {
        InstallOptions {
            manifest: PathBuf::from(".gems"),
            clean,
        }
    }

    #[test]
    fn installs_missing_gems_in_manifest_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".gems"),
            "rack --version 1.2.1\n# note\nbogus line\nsinatra --version 1.0\n",
        )
        .unwrap();
        let runner = FakeRunner::with_handler(|call| call.args[0] == "install");

        let report = install(&runner, dir.path(), &options(false)).unwrap();

        assert_eq!(report.count(InstallOutcome::Installed), 2);
        assert_eq!(
            runner.command_lines(),
            vec![
                "gem list -i rack -v 1.2.1",
                "gem install rack --version 1.2.1",
                "gem list -i sinatra -v 1.0",
                "gem install sinatra --version 1.0",
            ]
        );
    }

    #[test]
    fn satisfied_environment_installs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gems"), "rack --version 1.2.1\n").unwrap();
        let runner = FakeRunner::succeeding();

        let report = install(&runner, dir.path(), &options(false)).unwrap();

        assert_eq!(report.count(InstallOutcome::AlreadyInstalled), 1);
        assert!(runner.command_lines().iter().all(|l| !l.starts_with("gem install")));
    }

    #[test]
    fn vendored_gems_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gems"), "rack --version 1.2.1\n").unwrap();
        fs::create_dir_all(dir.path().join("vendor/gems/rack-1.2.1")).unwrap();
        let runner = FakeRunner::with_handler(|_| false);

        let report = install(&runner, dir.path(), &options(false)).unwrap();

        assert_eq!(report.count(InstallOutcome::Vendored), 1);
        assert_eq!(runner.command_lines(), vec!["gem list -i rack -v 1.2.1"]);
    }

    #[test]
    fn failed_install_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gems"), "a --version 1\nb --version 2\n").unwrap();
        let runner =
            FakeRunner::with_handler(|call| call.args[0] == "install" && call.args[1] == "b");

        let report = install(&runner, dir.path(), &options(false)).unwrap();

        assert!(report.has_failures());
        assert_eq!(report.failures().next().map(|e| e.name.as_str()), Some("a"));
        assert_eq!(report.count(InstallOutcome::Installed), 1);
    }

    #[test]
    fn clean_empties_gemset_first() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gems"), "").unwrap();
        let runner = FakeRunner::succeeding();

        install(&runner, dir.path(), &options(true)).unwrap();

        assert_eq!(runner.command_lines(), vec!["rvm --force gemset empty"]);
    }

    #[test]
    fn missing_manifest_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::succeeding();

        let err = install(&runner, dir.path(), &options(false)).expect_err("no manifest");
        assert!(matches!(err, RvmError::Other(_)));
    }

    #[test]
    fn lock_then_install_is_a_no_op_when_satisfied() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let runner = FakeRunner::with_handler(move |call| {
            if call.args.first().map(String::as_str) == Some("gemset") {
                let exported = "# exported\nrack -v1.2.1\nthin -v1.2.7\n";
                fs::write(root.join(".gems"), exported).unwrap();
            }
            true
        });

        let manifest = lock(&runner, dir.path()).unwrap();
        assert_eq!(
            fs::read_to_string(&manifest).unwrap(),
            "rack --version 1.2.1\nthin --version 1.2.7\n"
        );

        let report = install(&runner, dir.path(), &options(false)).unwrap();
        assert_eq!(report.count(InstallOutcome::AlreadyInstalled), 2);
        assert!(runner.command_lines().iter().all(|l| !l.starts_with("gem install")));
    }
}
