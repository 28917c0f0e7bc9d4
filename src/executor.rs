use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use tracing::{debug, info};
use which::which;

/// A single external program call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
        }
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// Program and arguments joined with spaces, without the working directory.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cwd {
            Some(dir) => write!(f, "{} (in {})", self.command_line(), dir.display()),
            None => f.write_str(&self.command_line()),
        }
    }
}

/// Runs external tools on behalf of the commands.
///
/// `status` returns `Ok(true)` when the program exited successfully and
/// `Ok(false)` on a non-zero exit. Failing to spawn the program at all is an
/// error.
pub trait CommandRunner {
    fn status(&self, invocation: &Invocation) -> anyhow::Result<bool>;

    fn is_available(&self, program: &str) -> bool;
}

/// Spawns real processes with inherited stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn status(&self, invocation: &Invocation) -> anyhow::Result<bool> {
        info!("running {invocation}");

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }

        let status = command
            .status()
            .with_context(|| format!("running command: {}", invocation.command_line()))?;
        debug!("{} exited with {:?}", invocation.program, status.code());
        Ok(status.success())
    }

    fn is_available(&self, program: &str) -> bool {
        which(program).is_ok()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::HashSet;

    use super::{CommandRunner, Invocation};

    type Handler = Box<dyn Fn(&Invocation) -> bool>;

    /// Records every invocation and answers through a handler closure.
    pub(crate) struct FakeRunner {
        calls: RefCell<Vec<Invocation>>,
        available: HashSet<String>,
        handler: Handler,
    }

    impl FakeRunner {
        /// Every program is available and every call succeeds.
        pub(crate) fn succeeding() -> Self {
            Self::with_handler(|_| true)
        }

        pub(crate) fn with_handler(handler: impl Fn(&Invocation) -> bool + 'static) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                available: ["git", "rvm", "gem"].iter().map(|p| p.to_string()).collect(),
                handler: Box::new(handler),
            }
        }

        pub(crate) fn without_program(mut self, program: &str) -> Self {
            self.available.remove(program);
            self
        }

        pub(crate) fn calls(&self) -> Vec<Invocation> {
            self.calls.borrow().clone()
        }

        pub(crate) fn command_lines(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .map(Invocation::command_line)
                .collect()
        }
    }

    impl CommandRunner for FakeRunner {
        fn status(&self, invocation: &Invocation) -> anyhow::Result<bool> {
            self.calls.borrow_mut().push(invocation.clone());
            Ok((self.handler)(invocation))
        }

        fn is_available(&self, program: &str) -> bool {
            self.available.contains(program)
        }
    }
}
