pub mod cli;
pub mod config;
pub mod executor;
pub mod git;
pub mod install;
pub mod manifest;
pub mod rvm;
pub mod scaffold;
pub mod vendor;

/// Run the command line interface and return an exit code.
pub fn run_cli() -> i32 {
    cli::run()
}
