//! CLI command definitions and dispatch.

pub mod init;
pub mod run;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// nestbox: an isolated shell in fresh Linux namespaces.
///
/// The directive is the only accepted argument; `help`, `--help` and
/// `--version` are usage errors like any other unknown input.
#[derive(Parser, Debug)]
#[command(
    name = "nestbox",
    about,
    long_about = None,
    disable_help_subcommand = true,
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct Cli {
    /// Directive to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available directives.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a shell in new IPC, network, mount, PID, user and UTS namespaces.
    Run,
    /// Assemble the container root and exec the shell (run inside the namespaces).
    #[command(hide = true)]
    Init,
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the directive fails before producing an exit status.
pub fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Run => run::execute(),
        Command::Init => init::execute(),
    }
}
