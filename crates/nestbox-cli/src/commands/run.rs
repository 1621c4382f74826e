//! `nestbox run`: launch the container and wait for it.

use std::process::ExitCode;

use anyhow::Context;
use nestbox_common::config::LaunchConfig;
use nestbox_common::constants::EXIT_FAILURE;
use nestbox_runtime::launcher;

/// Executes the `run` directive.
///
/// The returned code is the child's: its exit status, or `128 + signal`.
///
/// # Errors
///
/// Returns an error if the child could not be created, mapped or reaped.
pub fn execute() -> anyhow::Result<ExitCode> {
    let code = launcher::launch(&LaunchConfig::default()).context("launching container")?;
    tracing::debug!(code, "container exited");
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(EXIT_FAILURE)))
}
