//! `nestbox init`: the in-namespace half of the bootstrap.

use std::process::ExitCode;

use nestbox_common::config::BootstrapConfig;
use nestbox_core::host::LinuxHost;
use nestbox_runtime::init::Initializer;

/// Executes the `init` directive.
///
/// Only returns if a stage failed; on success the process has become the shell.
///
/// # Errors
///
/// Returns the failed stage rendered as one line, with the hint last.
pub fn execute() -> anyhow::Result<ExitCode> {
    let initializer = Initializer::new(LinuxHost, BootstrapConfig::default());
    match initializer.run() {
        Ok(never) => match never {},
        Err(err) => {
            tracing::debug!(stage = %err.stage, "bootstrap aborted");
            Err(anyhow::anyhow!(err.diagnostic()))
        }
    }
}
