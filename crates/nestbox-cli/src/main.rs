//! # nestbox
//!
//! Launches an interactive shell inside fresh namespaces on a throwaway
//! overlay root. `nestbox run` is the entry point; the hidden `nestbox init`
//! is what the launcher re-executes inside the new namespaces.

mod commands;

use std::process::ExitCode;

use clap::Parser;
use nestbox_common::error::render_chain;

use crate::commands::Cli;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match commands::execute(cli) {
        Ok(code) => code,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::print_stderr)]
fn report(err: &anyhow::Error) {
    eprintln!("Error: {}", render_chain(&**err));
}
