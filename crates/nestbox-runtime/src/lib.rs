//! Two-phase container bootstrap for nestbox.
//!
//! - [`launcher`]: runs on the host, clones the child into new namespaces,
//!   maps its identity and waits for it.
//! - [`init`]: runs inside the namespaces, assembles the overlay root and
//!   switches into it.
//! - [`process`]: the terminal handoff to the shell.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod init;
pub mod launcher;
pub mod process;
