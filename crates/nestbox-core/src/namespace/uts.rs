//! UTS namespace isolation.
//!
//! Allows the container to have its own hostname.

use nestbox_common::error::{NestboxError, Result};

/// Sets the hostname inside the UTS namespace.
///
/// # Errors
///
/// Returns an error if `sethostname(2)` fails.
pub fn set_hostname(hostname: &str) -> Result<()> {
    nix::unistd::sethostname(hostname)
        .map_err(|e| NestboxError::sys("sethostname", hostname, e))?;
    tracing::debug!(hostname, "container hostname set");
    Ok(())
}
