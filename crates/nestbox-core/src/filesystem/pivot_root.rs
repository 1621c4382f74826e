//! Root filesystem switching via `pivot_root(2)`.
//!
//! More secure than `chroot` because it actually changes the root mount
//! point rather than just the process's view of `/`. The old root stays
//! reachable under `put_old` until it is detached.

use std::path::Path;

use nix::mount::MntFlags;

use nestbox_common::error::{NestboxError, Result};

/// Switches the root filesystem to `new_root` using `pivot_root(2)`.
///
/// `new_root` must be a mount point and `put_old` a directory beneath it.
/// The old root is moved to `put_old` and should be detached afterward.
///
/// # Errors
///
/// Returns an error if `pivot_root(2)` fails.
pub fn pivot_root(new_root: &Path, put_old: &Path) -> Result<()> {
    nix::unistd::pivot_root(new_root, put_old)
        .map_err(|e| NestboxError::sys("pivot_root", new_root.display(), e))?;
    tracing::info!(
        new_root = %new_root.display(),
        put_old = %put_old.display(),
        "performed pivot_root"
    );
    Ok(())
}

/// Lazily detaches the mount at `target` with `MNT_DETACH`.
///
/// The mount disappears from the namespace immediately; the kernel releases
/// it once nothing references it.
///
/// # Errors
///
/// Returns an error if `umount2(2)` fails.
pub fn detach(target: &Path) -> Result<()> {
    nix::mount::umount2(target, MntFlags::MNT_DETACH)
        .map_err(|e| NestboxError::sys("umount2", target.display(), e))?;
    tracing::info!(path = %target.display(), "mount detached");
    Ok(())
}
