//! Mount operations for container filesystem setup.
//!
//! Each [`MountOperation`] is a plain description of one `mount(2)` call;
//! the caller is responsible for creating the target beforehand and for
//! issuing operations in order.

use std::fmt;
use std::path::{Path, PathBuf};

use nix::mount::MsFlags;

use nestbox_common::error::{NestboxError, Result};

/// A single `mount(2)` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountOperation {
    /// Mount source (device, filesystem name or bind source).
    pub source: Option<String>,
    /// Existing directory the filesystem is attached to.
    pub target: PathBuf,
    /// Filesystem type; `None` for bind mounts.
    pub fstype: Option<String>,
    /// Mount flags.
    pub flags: MsFlags,
    /// Filesystem-specific options.
    pub data: Option<String>,
}

impl MountOperation {
    /// A fresh `proc` instance for the current PID namespace.
    ///
    /// Mounted `noexec,nosuid,nodev`.
    #[must_use]
    pub fn proc(target: &Path) -> Self {
        Self {
            source: Some("proc".into()),
            target: target.to_path_buf(),
            fstype: Some("proc".into()),
            flags: MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID | MsFlags::MS_NODEV,
            data: None,
        }
    }

    /// A recursive bind of `source` onto `target`.
    ///
    /// Binding a directory onto itself turns it into a mount point, which
    /// `pivot_root(2)` requires of the new root.
    #[must_use]
    pub fn recursive_bind(source: &Path, target: &Path) -> Self {
        Self {
            source: Some(source.display().to_string()),
            target: target.to_path_buf(),
            fstype: None,
            flags: MsFlags::MS_BIND | MsFlags::MS_REC,
            data: None,
        }
    }

    /// Whether this operation is a bind mount.
    #[must_use]
    pub const fn is_bind(&self) -> bool {
        self.flags.contains(MsFlags::MS_BIND)
    }
}

impl fmt::Display for MountOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} type {}",
            self.source.as_deref().unwrap_or("none"),
            self.target.display(),
            self.fstype.as_deref().unwrap_or(if self.is_bind() { "bind" } else { "none" }),
        )
    }
}

/// Issues the `mount(2)` call described by `op`.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
pub fn apply(op: &MountOperation) -> Result<()> {
    nix::mount::mount(
        op.source.as_deref(),
        &op.target,
        op.fstype.as_deref(),
        op.flags,
        op.data.as_deref(),
    )
    .map_err(|e| NestboxError::sys("mount", op, e))?;
    tracing::info!(mount = %op, "mounted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proc_mount_is_noexec_nosuid_nodev() {
        let op = MountOperation::proc(Path::new("/root/overlayfs/lower/proc"));
        assert_eq!(op.fstype.as_deref(), Some("proc"));
        assert!(op.flags.contains(MsFlags::MS_NOEXEC));
        assert!(op.flags.contains(MsFlags::MS_NOSUID));
        assert!(op.flags.contains(MsFlags::MS_NODEV));
        assert!(!op.is_bind());
    }

    #[test]
    fn self_bind_is_recursive() {
        let lower = Path::new("/root/overlayfs/lower");
        let op = MountOperation::recursive_bind(lower, lower);
        assert!(op.is_bind());
        assert!(op.flags.contains(MsFlags::MS_REC));
        assert_eq!(op.fstype, None);
        assert_eq!(op.to_string(), "/root/overlayfs/lower on /root/overlayfs/lower type bind");
    }
}
