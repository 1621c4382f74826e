//! `OverlayFS` management for the layered container root.
//!
//! A single read-only lower layer is combined with a writable upper layer;
//! writes in the merged view land in `upper` and leave `lower` untouched
//! across runs.

use std::path::{Path, PathBuf};

use nix::mount::MsFlags;

use nestbox_common::constants::{
    DIR_MODE, LOWER_DIR, MERGED_DIR, OLD_ROOT_DIR, PROC_DIR, UPPER_DIR, WORK_DIR,
};
use nestbox_common::error::Result;

use super::mount::MountOperation;
use crate::host::Host;

/// The four overlay directories under a common base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayLayout {
    /// Base directory.
    pub base: PathBuf,
    /// Read-only base layer.
    pub lower: PathBuf,
    /// Writable delta layer.
    pub upper: PathBuf,
    /// Scratch directory; must be empty when mounting.
    pub work: PathBuf,
    /// Union view; becomes the new root.
    pub merged: PathBuf,
}

impl OverlayLayout {
    /// Lays out `lower`, `upper`, `work` and `merged` under `base`.
    #[must_use]
    pub fn new(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
            lower: base.join(LOWER_DIR),
            upper: base.join(UPPER_DIR),
            work: base.join(WORK_DIR),
            merged: base.join(MERGED_DIR),
        }
    }

    /// Mount point for `/proc` inside the lower layer.
    #[must_use]
    pub fn proc_dir(&self) -> PathBuf {
        self.lower.join(PROC_DIR)
    }

    /// Directory in the lower layer that will receive the old root.
    #[must_use]
    pub fn old_root_receptacle(&self) -> PathBuf {
        self.lower.join(OLD_ROOT_DIR)
    }

    /// The same receptacle as seen through the merged view.
    #[must_use]
    pub fn put_old(&self) -> PathBuf {
        self.merged.join(OLD_ROOT_DIR)
    }

    /// Removes leftovers of a previous run and recreates all four layers.
    ///
    /// `upper`, `work` and `merged` are deleted so the work directory is
    /// empty and the merged mount point carries no stale content. `lower`
    /// is only created if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if removal or directory creation fails.
    pub fn reset(&self, host: &dyn Host) -> Result<()> {
        for stale in [&self.upper, &self.work, &self.merged] {
            host.remove_dir_all(stale)?;
        }
        for dir in [&self.lower, &self.upper, &self.work, &self.merged] {
            host.create_dir_all(dir, DIR_MODE)?;
        }
        tracing::info!(base = %self.base.display(), "overlay workspace reset");
        Ok(())
    }

    /// The `lowerdir=…,upperdir=…,workdir=…` option string.
    #[must_use]
    pub fn mount_options(&self) -> String {
        format!(
            "lowerdir={},upperdir={},workdir={}",
            self.lower.display(),
            self.upper.display(),
            self.work.display()
        )
    }

    /// The mount that assembles the merged view.
    #[must_use]
    pub fn mount_operation(&self) -> MountOperation {
        MountOperation {
            source: Some("overlay".into()),
            target: self.merged.clone(),
            fstype: Some("overlay".into()),
            flags: MsFlags::empty(),
            data: Some(self.mount_options()),
        }
    }
}

/// Mounts the overlay described by `layout` at its merged directory.
///
/// # Errors
///
/// Returns an error if the mount syscall fails.
pub fn mount_overlay(host: &dyn Host, layout: &OverlayLayout) -> Result<()> {
    host.mount(&layout.mount_operation())?;
    tracing::info!(merged = %layout.merged.display(), "overlayfs mounted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::LinuxHost;

    #[test]
    fn options_name_all_three_layers() {
        let layout = OverlayLayout::new(Path::new("/root/overlayfs"));
        assert_eq!(
            layout.mount_options(),
            "lowerdir=/root/overlayfs/lower,upperdir=/root/overlayfs/upper,workdir=/root/overlayfs/work"
        );
        let op = layout.mount_operation();
        assert_eq!(op.target, PathBuf::from("/root/overlayfs/merged"));
        assert_eq!(op.fstype.as_deref(), Some("overlay"));
    }

    #[test]
    fn put_old_lives_inside_merged() {
        let layout = OverlayLayout::new(Path::new("/root/overlayfs"));
        assert_eq!(layout.put_old(), PathBuf::from("/root/overlayfs/merged/oldrootfs"));
        assert_eq!(
            layout.old_root_receptacle(),
            PathBuf::from("/root/overlayfs/lower/oldrootfs")
        );
    }

    #[test]
    fn reset_twice_clears_stale_layers_and_keeps_lower() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = OverlayLayout::new(dir.path());

        layout.reset(&LinuxHost).expect("first reset");
        std::fs::write(layout.lower.join("keep"), "base").expect("lower file");
        std::fs::write(layout.upper.join("delta"), "stale").expect("upper file");
        std::fs::create_dir(layout.work.join("work")).expect("work dir");
        std::fs::write(layout.merged.join("leftover"), "stale").expect("merged file");

        layout.reset(&LinuxHost).expect("second reset");

        assert_eq!(
            std::fs::read_to_string(layout.lower.join("keep")).expect("lower kept"),
            "base"
        );
        for dir in [&layout.upper, &layout.work, &layout.merged] {
            let entries = std::fs::read_dir(dir).expect("exists").count();
            assert_eq!(entries, 0, "{} should be empty", dir.display());
        }
    }
}
