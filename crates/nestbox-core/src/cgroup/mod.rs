//! Cgroup v1 resource management.
//!
//! Registers the container's init process in a named group under the CPU
//! controller (`/sys/fs/cgroup/cpu` by default) and bounds its CPU time.

pub mod cpu;

use std::path::{Path, PathBuf};

use nestbox_common::constants::{CGROUP_TASKS_FILE, DIR_MODE};
use nestbox_common::error::Result;

use crate::host::Host;

/// Handle to the container's control group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgroupManager {
    /// Path to the group directory.
    path: PathBuf,
}

impl CgroupManager {
    /// Creates (or reuses) the group `name` under `root`.
    ///
    /// The directory is created before any control file is touched.
    ///
    /// # Errors
    ///
    /// Returns an error if the cgroup directory cannot be created.
    pub fn create(host: &dyn Host, root: &Path, name: &str) -> Result<Self> {
        let path = root.join(name);
        host.create_dir_all(&path, DIR_MODE)?;
        tracing::info!(path = %path.display(), "cgroup created");
        Ok(Self { path })
    }

    /// Returns the group directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds a process to this cgroup by writing its PID to `tasks`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `tasks` fails.
    pub fn add_process(&self, host: &dyn Host, pid: u32) -> Result<()> {
        host.write_file(&self.path.join(CGROUP_TASKS_FILE), &format!("{pid}\n"))?;
        tracing::debug!(pid, "added process to cgroup");
        Ok(())
    }

    /// Sets the CFS quota of this cgroup.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `cpu.cfs_quota_us` fails.
    pub fn set_cpu_quota(&self, host: &dyn Host, quota_us: u64) -> Result<()> {
        cpu::set_cfs_quota(host, &self.path, quota_us)
    }
}
