//! User namespace isolation.
//!
//! Maps the invoking host user and group to root inside the container,
//! enabling rootless containers.

use std::fs;
use std::path::PathBuf;

use nestbox_common::error::{NestboxError, Result};

/// One line of a `uid_map` / `gid_map` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdMapping {
    /// First ID inside the namespace.
    pub container_id: u32,
    /// First ID in the parent namespace.
    pub host_id: u32,
    /// Number of consecutive IDs mapped.
    pub size: u32,
}

impl IdMapping {
    /// Maps container root (0) to `host_id`, one ID wide.
    #[must_use]
    pub const fn root_to(host_id: u32) -> Self {
        Self {
            container_id: 0,
            host_id,
            size: 1,
        }
    }

    /// Checks the mapping pins exactly container root to one host ID.
    ///
    /// # Errors
    ///
    /// Returns a configuration error otherwise.
    pub fn validate(&self) -> Result<()> {
        if self.container_id != 0 || self.size != 1 {
            return Err(NestboxError::Config {
                message: format!(
                    "identity mapping must map container id 0 with size 1, got {self:?}"
                ),
            });
        }
        Ok(())
    }

    /// Renders the mapping in the kernel's map-file format.
    #[must_use]
    pub fn to_map_line(&self) -> String {
        format!("{} {} {}\n", self.container_id, self.host_id, self.size)
    }
}

/// User and group mappings installed for the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityMapping {
    /// User ID mapping.
    pub uid: IdMapping,
    /// Group ID mapping.
    pub gid: IdMapping,
}

impl IdentityMapping {
    /// Maps root inside the container to the real user and group of the caller.
    #[must_use]
    pub fn for_current_user() -> Self {
        Self {
            uid: IdMapping::root_to(nix::unistd::getuid().as_raw()),
            gid: IdMapping::root_to(nix::unistd::getgid().as_raw()),
        }
    }

    /// Validates both axes.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if either mapping is invalid.
    pub fn validate(&self) -> Result<()> {
        self.uid.validate()?;
        self.gid.validate()
    }
}

fn proc_file(pid: u32, name: &str) -> PathBuf {
    let pid_str = if pid == 0 {
        "self".to_string()
    } else {
        pid.to_string()
    };
    PathBuf::from(format!("/proc/{pid_str}/{name}"))
}

/// Writes the UID/GID maps of the user namespace that `pid` lives in.
///
/// `setgroups` is denied first, which unprivileged writers must do before
/// they are allowed to write `gid_map`. A `pid` of 0 targets the caller.
///
/// # Errors
///
/// Returns an error if writing to `/proc/[pid]/setgroups`,
/// `/proc/[pid]/uid_map`, or `/proc/[pid]/gid_map` fails.
pub fn write_id_maps(pid: u32, mapping: &IdentityMapping) -> Result<()> {
    mapping.validate()?;

    let setgroups_path = proc_file(pid, "setgroups");
    if setgroups_path.exists() {
        fs::write(&setgroups_path, "deny").map_err(|e| NestboxError::io(&setgroups_path, e))?;
    }

    let uid_map_path = proc_file(pid, "uid_map");
    fs::write(&uid_map_path, mapping.uid.to_map_line())
        .map_err(|e| NestboxError::io(&uid_map_path, e))?;

    let gid_map_path = proc_file(pid, "gid_map");
    fs::write(&gid_map_path, mapping.gid.to_map_line())
        .map_err(|e| NestboxError::io(&gid_map_path, e))?;

    tracing::debug!(
        pid,
        host_uid = mapping.uid.host_id,
        host_gid = mapping.gid.host_id,
        "wrote UID/GID map"
    );
    Ok(())
}
