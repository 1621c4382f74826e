//! Configuration models for the launcher and the initializer.
//!
//! The shipped binary always uses the defaults; the structs exist so the
//! bootstrap sequence can be pointed at a temporary root in tests.

use std::path::{Path, PathBuf};

use crate::constants;

/// Everything the initializer needs to assemble and enter the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Hostname set inside the UTS namespace.
    pub hostname: String,
    /// Root of the cgroup CPU controller hierarchy.
    pub cgroup_root: PathBuf,
    /// Name of the control group created under `cgroup_root`.
    pub cgroup_name: String,
    /// Value written to `cpu.cfs_quota_us`.
    pub cpu_quota_us: u64,
    /// Directory holding the `lower`, `upper`, `work` and `merged` layers.
    pub overlay_base: PathBuf,
    /// Program the initializer replaces itself with.
    pub shell: PathBuf,
}

impl BootstrapConfig {
    /// Returns the directory of the control group.
    #[must_use]
    pub fn cgroup_dir(&self) -> PathBuf {
        self.cgroup_root.join(&self.cgroup_name)
    }

    /// Returns a copy rooted at `base` for overlay and cgroup paths.
    ///
    /// Used to run the filesystem stages against a scratch directory.
    #[must_use]
    pub fn rooted_at(&self, base: &Path) -> Self {
        Self {
            cgroup_root: base.join("cgroup").join("cpu"),
            overlay_base: base.join("overlayfs"),
            ..self.clone()
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            hostname: constants::DEFAULT_HOSTNAME.into(),
            cgroup_root: PathBuf::from(constants::CGROUP_CPU_ROOT),
            cgroup_name: constants::DEFAULT_CGROUP_NAME.into(),
            cpu_quota_us: constants::DEFAULT_CPU_QUOTA_US,
            overlay_base: PathBuf::from(constants::DEFAULT_OVERLAY_BASE),
            shell: PathBuf::from(constants::DEFAULT_SHELL),
        }
    }
}

/// How the launcher re-executes itself into the new namespaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Executable started inside the namespaces.
    pub executable: PathBuf,
    /// Arguments passed to it, including `argv[0]`.
    pub args: Vec<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(constants::SELF_EXE),
            args: vec![
                constants::BIN_NAME.into(),
                constants::INIT_DIRECTIVE.into(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cgroup_dir_is_under_cpu_controller() {
        let config = BootstrapConfig::default();
        assert_eq!(
            config.cgroup_dir(),
            PathBuf::from("/sys/fs/cgroup/cpu/nestbox")
        );
    }

    #[test]
    fn rooted_at_keeps_hostname_and_quota() {
        let config = BootstrapConfig::default().rooted_at(Path::new("/tmp/x"));
        assert_eq!(config.hostname, "container");
        assert_eq!(config.cpu_quota_us, 1000);
        assert_eq!(config.overlay_base, PathBuf::from("/tmp/x/overlayfs"));
        assert!(config.cgroup_dir().starts_with("/tmp/x"));
    }

    #[test]
    fn default_launch_reexecutes_self_with_init() {
        let launch = LaunchConfig::default();
        assert_eq!(launch.executable, PathBuf::from("/proc/self/exe"));
        assert_eq!(launch.args.last().map(String::as_str), Some("init"));
    }
}
