//! System-wide constants and default paths.

/// Binary name for the CLI.
pub const BIN_NAME: &str = "nestbox";

/// Directive that makes the binary run the in-namespace initializer.
pub const INIT_DIRECTIVE: &str = "init";

/// Path the launcher re-executes to start the initializer.
pub const SELF_EXE: &str = "/proc/self/exe";

/// Hostname set inside the new UTS namespace.
pub const DEFAULT_HOSTNAME: &str = "container";

/// Mount point of the cgroup v1 CPU controller.
pub const CGROUP_CPU_ROOT: &str = "/sys/fs/cgroup/cpu";

/// Name of the control group the initializer registers itself in.
pub const DEFAULT_CGROUP_NAME: &str = "nestbox";

/// CPU bandwidth quota in microseconds per scheduler period.
pub const DEFAULT_CPU_QUOTA_US: u64 = 1000;

/// Membership file of a cgroup v1 group.
pub const CGROUP_TASKS_FILE: &str = "tasks";

/// CFS quota file of a cgroup v1 CPU group.
pub const CGROUP_CFS_QUOTA_FILE: &str = "cpu.cfs_quota_us";

/// Base directory holding the overlay layers.
pub const DEFAULT_OVERLAY_BASE: &str = "/root/overlayfs";

/// Read-only base layer directory name.
pub const LOWER_DIR: &str = "lower";

/// Writable delta layer directory name.
pub const UPPER_DIR: &str = "upper";

/// `OverlayFS` scratch directory name.
pub const WORK_DIR: &str = "work";

/// Union view directory name; becomes the new root.
pub const MERGED_DIR: &str = "merged";

/// Process-information mount point inside the lower layer.
pub const PROC_DIR: &str = "proc";

/// Directory inside the new root that receives the old root on pivot.
pub const OLD_ROOT_DIR: &str = "oldrootfs";

/// Permission bits for every directory the initializer creates.
pub const DIR_MODE: u32 = 0o700;

/// Shell the initializer hands off to.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Exit code for launch and initialization failures.
pub const EXIT_FAILURE: u8 = 1;

/// Exit code offset used when the child is killed by a signal.
pub const SIGNAL_EXIT_BASE: i32 = 128;
