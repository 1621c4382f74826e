//! CPU resource control via the cgroup v1 CFS bandwidth controller.

use std::path::Path;

use nestbox_common::constants::CGROUP_CFS_QUOTA_FILE;
use nestbox_common::error::Result;

use crate::host::Host;

/// Sets the CPU bandwidth limit in microseconds per period.
///
/// Writes `quota_us` to `cpu.cfs_quota_us`; the period stays at the
/// kernel default.
///
/// # Errors
///
/// Returns an error if writing to `cpu.cfs_quota_us` fails.
pub fn set_cfs_quota(host: &dyn Host, cgroup_path: &Path, quota_us: u64) -> Result<()> {
    host.write_file(&cgroup_path.join(CGROUP_CFS_QUOTA_FILE), &format!("{quota_us}\n"))?;
    tracing::debug!(quota_us, "CPU quota set");
    Ok(())
}
