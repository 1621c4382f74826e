//! The seam between the bootstrap sequence and the kernel.
//!
//! Every side effect the initializer performs goes through [`Host`], so the
//! sequence can be replayed against a temporary directory with the privileged
//! calls recorded instead of executed.

use std::convert::Infallible;
use std::ffi::{CStr, CString};
use std::io::ErrorKind;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;

use nestbox_common::error::{NestboxError, Result};

use crate::filesystem::mount::{self, MountOperation};
use crate::filesystem::pivot_root;
use crate::namespace::uts;

/// Kernel and filesystem operations used by the bootstrap.
pub trait Host {
    /// Sets the hostname of the current UTS namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if `sethostname(2)` fails.
    fn set_hostname(&self, name: &str) -> Result<()>;

    /// Creates `path` and any missing parents with permission bits `mode`.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    fn create_dir_all(&self, path: &Path, mode: u32) -> Result<()>;

    /// Removes `path` recursively. A missing path is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing entry cannot be removed.
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Replaces the contents of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or written.
    fn write_file(&self, path: &Path, contents: &str) -> Result<()>;

    /// Performs a single mount operation.
    ///
    /// # Errors
    ///
    /// Returns an error if `mount(2)` fails.
    fn mount(&self, op: &MountOperation) -> Result<()>;

    /// Changes the working directory of the process.
    ///
    /// # Errors
    ///
    /// Returns an error if `chdir(2)` fails.
    fn chdir(&self, path: &Path) -> Result<()>;

    /// Makes `new_root` the root mount and moves the old root to `put_old`.
    ///
    /// # Errors
    ///
    /// Returns an error if `pivot_root(2)` fails.
    fn pivot_root(&self, new_root: &Path, put_old: &Path) -> Result<()>;

    /// Lazily detaches the mount at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if `umount2(2)` fails.
    fn unmount_detach(&self, target: &Path) -> Result<()>;

    /// Replaces the process image. Only returns on failure.
    ///
    /// # Errors
    ///
    /// Returns an error if `execve(2)` fails.
    fn exec(&self, program: &CStr, args: &[CString], env: &[CString]) -> Result<Infallible>;

    /// Returns the id of the calling process as seen from its PID namespace.
    fn current_pid(&self) -> u32;
}

/// [`Host`] that issues the real system calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxHost;

impl Host for LinuxHost {
    fn set_hostname(&self, name: &str) -> Result<()> {
        uts::set_hostname(name)
    }

    fn create_dir_all(&self, path: &Path, mode: u32) -> Result<()> {
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(mode)
            .create(path)
            .map_err(|e| NestboxError::io(path, e))?;
        tracing::debug!(path = %path.display(), mode = %format!("{mode:o}"), "directory ready");
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        match std::fs::remove_dir_all(path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed stale directory");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(NestboxError::io(path, e)),
        }
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        std::fs::write(path, contents).map_err(|e| NestboxError::io(path, e))
    }

    fn mount(&self, op: &MountOperation) -> Result<()> {
        mount::apply(op)
    }

    fn chdir(&self, path: &Path) -> Result<()> {
        nix::unistd::chdir(path).map_err(|e| NestboxError::sys("chdir", path.display(), e))
    }

    fn pivot_root(&self, new_root: &Path, put_old: &Path) -> Result<()> {
        pivot_root::pivot_root(new_root, put_old)
    }

    fn unmount_detach(&self, target: &Path) -> Result<()> {
        pivot_root::detach(target)
    }

    fn exec(&self, program: &CStr, args: &[CString], env: &[CString]) -> Result<Infallible> {
        tracing::info!(program = ?program, "replacing process image");
        nix::unistd::execve(program, args, env)
            .map_err(|e| NestboxError::sys("execve", program.to_string_lossy(), e))
    }

    fn current_pid(&self) -> u32 {
        std::process::id()
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    #[test]
    fn create_dir_all_applies_owner_only_mode() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("a").join("b");
        LinuxHost.create_dir_all(&target, 0o700).expect("create");
        let mode = std::fs::metadata(&target).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn remove_dir_all_tolerates_missing_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        LinuxHost
            .remove_dir_all(&dir.path().join("never-created"))
            .expect("absence is not an error");
    }

    #[test]
    fn remove_dir_all_deletes_nested_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let upper = dir.path().join("upper");
        std::fs::create_dir_all(upper.join("etc")).expect("mkdir");
        std::fs::write(upper.join("etc").join("motd"), "stale").expect("write");
        LinuxHost.remove_dir_all(&upper).expect("remove");
        assert!(!upper.exists());
    }

    #[test]
    fn write_file_into_missing_directory_fails_with_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("missing").join("tasks");
        let err = LinuxHost.write_file(&target, "1\n").expect_err("must fail");
        assert!(matches!(err, NestboxError::Io { ref path, .. } if *path == target));
    }
}
