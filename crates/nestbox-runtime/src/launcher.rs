//! The host-side half of the bootstrap.
//!
//! The launcher clones a child into fresh IPC, network, mount, PID, user
//! and UTS namespaces. The child blocks on a close-on-exec pipe until the
//! launcher has written its UID/GID maps, then re-executes the current
//! binary with the `init` directive. The launcher waits for it and reports
//! its exit status.

use std::ffi::{CStr, CString, OsStr};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sched::clone;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{Pid, execv, pipe2, read, write};

use nestbox_common::config::LaunchConfig;
use nestbox_common::constants::SIGNAL_EXIT_BASE;
use nestbox_common::error::{NestboxError, Result};
use nestbox_core::namespace::NamespaceConfig;
use nestbox_core::namespace::user::{IdentityMapping, write_id_maps};

use crate::process::to_cstring;

/// Stack handed to the cloned child.
const STACK_SIZE: usize = 1024 * 1024;

/// Exit code of a child that was never released or could not exec.
const CHILD_FAILURE: isize = 1;

/// Creates the isolated child and hands it over to the initializer.
#[derive(Debug, Clone)]
pub struct Launcher {
    namespaces: NamespaceConfig,
    identity: IdentityMapping,
    launch: LaunchConfig,
}

impl Default for Launcher {
    fn default() -> Self {
        Self::new(
            NamespaceConfig::default(),
            IdentityMapping::for_current_user(),
            LaunchConfig::default(),
        )
    }
}

impl Launcher {
    /// Creates a launcher from explicit settings.
    #[must_use]
    pub const fn new(
        namespaces: NamespaceConfig,
        identity: IdentityMapping,
        launch: LaunchConfig,
    ) -> Self {
        Self {
            namespaces,
            identity,
            launch,
        }
    }

    /// Namespaces requested for the child.
    #[must_use]
    pub const fn namespaces(&self) -> &NamespaceConfig {
        &self.namespaces
    }

    /// Identity installed in the child's user namespace.
    #[must_use]
    pub const fn identity(&self) -> &IdentityMapping {
        &self.identity
    }

    /// Clones the child, installs its ID maps and releases it.
    ///
    /// If the maps cannot be written the child is killed and reaped before
    /// the error is returned, so it never runs unmapped.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the kernel lacks a
    /// namespace, or any of `pipe2`, `clone` or the map writes fail.
    pub fn spawn(&self) -> Result<ContainerChild> {
        self.namespaces.validate()?;
        self.namespaces.probe()?;
        self.identity.validate()?;

        let program = to_cstring(self.launch.executable.as_os_str())?;
        let args = self
            .launch
            .args
            .iter()
            .map(|arg| to_cstring(OsStr::new(arg)))
            .collect::<Result<Vec<_>>>()?;

        let (reader, writer) =
            pipe2(OFlag::O_CLOEXEC).map_err(|e| NestboxError::sys("pipe2", "sync pipe", e))?;
        let writer_fd = writer.as_raw_fd();
        let exec_failure = format!("Error: exec {} failed: ", self.launch.executable.display());
        let mut stack = vec![0_u8; STACK_SIZE];

        let callback = Box::new(|| {
            await_release_and_exec(&reader, writer_fd, &program, &args, exec_failure.as_bytes())
        });
        // SAFETY: the child gets its own copy of the address space (no
        // CLONE_VM), so the stack and everything the callback borrows stay
        // valid for it, and the callback makes no allocation or lock-taking
        // call before exec.
        let pid = unsafe {
            clone(
                callback,
                &mut stack,
                self.namespaces.clone_flags(),
                Some(libc::SIGCHLD),
            )
        }
        .map_err(|e| NestboxError::sys("clone", self.launch.executable.display(), e))?;
        drop(reader);

        let child = ContainerChild { pid };
        tracing::info!(pid = pid.as_raw(), "cloned child into new namespaces");

        if let Err(err) = self.map_identity(pid) {
            child.abort();
            return Err(err);
        }
        if let Err(err) = release(writer) {
            child.abort();
            return Err(err);
        }
        Ok(child)
    }

    /// Spawns the child and waits for it.
    ///
    /// # Errors
    ///
    /// Returns an error if spawning or waiting fails; the child's own exit
    /// status is reported through the `Ok` value.
    pub fn run(&self) -> Result<i32> {
        self.spawn()?.wait()
    }

    fn map_identity(&self, pid: Pid) -> Result<()> {
        let pid = u32::try_from(pid.as_raw()).map_err(|_| NestboxError::Spawn {
            message: format!("clone returned invalid pid {pid}"),
        })?;
        write_id_maps(pid, &self.identity)
    }
}

/// A cloned child that has not been reaped yet.
#[derive(Debug)]
pub struct ContainerChild {
    pid: Pid,
}

impl ContainerChild {
    /// PID of the child as seen from the launcher.
    #[must_use]
    pub const fn pid(&self) -> Pid {
        self.pid
    }

    /// Waits for the child to terminate.
    ///
    /// A normal exit yields its code; death by a signal yields
    /// `128 + signal`, the way shells report it.
    ///
    /// # Errors
    ///
    /// Returns an error if `waitpid(2)` fails for a reason other than `EINTR`.
    pub fn wait(self) -> Result<i32> {
        loop {
            match waitpid(self.pid, None) {
                Ok(WaitStatus::Exited(_, code)) => {
                    tracing::debug!(pid = self.pid.as_raw(), code, "child exited");
                    return Ok(code);
                }
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    tracing::debug!(pid = self.pid.as_raw(), %signal, "child killed by signal");
                    return Ok(SIGNAL_EXIT_BASE + signal as i32);
                }
                Ok(_) | Err(Errno::EINTR) => {}
                Err(e) => return Err(NestboxError::sys("waitpid", self.pid, e)),
            }
        }
    }

    /// Kills the child and reaps it.
    pub fn abort(self) {
        if let Err(e) = kill(self.pid, Signal::SIGKILL) {
            tracing::warn!(pid = self.pid.as_raw(), error = %e, "failed to kill child");
        }
        if let Err(e) = self.wait() {
            tracing::warn!(error = %e, "failed to reap child");
        }
    }
}

/// Runs `launch` in fresh namespaces as the calling user's container root
/// and returns its exit status.
///
/// # Errors
///
/// Returns an error if the child cannot be created, mapped or waited for.
pub fn launch(launch: &LaunchConfig) -> Result<i32> {
    Launcher::new(
        NamespaceConfig::default(),
        IdentityMapping::for_current_user(),
        launch.clone(),
    )
    .run()
}

fn release(writer: OwnedFd) -> Result<()> {
    loop {
        match write(&writer, &[1]) {
            Ok(_) => return Ok(()),
            Err(Errno::EINTR) => {}
            Err(e) => return Err(NestboxError::sys("write", "sync pipe", e)),
        }
    }
}

/// Body of the cloned child.
///
/// Exits without exec if the launcher closes the pipe without releasing it.
/// Only `close`, `read`, `execv` and `write` run here: the child is a copy of
/// a possibly multi-threaded process and must not allocate or take locks.
fn await_release_and_exec(
    reader: &OwnedFd,
    writer: RawFd,
    program: &CStr,
    args: &[CString],
    exec_failure: &[u8],
) -> isize {
    // The child's copy of the write end would otherwise keep the pipe open
    // after the launcher is gone.
    // SAFETY: `writer` is this process's duplicate of the launcher's pipe
    // end and nothing else in the child refers to it.
    let _ = unsafe { libc::close(writer) };

    let mut byte = [0_u8; 1];
    loop {
        match read(reader, &mut byte) {
            Ok(1) => break,
            Err(Errno::EINTR) => {}
            _ => return CHILD_FAILURE,
        }
    }

    match execv(program, args) {
        Ok(never) => match never {},
        Err(errno) => {
            let stderr = std::io::stderr();
            for part in [exec_failure, errno.desc().as_bytes(), &b"\n"[..]] {
                let _ = write(&stderr, part);
            }
            CHILD_FAILURE
        }
    }
}
