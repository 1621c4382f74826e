//! Linux namespace management for container isolation.
//!
//! Describes the namespace set the launcher requests from `clone(2)`,
//! plus the user-namespace ID maps and UTS hostname set up around it.

pub mod user;
pub mod uts;

use std::path::Path;

use nix::sched::CloneFlags;

use nestbox_common::error::{NestboxError, Result};

/// A kind of kernel namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// System V IPC objects and POSIX message queues.
    Ipc,
    /// Network stack.
    Network,
    /// Mount table.
    Mount,
    /// Process IDs.
    Pid,
    /// User and group IDs.
    User,
    /// Hostname and domain name.
    Uts,
}

impl Namespace {
    /// Every namespace kind, in the order they are reported.
    pub const ALL: [Self; 6] = [
        Self::Ipc,
        Self::Network,
        Self::Mount,
        Self::Pid,
        Self::User,
        Self::Uts,
    ];

    /// The `clone(2)` flag that creates this namespace.
    #[must_use]
    pub const fn clone_flag(self) -> CloneFlags {
        match self {
            Self::Ipc => CloneFlags::CLONE_NEWIPC,
            Self::Network => CloneFlags::CLONE_NEWNET,
            Self::Mount => CloneFlags::CLONE_NEWNS,
            Self::Pid => CloneFlags::CLONE_NEWPID,
            Self::User => CloneFlags::CLONE_NEWUSER,
            Self::Uts => CloneFlags::CLONE_NEWUTS,
        }
    }

    /// Entry name under `/proc/<pid>/ns/`.
    #[must_use]
    pub const fn proc_name(self) -> &'static str {
        match self {
            Self::Ipc => "ipc",
            Self::Network => "net",
            Self::Mount => "mnt",
            Self::Pid => "pid",
            Self::User => "user",
            Self::Uts => "uts",
        }
    }

    /// Whether the running kernel exposes this namespace kind.
    #[must_use]
    pub fn is_supported(self) -> bool {
        Path::new("/proc/self/ns").join(self.proc_name()).exists()
    }
}

/// Configuration for which namespaces to create.
///
/// The bootstrap only supports the full set; [`NamespaceConfig::validate`]
/// rejects anything else.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Isolate PID namespace.
    pub pid: bool,
    /// Isolate mount namespace.
    pub mount: bool,
    /// Isolate network namespace.
    pub network: bool,
    /// Isolate user namespace.
    pub user: bool,
    /// Isolate IPC namespace.
    pub ipc: bool,
    /// Isolate UTS (hostname) namespace.
    pub uts: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            pid: true,
            mount: true,
            network: true,
            user: true,
            ipc: true,
            uts: true,
        }
    }
}

impl NamespaceConfig {
    /// Whether `kind` is requested.
    #[must_use]
    pub const fn contains(&self, kind: Namespace) -> bool {
        match kind {
            Namespace::Ipc => self.ipc,
            Namespace::Network => self.network,
            Namespace::Mount => self.mount,
            Namespace::Pid => self.pid,
            Namespace::User => self.user,
            Namespace::Uts => self.uts,
        }
    }

    /// Combined `clone(2)` flags for every requested namespace.
    #[must_use]
    pub fn clone_flags(&self) -> CloneFlags {
        Namespace::ALL
            .into_iter()
            .filter(|kind| self.contains(*kind))
            .fold(CloneFlags::empty(), |flags, kind| flags | kind.clone_flag())
    }

    /// Checks that all six namespaces are requested.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the missing namespaces.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = Namespace::ALL
            .into_iter()
            .filter(|kind| !self.contains(*kind))
            .map(Namespace::proc_name)
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(NestboxError::Config {
            message: format!(
                "partial isolation is not supported, missing namespaces: {}",
                missing.join(", ")
            ),
        })
    }

    /// Checks that the kernel exposes every requested namespace.
    ///
    /// # Errors
    ///
    /// Returns [`NestboxError::Unsupported`] for the first missing kind.
    pub fn probe(&self) -> Result<()> {
        for kind in Namespace::ALL {
            if self.contains(kind) && !kind.is_supported() {
                return Err(NestboxError::Unsupported {
                    message: format!("kernel does not provide the {} namespace", kind.proc_name()),
                });
            }
        }
        tracing::debug!(flags = ?self.clone_flags(), "namespace support probed");
        Ok(())
    }
}
