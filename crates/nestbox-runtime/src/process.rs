//! Process-image handoff at the end of the bootstrap.
//!
//! A [`Handoff`] is the terminal action of the initializer: executing it
//! either fails or turns the current process into the shell. Nothing after
//! a successful [`Handoff::exec`] runs, so everything the caller owns must
//! already be released when it is invoked.

use std::convert::Infallible;
use std::ffi::{CStr, CString, OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use nestbox_common::error::{NestboxError, Result};
use nestbox_core::host::Host;

/// A prepared `execve(2)` of the container shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handoff {
    path: PathBuf,
    program: CString,
    args: Vec<CString>,
    env: Vec<CString>,
}

impl Handoff {
    /// Prepares `shell` with the environment of the current process.
    ///
    /// # Errors
    ///
    /// Returns an error if the path or an environment entry contains a NUL byte.
    pub fn shell(shell: &Path) -> Result<Self> {
        Self::with_env(shell, std::env::vars_os())
    }

    /// Prepares `shell` with an explicit environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the path or an environment entry contains a NUL byte.
    pub fn with_env<I>(shell: &Path, env: I) -> Result<Self>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let program = to_cstring(shell.as_os_str())?;
        let env = env
            .into_iter()
            .map(|(key, value)| {
                let mut entry = key;
                entry.push("=");
                entry.push(value);
                to_cstring(&entry)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            path: shell.to_path_buf(),
            args: vec![program.clone()],
            program,
            env,
        })
    }

    /// Path of the program that will replace the process.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The program as passed to `execve(2)`.
    #[must_use]
    pub fn program(&self) -> &CStr {
        &self.program
    }

    /// `argv`, starting with the program itself.
    #[must_use]
    pub fn args(&self) -> &[CString] {
        &self.args
    }

    /// `envp` as `KEY=VALUE` entries.
    #[must_use]
    pub fn env(&self) -> &[CString] {
        &self.env
    }

    /// Replaces the current process image.
    ///
    /// # Errors
    ///
    /// Returns an error if `execve(2)` fails; on success it does not return.
    pub fn exec(self, host: &dyn Host) -> Result<Infallible> {
        host.exec(&self.program, &self.args, &self.env)
    }
}

/// Converts an OS string into a C string for `exec`.
///
/// # Errors
///
/// Returns a configuration error if `value` contains a NUL byte.
pub fn to_cstring(value: &OsStr) -> Result<CString> {
    CString::new(value.as_bytes()).map_err(|e| NestboxError::Config {
        message: format!("{} contains a NUL byte: {e}", value.to_string_lossy()),
    })
}
