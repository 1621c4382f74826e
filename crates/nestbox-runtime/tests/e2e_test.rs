//! Integration tests for the nestbox runtime public API.
//!
//! These run unprivileged:
//! 1. Stage sequence and naming
//! 2. Shell handoff preparation
//! 3. Launcher validation before any process is created
//! 4. Launcher clone, ID mapping and release, with `/bin/sh` as the payload
//! 5. Initializer driven against a recording host under a temporary root
//!
//! The launcher tests skip themselves where the kernel refuses
//! unprivileged user namespaces.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::print_stderr)]

use std::cell::RefCell;
use std::convert::Infallible;
use std::ffi::{CStr, CString, OsString};
use std::path::Path;

use nestbox_common::config::{BootstrapConfig, LaunchConfig};
use nestbox_common::error::{NestboxError, Result};
use nestbox_core::filesystem::mount::MountOperation;
use nestbox_core::host::{Host, LinuxHost};
use nestbox_core::namespace::NamespaceConfig;
use nestbox_core::namespace::user::{IdMapping, IdentityMapping};
use nestbox_runtime::init::{Initializer, Stage};
use nestbox_runtime::launcher::{ContainerChild, Launcher};
use nestbox_runtime::process::Handoff;

// ── Stages ───────────────────────────────────────────────────────────

#[test]
fn pipeline_stage_names_are_unique_and_ordered() {
    let names: Vec<_> = Stage::ALL.iter().map(ToString::to_string).collect();
    assert_eq!(names.first().map(String::as_str), Some("hostname"));
    assert_eq!(names.last().map(String::as_str), Some("handoff"));

    let mut sorted = Stage::ALL.to_vec();
    sorted.sort();
    assert_eq!(sorted, Stage::ALL);
}

// ── Handoff ──────────────────────────────────────────────────────────

#[test]
fn pipeline_handoff_inherits_environment_verbatim() {
    let env = vec![(OsString::from("PATH"), OsString::from("/bin:/usr/bin"))];
    let handoff = Handoff::with_env(Path::new("/bin/sh"), env).expect("handoff");
    assert_eq!(handoff.path(), Path::new("/bin/sh"));
    assert_eq!(handoff.env()[0].to_bytes(), b"PATH=/bin:/usr/bin");
}

// ── Launcher ─────────────────────────────────────────────────────────

#[test]
fn pipeline_launcher_rejects_wide_identity_mapping() {
    let identity = IdentityMapping {
        uid: IdMapping {
            container_id: 0,
            host_id: 100_000,
            size: 65_536,
        },
        gid: IdMapping::root_to(1000),
    };
    let launcher = Launcher::new(NamespaceConfig::default(), identity, LaunchConfig::default());
    let err = launcher.spawn().expect_err("wide mapping");
    assert!(matches!(err, NestboxError::Config { .. }), "{err}");
}

#[test]
fn pipeline_launcher_rejects_missing_namespaces() {
    let namespaces = NamespaceConfig {
        user: false,
        ..NamespaceConfig::default()
    };
    let launcher = Launcher::new(
        namespaces,
        IdentityMapping::for_current_user(),
        LaunchConfig::default(),
    );
    assert!(launcher.spawn().is_err());
}

fn shell_payload(script: &str) -> LaunchConfig {
    LaunchConfig {
        executable: "/bin/sh".into(),
        args: vec!["sh".into(), "-c".into(), script.into()],
    }
}

/// Spawns `launch` in all six namespaces, or `None` if `clone` is refused.
fn spawn_or_skip(launch: LaunchConfig) -> Option<ContainerChild> {
    let launcher = Launcher::new(
        NamespaceConfig::default(),
        IdentityMapping::for_current_user(),
        launch,
    );
    match launcher.spawn() {
        Err(NestboxError::Sys {
            call: "clone",
            source,
            ..
        }) => {
            eprintln!("skipping: user namespaces unavailable ({source})");
            None
        }
        other => Some(other.expect("spawn launcher child")),
    }
}

#[test]
fn pipeline_launcher_child_is_root_and_pid_one() {
    let script = r#"test "$(id -u)" = 0 || exit 3; test "$$" = 1 || exit 4; exit 5"#;
    let Some(child) = spawn_or_skip(shell_payload(script)) else {
        return;
    };
    assert_ne!(u32::try_from(child.pid().as_raw()).ok(), Some(std::process::id()));
    assert_eq!(child.wait().expect("wait"), 5);
}

#[test]
fn pipeline_launcher_propagates_zero_exit() {
    let Some(child) = spawn_or_skip(shell_payload("exit 0")) else {
        return;
    };
    assert_eq!(child.wait().expect("wait"), 0);
}

#[test]
fn pipeline_launcher_reports_exec_failure_as_one() {
    let launch = LaunchConfig {
        executable: "/nonexistent/nestbox-payload".into(),
        args: vec!["nestbox-payload".into()],
    };
    let Some(child) = spawn_or_skip(launch) else {
        return;
    };
    assert_eq!(child.wait().expect("wait"), 1);
}

// ── Initializer ──────────────────────────────────────────────────────

/// Performs directory and file work for real, records everything else.
struct ScratchHost {
    mounts: RefCell<Vec<MountOperation>>,
}

impl Host for ScratchHost {
    fn set_hostname(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    fn create_dir_all(&self, path: &Path, mode: u32) -> Result<()> {
        LinuxHost.create_dir_all(path, mode)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        LinuxHost.remove_dir_all(path)
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        LinuxHost.write_file(path, contents)
    }

    fn mount(&self, op: &MountOperation) -> Result<()> {
        self.mounts.borrow_mut().push(op.clone());
        Ok(())
    }

    fn chdir(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn pivot_root(&self, _new_root: &Path, _put_old: &Path) -> Result<()> {
        Ok(())
    }

    fn unmount_detach(&self, _target: &Path) -> Result<()> {
        Ok(())
    }

    fn exec(&self, _program: &CStr, _args: &[CString], _env: &[CString]) -> Result<Infallible> {
        Err(NestboxError::Spawn {
            message: "not executed".into(),
        })
    }

    fn current_pid(&self) -> u32 {
        1
    }
}

#[test]
fn pipeline_initializer_prepares_overlay_before_mounting_it() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = BootstrapConfig::default().rooted_at(dir.path());
    let host = ScratchHost {
        mounts: RefCell::default(),
    };

    let mut init = Initializer::new(host, config.clone());
    init.run_through(Stage::OverlayMount).expect("prefix up to overlay mount");

    let layout = init.layout();
    for layer in [&layout.lower, &layout.upper, &layout.work, &layout.merged] {
        assert!(layer.is_dir(), "{} missing", layer.display());
    }
    assert_eq!(
        std::fs::read_to_string(config.cgroup_dir().join("tasks")).expect("tasks"),
        "1\n"
    );

    let mounts = init.host().mounts.borrow();
    let kinds: Vec<_> = mounts
        .iter()
        .map(|op| op.fstype.clone().unwrap_or_else(|| "bind".into()))
        .collect();
    assert_eq!(kinds, ["proc", "bind", "overlay"]);
    assert_eq!(init.next_stage(), Some(Stage::PivotRoot));
}
