//! The in-namespace initializer.
//!
//! Runs inside the namespaces created by the launcher and walks
//! [`Stage::ALL`] strictly in order: hostname, cgroup, overlay assembly,
//! `pivot_root`, old-root teardown, and finally the shell handoff. A failed
//! stage aborts the whole sequence; nothing is retried or rolled back.
//!
//! Stages can be driven one at a time with [`Initializer::step`] or up to a
//! given stage with [`Initializer::run_through`], which lets tests inspect
//! the filesystem between stages without ever reaching the handoff.

pub mod stage;

use std::convert::Infallible;
use std::path::Path;

use nestbox_common::config::BootstrapConfig;
use nestbox_common::constants::{DIR_MODE, OLD_ROOT_DIR};
use nestbox_core::cgroup::CgroupManager;
use nestbox_core::filesystem::mount::MountOperation;
use nestbox_core::filesystem::overlayfs::{self, OverlayLayout};
use nestbox_core::host::Host;

use crate::process::Handoff;

pub use self::stage::{Stage, StageError};
use self::stage::StageContext;

/// Outcome of a single [`Initializer::step`].
#[derive(Debug)]
pub enum Step {
    /// The stage completed; the sequence continues.
    Completed(Stage),
    /// Every preparatory stage completed; only the handoff remains.
    Handoff(Handoff),
}

/// Drives the bootstrap stages against a [`Host`].
#[derive(Debug)]
pub struct Initializer<H: Host> {
    host: H,
    config: BootstrapConfig,
    layout: OverlayLayout,
    next: Option<Stage>,
}

impl<H: Host> Initializer<H> {
    /// Creates an initializer positioned before the first stage.
    pub fn new(host: H, config: BootstrapConfig) -> Self {
        let layout = OverlayLayout::new(&config.overlay_base);
        Self {
            host,
            config,
            layout,
            next: Some(Stage::Hostname),
        }
    }

    /// The host every side effect is issued through.
    pub const fn host(&self) -> &H {
        &self.host
    }

    /// The overlay directories this initializer assembles.
    pub const fn layout(&self) -> &OverlayLayout {
        &self.layout
    }

    /// The stage [`Initializer::step`] will run next.
    pub const fn next_stage(&self) -> Option<Stage> {
        self.next
    }

    /// Runs the next stage.
    ///
    /// The handoff stage does not execute anything itself; it yields the
    /// prepared [`Handoff`] so the caller can give up ownership first.
    ///
    /// # Errors
    ///
    /// Returns the [`StageError`] of the failed stage. Once a stage has
    /// failed, or after the handoff was yielded, further calls fail too.
    pub fn step(&mut self) -> Result<Step, StageError> {
        let Some(stage) = self.next.take() else {
            return Err(StageError::new(
                Stage::Handoff,
                "continuing a finished bootstrap",
                nestbox_common::error::NestboxError::Config {
                    message: "no stages left to run".into(),
                },
            ));
        };

        tracing::info!(%stage, "entering stage");
        if stage == Stage::Handoff {
            let handoff = Handoff::shell(&self.config.shell)
                .stage(stage, &format!("preparing {}", self.config.shell.display()))?;
            return Ok(Step::Handoff(handoff));
        }

        self.run_stage(stage)?;
        self.next = stage.next();
        Ok(Step::Completed(stage))
    }

    /// Runs stages in order up to and including `last`.
    ///
    /// Stops before the handoff even when `last` is [`Stage::Handoff`].
    ///
    /// # Errors
    ///
    /// Returns the [`StageError`] of the first stage that fails.
    pub fn run_through(&mut self, last: Stage) -> Result<(), StageError> {
        while let Some(stage) = self.next {
            if stage > last || stage == Stage::Handoff {
                break;
            }
            let _ = self.step()?;
        }
        Ok(())
    }

    /// Runs the whole sequence and replaces the process with the shell.
    ///
    /// # Errors
    ///
    /// Returns the first [`StageError`]; on success this never returns.
    pub fn run(mut self) -> Result<Infallible, StageError> {
        loop {
            if let Step::Handoff(handoff) = self.step()? {
                let Self { host, layout, .. } = self;
                let shell = handoff.path();
                let action = format!("executing {}", shell.display());
                let expected = layout.lower.join(shell.strip_prefix("/").unwrap_or(shell));
                let hint = format!("does {} exist?", expected.display());
                return handoff
                    .exec(&host)
                    .stage(Stage::Handoff, &action)
                    .map_err(|err| err.with_hint(hint));
            }
        }
    }

    fn run_stage(&self, stage: Stage) -> Result<(), StageError> {
        let host: &dyn Host = &self.host;
        match stage {
            Stage::Hostname => host
                .set_hostname(&self.config.hostname)
                .stage(stage, "setting hostname"),
            Stage::ResourceGroup => self.register_resource_group(stage),
            Stage::OverlayReset => self
                .layout
                .reset(host)
                .stage(stage, "resetting overlay workspace"),
            Stage::ProcMount => {
                let proc_dir = self.layout.proc_dir();
                host.create_dir_all(&proc_dir, DIR_MODE)
                    .stage(stage, "creating proc mount point in lower layer")?;
                host.mount(&MountOperation::proc(&proc_dir))
                    .stage(stage, "mounting proc")
            }
            Stage::RootBind => {
                host.chdir(&self.layout.base)
                    .stage(stage, "changing directory to overlay base")?;
                host.mount(&MountOperation::recursive_bind(
                    &self.layout.lower,
                    &self.layout.lower,
                ))
                .stage(stage, "bind-mounting lower layer as rootfs")
            }
            Stage::OldRootReceptacle => host
                .create_dir_all(&self.layout.old_root_receptacle(), DIR_MODE)
                .stage(stage, "creating oldrootfs in lower layer"),
            Stage::OverlayMount => {
                overlayfs::mount_overlay(host, &self.layout).stage(stage, "mounting overlayfs")
            }
            Stage::PivotRoot => {
                host.chdir(&self.layout.base)
                    .stage(stage, "changing directory to overlay base")?;
                host.pivot_root(&self.layout.merged, &self.layout.put_old())
                    .stage(stage, "pivoting root")
            }
            Stage::DetachOldRoot => {
                let old_root = Path::new("/").join(OLD_ROOT_DIR);
                host.unmount_detach(&old_root)
                    .stage(stage, "unmounting oldrootfs")?;
                host.remove_dir_all(&old_root)
                    .stage(stage, "removing oldrootfs")
            }
            Stage::EnterNewRoot => host
                .chdir(Path::new("/"))
                .stage(stage, "changing directory to /"),
            Stage::Handoff => Ok(()),
        }
    }

    fn register_resource_group(&self, stage: Stage) -> Result<(), StageError> {
        let host: &dyn Host = &self.host;
        let group = CgroupManager::create(host, &self.config.cgroup_root, &self.config.cgroup_name)
            .stage(stage, "creating resource group directory")?;
        group
            .add_process(host, host.current_pid())
            .stage(stage, "registering process in resource group")?;
        group
            .set_cpu_quota(host, self.config.cpu_quota_us)
            .stage(stage, "setting CPU quota")
    }
}
