//! The ordered stages of the in-namespace bootstrap.

use std::fmt;

use nestbox_common::error::{NestboxError, render_chain};
use thiserror::Error;

/// One step of the initializer, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Set the UTS hostname.
    Hostname,
    /// Create the cgroup, join it and set the CPU quota.
    ResourceGroup,
    /// Remove stale overlay layers and recreate all four.
    OverlayReset,
    /// Mount `proc` inside the lower layer.
    ProcMount,
    /// Bind-mount the lower layer onto itself.
    RootBind,
    /// Create the directory that will hold the old root.
    OldRootReceptacle,
    /// Mount the overlay at `merged`.
    OverlayMount,
    /// `pivot_root` into the merged view.
    PivotRoot,
    /// Detach and remove the old root.
    DetachOldRoot,
    /// `chdir("/")` in the new root.
    EnterNewRoot,
    /// Replace the process image with the shell.
    Handoff,
}

impl Stage {
    /// All stages in the order they run.
    pub const ALL: [Self; 11] = [
        Self::Hostname,
        Self::ResourceGroup,
        Self::OverlayReset,
        Self::ProcMount,
        Self::RootBind,
        Self::OldRootReceptacle,
        Self::OverlayMount,
        Self::PivotRoot,
        Self::DetachOldRoot,
        Self::EnterNewRoot,
        Self::Handoff,
    ];

    /// Position in [`Stage::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The stage that runs after this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Hostname => "hostname",
            Self::ResourceGroup => "resource-group",
            Self::OverlayReset => "overlay-reset",
            Self::ProcMount => "proc-mount",
            Self::RootBind => "root-bind",
            Self::OldRootReceptacle => "old-root-receptacle",
            Self::OverlayMount => "overlay-mount",
            Self::PivotRoot => "pivot-root",
            Self::DetachOldRoot => "detach-old-root",
            Self::EnterNewRoot => "enter-new-root",
            Self::Handoff => "handoff",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fatal failure of one stage, with what was being attempted.
#[derive(Debug, Error)]
#[error("{action} failed")]
pub struct StageError {
    /// Stage that failed.
    pub stage: Stage,
    /// What the stage was attempting.
    pub action: String,
    /// Underlying failure.
    #[source]
    pub source: NestboxError,
    /// Suggestion shown after the cause.
    pub hint: Option<String>,
}

impl StageError {
    /// Wraps `source` as a failure of `action` within `stage`.
    pub fn new(stage: Stage, action: impl Into<String>, source: NestboxError) -> Self {
        Self {
            stage,
            action: action.into(),
            source,
            hint: None,
        }
    }

    /// Attaches a suggestion for the user.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// One-line report: the action, its cause, then the hint if any.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        let line = render_chain(self);
        match &self.hint {
            Some(hint) => format!("{line}; {hint}"),
            None => line,
        }
    }
}

/// Attaches stage context to a core result.
pub(crate) trait StageContext<T> {
    /// Converts an error into a [`StageError`] for `stage`.
    fn stage(self, stage: Stage, action: &str) -> Result<T, StageError>;
}

impl<T> StageContext<T> for nestbox_common::error::Result<T> {
    fn stage(self, stage: Stage, action: &str) -> Result<T, StageError> {
        self.map_err(|source| StageError::new(stage, action, source))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn stages_are_listed_in_index_order() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
        assert_eq!(Stage::ALL.len(), 11);
    }

    #[test]
    fn next_walks_the_sequence_and_ends_at_handoff() {
        assert_eq!(Stage::Hostname.next(), Some(Stage::ResourceGroup));
        assert_eq!(Stage::PivotRoot.next(), Some(Stage::DetachOldRoot));
        assert_eq!(Stage::Handoff.next(), None);
    }

    #[test]
    fn ordering_follows_execution_order() {
        assert!(Stage::ResourceGroup < Stage::OverlayReset);
        assert!(Stage::PivotRoot < Stage::DetachOldRoot);
    }

    #[test]
    fn error_message_names_action_and_keeps_source() {
        let err = StageError::new(
            Stage::Hostname,
            "setting hostname",
            NestboxError::sys("sethostname", "container", std::io::Error::from_raw_os_error(1)),
        );
        assert_eq!(err.to_string(), "setting hostname failed");
        assert!(err.source().is_some());
    }

    #[test]
    fn diagnostic_puts_hint_after_cause() {
        let err = StageError::new(
            Stage::Handoff,
            "executing /bin/sh",
            NestboxError::sys("execve", "/bin/sh", std::io::Error::from_raw_os_error(2)),
        )
        .with_hint("does /root/overlayfs/lower/bin/sh exist?");
        let line = err.diagnostic();
        assert!(line.starts_with("executing /bin/sh failed: execve(/bin/sh) failed: "), "{line}");
        assert!(line.ends_with("; does /root/overlayfs/lower/bin/sh exist?"), "{line}");
        assert_eq!(line.matches("os error 2").count(), 1, "{line}");
    }

    #[test]
    fn diagnostic_without_hint_is_the_chain() {
        let err = StageError::new(
            Stage::EnterNewRoot,
            "changing directory to /",
            NestboxError::sys("chdir", "/", std::io::Error::from_raw_os_error(2)),
        );
        assert_eq!(err.diagnostic(), format!("changing directory to / failed: {}", err.source));
    }
}
