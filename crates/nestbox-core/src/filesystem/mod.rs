//! Filesystem management for container isolation.
//!
//! Provides the ordered mount operations, the `OverlayFS` layer layout, and
//! `pivot_root` for switching into the assembled root filesystem.

pub mod mount;
pub mod overlayfs;
pub mod pivot_root;
