//! # nestbox-core
//!
//! Low-level Linux isolation primitives for the nestbox bootstrap.
//!
//! This crate provides safe abstractions over:
//! - **Namespaces**: the six-namespace request, user/group ID maps, UTS hostname.
//! - **Cgroups**: CPU controller group membership and CFS quota.
//! - **Filesystem**: mount operations, the `OverlayFS` layer layout and `pivot_root`.
//! - **Host**: the seam through which every kernel side effect is issued.
//!
//! System calls go through `nix` and surface as
//! [`nestbox_common::error::NestboxError`] values naming the failed call.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

#[cfg(not(target_os = "linux"))]
compile_error!("nestbox-core requires Linux: namespaces, cgroup v1, OverlayFS and pivot_root");

pub mod cgroup;
pub mod filesystem;
pub mod host;
pub mod namespace;
