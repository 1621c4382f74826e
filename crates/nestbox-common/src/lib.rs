//! # nestbox-common
//!
//! Shared constants, the bootstrap configuration model, and error
//! definitions used across the nestbox workspace.
//!
//! This crate is the leaf of the dependency graph. It depends on no other
//! internal crate and carries no Linux-specific code.

pub mod config;
pub mod constants;
pub mod error;
