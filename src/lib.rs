//! Berth - build-graph orchestration for C/C++ libraries
//!
//! This crate provides the core library functionality for Berth: a
//! dependency-ordered build graph, nested builds that run as separate
//! processes with a scoped environment, and the libroot index that
//! carries their artifacts back to the parent.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and mocks for Berth unit tests.
///
/// This module is only available when running tests. It provides a
/// recording toolchain and fixtures that simulate nested builds.
#[cfg(test)]
pub mod test_support;

pub use builder::BuildError;
pub use core::{manifest::Manifest, workspace::Workspace};
pub use util::context::GlobalContext;
