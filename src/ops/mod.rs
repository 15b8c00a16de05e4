//! High-level operations.
//!
//! This module contains the implementation of Berth commands.

pub mod berth_build;
pub mod berth_clean;

pub use berth_build::{
    build, inherited_build_dir, install, resolve_install_dirs, BuildOptions, BuildPlan,
    BuildResult, InstallResult,
};
pub use berth_clean::clean;
pub use berth_test::test;
