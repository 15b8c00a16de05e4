//! Build context - toolchain, profile and output configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::builder::toolchain::{detect_toolchain, Toolchain};
use crate::core::Workspace;
use crate::util::config::{Config, ToolchainConfig};

/// C++ standard used when neither the config nor the CLI selects one.
pub const DEFAULT_CPP_STD: &str = "c++20";

/// Build context shared by every target of one run.
#[derive(Clone)]
pub struct BuildContext {
    /// Toolchain implementation
    pub toolchain: Arc<dyn Toolchain>,

    /// Profile name (`debug` or `release`)
    pub profile_name: String,

    /// Profile output directory
    pub output_dir: PathBuf,

    /// Workspace root
    pub workspace_root: PathBuf,

    /// Maximum parallel targets (None = one per core)
    pub jobs: Option<usize>,
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("toolchain", &self.toolchain.platform())
            .field("profile_name", &self.profile_name)
            .field("output_dir", &self.output_dir)
            .field("workspace_root", &self.workspace_root)
            .field("jobs", &self.jobs)
            .finish()
    }
}

impl BuildContext {
    /// Create a build context, detecting the toolchain.
    pub fn new(ws: &Workspace, config: &Config, toolchain_config: &ToolchainConfig) -> Result<Self> {
        let cpp_std = config
            .build
            .cpp_std
            .clone()
            .unwrap_or_else(|| DEFAULT_CPP_STD.to_string());

        let toolchain = detect_toolchain(&toolchain_config.toolchain)?
            .with_cpp_std(Some(cpp_std))
            .with_cflags(profile_flags(ws.is_release()));

        tracing::debug!(
            "Using {} toolchain ({})",
            toolchain.family.as_str(),
            toolchain.cxx.display()
        );

        Ok(Self::with_toolchain(ws, Arc::new(toolchain)).jobs(config.build.jobs))
    }

    /// Create a build context around an existing toolchain.
    pub fn with_toolchain(ws: &Workspace, toolchain: Arc<dyn Toolchain>) -> Self {
        BuildContext {
            toolchain,
            profile_name: ws.profile().to_string(),
            output_dir: ws.output_dir(),
            workspace_root: ws.root().to_path_buf(),
            jobs: None,
        }
    }

    /// Limit parallelism.
    pub fn jobs(mut self, jobs: Option<usize>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Shared libroot index for nested builds of this run.
    pub fn nested_libroot_dir(&self) -> PathBuf {
        self.output_dir.join("libroot")
    }
}

/// Compile flags selected by the profile.
pub fn profile_flags(release: bool) -> Vec<String> {
    if release {
        vec!["-O2".to_string(), "-DNDEBUG".to_string()]
    } else {
        vec!["-g".to_string()]
    }
}
