//! Global context for Berth operations.
//!
//! Provides centralized access to configuration, paths, and environment.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;

use crate::core::manifest::MANIFEST_NAME;
use crate::util::config::{global_config_dir, load_config, load_toolchain_config, Config, ToolchainConfig};

/// Project directories for Berth
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("com", "berth", "berth"));

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global Berth data
    home: PathBuf,
}

impl GlobalContext {
    /// Create a new GlobalContext with defaults.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;

        let home = match PROJECT_DIRS.as_ref() {
            Some(dirs) => dirs.cache_dir().to_path_buf(),
            None => global_config_dir().unwrap_or_else(|| PathBuf::from(".berth")),
        };

        Ok(GlobalContext { cwd, home })
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let mut ctx = Self::new()?;
        ctx.cwd = cwd;
        Ok(ctx)
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the Berth home directory.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Get the project-local `.berth` directory for a project root.
    pub fn project_berth_dir(&self, root: &Path) -> PathBuf {
        root.join(".berth")
    }

    /// Load config merged from `~/.berth/config.toml` and the project.
    pub fn config(&self, root: &Path) -> Config {
        let global = global_config_dir()
            .map(|dir| dir.join("config.toml"))
            .unwrap_or_default();
        load_config(&global, &self.project_berth_dir(root).join("config.toml"))
    }

    /// Load toolchain overrides merged from `~/.berth/toolchain.toml` and the project.
    pub fn toolchain_config(&self, root: &Path) -> ToolchainConfig {
        let global = global_config_dir()
            .map(|dir| dir.join("toolchain.toml"))
            .unwrap_or_default();
        load_toolchain_config(&global, &self.project_berth_dir(root).join("toolchain.toml"))
    }

    /// Find Berth.toml starting from cwd and searching upward.
    pub fn find_manifest(&self) -> Result<PathBuf> {
        for dir in self.cwd.ancestors() {
            let candidate = dir.join(MANIFEST_NAME);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        bail!(
            "could not find `{}` in `{}` or any parent directory",
            MANIFEST_NAME,
            self.cwd.display()
        )
    }
}
