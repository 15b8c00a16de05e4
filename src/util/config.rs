//! Configuration file support for Berth.
//!
//! Berth reads two configuration file locations:
//! - Global: `~/.berth/config.toml` - User-wide defaults
//! - Project: `.berth/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config.
//!
//! Toolchain overrides are stored separately:
//! - Global: `~/.berth/toolchain.toml`
//! - Project: `.berth/toolchain.toml`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Berth configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// Install settings
    pub install: InstallConfig,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Default number of parallel jobs (None = auto-detect)
    pub jobs: Option<usize>,

    /// Default C++ standard version
    pub cpp_std: Option<String>,

    /// Build with the release profile by default
    pub release: bool,
}

/// Install-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Install prefix; `include/`, `lib/` and `libroot/` are created under it
    pub prefix: Option<PathBuf>,
}

/// Toolchain configuration for compiler overrides.
///
/// Kept in its own file (`toolchain.toml`) so switching compilers does not
/// touch the rest of the config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Toolchain settings
    pub toolchain: ToolchainSettings,
}

/// Toolchain settings for C/C++ compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Path to the C compiler (e.g., /usr/bin/clang)
    pub cc: Option<PathBuf>,

    /// Path to the C++ compiler (e.g., /usr/bin/clang++)
    pub cxx: Option<PathBuf>,

    /// Path to the archiver (e.g., /usr/bin/llvm-ar)
    pub ar: Option<PathBuf>,

    /// Additional C compiler flags
    pub cflags: Vec<String>,

    /// Additional C++ compiler flags
    pub cxxflags: Vec<String>,

    /// Additional linker flags
    pub ldflags: Vec<String>,
}

fn load_toml<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}: {}", what, path.display()))?;

    toml::from_str(&contents)
        .with_context(|| format!("failed to parse {}: {}", what, path.display()))
}

fn load_toml_or_default<T: DeserializeOwned + Default>(path: &Path, what: &str) -> T {
    if !path.exists() {
        return T::default();
    }
    load_toml(path, what).unwrap_or_else(|e| {
        tracing::warn!("Failed to load {} from {}: {:#}", what, path.display(), e);
        T::default()
    })
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        load_toml(path, "config file")
    }

    /// Load configuration with fallback to defaults if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        load_toml_or_default(path, "config")
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }
        if other.build.cpp_std.is_some() {
            self.build.cpp_std = other.build.cpp_std;
        }
        if other.build.release {
            self.build.release = true;
        }
        if other.install.prefix.is_some() {
            self.install.prefix = other.install.prefix;
        }
    }
}

impl ToolchainConfig {
    /// Load toolchain configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        load_toml(path, "toolchain config")
    }

    /// Load toolchain configuration with fallback to defaults.
    pub fn load_or_default(path: &Path) -> Self {
        load_toml_or_default(path, "toolchain config")
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: ToolchainConfig) {
        let other = other.toolchain;
        if other.cc.is_some() {
            self.toolchain.cc = other.cc;
        }
        if other.cxx.is_some() {
            self.toolchain.cxx = other.cxx;
        }
        if other.ar.is_some() {
            self.toolchain.ar = other.ar;
        }
        if !other.cflags.is_empty() {
            self.toolchain.cflags = other.cflags;
        }
        if !other.cxxflags.is_empty() {
            self.toolchain.cxxflags = other.cxxflags;
        }
        if !other.ldflags.is_empty() {
            self.toolchain.ldflags = other.ldflags;
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.berth/config.toml)
/// 2. Global config (~/.berth/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();
    config.merge(Config::load_or_default(global_path));
    config.merge(Config::load_or_default(project_path));
    config
}

/// Load merged toolchain configuration from global and project locations.
pub fn load_toolchain_config(global_path: &Path, project_path: &Path) -> ToolchainConfig {
    let mut config = ToolchainConfig::default();
    config.merge(ToolchainConfig::load_or_default(global_path));
    config.merge(ToolchainConfig::load_or_default(project_path));
    config
}

/// Get the global berth config directory (~/.berth).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".berth"))
}
