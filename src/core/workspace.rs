//! Workspace - the root manifest plus its output layout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::manifest::Manifest;

/// A workspace containing the root manifest and build paths.
#[derive(Debug)]
pub struct Workspace {
    manifest: Manifest,

    /// Directory containing Berth.toml
    root: PathBuf,

    /// Target directory for build outputs
    target_dir: PathBuf,

    /// Current build profile
    profile: String,
}

impl Workspace {
    /// Create a new workspace from a manifest path.
    pub fn new(manifest_path: &Path) -> Result<Self> {
        let manifest = Manifest::load(manifest_path)?;
        let root = manifest.manifest_dir().to_path_buf();
        let target_dir = root.join(".berth").join("target");

        Ok(Workspace {
            manifest,
            root,
            target_dir,
            profile: "debug".to_string(),
        })
    }

    /// Use a custom target directory.
    pub fn with_target_dir(mut self, target_dir: PathBuf) -> Self {
        self.target_dir = target_dir;
        self
    }

    /// Build into the scratch directory handed down by a parent build, if any.
    ///
    /// A nested build must not write into its source tree, which the parent
    /// does not own.
    pub fn with_build_dir(self, build_dir: Option<PathBuf>) -> Self {
        match build_dir {
            Some(dir) => {
                tracing::debug!("Building in parent-provided {}", dir.display());
                self.with_target_dir(dir)
            }
            None => self,
        }
    }

    /// Set the build profile.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Get the workspace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the target directory.
    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Get the profile-specific output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.target_dir.join(&self.profile)
    }

    /// Scratch directory handed to the nested build.
    pub fn nested_build_dir(&self, name: &str) -> PathBuf {
        self.output_dir().join("nested").join(name).join("build")
    }

    /// Private install prefix the nested build installs into.
    pub fn nested_install_dir(&self, name: &str) -> PathBuf {
        self.output_dir().join("nested").join(name).join("install")
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Check if building in release mode.
    pub fn is_release(&self) -> bool {
        self.profile == "release"
    }

    /// Get the .berth directory.
    pub fn berth_dir(&self) -> PathBuf {
        self.root.join(".berth")
    }

    /// Ensure the output directory exists.
    pub fn ensure_output_dir(&self) -> Result<()> {
        let output_dir = self.output_dir();
        std::fs::create_dir_all(&output_dir).with_context(|| {
            format!(
                "failed to create output directory: {}",
                output_dir.display()
            )
        })
    }
}
