//! Toolchain abstraction for C/C++ compilers.
//!
//! The build core only talks to a compiler through the [`Toolchain`] trait:
//! compile a library or an executable from a descriptor, and resolve
//! a prebuilt library by name and version. Flag computation stays inside the
//! implementations.
//!
//! Toolchain detection priority:
//! 1. Toolchain config file (`.berth/toolchain.toml` or `~/.berth/toolchain.toml`)
//! 2. Environment variables (CC, CXX, AR)
//! 3. Auto-detection (searching PATH for common compilers)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::builder::env_scope::EnvScopeStack;
use crate::builder::errors::BuildError;
use crate::core::artifact::{ArtifactHandle, LinkKind};
use crate::core::libroot::LibrootIndex;

mod detect;
mod gcc;

pub use detect::{detect_compiler_family, detect_toolchain};
pub use gcc::GccToolchain;

/// Compiler family of a toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainPlatform {
    Gcc,
    Clang,
    AppleClang,
}

impl ToolchainPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolchainPlatform::Gcc => "gcc",
            ToolchainPlatform::Clang => "clang",
            ToolchainPlatform::AppleClang => "apple-clang",
        }
    }
}

/// Description of a library to compile.
#[derive(Debug, Clone)]
pub struct LibraryDescriptor {
    pub name: String,
    pub version: String,
    /// Source files; empty for a header-only library
    pub sources: Vec<PathBuf>,
    /// Public include directories
    pub include_dirs: Vec<PathBuf>,
    /// Macro marking the library's exported API
    pub api_def: Option<String>,
    /// Libraries this one links against
    pub links: Vec<Arc<ArtifactHandle>>,
    /// Directory owned by this library's build
    pub output_dir: PathBuf,
}

impl LibraryDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        LibraryDescriptor {
            name: name.into(),
            version: version.into(),
            sources: Vec::new(),
            include_dirs: Vec::new(),
            api_def: None,
            links: Vec::new(),
            output_dir: output_dir.into(),
        }
    }

    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }

    pub fn sources(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.sources.extend(paths);
        self
    }

    pub fn include(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    pub fn api_def(mut self, name: impl Into<String>) -> Self {
        self.api_def = Some(name.into());
        self
    }

    /// Record a link dependency on another library.
    pub fn link(mut self, handle: Arc<ArtifactHandle>) -> Self {
        self.links.push(handle);
        self
    }

    /// Definitions used while compiling the library and by its consumers.
    pub fn defines(&self) -> Vec<String> {
        self.api_def
            .iter()
            .map(|api| format!("{}=", api))
            .collect()
    }
}

/// Description of an executable to compile and link.
#[derive(Debug, Clone)]
pub struct ExecutableDescriptor {
    pub name: String,
    pub sources: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub links: Vec<Arc<ArtifactHandle>>,
    pub output_dir: PathBuf,
}

impl ExecutableDescriptor {
    pub fn new(name: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        ExecutableDescriptor {
            name: name.into(),
            sources: Vec::new(),
            include_dirs: Vec::new(),
            links: Vec::new(),
            output_dir: output_dir.into(),
        }
    }

    pub fn sources(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.sources.extend(paths);
        self
    }

    pub fn include(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    /// Record a link dependency on a library.
    pub fn link(mut self, handle: Arc<ArtifactHandle>) -> Self {
        self.links.push(handle);
        self
    }
}

/// Interface to a C/C++ compiler toolchain.
pub trait Toolchain: Send + Sync {
    /// Compiler family.
    fn platform(&self) -> ToolchainPlatform;

    /// Path to the C++ compiler driver.
    fn compiler_path(&self) -> &Path;

    /// Compile a library, producing its handle.
    fn compile_library(&self, desc: &LibraryDescriptor) -> Result<ArtifactHandle, BuildError>;

    /// Compile and link an executable, producing its handle.
    fn compile_executable(&self, desc: &ExecutableDescriptor)
        -> Result<ArtifactHandle, BuildError>;

    /// Resolve a prebuilt library from the libroot search path.
    fn require(&self, name: &str, version: &str, link: LinkKind) -> Result<ArtifactHandle, BuildError> {
        let index = {
            let _env = EnvScopeStack::lock();
            LibrootIndex::from_env()
        };
        tracing::debug!("Resolving `{}` {} from libroot path", name, version);
        let handle = index.resolve(name, version)?;
        Ok(handle.with_link(link))
    }
}
