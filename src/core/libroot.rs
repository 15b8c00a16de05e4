//! Libroot descriptors and the cross-build libroot index.
//!
//! A libroot is a small TOML file describing an installed library: where its
//! headers and archive live and which other libroots it requires. Libroot
//! files are stored as `<index-dir>/<name>/<version>.toml`, and a build finds
//! them by searching every directory on `BERTH_LIBROOT_PATH`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::builder::errors::BuildError;
use crate::core::artifact::{ArtifactHandle, LinkKind};
use crate::util::fs::copy_dir_all;

/// Search path for libroot index directories.
pub const LIBROOT_PATH_ENV: &str = "BERTH_LIBROOT_PATH";

/// Install destination for headers.
pub const INSTALL_INCLUDE_DIR_ENV: &str = "BERTH_INSTALL_INCLUDE_DIR";

/// Install destination for libraries.
pub const INSTALL_LIB_DIR_ENV: &str = "BERTH_INSTALL_LIB_DIR";

/// Install destination for libroot descriptors.
pub const INSTALL_LIBROOT_DIR_ENV: &str = "BERTH_INSTALL_LIBROOT_DIR";

/// Scratch directory for a nested build.
pub const BUILD_DIR_ENV: &str = "BERTH_BUILD_DIR";

/// Reference from one libroot to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrootRef {
    pub name: String,
    pub version: String,
}

/// Installable description of a library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Libroot {
    pub name: String,
    pub version: String,

    /// Directory holding the public headers
    pub include_dir: PathBuf,

    /// Archive or shared object; absent for header-only libraries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<PathBuf>,

    #[serde(default)]
    pub link: LinkKind,

    /// Definitions consumers compile with
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defines: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<LibrootRef>,
}

impl Libroot {
    /// Load a libroot descriptor from a file.
    pub fn load(path: &Path) -> Result<Self, BuildError> {
        let contents = std::fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        toml::from_str(&contents).map_err(|e| BuildError::Io {
            path: path.display().to_string(),
            message: format!("invalid libroot descriptor: {}", e),
        })
    }

    /// Path of this descriptor inside an index directory.
    pub fn path_in(&self, index_dir: &Path) -> PathBuf {
        index_dir
            .join(&self.name)
            .join(format!("{}.toml", self.version))
    }

    /// Write the descriptor into an index directory, returning its path.
    pub fn save(&self, index_dir: &Path) -> Result<PathBuf, BuildError> {
        let path = self.path_in(index_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        let contents = toml::to_string_pretty(self).map_err(|e| BuildError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, contents).map_err(|e| BuildError::io(&path, e))?;
        Ok(path)
    }

    /// Install-root handle for this descriptor saved in `index_dir`.
    pub fn install_root(&self, index_dir: &Path) -> ArtifactHandle {
        let mut handle = ArtifactHandle::install_root(&self.name, self.path_in(index_dir))
            .with_include_dir(&self.include_dir)
            .with_link(self.link);
        for define in &self.defines {
            handle = handle.with_define(define);
        }
        handle
    }

    /// Copy headers and library into `dirs` and record the installed libroot.
    ///
    /// Returns the descriptor as written, with paths rewritten to the
    /// install locations.
    pub fn materialize(&self, dirs: &InstallDirs) -> Result<Libroot, BuildError> {
        if self.include_dir.is_dir() {
            copy_dir_all(&self.include_dir, &dirs.include).map_err(|e| BuildError::Io {
                path: self.include_dir.display().to_string(),
                message: format!("{:#}", e),
            })?;
        } else {
            std::fs::create_dir_all(&dirs.include).map_err(|e| BuildError::io(&dirs.include, e))?;
        }

        let library = match &self.library {
            Some(lib) => {
                std::fs::create_dir_all(&dirs.lib).map_err(|e| BuildError::io(&dirs.lib, e))?;
                let file_name = lib.file_name().ok_or_else(|| BuildError::Io {
                    path: lib.display().to_string(),
                    message: "library path has no file name".to_string(),
                })?;
                let dest = dirs.lib.join(file_name);
                std::fs::copy(lib, &dest).map_err(|e| BuildError::io(lib, e))?;
                Some(dest)
            }
            None => None,
        };

        let installed = Libroot {
            include_dir: dirs.include.clone(),
            library,
            ..self.clone()
        };
        let path = installed.save(&dirs.libroot)?;
        tracing::debug!("Installed libroot {}", path.display());

        Ok(installed)
    }
}

/// Install destinations for headers, libraries and libroot descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstallDirs {
    pub include: PathBuf,
    pub lib: PathBuf,
    pub libroot: PathBuf,
}

impl InstallDirs {
    /// Standard layout below a prefix.
    pub fn under(prefix: &Path) -> Self {
        InstallDirs {
            include: prefix.join("include"),
            lib: prefix.join("lib"),
            libroot: prefix.join("libroot"),
        }
    }

    /// Destinations handed down by a parent build, if all are set.
    pub fn from_env() -> Option<Self> {
        let var = |name| std::env::var_os(name).map(PathBuf::from);
        Some(InstallDirs {
            include: var(INSTALL_INCLUDE_DIR_ENV)?,
            lib: var(INSTALL_LIB_DIR_ENV)?,
            libroot: var(INSTALL_LIBROOT_DIR_ENV)?,
        })
    }
}

/// Ordered set of libroot index directories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibrootIndex {
    dirs: Vec<PathBuf>,
}

impl LibrootIndex {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        LibrootIndex { dirs }
    }

    /// Index described by `BERTH_LIBROOT_PATH`.
    ///
    /// The environment is shared process state; callers resolving on behalf
    /// of a nested build must hold the environment scope lock.
    pub fn from_env() -> Self {
        let dirs = std::env::var_os(LIBROOT_PATH_ENV)
            .map(|v| std::env::split_paths(&v).collect())
            .unwrap_or_default();
        LibrootIndex { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Find the descriptor file for `name` at `version`.
    pub fn find(&self, name: &str, version: &str) -> Option<PathBuf> {
        self.dirs
            .iter()
            .map(|dir| dir.join(name).join(format!("{}.toml", version)))
            .find(|path| path.is_file())
    }

    /// Load the descriptor for `name` at `version`.
    pub fn lookup(&self, name: &str, version: &str) -> Result<Libroot, BuildError> {
        match self.find(name, version) {
            Some(path) => Libroot::load(&path),
            None => Err(self.not_found(name, version)),
        }
    }

    /// Resolve `name` at `version` into a handle, following its requirements.
    pub fn resolve(&self, name: &str, version: &str) -> Result<ArtifactHandle, BuildError> {
        let mut visiting = HashSet::new();
        self.resolve_inner(name, version, &mut visiting)
    }

    fn resolve_inner(
        &self,
        name: &str,
        version: &str,
        visiting: &mut HashSet<(String, String)>,
    ) -> Result<ArtifactHandle, BuildError> {
        let key = (name.to_string(), version.to_string());
        if !visiting.insert(key.clone()) {
            return Err(BuildError::Cycle {
                target: format!("{}@{}", name, version),
            });
        }

        let libroot = self.lookup(name, version)?;
        let location = libroot
            .library
            .clone()
            .unwrap_or_else(|| libroot.include_dir.clone());

        let mut handle = ArtifactHandle::library(&libroot.name, location)
            .with_include_dir(&libroot.include_dir)
            .with_link(libroot.link);
        for define in &libroot.defines {
            handle = handle.with_define(define);
        }
        for req in &libroot.requires {
            let dep = self.resolve_inner(&req.name, &req.version, visiting)?;
            handle = handle.with_requirement(Arc::new(dep));
        }

        visiting.remove(&key);
        Ok(handle)
    }

    fn not_found(&self, name: &str, version: &str) -> BuildError {
        let searched = if self.dirs.is_empty() {
            format!("(empty {})", LIBROOT_PATH_ENV)
        } else {
            self.dirs
                .iter()
                .map(|d| d.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        BuildError::ArtifactNotFound {
            name: name.to_string(),
            version: version.to_string(),
            searched,
        }
    }
}
