//! Artifact handles - references to build outputs.
//!
//! A handle is produced by exactly one target and shared read-only with every
//! consumer that links against it.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The kind of output a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// A compiled (or header-only) library
    Library,
    /// A linked executable
    Executable,
    /// An installable root (libroot descriptor)
    InstallRoot,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Library => "library",
            ArtifactKind::Executable => "executable",
            ArtifactKind::InstallRoot => "install-root",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a library is linked into its consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    #[default]
    Static,
    Dynamic,
}

/// Reference to a build output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    /// Kind of output
    pub kind: ArtifactKind,

    /// Logical name (library or executable name)
    pub name: String,

    /// Primary filesystem location.
    ///
    /// For a compiled library this is the archive or shared object, for a
    /// header-only library the include directory, for an executable the binary.
    pub location: PathBuf,

    /// Header directories consumers must add to their include path
    pub include_dirs: Vec<PathBuf>,

    /// Preprocessor definitions consumers must compile with
    pub defines: Vec<String>,

    /// Linkage of `location` when it is a library
    pub link: LinkKind,

    /// Direct link requirements
    pub requirements: Vec<Arc<ArtifactHandle>>,
}

impl ArtifactHandle {
    /// Create a library handle.
    pub fn library(name: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        Self::new(ArtifactKind::Library, name, location)
    }

    /// Create an executable handle.
    pub fn executable(name: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        Self::new(ArtifactKind::Executable, name, location)
    }

    /// Create an install-root handle.
    pub fn install_root(name: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        Self::new(ArtifactKind::InstallRoot, name, location)
    }

    fn new(kind: ArtifactKind, name: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        ArtifactHandle {
            kind,
            name: name.into(),
            location: location.into(),
            include_dirs: Vec::new(),
            defines: Vec::new(),
            link: LinkKind::Static,
            requirements: Vec::new(),
        }
    }

    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    pub fn with_define(mut self, define: impl Into<String>) -> Self {
        self.defines.push(define.into());
        self
    }

    pub fn with_link(mut self, link: LinkKind) -> Self {
        self.link = link;
        self
    }

    /// Record a link requirement on another handle.
    pub fn with_requirement(mut self, other: Arc<ArtifactHandle>) -> Self {
        self.requirements.push(other);
        self
    }

    /// Get the primary location.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Whether `location` is a linkable file rather than a header directory.
    pub fn is_linkable(&self) -> bool {
        self.kind == ArtifactKind::Library && !self.location.is_dir()
    }

    /// All requirements reachable from this handle, in link order.
    ///
    /// A library precedes the libraries it depends on, and each handle
    /// appears once (at its last required position).
    pub fn transitive_requirements(&self) -> Vec<Arc<ArtifactHandle>> {
        let mut post_order = Vec::new();
        let mut seen = HashSet::new();
        for req in self.requirements.iter().rev() {
            collect_post_order(req, &mut seen, &mut post_order);
        }
        post_order.reverse();
        post_order
    }

    /// Include directories of this handle and every transitive requirement.
    pub fn all_include_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = self.include_dirs.clone();
        for req in self.transitive_requirements() {
            for dir in &req.include_dirs {
                if !dirs.contains(dir) {
                    dirs.push(dir.clone());
                }
            }
        }
        dirs
    }

    /// Defines of this handle and every transitive requirement.
    pub fn all_defines(&self) -> Vec<String> {
        let mut defines = self.defines.clone();
        for req in self.transitive_requirements() {
            for define in &req.defines {
                if !defines.contains(define) {
                    defines.push(define.clone());
                }
            }
        }
        defines
    }
}

fn collect_post_order(
    handle: &Arc<ArtifactHandle>,
    seen: &mut HashSet<(PathBuf, String)>,
    out: &mut Vec<Arc<ArtifactHandle>>,
) {
    if !seen.insert((handle.location.clone(), handle.name.clone())) {
        return;
    }
    for req in handle.requirements.iter().rev() {
        collect_post_order(req, seen, out);
    }
    out.push(Arc::clone(handle));
}
