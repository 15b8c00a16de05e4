//! Berth.toml manifest parsing and schema.
//!
//! A manifest describes one composite library: its local sources, an
//! optional nested dependency built by a separate process, and a test
//! executable.
//!
//! ```toml
//! [package]
//! name = "com.example.wrapper"
//! version = "0.1.0"
//!
//! [library]
//! sources = ["src/**/*.cpp"]
//! include = "include"
//! api-def = "WRAPPER_API"
//!
//! [nested]
//! path = "deps/inner"
//! name = "com.example.inner"
//! version = "1.2.0"
//!
//! [test]
//! name = "wrapper-test"
//! sources = ["test/**/*.cpp"]
//! requires = [{ name = "doctest", version = "2.4.11" }]
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use semver::Version;
use serde::Deserialize;

use crate::builder::errors::BuildError;
use crate::core::artifact::LinkKind;

/// Canonical manifest file name.
pub const MANIFEST_NAME: &str = "Berth.toml";

/// Parsed Berth.toml.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub package: PackageMetadata,
    pub library: LibrarySection,
    pub nested: Option<NestedSection>,
    pub test: Option<TestSection>,

    /// Directory containing the manifest
    manifest_dir: PathBuf,
}

/// The `[package]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageMetadata {
    /// Package name, used as the library name
    pub name: String,

    /// Package version; only required when installing
    #[serde(default)]
    pub version: Option<String>,
}

/// The `[library]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LibrarySection {
    /// Source globs relative to the manifest directory
    pub sources: Vec<String>,

    /// Public include directory
    pub include: Option<PathBuf>,

    /// Macro marking the exported API, defined empty while compiling
    pub api_def: Option<String>,

    /// How consumers link the installed library
    pub link: LinkKind,
}

/// The `[nested]` section: a dependency built by a separate process.
#[derive(Debug, Clone, Deserialize)]
pub struct NestedSection {
    /// Source root of the nested build, relative to the manifest directory
    pub path: PathBuf,

    /// Name of the library the nested build installs
    pub name: String,

    /// Version of the library the nested build installs
    #[serde(default)]
    pub version: Option<String>,

    /// Program to run instead of `berth install`
    #[serde(default)]
    pub program: Option<PathBuf>,

    /// Arguments passed to `program`
    #[serde(default)]
    pub args: Vec<String>,
}

/// The `[test]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TestSection {
    /// Executable name; defaults to `<package>-test`
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub sources: Vec<String>,

    /// Prebuilt libraries resolved from the libroot path
    #[serde(default)]
    pub requires: Vec<Requirement>,
}

/// A prebuilt library required by the test executable.
#[derive(Debug, Clone, Deserialize)]
pub struct Requirement {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub link: LinkKind,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    package: Option<PackageMetadata>,

    #[serde(default)]
    library: LibrarySection,

    #[serde(default)]
    nested: Option<NestedSection>,

    #[serde(default)]
    test: Option<TestSection>,
}

impl Manifest {
    /// Load a manifest from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;

        Self::parse(&content, path)
    }

    /// Parse manifest content.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let raw: RawManifest = toml::from_str(content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let Some(package) = raw.package else {
            anyhow::bail!("manifest at {} is missing a [package] section", path.display());
        };

        if package.name.trim().is_empty() {
            anyhow::bail!("manifest at {} has an empty package name", path.display());
        }

        let manifest_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();

        Ok(Manifest {
            package,
            library: raw.library,
            nested: raw.nested,
            test: raw.test,
            manifest_dir,
        })
    }

    /// Package name.
    pub fn name(&self) -> &str {
        &self.package.name
    }

    /// Directory containing the manifest.
    pub fn manifest_dir(&self) -> &Path {
        &self.manifest_dir
    }

    /// Version string as written, or `"0.0.0"` when absent.
    ///
    /// Used only for target identity; installation goes through
    /// [`Manifest::require_version`].
    pub fn version_or_default(&self) -> &str {
        self.package.version.as_deref().unwrap_or("0.0.0")
    }

    /// The package version, required for installation.
    pub fn require_version(&self) -> Result<Version, BuildError> {
        parse_version(&self.package.name, self.package.version.as_deref())
    }

    /// Test executable name.
    pub fn test_name(&self) -> String {
        self.test
            .as_ref()
            .and_then(|t| t.name.clone())
            .unwrap_or_else(|| format!("{}-test", self.package.name))
    }

    /// Absolute public include directory of the library.
    pub fn include_dir(&self) -> Option<PathBuf> {
        self.library
            .include
            .as_ref()
            .map(|dir| self.manifest_dir.join(dir))
    }

    /// Absolute source root of the nested dependency.
    pub fn nested_root(&self) -> Option<PathBuf> {
        self.nested.as_ref().map(|n| self.manifest_dir.join(&n.path))
    }
}

impl NestedSection {
    /// The version the nested build must install.
    pub fn require_version(&self) -> Result<Version, BuildError> {
        parse_version(&self.name, self.version.as_deref())
    }
}

fn parse_version(what: &str, version: Option<&str>) -> Result<Version, BuildError> {
    let Some(version) = version else {
        return Err(BuildError::MissingVersion {
            what: what.to_string(),
        });
    };

    version.parse().map_err(|e: semver::Error| BuildError::InvalidVersion {
        what: what.to_string(),
        version: version.to_string(),
        message: e.to_string(),
    })
}
