//! Composite library target.
//!
//! Combines the artifact of a nested build with locally compiled sources into
//! one library, links a test executable against it, and exposes the libroot
//! descriptor used to install the result.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use crate::builder::errors::BuildError;
use crate::builder::toolchain::{ExecutableDescriptor, LibraryDescriptor, Toolchain};
use crate::core::artifact::{ArtifactHandle, ArtifactKind, LinkKind};
use crate::core::libroot::{InstallDirs, Libroot, LibrootRef};
use crate::core::manifest::Requirement;
use crate::core::target::{BuildInputs, BuildTarget, TargetId};

/// Test executable built alongside the library.
#[derive(Debug, Clone)]
pub struct TestExecutable {
    pub name: String,
    pub sources: Vec<PathBuf>,
    /// Prebuilt libraries (typically an assertion framework)
    pub requires: Vec<Requirement>,
}

/// A library built from local sources on top of an optional nested dependency.
pub struct CompositeLibraryTarget {
    name: String,
    version: String,
    toolchain: Arc<dyn Toolchain>,
    output_dir: PathBuf,

    nested: Option<(TargetId, LibrootRef)>,
    sources: Vec<PathBuf>,
    include_dir: Option<PathBuf>,
    api_def: Option<String>,
    link: LinkKind,
    test: Option<TestExecutable>,

    libroot: OnceLock<Libroot>,
    /// Installs done this run, by destination
    installed: Mutex<HashMap<InstallDirs, Libroot>>,
}

impl std::fmt::Debug for CompositeLibraryTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeLibraryTarget")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("nested", &self.nested)
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}

impl CompositeLibraryTarget {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        toolchain: Arc<dyn Toolchain>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        CompositeLibraryTarget {
            name: name.into(),
            version: version.into(),
            toolchain,
            output_dir: output_dir.into(),
            nested: None,
            sources: Vec::new(),
            include_dir: None,
            api_def: None,
            link: LinkKind::Static,
            test: None,
            libroot: OnceLock::new(),
            installed: Mutex::new(HashMap::new()),
        }
    }

    /// Depend on the library produced by a nested build target.
    pub fn nested(mut self, target: TargetId, library: LibrootRef) -> Self {
        self.nested = Some((target, library));
        self
    }

    pub fn sources(mut self, sources: impl IntoIterator<Item = PathBuf>) -> Self {
        self.sources.extend(sources);
        self
    }

    pub fn include(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dir = Some(dir.into());
        self
    }

    pub fn api_def(mut self, api_def: Option<String>) -> Self {
        self.api_def = api_def;
        self
    }

    /// Linkage recorded for consumers of the installed library.
    pub fn link_kind(mut self, link: LinkKind) -> Self {
        self.link = link;
        self
    }

    pub fn test(mut self, test: TestExecutable) -> Self {
        self.test = Some(test);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Installable descriptor of the built library.
    ///
    /// Fails with [`BuildError::NotBuilt`] until the target built successfully.
    pub fn libroot(&self) -> Result<Libroot, BuildError> {
        self.libroot.get().cloned().ok_or_else(|| BuildError::NotBuilt {
            target: self.id().to_string(),
        })
    }

    /// Materialize the libroot into `dirs`.
    ///
    /// Installs are cached per destination: installing into the same `dirs`
    /// again returns the first result without copying again.
    pub fn install(&self, dirs: &InstallDirs) -> Result<Libroot, BuildError> {
        let libroot = self.libroot()?;

        let mut installed = self.installed.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = installed.get(dirs) {
            return Ok(cached.clone());
        }

        let result = libroot.materialize(dirs)?;
        tracing::info!(
            "Installed `{}` {} into {}",
            self.name,
            self.version,
            dirs.libroot.display()
        );
        installed.insert(dirs.clone(), result.clone());
        Ok(result)
    }

    fn dependency_handle(&self, inputs: &BuildInputs) -> Result<Option<Arc<ArtifactHandle>>, BuildError> {
        let Some((id, _)) = &self.nested else {
            return Ok(None);
        };
        inputs
            .artifact(id, ArtifactKind::Library)
            .map(Some)
            .ok_or_else(|| BuildError::NotBuilt {
                target: id.to_string(),
            })
    }

    fn build_library(&self, dependency: Option<Arc<ArtifactHandle>>) -> Result<ArtifactHandle, BuildError> {
        let mut desc = LibraryDescriptor::new(&self.name, &self.version, &self.output_dir)
            .sources(self.sources.iter().cloned());
        if let Some(dir) = &self.include_dir {
            desc = desc.include(dir);
        }
        if let Some(api_def) = &self.api_def {
            desc = desc.api_def(api_def);
        }
        if let Some(dep) = dependency {
            desc = desc.link(dep);
        }

        tracing::info!("Compiling library `{}` {}", self.name, self.version);
        self.toolchain.compile_library(&desc)
    }

    fn build_test(&self, test: &TestExecutable, library: &Arc<ArtifactHandle>) -> Result<ArtifactHandle, BuildError> {
        let mut desc = ExecutableDescriptor::new(&test.name, &self.output_dir)
            .sources(test.sources.iter().cloned())
            .link(Arc::clone(library));

        for req in &test.requires {
            let handle = self.toolchain.require(&req.name, &req.version, req.link)?;
            desc = desc.link(Arc::new(handle));
        }

        tracing::info!("Linking test executable `{}`", test.name);
        self.toolchain.compile_executable(&desc)
    }

    fn describe(&self, library: &ArtifactHandle) -> Libroot {
        let include_dir = self
            .include_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join("include").join(&self.name));
        let library_file = (!self.sources.is_empty()).then(|| library.location.clone());

        Libroot {
            name: self.name.clone(),
            version: self.version.clone(),
            include_dir,
            library: library_file,
            link: self.link,
            defines: library.defines.clone(),
            requires: self.nested.iter().map(|(_, lib)| lib.clone()).collect(),
        }
    }
}

impl BuildTarget for CompositeLibraryTarget {
    fn id(&self) -> TargetId {
        TargetId::new(&self.name, &self.version)
    }

    fn dependencies(&self) -> Vec<TargetId> {
        self.nested.iter().map(|(id, _)| id.clone()).collect()
    }

    fn build(&self, inputs: &BuildInputs) -> Result<Vec<Arc<ArtifactHandle>>, BuildError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| BuildError::io(&self.output_dir, e))?;

        let dependency = self.dependency_handle(inputs)?;
        let library = Arc::new(self.build_library(dependency)?);

        let mut outputs = vec![Arc::clone(&library)];
        if let Some(test) = &self.test {
            outputs.push(Arc::new(self.build_test(test, &library)?));
        }

        let _ = self.libroot.set(self.describe(&library));
        Ok(outputs)
    }
}
