//! Nested build invoker.
//!
//! A nested dependency is built by a separate process (by default another
//! `berth install` rooted at the dependency's source tree). The child learns
//! where to install through environment variables; once it exits
//! successfully, the installed library is resolved from the libroot index it
//! wrote into.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::builder::env_scope::{EnvOverlay, EnvScopeStack};
use crate::builder::errors::BuildError;
use crate::core::artifact::ArtifactHandle;
use crate::core::libroot::{
    InstallDirs, LibrootIndex, BUILD_DIR_ENV, INSTALL_INCLUDE_DIR_ENV, INSTALL_LIBROOT_DIR_ENV,
    INSTALL_LIB_DIR_ENV, LIBROOT_PATH_ENV,
};
use crate::core::target::{BuildInputs, BuildTarget, TargetId};
use crate::util::process::ProcessBuilder;

/// Everything needed to run one nested build.
#[derive(Debug, Clone)]
pub struct NestedBuildDescriptor {
    /// Source root of the nested build; the child's working directory
    pub cwd: PathBuf,

    /// Where the child installs headers, libraries and its libroot
    pub install: InstallDirs,

    /// Scratch directory owned by the child
    pub build_dir: PathBuf,

    pub program: PathBuf,
    pub args: Vec<OsString>,

    /// Libroot search path inherited from the parent
    pub inherited_libroot_path: Option<OsString>,
}

impl NestedBuildDescriptor {
    /// Describe a nested build that runs `berth install` in `cwd`.
    pub fn new(cwd: impl Into<PathBuf>, install: InstallDirs, build_dir: impl Into<PathBuf>) -> Self {
        let program = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("berth"));
        NestedBuildDescriptor {
            cwd: cwd.into(),
            install,
            build_dir: build_dir.into(),
            program,
            args: vec![OsString::from("install")],
            inherited_libroot_path: None,
        }
    }

    /// Run `program` with `args` instead of `berth install`.
    pub fn program(mut self, program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        self.program = program.into();
        self.args = args;
        self
    }

    /// Capture the parent's current libroot search path.
    pub fn inherit_libroot_path(mut self) -> Self {
        let _env = EnvScopeStack::lock();
        self.inherited_libroot_path = std::env::var_os(LIBROOT_PATH_ENV);
        self
    }

    /// Variables the nested build runs with.
    ///
    /// `BERTH_LIBROOT_PATH` searches the install libroot directory first so
    /// the freshly installed library shadows any older copy.
    pub fn overlay(&self) -> EnvOverlay {
        let mut search = vec![self.install.libroot.clone()];
        if let Some(inherited) = &self.inherited_libroot_path {
            search.extend(std::env::split_paths(inherited));
        }
        let libroot_path = std::env::join_paths(&search)
            .unwrap_or_else(|_| self.install.libroot.clone().into_os_string());

        EnvOverlay::new()
            .set(INSTALL_INCLUDE_DIR_ENV, &self.install.include)
            .set(INSTALL_LIB_DIR_ENV, &self.install.lib)
            .set(INSTALL_LIBROOT_DIR_ENV, &self.install.libroot)
            .set(BUILD_DIR_ENV, &self.build_dir)
            .set(LIBROOT_PATH_ENV, libroot_path)
    }

    fn command(&self, overlay: &EnvOverlay) -> ProcessBuilder {
        overlay.iter().fold(
            ProcessBuilder::new(&self.program)
                .args(&self.args)
                .cwd(&self.cwd),
            |cmd, (key, value)| cmd.env(key, value),
        )
    }
}

/// Build target that delegates to a separate build process.
#[derive(Debug)]
pub struct NestedBuildInvoker {
    name: String,
    version: String,
    descriptor: NestedBuildDescriptor,
    artifact: OnceLock<Arc<ArtifactHandle>>,
}

impl NestedBuildInvoker {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        descriptor: NestedBuildDescriptor,
    ) -> Self {
        NestedBuildInvoker {
            name: name.into(),
            version: version.into(),
            descriptor,
            artifact: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &NestedBuildDescriptor {
        &self.descriptor
    }

    /// The nested library, available only after a successful build.
    pub fn artifact(&self) -> Result<Arc<ArtifactHandle>, BuildError> {
        self.artifact.get().cloned().ok_or_else(|| BuildError::NotBuilt {
            target: self.id().to_string(),
        })
    }

    fn prepare_dirs(&self) -> Result<(), BuildError> {
        let desc = &self.descriptor;
        for dir in [
            &desc.build_dir,
            &desc.install.include,
            &desc.install.lib,
            &desc.install.libroot,
        ] {
            std::fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;
        }
        Ok(())
    }

    fn run(&self, overlay: &EnvOverlay) -> Result<(), BuildError> {
        let cmd = self.descriptor.command(overlay);
        tracing::debug!(
            "Running nested build `{}` in {}",
            cmd.display_command(),
            self.descriptor.cwd.display()
        );

        let status = cmd.status().map_err(|e| BuildError::NestedBuildSpawn {
            name: self.name.clone(),
            program: self.descriptor.program.display().to_string(),
            message: e.to_string(),
        })?;

        match status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(BuildError::NestedBuildFailed {
                name: self.name.clone(),
                code,
            }),
            None => Err(BuildError::NestedBuildTerminated {
                name: self.name.clone(),
            }),
        }
    }

    /// Resolve the installed library with the nested build's search path
    /// applied to the process environment.
    fn resolve(&self, overlay: &EnvOverlay) -> Result<ArtifactHandle, BuildError> {
        let mut env = EnvScopeStack::lock();
        env.with_scope(overlay, |_| {
            LibrootIndex::from_env().resolve(&self.name, &self.version)
        })
    }
}

impl BuildTarget for NestedBuildInvoker {
    fn id(&self) -> TargetId {
        TargetId::new(&self.name, &self.version)
    }

    fn dependencies(&self) -> Vec<TargetId> {
        Vec::new()
    }

    fn build(&self, _inputs: &BuildInputs) -> Result<Vec<Arc<ArtifactHandle>>, BuildError> {
        self.prepare_dirs()?;

        let overlay = self.descriptor.overlay();
        self.run(&overlay)?;

        let handle = Arc::new(self.resolve(&overlay)?);
        tracing::info!(
            "Resolved nested library `{}` at {}",
            self.name,
            handle.location().display()
        );

        let handle = self.artifact.get_or_init(|| handle);
        Ok(vec![Arc::clone(handle)])
    }
}

/// Standard install layout for a nested build rooted at `prefix`, sharing
/// `libroot` as its index directory.
pub fn nested_install_dirs(prefix: &Path, libroot: &Path) -> InstallDirs {
    InstallDirs {
        include: prefix.join("include"),
        lib: prefix.join("lib"),
        libroot: libroot.to_path_buf(),
    }
}
