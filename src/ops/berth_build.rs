//! Implementation of `berth build` and `berth install`.
//!
//! The manifest is planned into a graph of at most two targets: the
//! composite library and, when declared, the nested build it depends on.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::builder::composite::{CompositeLibraryTarget, TestExecutable};
use crate::builder::env_scope::EnvScopeStack;
use crate::builder::errors::BuildError;
use crate::builder::executor::{BuildGraph, Rule};
use crate::builder::nested::{nested_install_dirs, NestedBuildDescriptor, NestedBuildInvoker};
use crate::builder::{BuildContext, Node};
use crate::core::artifact::{ArtifactHandle, ArtifactKind};
use crate::core::libroot::{InstallDirs, Libroot, LibrootRef, BUILD_DIR_ENV};
use crate::core::target::{BuildTarget, TargetId};
use crate::core::Workspace;
use crate::util::config::{global_config_dir, Config};
use crate::util::fs::glob_files;

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Build in release mode
    pub release: bool,

    /// Number of parallel jobs
    pub jobs: Option<usize>,
}

impl BuildOptions {
    /// Profile name selected by these options.
    pub fn profile(&self) -> &'static str {
        if self.release {
            "release"
        } else {
            "debug"
        }
    }
}

/// Artifacts produced by the default rule.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub library: Arc<ArtifactHandle>,
    pub test_executable: Option<Arc<ArtifactHandle>>,
}

/// Result of installing a library.
#[derive(Debug, Clone)]
pub struct InstallResult {
    /// The descriptor as written to the libroot index
    pub libroot: Libroot,

    /// Install-root handle pointing at the written descriptor
    pub root: Arc<ArtifactHandle>,
}

/// A planned build graph for one manifest.
pub struct BuildPlan {
    graph: BuildGraph<Node>,
    goal: TargetId,
}

impl BuildPlan {
    /// Plan the targets of the workspace's manifest.
    ///
    /// Fails with [`BuildError::MissingVersion`] when a nested dependency
    /// declares no version, before any process is spawned.
    pub fn new(ws: &Workspace, ctx: &BuildContext) -> Result<Self> {
        let manifest = ws.manifest();
        let root = manifest.manifest_dir();
        let mut nodes = Vec::new();

        let mut composite = CompositeLibraryTarget::new(
            manifest.name(),
            manifest.version_or_default(),
            Arc::clone(&ctx.toolchain),
            ctx.output_dir(),
        )
        .sources(glob_files(root, &manifest.library.sources)?)
        .api_def(manifest.library.api_def.clone())
        .link_kind(manifest.library.link);

        if let Some(include) = manifest.include_dir() {
            composite = composite.include(include);
        }

        if let Some(nested) = &manifest.nested {
            let version = nested.require_version()?.to_string();
            let nested_root = root.join(&nested.path);

            let mut desc = NestedBuildDescriptor::new(
                nested_root,
                nested_install_dirs(&ws.nested_install_dir(&nested.name), &ctx.nested_libroot_dir()),
                ws.nested_build_dir(&nested.name),
            )
            .inherit_libroot_path();
            if let Some(program) = &nested.program {
                desc = desc.program(program, nested.args.iter().map(Into::into).collect());
            }

            let invoker = NestedBuildInvoker::new(&nested.name, &version, desc);
            composite = composite.nested(
                invoker.id(),
                LibrootRef {
                    name: nested.name.clone(),
                    version,
                },
            );
            nodes.push(Node::from(invoker));
        }

        if let Some(test) = &manifest.test {
            composite = composite.test(TestExecutable {
                name: manifest.test_name(),
                sources: glob_files(root, &test.sources)?,
                requires: test.requires.clone(),
            });
        }

        let goal = composite.id();
        nodes.push(Node::from(composite));

        let graph = BuildGraph::new(nodes)?.jobs(ctx.jobs);
        tracing::debug!("Planned {} target(s) for `{}`", graph.len(), goal);

        Ok(BuildPlan { graph, goal })
    }

    pub fn goal(&self) -> &TargetId {
        &self.goal
    }

    pub fn graph(&self) -> &BuildGraph<Node> {
        &self.graph
    }

    /// The composite library at the root of the plan.
    pub fn composite(&self) -> Result<&CompositeLibraryTarget, BuildError> {
        self.graph
            .get(&self.goal)
            .and_then(Node::as_composite)
            .ok_or_else(|| BuildError::UnknownTarget {
                target: self.goal.to_string(),
            })
    }

    /// Rule building the library and its test executable.
    pub fn default_rule(&self) -> Result<Rule<'_, Node>, BuildError> {
        self.graph.rule(&self.goal)
    }

    /// Run the default rule.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        let outputs = self.default_rule()?.run()?;
        let progress = self.graph.progress();
        tracing::debug!(
            "Built {} of {} target(s)",
            progress.succeeded_count(),
            self.graph.len()
        );
        let find = |kind: ArtifactKind| outputs.iter().find(|h| h.kind == kind).cloned();

        let library = find(ArtifactKind::Library).ok_or_else(|| BuildError::NotBuilt {
            target: self.goal.to_string(),
        })?;
        Ok(BuildResult {
            library,
            test_executable: find(ArtifactKind::Executable),
        })
    }

    /// Run the default rule, then materialize the libroot into `dirs`.
    pub fn install(&self, dirs: &InstallDirs) -> Result<Libroot, BuildError> {
        let composite = self.composite()?;
        self.default_rule()?.then(|_| composite.install(dirs))
    }
}

/// Build the workspace.
pub fn build(ws: &Workspace, ctx: &BuildContext) -> Result<BuildResult> {
    ws.ensure_output_dir()?;
    let plan = BuildPlan::new(ws, ctx)?;
    Ok(plan.build()?)
}

/// Build the workspace and install its libroot.
///
/// The package version is checked first: installing an unversioned package
/// fails before any nested build is spawned.
pub fn install(ws: &Workspace, ctx: &BuildContext, dirs: &InstallDirs) -> Result<InstallResult> {
    ws.manifest().require_version()?;
    ws.ensure_output_dir()?;

    let plan = BuildPlan::new(ws, ctx)?;
    let libroot = plan
        .install(dirs)
        .with_context(|| format!("failed to install `{}`", ws.manifest().name()))?;
    let root = Arc::new(libroot.install_root(&dirs.libroot));

    Ok(InstallResult { libroot, root })
}

/// Scratch directory handed down by a parent build through `BERTH_BUILD_DIR`.
pub fn inherited_build_dir() -> Option<PathBuf> {
    let _env = EnvScopeStack::lock();
    std::env::var_os(BUILD_DIR_ENV).map(PathBuf::from)
}

/// Where `berth install` puts its output.
///
/// Destinations handed down by a parent build win, then `install.prefix`
/// from the config, then `~/.berth`.
pub fn resolve_install_dirs(ws: &Workspace, config: &Config) -> Result<InstallDirs> {
    let from_env = {
        let _env = EnvScopeStack::lock();
        InstallDirs::from_env()
    };
    if let Some(dirs) = from_env {
        tracing::debug!("Installing into parent-provided {}", dirs.libroot.display());
        return Ok(dirs);
    }

    let prefix: PathBuf = match &config.install.prefix {
        Some(prefix) => ws.root().join(prefix),
        None => global_config_dir()
            .context("could not determine the home directory; set `install.prefix`")?,
    };
    Ok(InstallDirs::under(&prefix))
}
