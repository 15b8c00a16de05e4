//! Build error taxonomy.
//!
//! Every failure is terminal for the affected subtree; nothing here is
//! retried internally.

use miette::Diagnostic;
use thiserror::Error;

/// Error produced by a build target or the graph executor.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum BuildError {
    #[error("`{target}` was skipped because its dependency `{dependency}` failed")]
    #[diagnostic(code(berth::build::dependency_failed))]
    DependencyFailed { target: String, dependency: String },

    #[error("nested build of `{name}` failed with exit code {code}")]
    #[diagnostic(
        code(berth::build::nested_failed),
        help("the nested build's own output above shows the underlying error")
    )]
    NestedBuildFailed { name: String, code: i32 },

    #[error("nested build of `{name}` was terminated by a signal")]
    #[diagnostic(code(berth::build::nested_terminated))]
    NestedBuildTerminated { name: String },

    #[error("failed to start nested build of `{name}` (`{program}`): {message}")]
    #[diagnostic(
        code(berth::build::nested_spawn),
        help("check the `program` entry of the [nested] table")
    )]
    NestedBuildSpawn {
        name: String,
        program: String,
        message: String,
    },

    #[error("no libroot for `{name}` {version} in {searched}")]
    #[diagnostic(
        code(berth::build::artifact_not_found),
        help("the producing build reported success but did not install where expected; this is an install path bug")
    )]
    ArtifactNotFound {
        name: String,
        version: String,
        searched: String,
    },

    #[error("`{target}` has not been built")]
    #[diagnostic(code(berth::build::not_built))]
    NotBuilt { target: String },

    #[error("no version configured for {what}")]
    #[diagnostic(
        code(berth::config::missing_version),
        help("add a `version` entry to Berth.toml")
    )]
    MissingVersion { what: String },

    #[error("invalid version `{version}` for {what}: {message}")]
    #[diagnostic(code(berth::config::invalid_version))]
    InvalidVersion {
        what: String,
        version: String,
        message: String,
    },

    #[error("{message}")]
    #[diagnostic(code(berth::build::toolchain))]
    Toolchain { target: String, message: String },

    #[error("dependency cycle detected involving `{target}`")]
    #[diagnostic(code(berth::graph::cycle))]
    Cycle { target: String },

    #[error("unknown target `{target}`")]
    #[diagnostic(code(berth::graph::unknown_target))]
    UnknownTarget { target: String },

    #[error("I/O error at {path}: {message}")]
    #[diagnostic(code(berth::io))]
    Io { path: String, message: String },
}

impl BuildError {
    /// Wrap an I/O error with the path it occurred at.
    pub fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        BuildError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}
