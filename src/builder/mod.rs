//! Build graph and the targets it runs.
//!
//! A composite library depends on a nested build; the executor orders them,
//! runs each once, and hands the nested artifact to the composite's compile
//! step.

pub mod composite;
pub mod context;
pub mod env_scope;
pub mod errors;
pub mod executor;
pub mod nested;
pub mod node;
pub mod toolchain;

pub use composite::{CompositeLibraryTarget, TestExecutable};
pub use context::BuildContext;
pub use env_scope::{EnvOverlay, EnvScopeStack};
pub use errors::BuildError;
pub use executor::{BuildGraph, Rule};
pub use nested::{NestedBuildDescriptor, NestedBuildInvoker};
pub use node::Node;
pub use toolchain::{detect_toolchain, GccToolchain, Toolchain, ToolchainPlatform};
