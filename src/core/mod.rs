//! Core data structures for Berth.
//!
//! - Artifact handles shared between targets
//! - Target identity and the build-target contract
//! - Libroot descriptors and the index that resolves them
//! - Manifests and workspace layout

pub mod artifact;
pub mod libroot;
pub mod manifest;
pub mod target;
pub mod workspace;

pub use artifact::{ArtifactHandle, ArtifactKind, LinkKind};
pub use libroot::{InstallDirs, Libroot, LibrootIndex};
pub use manifest::{Manifest, MANIFEST_NAME};
pub use target::{BuildInputs, BuildTarget, TargetId, TargetState};
pub use workspace::Workspace;
