//! Build targets - nodes of the build graph.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::builder::errors::BuildError;
use crate::core::artifact::{ArtifactHandle, ArtifactKind};

/// Identity of a target, unique within one build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(String);

impl TargetId {
    /// Identity for a versioned node (`name@version`).
    pub fn new(name: &str, version: &str) -> Self {
        TargetId(format!("{}@{}", name, version))
    }

    /// Identity from a bare name.
    pub fn named(name: impl Into<String>) -> Self {
        TargetId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Artifacts produced by a successfully built target.
pub type Outputs = Arc<Vec<Arc<ArtifactHandle>>>;

/// Outputs of the direct dependencies of a target, handed to its build action.
#[derive(Debug, Clone, Default)]
pub struct BuildInputs {
    outputs: HashMap<TargetId, Outputs>,
}

impl BuildInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: TargetId, outputs: Outputs) {
        self.outputs.insert(id, outputs);
    }

    /// All outputs of one dependency.
    pub fn outputs(&self, id: &TargetId) -> Option<&Outputs> {
        self.outputs.get(id)
    }

    /// The first artifact of the given kind produced by a dependency.
    pub fn artifact(&self, id: &TargetId, kind: ArtifactKind) -> Option<Arc<ArtifactHandle>> {
        self.outputs
            .get(id)?
            .iter()
            .find(|h| h.kind == kind)
            .cloned()
    }
}

/// A node in the build graph.
///
/// Implementations must keep `dependencies` pure and stable for the whole run.
/// The executor calls `build` at most once per run, and only after every
/// dependency succeeded.
pub trait BuildTarget: Send + Sync {
    /// Unique identity of this target.
    fn id(&self) -> TargetId;

    /// Direct dependencies, in declaration order.
    fn dependencies(&self) -> Vec<TargetId>;

    /// Perform the action and report completion.
    fn build(&self, inputs: &BuildInputs) -> Result<Vec<Arc<ArtifactHandle>>, BuildError>;
}

/// Lifecycle of a target within one run.
#[derive(Debug, Clone)]
pub enum TargetState {
    Pending,
    Building,
    Succeeded(Outputs),
    Failed(BuildError),
}

impl TargetState {
    /// Whether the state is final for the rest of the run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TargetState::Succeeded(_) | TargetState::Failed(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetState::Pending => "pending",
            TargetState::Building => "building",
            TargetState::Succeeded(_) => "succeeded",
            TargetState::Failed(_) => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_id_format() {
        let id = TargetId::new("com.gulachek.gtree", "0.1.0");
        assert_eq!(id.as_str(), "com.gulachek.gtree@0.1.0");
        assert_eq!(id.to_string(), "com.gulachek.gtree@0.1.0");
    }

    #[test]
    fn test_build_inputs_artifact_by_kind() {
        let id = TargetId::named("lib");
        let mut inputs = BuildInputs::new();
        inputs.insert(
            id.clone(),
            Arc::new(vec![
                Arc::new(ArtifactHandle::executable("lib_test", "/out/lib_test")),
                Arc::new(ArtifactHandle::library("lib", "/out/liblib.a")),
            ]),
        );

        let lib = inputs.artifact(&id, ArtifactKind::Library).unwrap();
        assert_eq!(lib.name, "lib");
        assert!(inputs
            .artifact(&TargetId::named("other"), ArtifactKind::Library)
            .is_none());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TargetState::Pending.is_terminal());
        assert!(!TargetState::Building.is_terminal());
        assert!(TargetState::Succeeded(Arc::new(vec![])).is_terminal());
        assert!(TargetState::Failed(BuildError::NotBuilt {
            target: "x".to_string()
        })
        .is_terminal());
    }
}
