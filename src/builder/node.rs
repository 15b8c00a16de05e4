//! Graph nodes.
//!
//! The executor is generic over one node type; every kind of target a
//! manifest can produce is a variant here.

use std::sync::Arc;

use crate::builder::composite::CompositeLibraryTarget;
use crate::builder::errors::BuildError;
use crate::builder::nested::NestedBuildInvoker;
use crate::core::artifact::ArtifactHandle;
use crate::core::target::{BuildInputs, BuildTarget, TargetId};

/// A target in the build graph.
#[derive(Debug)]
pub enum Node {
    Nested(NestedBuildInvoker),
    Composite(CompositeLibraryTarget),
}

impl Node {
    pub fn as_composite(&self) -> Option<&CompositeLibraryTarget> {
        match self {
            Node::Composite(target) => Some(target),
            Node::Nested(_) => None,
        }
    }
}

impl BuildTarget for Node {
    fn id(&self) -> TargetId {
        match self {
            Node::Nested(target) => target.id(),
            Node::Composite(target) => target.id(),
        }
    }

    fn dependencies(&self) -> Vec<TargetId> {
        match self {
            Node::Nested(target) => target.dependencies(),
            Node::Composite(target) => target.dependencies(),
        }
    }

    fn build(&self, inputs: &BuildInputs) -> Result<Vec<Arc<ArtifactHandle>>, BuildError> {
        match self {
            Node::Nested(target) => target.build(inputs),
            Node::Composite(target) => target.build(inputs),
        }
    }
}

impl From<NestedBuildInvoker> for Node {
    fn from(target: NestedBuildInvoker) -> Self {
        Node::Nested(target)
    }
}

impl From<CompositeLibraryTarget> for Node {
    fn from(target: CompositeLibraryTarget) -> Self {
        Node::Composite(target)
    }
}
