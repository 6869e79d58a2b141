use std::fmt;

use crate::parser::SyntaxKind;

/// One step of a [`NodePath`]: the node kind and how many earlier siblings of
/// the same kind precede it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathStep {
    pub kind: SyntaxKind,
    pub ordinal: u32,
}

/// Position of a node relative to the file root, independent of offsets.
///
/// Two textually identical siblings get different paths, which is what lets a
/// reformatted file map anchors back onto "the same" declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath {
    steps: Vec<PathStep>,
}

impl NodePath {
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn last(&self) -> Option<&PathStep> {
        self.steps.last()
    }

    pub fn depth(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of leading steps shared with `other`.
    pub fn common_prefix(&self, other: &NodePath) -> usize {
        self.steps
            .iter()
            .zip(&other.steps)
            .take_while(|(a, b)| a == b)
            .count()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{:?}[{}]", step.kind, step.ordinal)?;
        }
        Ok(())
    }
}
