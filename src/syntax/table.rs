//! Flat, thread-safe snapshot of a syntax tree.
//!
//! Rowan's red nodes are neither `Send` nor `Sync`, so views store their
//! structure as a table of plain nodes in preorder. Index 0 is always the file
//! root.

use rowan::{TextRange, WalkEvent};
use smol_str::SmolStr;
use tokio_util::sync::CancellationToken;

use super::path::{NodePath, PathStep};
use crate::parser::{SyntaxKind, SyntaxNode};
use crate::project::ProjectError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
    pub kind: SyntaxKind,
    pub range: TextRange,
    pub parent: Option<u32>,
    pub children: Vec<u32>,
    pub name: Option<SmolStr>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeTable {
    nodes: Vec<NodeData>,
}

impl NodeTable {
    /// Snapshot every node of `root` for which `include` holds. A kept node's
    /// parent is its nearest kept ancestor.
    pub fn build(root: &SyntaxNode, include: impl Fn(SyntaxKind) -> bool) -> Self {
        let mut nodes: Vec<NodeData> = Vec::new();
        let mut open: Vec<Option<u32>> = Vec::new();
        for event in root.preorder() {
            match event {
                WalkEvent::Enter(node) => {
                    if !include(node.kind()) {
                        open.push(None);
                        continue;
                    }
                    let index = nodes.len() as u32;
                    let parent = open.iter().rev().find_map(|slot| *slot);
                    if let Some(parent) = parent {
                        nodes[parent as usize].children.push(index);
                    }
                    nodes.push(NodeData {
                        kind: node.kind(),
                        range: node.text_range(),
                        parent,
                        children: Vec::new(),
                        name: node_name(&node),
                    });
                    open.push(Some(index));
                }
                WalkEvent::Leave(_) => {
                    open.pop();
                }
            }
        }
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&NodeData> {
        self.nodes.get(index as usize)
    }

    pub fn root(&self) -> Option<&NodeData> {
        self.nodes.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &NodeData)> {
        self.nodes.iter().enumerate().map(|(i, n)| (i as u32, n))
    }

    /// Position of `index` among the children of its parent.
    pub fn child_position(&self, index: u32) -> Option<usize> {
        let parent = self.get(index)?.parent?;
        self.nodes[parent as usize]
            .children
            .iter()
            .position(|&c| c == index)
    }

    pub fn path(&self, index: u32) -> NodePath {
        let mut steps = Vec::new();
        let mut current = index;
        while let Some(node) = self.get(current) {
            let ordinal = match node.parent {
                Some(parent) => self.nodes[parent as usize]
                    .children
                    .iter()
                    .take_while(|&&c| c != current)
                    .filter(|&&c| self.nodes[c as usize].kind == node.kind)
                    .count() as u32,
                None => 0,
            };
            steps.push(PathStep {
                kind: node.kind,
                ordinal,
            });
            match node.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        steps.reverse();
        NodePath::new(steps)
    }

    /// Follow `path` from the root.
    pub fn resolve_path(&self, path: &NodePath) -> Option<u32> {
        let mut steps = path.steps().iter();
        let first = steps.next()?;
        let root = self.root()?;
        if root.kind != first.kind {
            return None;
        }
        let mut current = 0u32;
        for step in steps {
            current = self.nodes[current as usize]
                .children
                .iter()
                .copied()
                .filter(|&c| self.nodes[c as usize].kind == step.kind)
                .nth(step.ordinal as usize)?;
        }
        Some(current)
    }

    /// Node of `kind` spanning exactly `range`, found by descending through
    /// the nodes that contain it.
    pub fn find_exact(
        &self,
        range: TextRange,
        kind: SyntaxKind,
        cancel: &CancellationToken,
    ) -> Result<Option<u32>, ProjectError> {
        self.descend(range, cancel, |node| node.kind == kind)
    }

    /// Outermost node of any kind spanning exactly `range`. The root only
    /// matches when no node below it does.
    pub fn find_outermost_exact(
        &self,
        range: TextRange,
        cancel: &CancellationToken,
    ) -> Result<Option<u32>, ProjectError> {
        let below_root = self.descend(range, cancel, |node| node.parent.is_some())?;
        Ok(below_root.or_else(|| self.root().filter(|root| root.range == range).map(|_| 0)))
    }

    fn descend(
        &self,
        range: TextRange,
        cancel: &CancellationToken,
        accept: impl Fn(&NodeData) -> bool,
    ) -> Result<Option<u32>, ProjectError> {
        let Some(root) = self.root() else {
            return Ok(None);
        };
        if !root.range.contains_range(range) {
            return Ok(None);
        }
        let mut stack = vec![0u32];
        while let Some(index) = stack.pop() {
            if cancel.is_cancelled() {
                return Err(ProjectError::Cancelled);
            }
            let node = &self.nodes[index as usize];
            if node.range == range && accept(node) {
                return Ok(Some(index));
            }
            // reversed so that siblings are visited in document order
            stack.extend(
                node.children
                    .iter()
                    .rev()
                    .copied()
                    .filter(|&c| self.nodes[c as usize].range.contains_range(range)),
            );
        }
        Ok(None)
    }

    /// Deepest node containing `range`; the root when nothing deeper does.
    pub fn find_innermost_covering(
        &self,
        range: TextRange,
        cancel: &CancellationToken,
    ) -> Result<Option<u32>, ProjectError> {
        let Some(root) = self.root() else {
            return Ok(None);
        };
        if !root.range.contains_range(range) {
            return Ok(None);
        }
        let mut current = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(ProjectError::Cancelled);
            }
            let next = self.nodes[current as usize]
                .children
                .iter()
                .copied()
                .find(|&c| self.nodes[c as usize].range.contains_range(range));
            match next {
                Some(child) => current = child,
                None => return Ok(Some(current)),
            }
        }
    }

    pub fn nodes_of_kind(&self, kind: SyntaxKind) -> impl Iterator<Item = u32> + '_ {
        self.iter()
            .filter(move |(_, n)| n.kind == kind)
            .map(|(i, _)| i)
    }
}

fn node_name(node: &SyntaxNode) -> Option<SmolStr> {
    match node.kind() {
        SyntaxKind::IMPORT => node
            .children()
            .find(|c| c.kind() == SyntaxKind::IMPORT_PATH)
            .map(|path| SmolStr::new(path.text().to_string())),
        _ => node
            .children()
            .find(|c| c.kind() == SyntaxKind::NAME)
            .and_then(|name| name.first_token())
            .map(|token| SmolStr::new(token.text())),
    }
}
