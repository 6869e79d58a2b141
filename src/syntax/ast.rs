//! The full syntax tree of a view, loaded on demand.

use rowan::GreenNode;

use super::element_kind::is_stub_kind;
use super::stub::StubTree;
use super::table::NodeTable;
use crate::parser::SyntaxNode;
use crate::project::ProjectError;

#[derive(Debug)]
pub struct AstTree {
    green: GreenNode,
    table: NodeTable,
    stub_of: Vec<Option<u32>>,
    ast_of_stub: Vec<u32>,
}

impl AstTree {
    /// Build the node table of `green` and line it up with `stubs`.
    ///
    /// Fails with [`ProjectError::StaleView`] when the tree does not have the
    /// structure the stubs describe, which means the text changed.
    pub fn build(green: GreenNode, stubs: &StubTree) -> Result<Self, ProjectError> {
        let root = SyntaxNode::new_root(green.clone());
        let table = NodeTable::build(&root, |_| true);

        let mut stub_of = vec![None; table.len()];
        let mut ast_of_stub = Vec::with_capacity(stubs.table().len());
        let mut stub_nodes = stubs.table().iter();
        for (index, node) in table.iter().filter(|(_, n)| is_stub_kind(n.kind)) {
            let Some((stub, expected)) = stub_nodes.next() else {
                return Err(ProjectError::StaleView);
            };
            if expected.kind != node.kind || expected.range != node.range {
                return Err(ProjectError::StaleView);
            }
            stub_of[index as usize] = Some(stub);
            ast_of_stub.push(index);
        }
        if stub_nodes.next().is_some() {
            return Err(ProjectError::StaleView);
        }

        Ok(Self {
            green,
            table,
            stub_of,
            ast_of_stub,
        })
    }

    pub fn green(&self) -> &GreenNode {
        &self.green
    }

    pub fn table(&self) -> &NodeTable {
        &self.table
    }

    pub fn stub_of(&self, index: u32) -> Option<u32> {
        self.stub_of.get(index as usize).copied().flatten()
    }

    pub fn ast_of_stub(&self, stub: u32) -> Option<u32> {
        self.ast_of_stub.get(stub as usize).copied()
    }

    pub fn syntax_root(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.green.clone())
    }

    /// Red node for a table index, rebuilt from the root.
    pub fn syntax(&self, index: u32) -> Option<SyntaxNode> {
        let mut positions = Vec::new();
        let mut current = index;
        while let Some(parent) = self.table.get(current)?.parent {
            positions.push(self.table.child_position(current)?);
            current = parent;
        }
        let mut node = self.syntax_root();
        for position in positions.into_iter().rev() {
            node = node.children().nth(position)?;
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{SyntaxKind, parse};
    use crate::syntax::Language;

    #[test]
    fn test_stub_mapping() {
        let text = "class A { fn f() { return 1; } }";
        let parse = parse(text);
        let stubs = StubTree::build(&parse.syntax(), Language::Mini);
        let ast = AstTree::build(parse.green.clone(), &stubs).unwrap();
        for (stub, node) in stubs.table().iter() {
            let index = ast.ast_of_stub(stub).unwrap();
            let full = ast.table().get(index).unwrap();
            assert_eq!((full.kind, full.range, &full.name), (node.kind, node.range, &node.name));
            assert_eq!(ast.stub_of(index), Some(stub));
        }
        let (ret, _) = ast
            .table()
            .iter()
            .find(|(_, n)| n.kind == SyntaxKind::RETURN_STMT)
            .unwrap();
        assert_eq!(ast.stub_of(ret), None);
        assert_eq!(ast.syntax(ret).unwrap().text().to_string(), "return 1;");
    }

    #[test]
    fn test_mismatched_text_is_stale() {
        let stubs = StubTree::build(&parse("class A {}").syntax(), Language::Mini);
        let other = parse("class A {} class B {}");
        assert!(matches!(
            AstTree::build(other.green, &stubs),
            Err(ProjectError::StaleView)
        ));
    }
}
