//! Stub trees: the declaration skeleton of a file.
//!
//! A stub tree is what the project persists per file. It is enough to find
//! and rebind declarations without the document text or the full syntax tree.

use rowan::TextSize;

use super::element_kind::is_stub_kind;
use super::language::Language;
use super::table::NodeTable;
use crate::parser::SyntaxNode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubTree {
    language: Language,
    table: NodeTable,
}

impl StubTree {
    pub fn build(root: &SyntaxNode, language: Language) -> Self {
        Self {
            language,
            table: NodeTable::build(root, is_stub_kind),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn table(&self) -> &NodeTable {
        &self.table
    }

    /// Length of the text the stubs were built from.
    pub fn text_len(&self) -> TextSize {
        self.table
            .root()
            .map(|root| root.range.end())
            .unwrap_or_default()
    }
}
