//! Structural views of files.
//!
//! Every parse produces two representations: the stub tree, a skeleton of the
//! declarations that is cheap to keep and persist, and the full syntax tree,
//! which is attached to a view only while something needs it.

mod ast;
mod element_kind;
mod language;
mod path;
mod stub;
mod table;
mod view;

use std::sync::Arc;

pub use ast::AstTree;
pub use element_kind::{ElementKind, is_stub_kind};
pub use language::Language;
pub use path::{NodePath, PathStep};
pub use stub::StubTree;
pub use table::{NodeData, NodeTable};
pub use view::{AstLoader, Element, ElementId, FileView};

use crate::project::ProjectError;

/// Parse `text` as `language` into its stub tree and full syntax tree.
pub fn parse_file(
    language: Language,
    text: &str,
) -> Result<(Arc<StubTree>, Arc<AstTree>), ProjectError> {
    let parse = language.parse(text);
    let stubs = StubTree::build(&parse.syntax(), language);
    let ast = AstTree::build(parse.green, &stubs)?;
    Ok((Arc::new(stubs), Arc::new(ast)))
}
