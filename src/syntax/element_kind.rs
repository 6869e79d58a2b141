use crate::parser::SyntaxKind;

/// Rebind category of a syntax kind. Each category has exactly one strategy
/// in the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// The file root.
    File,
    /// The import list of a file; there is at most one.
    ImportList,
    /// Named or structural declarations kept in the stub tree.
    Declaration,
    /// Everything else: blocks, statements, expressions. Needs the AST.
    Positional,
}

impl ElementKind {
    pub fn of(kind: SyntaxKind) -> Self {
        match kind {
            SyntaxKind::SOURCE_FILE | SyntaxKind::PLAIN_TEXT_FILE => ElementKind::File,
            SyntaxKind::IMPORT_LIST => ElementKind::ImportList,
            kind if is_stub_kind(kind) => ElementKind::Declaration,
            _ => ElementKind::Positional,
        }
    }

    pub fn is_stub_based(self) -> bool {
        !matches!(self, ElementKind::Positional)
    }
}

/// Kinds recorded in the stub tree.
pub fn is_stub_kind(kind: SyntaxKind) -> bool {
    matches!(
        kind,
        SyntaxKind::SOURCE_FILE
            | SyntaxKind::PLAIN_TEXT_FILE
            | SyntaxKind::IMPORT_LIST
            | SyntaxKind::IMPORT
            | SyntaxKind::CLASS
            | SyntaxKind::FUNCTION
            | SyntaxKind::FIELD
            | SyntaxKind::PARAM_LIST
            | SyntaxKind::PARAM
    )
}
