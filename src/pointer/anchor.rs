//! Structural descriptors of anchored elements.

use smol_str::SmolStr;

use crate::base::FileId;
use crate::parser::SyntaxKind;
use crate::syntax::{Element, ElementKind, Language, NodePath, PathStep};

/// What a pointer remembers about its element, besides the tracked range.
///
/// Nothing here refers to a live tree, so an anchor survives reparses,
/// unloads and language changes of its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorInfo {
    pub kind: SyntaxKind,
    pub language: Language,
    pub path: NodePath,
    pub name: Option<SmolStr>,
    pub file: FileId,
}

impl AnchorInfo {
    pub fn for_element(element: &Element) -> Self {
        Self {
            kind: element.kind(),
            language: element.language(),
            path: element.path(),
            name: element.name(),
            file: element.file(),
        }
    }

    /// Anchor of a plain text range: the file root.
    pub fn for_file(file: FileId, language: Language) -> Self {
        let kind = language.root_kind();
        Self {
            kind,
            language,
            path: NodePath::new(vec![PathStep { kind, ordinal: 0 }]),
            name: None,
            file,
        }
    }

    pub fn element_kind(&self) -> ElementKind {
        ElementKind::of(self.kind)
    }
}
