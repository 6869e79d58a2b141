//! Rebinding anchors to elements of the current tree.
//!
//! Resolution commits pending edits of the file, takes its current view
//! (rebuilding it lazily if it was unloaded) and looks for the element at the
//! tracked range. Declarations are searched in the stub tree only; the full
//! syntax tree is loaded for positional elements and for files whose language
//! changed. A successful search heals the anchor: the tracked range, path and
//! kind are refreshed from the element found.

use std::sync::Arc;

use rowan::{TextRange, TextSize};
use tokio_util::sync::CancellationToken;

use super::anchor::AnchorInfo;
use super::smart_pointer::SmartPointer;
use crate::base::AnchorState;
use crate::parser::SyntaxKind;
use crate::project::file_entry::FileEntry;
use crate::project::{Project, ProjectError};
use crate::syntax::{Element, ElementKind, FileView, NodeTable};

impl Project {
    pub(crate) fn resolve_pointer(
        &self,
        pointer: &SmartPointer,
        cancel: &CancellationToken,
    ) -> Result<Option<Element>, ProjectError> {
        if pointer.is_disposed() {
            return Ok(None);
        }
        match self.rebind(pointer, cancel) {
            Err(ProjectError::UnknownFile(_) | ProjectError::FileDeleted(_)) => Ok(None),
            result => result,
        }
    }

    fn rebind(
        &self,
        pointer: &SmartPointer,
        cancel: &CancellationToken,
    ) -> Result<Option<Element>, ProjectError> {
        let file = pointer.file();
        let entry = self.entry(file)?;
        // The tracked range must be read in the coordinates of the view.
        let (view, range, state) = loop {
            if cancel.is_cancelled() {
                return Err(ProjectError::Cancelled);
            }
            if self.has_uncommitted(file) {
                self.commit_document(file)?;
            }
            let view = self.current_view(&entry)?;
            let file_state = entry.state.read();
            if file_state.has_uncommitted() || !file_state.is_current_view(&view) {
                continue;
            }
            if let Some(element) = pointer.cached(&view) {
                return Ok(Some(element));
            }
            let Some((range, state)) = pointer.0.tracker.tracked(pointer.0.slot) else {
                return Ok(None);
            };
            break (view, range, state);
        };
        if state == AnchorState::Deleted {
            tracing::trace!(%file, kind = ?pointer.kind(), "anchored text was deleted");
            return Ok(None);
        }
        if pointer.is_range_pointer() {
            let root = Element::root(view);
            pointer.set_cache(&root);
            return Ok(Some(root));
        }

        let anchor = pointer.anchor();
        if anchor.language != view.language() {
            return self.reinterpret(pointer, &entry, view, range, cancel);
        }

        let found = match anchor.element_kind() {
            ElementKind::File => Some(Element::root(view)),
            ElementKind::ImportList => import_list(&view),
            ElementKind::Declaration => find_declaration(&view, &anchor, range, cancel)?,
            ElementKind::Positional => find_positional(&view, &anchor, range, cancel)?,
        };
        match found {
            Some(element) => {
                self.heal(pointer, &entry, &element);
                Ok(Some(element))
            }
            None => {
                tracing::trace!(%file, kind = ?anchor.kind, path = %anchor.path, ?state, "anchor did not rebind");
                self.inner.pointers.unregister(pointer);
                Ok(None)
            }
        }
    }

    /// The file is now parsed as another language, so kinds and paths mean
    /// nothing. Take whatever covers the tracked range.
    fn reinterpret(
        &self,
        pointer: &SmartPointer,
        entry: &Arc<FileEntry>,
        view: Arc<FileView>,
        range: TextRange,
        cancel: &CancellationToken,
    ) -> Result<Option<Element>, ProjectError> {
        let ast = view.ast()?;
        if let Some(index) = ast.table().find_outermost_exact(range, cancel)? {
            let element = Element::from_ast(view, ast, index);
            tracing::trace!(file = %pointer.file(), old = ?pointer.kind(), new = ?element.kind(), "anchor reinterpreted");
            self.heal(pointer, entry, &element);
            return Ok(Some(element));
        }
        // The covering element is not the one the anchor describes: leave the
        // anchor as it is and stop sharing the pointer for it.
        self.inner.pointers.unregister(pointer);
        let index = ast.table().find_innermost_covering(range, cancel)?;
        tracing::trace!(file = %pointer.file(), kind = ?pointer.kind(), ?range, "anchor resolved to covering element");
        Ok(index.map(|index| Element::from_ast(view, ast, index)))
    }

    fn heal(&self, pointer: &SmartPointer, entry: &Arc<FileEntry>, element: &Element) {
        let state = entry.state.read();
        // Element ranges are in committed coordinates; skip if the text moved on.
        if state.has_uncommitted() || state.committed_stamp != element.view().stamp() {
            return;
        }
        let range = element.range();
        let inner = &pointer.0;
        if inner.tracker.tracked(inner.slot) != Some((range, AnchorState::Intact)) {
            inner.tracker.reset(inner.slot, range);
        }
        *inner.anchor.write() = AnchorInfo::for_element(element);
        pointer.set_cache(element);
        self.inner
            .pointers
            .rekey(pointer, (element.view().generation(), element.id()));
        tracing::trace!(file = %pointer.file(), kind = ?element.kind(), ?range, "anchor healed");
    }
}

fn import_list(view: &Arc<FileView>) -> Option<Element> {
    Element::root(view.clone())
        .stub_children()
        .into_iter()
        .find(|child| child.kind() == SyntaxKind::IMPORT_LIST)
}

fn find_declaration(
    view: &Arc<FileView>,
    anchor: &AnchorInfo,
    range: TextRange,
    cancel: &CancellationToken,
) -> Result<Option<Element>, ProjectError> {
    let table = view.stubs().table();
    let mut found = table.find_exact(range, anchor.kind, cancel)?;
    if found.is_none() {
        found = recover_declaration(table, anchor, range, cancel)?;
    }
    Ok(found.map(|index| Element::from_stub(view.clone(), index)))
}

/// Pick the declaration of the anchor's kind and name that best matches its
/// old position: the same path first, then the nearest start offset, then
/// document order. Falls back to the path alone.
fn recover_declaration(
    table: &NodeTable,
    anchor: &AnchorInfo,
    range: TextRange,
    cancel: &CancellationToken,
) -> Result<Option<u32>, ProjectError> {
    let mut best: Option<(bool, u32, u32)> = None;
    for index in table.nodes_of_kind(anchor.kind) {
        if cancel.is_cancelled() {
            return Err(ProjectError::Cancelled);
        }
        let Some(node) = table.get(index) else {
            continue;
        };
        if node.name != anchor.name {
            continue;
        }
        let rank = (
            table.path(index) != anchor.path,
            distance(node.range.start(), range.start()),
            index,
        );
        if best.is_none_or(|best| rank < best) {
            best = Some(rank);
        }
    }
    Ok(match best {
        Some((_, _, index)) => Some(index),
        None => resolve_path(table, anchor),
    })
}

fn find_positional(
    view: &Arc<FileView>,
    anchor: &AnchorInfo,
    range: TextRange,
    cancel: &CancellationToken,
) -> Result<Option<Element>, ProjectError> {
    let ast = view.ast()?;
    let mut found = ast.table().find_exact(range, anchor.kind, cancel)?;
    if found.is_none() {
        found = resolve_path(ast.table(), anchor);
    }
    Ok(found.map(|index| Element::from_ast(view.clone(), ast, index)))
}

fn resolve_path(table: &NodeTable, anchor: &AnchorInfo) -> Option<u32> {
    table
        .resolve_path(&anchor.path)
        .filter(|&index| table.get(index).is_some_and(|node| node.kind == anchor.kind))
}

fn distance(a: TextSize, b: TextSize) -> u32 {
    u32::from(a).abs_diff(u32::from(b))
}
