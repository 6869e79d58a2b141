//! Unloading and lazy reconstruction of documents, syntax trees and views.
//!
//! A file can drop its full syntax tree, its whole view, and (when it has no
//! unsaved changes) its document. The next structural request rebuilds only
//! what it needs, in order of cost: a view that live elements still hold, the
//! persisted stub tree, the loaded document, the file on disk.

use std::sync::{Arc, Weak};

use rowan::TextSize;

use super::Project;
use super::document::Document;
use super::error::ProjectError;
use super::file_entry::{FileEntry, FileState, StubIndexEntry};
use crate::base::{ChangeEvent, FileId};
use crate::syntax::{AstLoader, FileView, Language, StubTree, parse_file};

enum Source {
    Stubs(Arc<StubTree>),
    Document(Arc<Document>),
    Disk,
}

impl Source {
    fn name(&self) -> &'static str {
        match self {
            Source::Stubs(_) => "stub index",
            Source::Document(_) => "document",
            Source::Disk => "disk",
        }
    }
}

impl Project {
    /// The view the file's pointers resolve against, rebuilt when it was unloaded.
    /// Concurrent callers for one file rebuild it once.
    pub(crate) fn current_view(&self, entry: &Arc<FileEntry>) -> Result<Arc<FileView>, ProjectError> {
        {
            let state = entry.state.read();
            if state.deleted {
                return Err(ProjectError::FileDeleted(entry.id()));
            }
            if let Some(view) = &state.view {
                return Ok(view.clone());
            }
        }

        let _reload = entry.reload.lock();
        loop {
            let (stamp, language, source) = {
                let state = entry.state.read();
                if state.deleted {
                    return Err(ProjectError::FileDeleted(entry.id()));
                }
                if let Some(view) = &state.view {
                    return Ok(view.clone());
                }
                let stamp = state.committed_stamp;
                let language = state.language;

                let reusable = state
                    .last_view
                    .upgrade()
                    .filter(|view| view.stamp() == stamp && view.language() == language);
                if let Some(view) = reusable {
                    drop(state);
                    let mut state = entry.state.write();
                    if state.view.is_none()
                        && state.committed_stamp == stamp
                        && state.language == language
                    {
                        state.view = Some(view.clone());
                        tracing::debug!(
                            file = %entry.id(),
                            generation = view.generation(),
                            "reused live view"
                        );
                        return Ok(view);
                    }
                    continue;
                }

                (stamp, language, self.pick_source(&state))
            };
            let source = source.ok_or(ProjectError::StaleView)?;
            let source_name = source.name();

            let view = match source {
                Source::Stubs(stubs) => Arc::new(FileView::new(
                    entry.id(),
                    self.tick(),
                    stamp,
                    stubs,
                    None,
                    Some(loader(entry)),
                )),
                Source::Document(doc) => self.build_view(entry, language, stamp, doc.text())?,
                Source::Disk => {
                    let text = entry.read_disk()?;
                    self.build_view(entry, language, stamp, &text)?
                }
            };

            let mut state = entry.state.write();
            if state.deleted {
                return Err(ProjectError::FileDeleted(entry.id()));
            }
            if let Some(existing) = &state.view {
                return Ok(existing.clone());
            }
            if state.committed_stamp != stamp || state.language != language {
                continue;
            }
            self.install_view(&mut state, &view);
            tracing::debug!(
                file = %entry.id(),
                generation = view.generation(),
                source = source_name,
                "rebuilt view"
            );
            return Ok(view);
        }
    }

    fn pick_source(&self, state: &FileState) -> Option<Source> {
        let stamp = state.committed_stamp;
        if self.config().use_stub_index {
            let indexed = state
                .stub_index
                .as_ref()
                .filter(|index| index.stamp == stamp && index.stubs.language() == state.language);
            if let Some(index) = indexed {
                return Some(Source::Stubs(index.stubs.clone()));
            }
        }
        if let Some(doc) = state.loaded_text_at(stamp) {
            return Some(Source::Document(doc));
        }
        (state.saved_stamp == stamp).then_some(Source::Disk)
    }

    /// Parse `text` into a new view with its syntax tree loaded.
    pub(crate) fn build_view(
        &self,
        entry: &Arc<FileEntry>,
        language: Language,
        stamp: u64,
        text: &str,
    ) -> Result<Arc<FileView>, ProjectError> {
        let (stubs, ast) = parse_file(language, text)?;
        Ok(Arc::new(FileView::new(
            entry.id(),
            self.tick(),
            stamp,
            stubs,
            Some(ast),
            Some(loader(entry)),
        )))
    }

    pub(crate) fn install_view(&self, state: &mut FileState, view: &Arc<FileView>) {
        state.view = Some(view.clone());
        state.last_view = Arc::downgrade(view);
        state.stub_index = Some(StubIndexEntry {
            stamp: view.stamp(),
            stubs: view.stubs().clone(),
        });
        if state.stamp == view.stamp() {
            state.text_len = Some(view.stubs().text_len());
        }
    }

    /// The document, read from disk when it is not loaded.
    pub(crate) fn load_document(&self, entry: &Arc<FileEntry>) -> Result<Arc<Document>, ProjectError> {
        {
            let state = entry.state.read();
            if state.deleted {
                return Err(ProjectError::FileDeleted(entry.id()));
            }
            if let Some(doc) = &state.document {
                return Ok(doc.clone());
            }
        }
        let text = entry.read_disk()?;
        let mut state = entry.state.write();
        if let Some(doc) = &state.document {
            return Ok(doc.clone());
        }
        // without a document the current text is the saved one
        let doc = Arc::new(Document::new(text, state.stamp));
        state.text_len = Some(doc.len());
        state.document = Some(doc.clone());
        tracing::debug!(file = %entry.id(), "loaded document");
        Ok(doc)
    }

    /// Drop the full syntax tree of the current view. Stub-based elements stay
    /// valid. Refused while the document has unsaved or uncommitted changes.
    pub fn unload_ast(&self, file: FileId) -> Result<bool, ProjectError> {
        let _write = self.inner.write_phase.lock();
        let entry = self.entry(file)?;
        let state = entry.state.read();
        if state.is_modified() || state.has_uncommitted() {
            return Ok(false);
        }
        let unloaded = state.view.as_ref().is_some_and(|view| view.unload_ast());
        if unloaded {
            tracing::debug!(%file, "unloaded syntax tree");
        }
        Ok(unloaded)
    }

    /// Drop the view, its syntax tree and, when it has no unsaved changes, the
    /// document. A view still held by elements is reused if nothing changed.
    pub fn unload_file(&self, file: FileId) -> Result<bool, ProjectError> {
        let _write = self.inner.write_phase.lock();
        let entry = self.entry(file)?;
        let mut state = entry.state.write();
        if state.has_uncommitted() {
            return Ok(false);
        }
        if let Some(view) = state.view.take() {
            view.unload_ast();
            state.last_view = Arc::downgrade(&view);
        }
        let dropped_document = !state.is_modified() && state.document.take().is_some();
        tracing::debug!(%file, dropped_document, "unloaded file");
        Ok(true)
    }

    /// Replace the document wholesale with the content on disk.
    ///
    /// Every tracked range sees one change covering the whole old text, so
    /// declarations are found again by structure. On a read failure nothing
    /// changes and the call can be retried.
    pub fn reload_from_disk(&self, file: FileId) -> Result<(), ProjectError> {
        let _write = self.inner.write_phase.lock();
        let entry = self.entry(file)?;
        let text = entry.read_disk()?;
        let old_len = {
            let state = entry.state.read();
            state
                .document
                .as_ref()
                .map(|doc| doc.len())
                .or(state.text_len)
                .unwrap_or_default()
        };
        let event = ChangeEvent::new(TextSize::new(0), old_len, TextSize::of(text.as_str()));

        let listeners = self.inner.document_listeners.read().clone();
        for listener in &listeners {
            listener.before_change(self, file, &event);
        }
        {
            let mut state = entry.state.write();
            let stamp = self.tick();
            let doc = Document::new(text, stamp);
            state.text_len = Some(doc.len());
            state.document = Some(Arc::new(doc));
            state.stamp = stamp;
            state.saved_stamp = stamp;
            state.uncommitted.push(event);
            entry.tracker.on_change(&event);
        }
        for listener in &listeners {
            listener.after_change(self, file, &event);
        }
        tracing::debug!(%file, "reloaded from disk");
        self.commit(file, true)?;
        Ok(())
    }
}

fn loader(entry: &Arc<FileEntry>) -> Weak<dyn AstLoader> {
    let weak: Weak<FileEntry> = Arc::downgrade(entry);
    weak
}
