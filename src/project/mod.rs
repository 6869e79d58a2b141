//! The project: files, documents, views and the pointers into them.
//!
//! [`Project`] is a cheap handle; clones share all state. Mutations (edits,
//! commits, renames, deletions, unloads) run in the write phase, a reentrant
//! lock held by one thread at a time. Reads, including pointer resolution,
//! only take per-file locks.
//!
//! Per-file lock order: write phase, reload, file state, pointer registry,
//! tracker.

mod config;
mod coordinator;
mod document;
mod error;
mod events;
pub(crate) mod file_entry;
mod vfs;

pub use config::ProjectConfig;
pub use document::Document;
pub use error::ProjectError;
pub use events::{DocumentListener, TreeChangeEvent, TreeChangeListener};
pub use vfs::{FileSystem, MemoryFileSystem, OsFileSystem};

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::thread::ThreadId;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use rowan::{TextRange, TextSize};
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

use crate::base::{ChangeEvent, FileId};
use crate::pointer::PointerManager;
use crate::syntax::{Element, Language};
use file_entry::FileEntry;

#[derive(Debug)]
struct PendingEdit {
    file: FileId,
    range: TextRange,
    text: String,
}

#[derive(Debug, Default)]
struct WritePhase {
    applying_edit: bool,
    queued: VecDeque<PendingEdit>,
}

/// Ends the current edit, also when a document listener panics. Edits queued
/// behind a failed one are dropped.
struct ApplyingEdit<'a>(&'a RefCell<WritePhase>);

impl Drop for ApplyingEdit<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.0.try_borrow_mut() {
            state.applying_edit = false;
            state.queued.clear();
        }
    }
}

/// Marks the calling thread as notifying tree-change listeners until dropped.
struct Dispatching<'a> {
    depths: &'a Mutex<FxHashMap<ThreadId, u32>>,
    thread: ThreadId,
}

impl<'a> Dispatching<'a> {
    fn enter(depths: &'a Mutex<FxHashMap<ThreadId, u32>>) -> Self {
        let thread = std::thread::current().id();
        *depths.lock().entry(thread).or_default() += 1;
        Self { depths, thread }
    }
}

impl Drop for Dispatching<'_> {
    fn drop(&mut self) {
        let mut depths = self.depths.lock();
        if let Some(depth) = depths.get_mut(&self.thread) {
            *depth -= 1;
            if *depth == 0 {
                depths.remove(&self.thread);
            }
        }
    }
}

pub(crate) struct ProjectInner {
    config: ProjectConfig,
    fs: Arc<dyn FileSystem>,
    files: RwLock<FxHashMap<FileId, Arc<FileEntry>>>,
    paths: RwLock<FxHashMap<PathBuf, FileId>>,
    next_file: AtomicU32,
    clock: AtomicU64,
    pub(crate) pointers: PointerManager,
    tree_listeners: RwLock<Vec<Arc<dyn TreeChangeListener>>>,
    document_listeners: RwLock<Vec<Arc<dyn DocumentListener>>>,
    write_phase: ReentrantMutex<RefCell<WritePhase>>,
    dispatching: Mutex<FxHashMap<ThreadId, u32>>,
}

/// Handle to all files of a workspace and the smart pointers into them.
#[derive(Clone)]
pub struct Project {
    pub(crate) inner: Arc<ProjectInner>,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("files", &self.inner.files.read().len())
            .finish()
    }
}

impl Project {
    pub fn new(config: ProjectConfig, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            inner: Arc::new(ProjectInner {
                config,
                fs,
                files: RwLock::new(FxHashMap::default()),
                paths: RwLock::new(FxHashMap::default()),
                next_file: AtomicU32::new(0),
                clock: AtomicU64::new(0),
                pointers: PointerManager::default(),
                tree_listeners: RwLock::new(Vec::new()),
                document_listeners: RwLock::new(Vec::new()),
                write_phase: ReentrantMutex::new(RefCell::new(WritePhase::default())),
                dispatching: Mutex::new(FxHashMap::default()),
            }),
        }
    }

    /// A project over the real file system with default settings.
    pub fn on_disk() -> Self {
        Self::new(ProjectConfig::default(), Arc::new(OsFileSystem))
    }

    pub(crate) fn from_inner(inner: Arc<ProjectInner>) -> Self {
        Self { inner }
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.inner.config
    }

    /// Next value of the project clock, used for stamps and view generations.
    pub(crate) fn tick(&self) -> u64 {
        self.inner.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn entry(&self, file: FileId) -> Result<Arc<FileEntry>, ProjectError> {
        let entry = self
            .inner
            .files
            .read()
            .get(&file)
            .cloned()
            .ok_or(ProjectError::UnknownFile(file))?;
        entry.ensure_live()?;
        Ok(entry)
    }

    // =========================================================================
    // Files
    // =========================================================================

    /// Register a file by path. Adding a known path returns its id.
    pub fn add_file(&self, path: impl AsRef<Path>) -> FileId {
        let path = path.as_ref().to_path_buf();
        let _write = self.inner.write_phase.lock();
        if let Some(&file) = self.inner.paths.read().get(&path) {
            return file;
        }
        let file = FileId::new(self.inner.next_file.fetch_add(1, Ordering::Relaxed));
        let language = self.inner.config.language_for(&path);
        let entry = FileEntry::new(
            file,
            path.clone(),
            language,
            self.tick(),
            self.inner.fs.clone(),
        );
        self.inner.files.write().insert(file, Arc::new(entry));
        self.inner.paths.write().insert(path, file);
        tracing::debug!(%file, %language, "added file");
        file
    }

    pub fn file_id(&self, path: impl AsRef<Path>) -> Option<FileId> {
        self.inner.paths.read().get(path.as_ref()).copied()
    }

    pub fn file_path(&self, file: FileId) -> Result<PathBuf, ProjectError> {
        Ok(self.entry(file)?.path())
    }

    pub fn files(&self) -> Vec<FileId> {
        let mut files: Vec<_> = self.inner.paths.read().values().copied().collect();
        files.sort();
        files
    }

    /// Remove a file. Its pointers stay registered but resolve to nothing.
    pub fn delete_file(&self, file: FileId) -> Result<(), ProjectError> {
        let _write = self.inner.write_phase.lock();
        let entry = self.entry(file)?;
        {
            let mut state = entry.state.write();
            state.deleted = true;
            state.document = None;
            state.uncommitted.clear();
            if let Some(view) = state.view.take() {
                view.unload_ast();
            }
            state.last_view = std::sync::Weak::new();
            state.stub_index = None;
            self.inner.paths.write().remove(&state.path);
        }
        tracing::debug!(%file, "deleted file");
        self.notify_tree_change(&TreeChangeEvent::Deleted { file });
        Ok(())
    }

    /// Move a file to another path; a different extension may change its language.
    pub fn rename_file(&self, file: FileId, path: impl AsRef<Path>) -> Result<(), ProjectError> {
        let path = path.as_ref().to_path_buf();
        let _write = self.inner.write_phase.lock();
        let entry = self.entry(file)?;
        let old_path = entry.path();
        entry
            .fs()
            .rename(&old_path, &path)
            .map_err(|source| ProjectError::io(&old_path, source))?;
        entry.state.write().path = path.clone();
        {
            let mut paths = self.inner.paths.write();
            paths.remove(&old_path);
            paths.insert(path.clone(), file);
        }
        let language = self.inner.config.language_for(&path);
        self.set_language(file, language)
    }

    /// Reinterpret a file as another language. Its text is unchanged; the
    /// next structural request parses it again.
    pub fn set_language(&self, file: FileId, language: Language) -> Result<(), ProjectError> {
        let _write = self.inner.write_phase.lock();
        let entry = self.entry(file)?;
        let old = {
            let mut state = entry.state.write();
            if state.language == language {
                return Ok(());
            }
            let old = std::mem::replace(&mut state.language, language);
            if let Some(view) = state.view.take() {
                view.unload_ast();
            }
            state.last_view = std::sync::Weak::new();
            state.stub_index = None;
            old
        };
        tracing::debug!(%file, %old, new = %language, "file language changed");
        self.notify_tree_change(&TreeChangeEvent::LanguageChanged {
            file,
            old,
            new: language,
        });
        Ok(())
    }

    pub fn language(&self, file: FileId) -> Result<Language, ProjectError> {
        Ok(self.entry(file)?.state.read().language)
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// The document of a file, loading it from disk when needed.
    pub fn document(&self, file: FileId) -> Result<Arc<Document>, ProjectError> {
        let entry = self.entry(file)?;
        self.load_document(&entry)
    }

    /// The document if it is loaded. Never touches the disk.
    pub fn cached_document(&self, file: FileId) -> Option<Arc<Document>> {
        let entry = self.entry(file).ok()?;
        let state = entry.state.read();
        state.document.clone()
    }

    pub fn replace_text(
        &self,
        file: FileId,
        range: TextRange,
        text: impl Into<String>,
    ) -> Result<(), ProjectError> {
        self.edit(PendingEdit {
            file,
            range,
            text: text.into(),
        })
    }

    pub fn insert_text(
        &self,
        file: FileId,
        offset: TextSize,
        text: impl Into<String>,
    ) -> Result<(), ProjectError> {
        self.replace_text(file, TextRange::empty(offset), text)
    }

    pub fn delete_text(&self, file: FileId, range: TextRange) -> Result<(), ProjectError> {
        self.replace_text(file, range, String::new())
    }

    /// Replace the whole text of the document.
    pub fn set_text(&self, file: FileId, text: impl Into<String>) -> Result<(), ProjectError> {
        let len = self.document(file)?.len();
        self.replace_text(file, TextRange::up_to(len), text)
    }

    pub fn save_document(&self, file: FileId) -> Result<(), ProjectError> {
        let _write = self.inner.write_phase.lock();
        let entry = self.entry(file)?;
        let (path, doc) = {
            let state = entry.state.read();
            match &state.document {
                Some(doc) => (state.path.clone(), doc.clone()),
                None => return Ok(()),
            }
        };
        entry
            .fs()
            .write(&path, doc.text())
            .map_err(|source| ProjectError::io(&path, source))?;
        let mut state = entry.state.write();
        if state.document.as_ref().map(|d| d.stamp()) == Some(doc.stamp()) {
            state.saved_stamp = doc.stamp();
        }
        tracing::debug!(%file, stamp = doc.stamp(), "saved document");
        Ok(())
    }

    /// Apply an edit, or queue it when called from a document listener while
    /// another edit is being applied.
    fn edit(&self, edit: PendingEdit) -> Result<(), ProjectError> {
        let phase = self.inner.write_phase.lock();
        {
            let mut state = phase.borrow_mut();
            if state.applying_edit {
                tracing::trace!(file = %edit.file, "queueing reentrant edit");
                state.queued.push_back(edit);
                return Ok(());
            }
            state.applying_edit = true;
        }
        let _applying = ApplyingEdit(&phase);
        let result = self.apply_edit(&edit);
        loop {
            let next = phase.borrow_mut().queued.pop_front();
            let Some(next) = next else { break };
            if let Err(err) = self.apply_edit(&next) {
                tracing::warn!(file = %next.file, error = %err, "dropping queued edit");
            }
        }
        result
    }

    fn apply_edit(&self, edit: &PendingEdit) -> Result<(), ProjectError> {
        let entry = self.entry(edit.file)?;
        self.load_document(&entry)?.check_range(edit.range)?;
        let event = ChangeEvent::replace(edit.range, TextSize::of(edit.text.as_str()));

        let listeners = self.inner.document_listeners.read().clone();
        for listener in &listeners {
            listener.before_change(self, edit.file, &event);
        }
        {
            let mut state = entry.state.write();
            let stamp = self.tick();
            let Some(doc) = state.document.as_mut() else {
                return Err(ProjectError::StaleView);
            };
            let doc = Arc::make_mut(doc);
            doc.replace(edit.range, &edit.text, stamp);
            let len = doc.len();
            state.stamp = stamp;
            state.text_len = Some(len);
            state.uncommitted.push(event);
            // ranges move together with the text, before any reader sees it
            entry.tracker.on_change(&event);
        }
        for listener in &listeners {
            listener.after_change(self, edit.file, &event);
        }
        Ok(())
    }

    // =========================================================================
    // Trees
    // =========================================================================

    pub fn has_uncommitted(&self, file: FileId) -> bool {
        self.entry(file)
            .map(|entry| entry.state.read().has_uncommitted())
            .unwrap_or(false)
    }

    /// Reparse the document into a new view. Returns `false` when there was
    /// nothing to commit.
    pub fn commit_document(&self, file: FileId) -> Result<bool, ProjectError> {
        self.commit(file, false)
    }

    fn commit(&self, file: FileId, reloaded: bool) -> Result<bool, ProjectError> {
        let _write = self.inner.write_phase.lock();
        let entry = self.entry(file)?;
        let (doc, language) = {
            let state = entry.state.read();
            if !state.has_uncommitted() {
                return Ok(false);
            }
            match &state.document {
                Some(doc) => (doc.clone(), state.language),
                None => return Ok(false),
            }
        };
        let view = self.build_view(&entry, language, doc.stamp(), doc.text())?;
        {
            let mut state = entry.state.write();
            state.committed_stamp = doc.stamp();
            state.uncommitted.clear();
            self.install_view(&mut state, &view);
        }
        let generation = view.generation();
        tracing::debug!(%file, generation, reloaded, "committed document");
        let event = if reloaded {
            TreeChangeEvent::Reloaded { file, generation }
        } else {
            TreeChangeEvent::Reparsed { file, generation }
        };
        self.notify_tree_change(&event);
        Ok(true)
    }

    pub fn commit_all_documents(&self) -> Result<(), ProjectError> {
        let _write = self.inner.write_phase.lock();
        let files: Vec<_> = self.inner.files.read().keys().copied().collect();
        for file in files {
            match self.commit_document(file) {
                Ok(_) | Err(ProjectError::FileDeleted(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// The root element of the file's current view.
    pub fn file_element(&self, file: FileId) -> Result<Element, ProjectError> {
        let entry = self.entry(file)?;
        let view = self.current_view(&entry)?;
        Ok(Element::root(view))
    }

    /// Innermost element covering the character at `offset`, after committing.
    pub fn find_element_at(&self, file: FileId, offset: TextSize) -> Result<Element, ProjectError> {
        self.find_element_at_with_cancel(file, offset, &CancellationToken::new())
    }

    pub fn find_element_at_with_cancel(
        &self,
        file: FileId,
        offset: TextSize,
        cancel: &CancellationToken,
    ) -> Result<Element, ProjectError> {
        self.commit_document(file)?;
        let entry = self.entry(file)?;
        let view = self.current_view(&entry)?;
        let ast = view.ast()?;
        let len = view.stubs().text_len();
        if offset > len {
            return Err(ProjectError::InvalidRange {
                range: TextRange::empty(offset),
                len: len.into(),
            });
        }
        let target = if offset < len {
            TextRange::at(offset, 1.into())
        } else {
            TextRange::empty(offset)
        };
        let index = ast
            .table()
            .find_innermost_covering(target, cancel)?
            .unwrap_or(0);
        Ok(Element::from_ast(view, ast, index))
    }

    /// `true` while the element belongs to the file's current view.
    pub fn is_valid(&self, element: &Element) -> bool {
        self.entry(element.file())
            .is_ok_and(|entry| entry.state.read().is_current_view(element.view()))
    }

    pub fn is_ast_loaded(&self, file: FileId) -> bool {
        self.entry(file)
            .ok()
            .and_then(|entry| entry.state.read().view.clone())
            .is_some_and(|view| view.is_ast_loaded())
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    pub fn add_tree_change_listener(&self, listener: impl TreeChangeListener + 'static) {
        self.inner.tree_listeners.write().push(Arc::new(listener));
    }

    pub fn add_document_listener(&self, listener: impl DocumentListener + 'static) {
        self.inner.document_listeners.write().push(Arc::new(listener));
    }

    fn notify_tree_change(&self, event: &TreeChangeEvent) {
        let listeners = self.inner.tree_listeners.read().clone();
        if listeners.is_empty() {
            return;
        }
        let _dispatching = Dispatching::enter(&self.inner.dispatching);
        for listener in &listeners {
            listener.tree_changed(self, event);
        }
    }

    /// Whether tree-change listeners are running on the calling thread.
    pub(crate) fn is_dispatching_tree_change(&self) -> bool {
        self.inner
            .dispatching
            .lock()
            .contains_key(&std::thread::current().id())
    }
}
