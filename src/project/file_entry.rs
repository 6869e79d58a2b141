//! Per-file state owned by the project.

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use rowan::{TextRange, TextSize};

use super::document::Document;
use super::error::ProjectError;
use super::vfs::FileSystem;
use crate::base::{AnchorState, ChangeEvent, FileId, apply_change};
use crate::syntax::{AstLoader, AstTree, FileView, Language, StubTree};
use crate::tracker::DocumentTracker;

/// Stub tree persisted for the text of one stamp.
#[derive(Debug, Clone)]
pub(crate) struct StubIndexEntry {
    pub stamp: u64,
    pub stubs: Arc<StubTree>,
}

#[derive(Debug)]
pub(crate) struct FileState {
    pub path: PathBuf,
    pub language: Language,
    pub deleted: bool,
    pub document: Option<Arc<Document>>,
    /// Stamp of the current text, whether loaded or on disk.
    pub stamp: u64,
    /// Stamp of the text on disk.
    pub saved_stamp: u64,
    /// Stamp of the text the current view describes.
    pub committed_stamp: u64,
    /// Length of the current text, once it has been seen.
    pub text_len: Option<TextSize>,
    /// Edits applied to the document since the last commit, in order.
    pub uncommitted: Vec<ChangeEvent>,
    pub view: Option<Arc<FileView>>,
    /// The last view that was dropped, reused while elements keep it alive.
    pub last_view: Weak<FileView>,
    pub stub_index: Option<StubIndexEntry>,
}

impl FileState {
    pub fn is_modified(&self) -> bool {
        self.stamp != self.saved_stamp
    }

    pub fn has_uncommitted(&self) -> bool {
        !self.uncommitted.is_empty()
    }

    /// Move a range of the committed text into the coordinates of the current text.
    pub fn translate_uncommitted(&self, range: TextRange) -> (TextRange, AnchorState) {
        self.uncommitted
            .iter()
            .fold((range, AnchorState::Intact), |(range, state), event| {
                apply_change(range, state, event)
            })
    }

    /// Whether elements of `view` are still live: it is the installed view, or
    /// the dropped one that will be reinstalled because nothing changed since.
    pub fn is_current_view(&self, view: &Arc<FileView>) -> bool {
        match &self.view {
            Some(current) => Arc::ptr_eq(current, view),
            None => self.last_view.upgrade().is_some_and(|last| {
                Arc::ptr_eq(&last, view)
                    && last.stamp() == self.committed_stamp
                    && last.language() == self.language
            }),
        }
    }

    /// Text of `stamp` if it is still available without a disk read.
    pub fn loaded_text_at(&self, stamp: u64) -> Option<Arc<Document>> {
        self.document.clone().filter(|doc| doc.stamp() == stamp)
    }
}

pub(crate) struct FileEntry {
    id: FileId,
    fs: Arc<dyn FileSystem>,
    pub(crate) state: RwLock<FileState>,
    pub(crate) tracker: Arc<DocumentTracker>,
    /// Serializes reconstruction of the view.
    pub(crate) reload: Mutex<()>,
}

impl FileEntry {
    pub fn new(
        id: FileId,
        path: PathBuf,
        language: Language,
        stamp: u64,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            id,
            fs,
            state: RwLock::new(FileState {
                path,
                language,
                deleted: false,
                document: None,
                stamp,
                saved_stamp: stamp,
                committed_stamp: stamp,
                text_len: None,
                uncommitted: Vec::new(),
                view: None,
                last_view: Weak::new(),
                stub_index: None,
            }),
            tracker: Arc::new(DocumentTracker::new(id)),
            reload: Mutex::new(()),
        }
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn path(&self) -> PathBuf {
        self.state.read().path.clone()
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub fn is_deleted(&self) -> bool {
        self.state.read().deleted
    }

    pub fn ensure_live(&self) -> Result<(), ProjectError> {
        if self.is_deleted() {
            return Err(ProjectError::FileDeleted(self.id));
        }
        Ok(())
    }

    /// Read the file content from disk; no state is changed.
    pub fn read_disk(&self) -> Result<String, ProjectError> {
        let path = self.path();
        self.fs.read(&path).map_err(|source| {
            tracing::warn!(file = %self.id, path = %path.display(), error = %source, "failed to read file");
            ProjectError::io(path, source)
        })
    }

    /// Text for a view's stamp: the loaded document if it still has that
    /// stamp, otherwise the disk content if that is what the stamp describes.
    fn text_for_stamp(&self, stamp: u64) -> Result<String, ProjectError> {
        let on_disk = {
            let state = self.state.read();
            if state.deleted {
                return Err(ProjectError::FileDeleted(self.id));
            }
            if let Some(doc) = state.loaded_text_at(stamp) {
                return Ok(doc.text().to_string());
            }
            state.saved_stamp == stamp
        };
        if !on_disk {
            return Err(ProjectError::StaleView);
        }
        self.read_disk()
    }
}

impl AstLoader for FileEntry {
    fn load_ast(&self, view: &FileView) -> Result<Arc<AstTree>, ProjectError> {
        let text = self.text_for_stamp(view.stamp())?;
        let parse = view.language().parse(&text);
        let ast = AstTree::build(parse.green, view.stubs())?;
        tracing::debug!(file = %self.id, generation = view.generation(), "loaded syntax tree");
        Ok(Arc::new(ast))
    }
}

impl std::fmt::Debug for FileEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileEntry")
            .field("id", &self.id)
            .field("state", &*self.state.read())
            .finish()
    }
}
