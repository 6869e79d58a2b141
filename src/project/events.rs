//! Listener interfaces for document and tree changes.

use crate::base::{ChangeEvent, FileId};
use crate::syntax::Language;

use super::Project;

/// Structural change of a file, reported after the change is in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeChangeEvent {
    /// The document was committed into a new view.
    Reparsed { file: FileId, generation: u64 },
    /// The file is now interpreted as another language.
    LanguageChanged {
        file: FileId,
        old: Language,
        new: Language,
    },
    /// The text was replaced wholesale by the content on disk.
    Reloaded { file: FileId, generation: u64 },
    Deleted { file: FileId },
}

impl TreeChangeEvent {
    pub fn file(&self) -> FileId {
        match self {
            TreeChangeEvent::Reparsed { file, .. }
            | TreeChangeEvent::LanguageChanged { file, .. }
            | TreeChangeEvent::Reloaded { file, .. }
            | TreeChangeEvent::Deleted { file } => *file,
        }
    }
}

/// Notified while the tree of a file is being replaced. Smart pointers must
/// not be created from inside [`TreeChangeListener::tree_changed`].
pub trait TreeChangeListener: Send + Sync {
    fn tree_changed(&self, project: &Project, event: &TreeChangeEvent);
}

impl<F> TreeChangeListener for F
where
    F: Fn(&Project, &TreeChangeEvent) + Send + Sync,
{
    fn tree_changed(&self, project: &Project, event: &TreeChangeEvent) {
        self(project, event)
    }
}

/// Notified around every text mutation. Edits requested from these callbacks
/// are queued and applied after the current one.
pub trait DocumentListener: Send + Sync {
    fn before_change(&self, _project: &Project, _file: FileId, _event: &ChangeEvent) {}
    fn after_change(&self, _project: &Project, _file: FileId, _event: &ChangeEvent) {}
}
