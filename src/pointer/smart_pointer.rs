use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use rowan::TextRange;
use tokio_util::sync::CancellationToken;

use super::anchor::AnchorInfo;
use crate::base::{AnchorState, FileId};
use crate::parser::SyntaxKind;
use crate::project::{Project, ProjectError, ProjectInner};
use crate::syntax::{Element, ElementId, FileView};
use crate::tracker::{AnchorSlot, DocumentTracker};

/// Reference counts stop here. A pointer that reaches the cap is pinned:
/// further creations and removals leave its count unchanged, so it is never
/// freed, however many times it is removed afterwards.
pub const MAX_REFERENCE_COUNT: u16 = 0x7FFF;

/// Registry key of a pointer: view generation and element id.
pub(crate) type RegistryKey = (u64, ElementId);

pub(crate) struct PointerInner {
    pub(super) project: Weak<ProjectInner>,
    pub(super) file: FileId,
    pub(super) tracker: Arc<DocumentTracker>,
    pub(super) slot: AnchorSlot,
    pub(super) is_range: bool,
    pub(super) anchor: RwLock<AnchorInfo>,
    pub(super) refs: Mutex<u16>,
    pub(super) disposed: AtomicBool,
    /// Last resolved element, kept only as long as its view lives.
    pub(super) cache: Mutex<Option<(Weak<FileView>, ElementId)>>,
    pub(super) registry_key: Mutex<Option<RegistryKey>>,
}

impl Drop for PointerInner {
    fn drop(&mut self) {
        self.tracker.detach(self.slot);
    }
}

/// Stable handle to an element or a text range of one file.
///
/// Clones share one pointer. Equality is identity: the registry hands out the
/// same pointer for the same live element.
#[derive(Clone)]
pub struct SmartPointer(pub(crate) Arc<PointerInner>);

impl SmartPointer {
    pub(super) fn new(
        project: &Project,
        file: FileId,
        tracker: Arc<DocumentTracker>,
        slot: AnchorSlot,
        anchor: AnchorInfo,
        is_range: bool,
    ) -> Self {
        Self(Arc::new(PointerInner {
            project: Arc::downgrade(&project.inner),
            file,
            tracker,
            slot,
            is_range,
            anchor: RwLock::new(anchor),
            refs: Mutex::new(1),
            disposed: AtomicBool::new(false),
            cache: Mutex::new(None),
            registry_key: Mutex::new(None),
        }))
    }

    fn project(&self) -> Option<Project> {
        self.0.project.upgrade().map(Project::from_inner)
    }

    /// The element this pointer denotes in the file's current tree.
    ///
    /// Commits pending edits of the file first. `None` when the element is
    /// gone, the file was deleted, or the pointer was removed.
    pub fn element(&self) -> Result<Option<Element>, ProjectError> {
        self.element_with_cancel(&CancellationToken::new())
    }

    pub fn element_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<Element>, ProjectError> {
        match self.project() {
            Some(project) => project.resolve_pointer(self, cancel),
            None => Ok(None),
        }
    }

    /// Current range of the pointer in the document text.
    ///
    /// Ranges that were never swallowed by an edit are answered by the
    /// tracker alone; the others need the element to be found again.
    pub fn range(&self) -> Result<Option<TextRange>, ProjectError> {
        self.range_with_cancel(&CancellationToken::new())
    }

    pub fn range_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<TextRange>, ProjectError> {
        if self.is_disposed() {
            return Ok(None);
        }
        let Some(project) = self.project() else {
            return Ok(None);
        };
        if project.entry(self.0.file).is_err() {
            return Ok(None);
        }
        match self.0.tracker.tracked(self.0.slot) {
            None | Some((_, AnchorState::Deleted)) => Ok(None),
            Some((range, AnchorState::Intact)) => Ok(Some(range)),
            Some((range, AnchorState::Replaced)) if self.0.is_range => Ok(Some(range)),
            Some((_, AnchorState::Replaced)) => {
                let element = project.resolve_pointer(self, cancel)?;
                Ok(element.and_then(|_| self.0.tracker.range(self.0.slot)))
            }
        }
    }

    pub fn file(&self) -> FileId {
        self.0.file
    }

    /// Kind of the element at its last successful resolution.
    pub fn kind(&self) -> SyntaxKind {
        self.0.anchor.read().kind
    }

    pub fn anchor(&self) -> AnchorInfo {
        self.0.anchor.read().clone()
    }

    /// Damage the tracked range has taken since the last resolution.
    pub fn state(&self) -> Option<AnchorState> {
        self.0.tracker.state(self.0.slot)
    }

    pub fn reference_count(&self) -> u16 {
        *self.0.refs.lock()
    }

    pub fn is_disposed(&self) -> bool {
        self.0.disposed.load(Ordering::Acquire)
    }

    pub fn is_range_pointer(&self) -> bool {
        self.0.is_range
    }

    /// Take one more reference. `None` if the pointer is already disposed,
    /// `Some(true)` if this reference saturated the count.
    pub(super) fn retain(&self) -> Option<bool> {
        let mut refs = self.0.refs.lock();
        if self.is_disposed() {
            return None;
        }
        if *refs == MAX_REFERENCE_COUNT {
            return Some(false);
        }
        *refs += 1;
        Some(*refs == MAX_REFERENCE_COUNT)
    }

    pub(super) fn cached(&self, view: &Arc<FileView>) -> Option<Element> {
        let (cached_view, id) = self.0.cache.lock().clone()?;
        let cached_view = cached_view.upgrade()?;
        if !Arc::ptr_eq(&cached_view, view) {
            return None;
        }
        Element::from_id(cached_view, id)
    }

    pub(super) fn set_cache(&self, element: &Element) {
        *self.0.cache.lock() = Some((Arc::downgrade(element.view()), element.id()));
    }
}

impl PartialEq for SmartPointer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for SmartPointer {}

impl Hash for SmartPointer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.0).hash(state);
    }
}

impl fmt::Debug for SmartPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartPointer")
            .field("file", &self.0.file)
            .field("kind", &self.kind())
            .field("range", &self.0.tracker.range(self.0.slot))
            .field("refs", &self.reference_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
