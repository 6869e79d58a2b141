//! Document change tracking for anchored ranges.
//!
//! Every file owns one [`DocumentTracker`]. Pointers attach their range when
//! they are created and detach it when their last reference is released; the
//! project feeds every text mutation of the file through [`DocumentTracker::on_change`]
//! while it holds the write phase, so readers always observe ranges that
//! reflect all edits applied so far.

mod anchor_tree;

pub use anchor_tree::{AnchorSlot, AnchorTree};

use parking_lot::Mutex;
use text_size::TextRange;

use crate::base::{AnchorState, ChangeEvent, FileId};

/// The set of ranges tracked for one document, behind its own lock.
#[derive(Debug)]
pub struct DocumentTracker {
    file: FileId,
    tree: Mutex<AnchorTree>,
}

impl DocumentTracker {
    pub fn new(file: FileId) -> Self {
        Self {
            file,
            tree: Mutex::new(AnchorTree::new()),
        }
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    pub fn attach(&self, range: TextRange) -> AnchorSlot {
        self.attach_with_state(range, AnchorState::Intact)
    }

    pub fn attach_with_state(&self, range: TextRange, state: AnchorState) -> AnchorSlot {
        self.tree.lock().insert(range, state)
    }

    /// Returns `false` if the slot was already detached.
    pub fn detach(&self, slot: AnchorSlot) -> bool {
        self.tree.lock().remove(slot)
    }

    /// Apply one document change to every attached range.
    pub fn on_change(&self, event: &ChangeEvent) {
        let mut tree = self.tree.lock();
        tracing::trace!(
            file = %self.file,
            offset = u32::from(event.offset),
            len_before = u32::from(event.len_before),
            len_after = u32::from(event.len_after),
            anchors = tree.len(),
            "applying document change"
        );
        tree.apply(event);
    }

    pub fn range(&self, slot: AnchorSlot) -> Option<TextRange> {
        self.tracked(slot).map(|(range, _)| range)
    }

    pub fn state(&self, slot: AnchorSlot) -> Option<AnchorState> {
        self.tracked(slot).map(|(_, state)| state)
    }

    pub fn tracked(&self, slot: AnchorSlot) -> Option<(TextRange, AnchorState)> {
        self.tree.lock().get(slot)
    }

    /// Replace the tracked range after a successful resolution.
    pub fn reset(&self, slot: AnchorSlot, range: TextRange) -> bool {
        self.tree.lock().reset(slot, range, AnchorState::Intact)
    }

    pub fn len(&self) -> usize {
        self.tree.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.lock().is_empty()
    }

    /// Snapshot of all tracked ranges in document order.
    pub fn ranges(&self) -> Vec<TextRange> {
        self.tree
            .lock()
            .ranges()
            .into_iter()
            .map(|(_, range, _)| range)
            .collect()
    }
}
