//! Document change events and the range algebra applied to tracked ranges.
//!
//! A [`ChangeEvent`] is a single replace `{offset, len_before, len_after}`;
//! inserts and deletes are the degenerate cases. [`apply_change`] moves one
//! tracked range through one event. Ranges never become invalid: when their
//! text disappears they collapse to the point where the edit happened and
//! record the damage in an [`AnchorState`].

use text_size::{TextRange, TextSize};

/// One text mutation of a document, expressed in offsets of the text *before*
/// the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChangeEvent {
    pub offset: TextSize,
    pub len_before: TextSize,
    pub len_after: TextSize,
}

impl ChangeEvent {
    pub fn new(offset: TextSize, len_before: TextSize, len_after: TextSize) -> Self {
        Self {
            offset,
            len_before,
            len_after,
        }
    }

    pub fn insert(offset: TextSize, len: TextSize) -> Self {
        Self::new(offset, TextSize::new(0), len)
    }

    pub fn delete(range: TextRange) -> Self {
        Self::new(range.start(), range.len(), TextSize::new(0))
    }

    pub fn replace(range: TextRange, len_after: TextSize) -> Self {
        Self::new(range.start(), range.len(), len_after)
    }

    /// End of the replaced text in old coordinates.
    pub fn old_end(&self) -> TextSize {
        self.offset + self.len_before
    }

    /// End of the inserted text in new coordinates.
    pub fn new_end(&self) -> TextSize {
        self.offset + self.len_after
    }

    pub fn old_range(&self) -> TextRange {
        TextRange::at(self.offset, self.len_before)
    }

    pub fn new_range(&self) -> TextRange {
        TextRange::at(self.offset, self.len_after)
    }

    /// Signed length change of the document.
    pub fn delta(&self) -> i64 {
        i64::from(u32::from(self.len_after)) - i64::from(u32::from(self.len_before))
    }

    pub fn is_insert(&self) -> bool {
        self.len_before == TextSize::new(0)
    }

    pub fn is_delete(&self) -> bool {
        self.len_after == TextSize::new(0)
    }
}

/// Damage a tracked range has taken since it was last resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnchorState {
    /// The range still delimits the text it was created for (possibly edited inside).
    #[default]
    Intact,
    /// All of the text was replaced by new text; the range covers the
    /// replacement (or is a point at its start when the edit reached beyond
    /// the range) and only structural recovery can find it again.
    Replaced,
    /// All of the text was deleted.
    Deleted,
}

pub(crate) fn shift(offset: TextSize, delta: i64) -> TextSize {
    let moved = i64::from(u32::from(offset)) + delta;
    TextSize::new(moved.clamp(0, i64::from(u32::MAX)) as u32)
}

/// Move `range` through `event`.
pub fn apply_change(
    range: TextRange,
    state: AnchorState,
    event: &ChangeEvent,
) -> (TextRange, AnchorState) {
    let (start, end) = (range.start(), range.end());
    if start == end {
        return apply_to_point(start, state, event);
    }

    let offset = event.offset;
    let old_end = event.old_end();
    let delta = event.delta();

    if offset >= end {
        return (range, state);
    }
    if old_end <= start {
        return (TextRange::new(shift(start, delta), shift(end, delta)), state);
    }

    // Edit inside the range: the range stretches or shrinks with it. When the
    // edit replaced exactly the range, none of the old text is left.
    if start <= offset && old_end <= end {
        let new_end = shift(end, delta);
        let state = if new_end == start {
            AnchorState::Deleted
        } else if offset == start && old_end == end {
            AnchorState::Replaced
        } else {
            state
        };
        return (TextRange::new(start, new_end), state);
    }

    // Prefix replaced.
    if offset < start && old_end < end {
        return (
            TextRange::new(event.new_end(), shift(end, delta)),
            state,
        );
    }

    // Suffix replaced.
    if start < offset && end < old_end {
        return (TextRange::new(start, offset), state);
    }

    // The edit swallowed the whole range.
    let state = if event.is_delete() {
        AnchorState::Deleted
    } else {
        AnchorState::Replaced
    };
    (TextRange::empty(offset), state)
}

fn apply_to_point(
    point: TextSize,
    state: AnchorState,
    event: &ChangeEvent,
) -> (TextRange, AnchorState) {
    let offset = event.offset;
    let old_end = event.old_end();

    if offset < point && point < old_end {
        return (TextRange::empty(offset), state);
    }
    if point > old_end || (point == old_end && !event.is_insert()) {
        return (TextRange::empty(shift(point, event.delta())), state);
    }
    (TextRange::empty(point), state)
}
