use rowan::{TextRange, TextSize};

use super::error::ProjectError;

/// In-memory text of a file at one modification stamp.
///
/// The project hands out `Arc<Document>` snapshots; edits copy the text only
/// when a snapshot is still held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: String,
    stamp: u64,
}

impl Document {
    pub(crate) fn new(text: String, stamp: u64) -> Self {
        Self { text, stamp }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> TextSize {
        TextSize::of(self.text.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Modification stamp of this text.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    pub fn slice(&self, range: TextRange) -> Option<&str> {
        self.text.get(std::ops::Range::<usize>::from(range))
    }

    pub(crate) fn check_range(&self, range: TextRange) -> Result<(), ProjectError> {
        let len = self.len();
        if range.end() > len
            || !self.text.is_char_boundary(range.start().into())
            || !self.text.is_char_boundary(range.end().into())
        {
            return Err(ProjectError::InvalidRange {
                range,
                len: len.into(),
            });
        }
        Ok(())
    }

    pub(crate) fn replace(&mut self, range: TextRange, text: &str, stamp: u64) {
        self.text
            .replace_range(std::ops::Range::<usize>::from(range), text);
        self.stamp = stamp;
    }
}
