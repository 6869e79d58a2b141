use std::fmt;

/// Stable identity of a file inside a [`Project`](crate::project::Project).
///
/// Ids are never reused: deleting a file and adding it again under the same path
/// yields a fresh id, which is how a wholesale replacement is told apart from an
/// in-place edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(u32);

impl FileId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}
