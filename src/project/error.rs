//! Error types for project operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::base::FileId;

/// Recoverable failures of a single project request.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// The id was never issued by this project.
    #[error("unknown file: {0}")]
    UnknownFile(FileId),

    /// The file was deleted from the project.
    #[error("file was deleted: {0}")]
    FileDeleted(FileId),

    /// Reading or writing file content failed.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A text range does not fit the document.
    #[error("range {range:?} is out of bounds for a document of length {len}")]
    InvalidRange { range: rowan::TextRange, len: u32 },

    /// The text a view was built from is no longer available.
    #[error("view is outdated")]
    StaleView,

    /// The caller cancelled the operation.
    #[error("operation was cancelled")]
    Cancelled,
}

impl ProjectError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
