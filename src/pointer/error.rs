//! Errors raised by the pointer registry.

use thiserror::Error;

use crate::base::FileId;
use crate::parser::SyntaxKind;
use crate::project::ProjectError;

/// Misuse of the registry, or a failed project request behind it.
///
/// `DoubleRemoval` and `CreatedDuringTreeChange` are lifetime bugs in the
/// caller. They are logged at error level when raised.
#[derive(Debug, Error)]
pub enum PointerError {
    #[error("double removal of a smart pointer to {kind:?} in {file}")]
    DoubleRemoval { file: FileId, kind: SyntaxKind },

    #[error("smart pointers must not be created during tree change notification")]
    CreatedDuringTreeChange,

    /// The element belongs to a view that is no longer current.
    #[error("element of {0} is outdated")]
    InvalidElement(FileId),

    #[error(transparent)]
    Project(#[from] ProjectError),
}
