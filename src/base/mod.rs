//! Foundation types for the anchor engine.
//!
//! This module provides fundamental types used throughout the crate:
//! - [`FileId`] - Stable file identity keys
//! - [`TextRange`], [`TextSize`] - Source positions (byte offsets)
//! - [`ChangeEvent`], [`AnchorState`] - Document edits and the range algebra over them
//!
//! This module has NO dependencies on other anchorage modules.

mod edit;
mod file_id;

pub use edit::{AnchorState, ChangeEvent, apply_change};
pub use file_id::FileId;

// Re-export text-size types for convenience
pub use text_size::{self, TextLen, TextRange, TextSize};
