//! Smart pointers: stable handles to elements across edits and reparses.
//!
//! A [`SmartPointer`] owns an [`AnchorInfo`] and a range tracked by the
//! file's [`DocumentTracker`](crate::tracker::DocumentTracker). The project's
//! registry hands out one pointer per live element and counts references;
//! resolution rebinds the anchor to the current tree on demand.

mod anchor;
mod error;
mod manager;
mod resolve;
mod smart_pointer;

pub use anchor::AnchorInfo;
pub use error::PointerError;
pub use smart_pointer::{MAX_REFERENCE_COUNT, SmartPointer};

pub(crate) use manager::PointerManager;
