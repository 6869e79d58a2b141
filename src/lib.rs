//! # anchorage-base
//!
//! Smart pointers and range anchors that stay valid while the text they point
//! into is edited, reparsed, unloaded and reloaded.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! pointer   → SmartPointer, AnchorInfo, registry and rebind resolver
//!   ↓
//! project   → Files, documents, commits, unload/reload, listeners
//!   ↓
//! syntax    → Stub trees, full syntax trees, FileView and Element
//!   ↓
//! tracker   → Per-document interval treap of anchored ranges
//!   ↓
//! parser    → Logos lexer and rowan parser for the supported languages
//!   ↓
//! base      → Primitives (FileId, ChangeEvent, range algebra, TextRange)
//! ```

// ============================================================================
// MODULES (dependency order: base → parser → tracker → syntax → project → pointer)
// ============================================================================

/// Foundation types: FileId, ChangeEvent, range algebra
pub mod base;

/// Parser: Logos lexer and rowan-based recursive-descent parser
pub mod parser;

/// Document change tracking for anchored ranges
pub mod tracker;

/// Structural views: stub trees, syntax trees, elements
pub mod syntax;

/// Project management: files, documents, commits, unload/reload
pub mod project;

/// Smart pointers and the pointer registry
pub mod pointer;

// Re-export foundation types
pub use base::{AnchorState, ChangeEvent, FileId, TextRange, TextSize};

pub use pointer::{AnchorInfo, PointerError, SmartPointer};
pub use project::{Project, ProjectConfig, ProjectError};
pub use syntax::{Element, Language};
