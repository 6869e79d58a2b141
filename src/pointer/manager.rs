//! The pointer registry.
//!
//! Each file has its own table mapping live elements to the pointer that
//! denotes them. Entries are weak: a pointer dropped by every holder goes
//! away without being removed, and its entry is pruned later.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use rowan::TextRange;
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

use super::anchor::AnchorInfo;
use super::error::PointerError;
use super::smart_pointer::{PointerInner, RegistryKey, SmartPointer};
use crate::base::FileId;
use crate::project::{Project, ProjectError};
use crate::syntax::Element;

const MIN_PRUNE_THRESHOLD: usize = 16;

#[derive(Default)]
struct PointerTable {
    by_element: FxHashMap<RegistryKey, Weak<PointerInner>>,
    all: Vec<Weak<PointerInner>>,
    /// Saturated pointers, kept alive for the lifetime of the project.
    pinned: Vec<SmartPointer>,
    prune_at: usize,
}

impl PointerTable {
    fn live(&self, key: &RegistryKey) -> Option<SmartPointer> {
        self.by_element
            .get(key)
            .and_then(Weak::upgrade)
            .map(SmartPointer)
            .filter(|pointer| !pointer.is_disposed())
    }

    /// Registered pointers resolved against another view than `generation`.
    fn stale(&self, generation: u64) -> Vec<SmartPointer> {
        self.by_element
            .iter()
            .filter(|((key_generation, _), _)| *key_generation != generation)
            .filter_map(|(_, pointer)| pointer.upgrade())
            .map(SmartPointer)
            .filter(|pointer| !pointer.is_disposed())
            .collect()
    }

    fn push(&mut self, pointer: &SmartPointer) {
        if self.all.len() >= self.prune_at {
            self.all.retain(|pointer| {
                pointer
                    .upgrade()
                    .is_some_and(|pointer| !pointer.disposed.load(Ordering::Acquire))
            });
            self.by_element.retain(|_, pointer| pointer.strong_count() > 0);
            self.prune_at = (self.all.len() * 2).max(MIN_PRUNE_THRESHOLD);
        }
        self.all.push(Arc::downgrade(&pointer.0));
    }

    fn count(&self) -> usize {
        self.all
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|pointer| !pointer.disposed.load(Ordering::Acquire))
            .count()
    }
}

/// Per-file pointer tables of a project.
#[derive(Default)]
pub(crate) struct PointerManager {
    tables: RwLock<FxHashMap<FileId, Arc<Mutex<PointerTable>>>>,
}

impl PointerManager {
    fn table(&self, file: FileId) -> Arc<Mutex<PointerTable>> {
        if let Some(table) = self.tables.read().get(&file) {
            return table.clone();
        }
        self.tables.write().entry(file).or_default().clone()
    }

    /// Register `pointer` under the element it now resolves to. If another
    /// pointer already denotes that element, the first one keeps the entry.
    pub(crate) fn rekey(&self, pointer: &SmartPointer, key: RegistryKey) {
        let table = self.table(pointer.file());
        let mut table = table.lock();
        let mut current = pointer.0.registry_key.lock();
        if *current == Some(key) || pointer.is_disposed() {
            return;
        }
        if let Some(old) = current.take() {
            remove_entry(&mut table, &old, pointer);
        }
        if table.live(&key).is_none() {
            table.by_element.insert(key, Arc::downgrade(&pointer.0));
            *current = Some(key);
        }
    }

    /// Drop the registry entry of `pointer`, if it has one.
    pub(crate) fn unregister(&self, pointer: &SmartPointer) {
        let table = self.table(pointer.file());
        let mut table = table.lock();
        if let Some(old) = pointer.0.registry_key.lock().take() {
            remove_entry(&mut table, &old, pointer);
        }
    }
}

fn remove_entry(table: &mut PointerTable, key: &RegistryKey, pointer: &SmartPointer) {
    let owned = table
        .by_element
        .get(key)
        .is_some_and(|entry| Weak::as_ptr(entry) == Arc::as_ptr(&pointer.0));
    if owned {
        table.by_element.remove(key);
    }
}

impl Project {
    /// The pointer to `element`, creating it on first request.
    ///
    /// Asking again for the same live element returns the same pointer with
    /// one more reference. Never loads the document or the full syntax tree
    /// for declarations.
    pub fn create_pointer(&self, element: &Element) -> Result<SmartPointer, PointerError> {
        self.ensure_not_dispatching()?;
        let file = element.file();
        let entry = self.entry(file)?;
        let key = (element.view().generation(), element.id());
        let table = self.inner.pointers.table(file);

        let mut rebound = false;
        loop {
            let stale = {
                let state = entry.state.read();
                if !state.is_current_view(element.view()) {
                    tracing::error!(%file, element = ?element, "pointer requested for an outdated element");
                    return Err(PointerError::InvalidElement(file));
                }
                let mut table = table.lock();
                if let Some(existing) = table.live(&key) {
                    match existing.retain() {
                        Some(saturated) => {
                            if saturated {
                                tracing::debug!(%file, kind = ?existing.kind(), "pointer reference count saturated");
                                table.pinned.push(existing.clone());
                            }
                            return Ok(existing);
                        }
                        None => {
                            table.by_element.remove(&key);
                        }
                    }
                }

                // Pointers made for an older view may denote this element too.
                let stale = if rebound || state.has_uncommitted() {
                    Vec::new()
                } else {
                    table.stale(key.0)
                };
                if stale.is_empty() {
                    let (range, anchor_state) = state.translate_uncommitted(element.range());
                    let slot = entry.tracker.attach_with_state(range, anchor_state);
                    let pointer = SmartPointer::new(
                        self,
                        file,
                        entry.tracker.clone(),
                        slot,
                        AnchorInfo::for_element(element),
                        false,
                    );
                    *pointer.0.registry_key.lock() = Some(key);
                    pointer.set_cache(element);
                    table.by_element.insert(key, Arc::downgrade(&pointer.0));
                    table.push(&pointer);
                    tracing::trace!(%file, kind = ?element.kind(), ?range, "created pointer");
                    return Ok(pointer);
                }
                stale
            };

            let cancel = CancellationToken::new();
            for pointer in &stale {
                if let Err(error) = self.resolve_pointer(pointer, &cancel) {
                    tracing::warn!(%file, %error, "failed to rebind pointer");
                }
            }
            rebound = true;
        }
    }

    /// A pointer to a raw text range of the current document text. Range
    /// pointers are never shared.
    pub fn create_range_pointer(
        &self,
        file: FileId,
        range: TextRange,
    ) -> Result<SmartPointer, PointerError> {
        self.ensure_not_dispatching()?;
        let entry = self.entry(file)?;
        if entry.state.read().text_len.is_none() {
            self.load_document(&entry)?;
        }

        // the state lock keeps edits out until the range is tracked
        let state = entry.state.read();
        let len = state.text_len.ok_or(ProjectError::StaleView)?;
        if range.end() > len {
            return Err(ProjectError::InvalidRange {
                range,
                len: len.into(),
            }
            .into());
        }
        let table = self.inner.pointers.table(file);
        let mut table = table.lock();
        let slot = entry.tracker.attach(range);
        let pointer = SmartPointer::new(
            self,
            file,
            entry.tracker.clone(),
            slot,
            AnchorInfo::for_file(file, state.language),
            true,
        );
        table.push(&pointer);
        tracing::trace!(%file, ?range, "created range pointer");
        Ok(pointer)
    }

    /// Release one reference. The last release detaches the pointer; it then
    /// resolves to nothing. Removing it once more is an error.
    pub fn remove_pointer(&self, pointer: &SmartPointer) -> Result<(), PointerError> {
        let inner = &pointer.0;
        {
            let mut refs = inner.refs.lock();
            if pointer.is_disposed() {
                let kind = pointer.kind();
                tracing::error!(file = %inner.file, ?kind, "double removal of a smart pointer");
                return Err(PointerError::DoubleRemoval {
                    file: inner.file,
                    kind,
                });
            }
            if *refs == super::MAX_REFERENCE_COUNT {
                return Ok(());
            }
            *refs = refs.saturating_sub(1);
            if *refs > 0 {
                return Ok(());
            }
            inner.disposed.store(true, Ordering::Release);
        }
        inner.tracker.detach(inner.slot);
        *inner.cache.lock() = None;
        self.inner.pointers.unregister(pointer);
        tracing::trace!(file = %inner.file, kind = ?pointer.kind(), "disposed pointer");
        Ok(())
    }

    /// Whether both pointers denote the same element now. Range pointers
    /// compare by file and range.
    pub fn point_to_same_element(
        &self,
        first: &SmartPointer,
        second: &SmartPointer,
    ) -> Result<bool, ProjectError> {
        if first == second {
            return Ok(!first.is_disposed());
        }
        if first.file() != second.file() {
            return Ok(false);
        }
        if first.is_range_pointer() || second.is_range_pointer() {
            let first_range = first.range()?;
            return Ok(first_range.is_some() && first_range == second.range()?);
        }
        let first = first.element()?;
        Ok(first.is_some() && first == second.element()?)
    }

    /// Resolve many pointers in parallel. Pending edits are committed first
    /// on the calling thread.
    pub fn resolve_all(
        &self,
        pointers: &[SmartPointer],
    ) -> Vec<Result<Option<Element>, ProjectError>> {
        if let Err(error) = self.commit_all_documents() {
            tracing::warn!(%error, "commit before resolution failed");
        }
        pointers.par_iter().map(SmartPointer::element).collect()
    }

    /// Number of live pointers into `file`.
    pub fn pointer_count(&self, file: FileId) -> usize {
        let table = self.inner.pointers.tables.read().get(&file).cloned();
        table.map(|table| table.lock().count()).unwrap_or(0)
    }

    fn ensure_not_dispatching(&self) -> Result<(), PointerError> {
        if self.is_dispatching_tree_change() {
            tracing::error!("smart pointer requested during tree change notification");
            return Err(PointerError::CreatedDuringTreeChange);
        }
        Ok(())
    }
}
