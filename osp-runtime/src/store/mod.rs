//! Anchor storage
//!
//! This module defines the `Backend` trait for pluggable durable storage
//! and the `AnchorStore` write-back cache that holds the canonical instance
//! of every live anchor. All engine operations read and mutate anchors
//! through the store by id; nothing else keeps a copy that can diverge.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::anchor::Anchor;
use osp_types::AnchorId;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to replace store file: {0}")]
    Persist(String),
}

/// Trait for durable anchor storage
///
/// Implementations decide where committed anchors live:
/// - `MemoryBackend`: process-local map, lost on exit
/// - `FileBackend`: single JSON document, replaced atomically on write
pub trait Backend: Send + Sync {
    /// Fetch a committed anchor
    fn load(&self, id: &AnchorId) -> Result<Option<Anchor>, StoreError>;

    /// Insert or replace committed anchors
    fn write(&self, anchors: &[Anchor]) -> Result<(), StoreError>;

    /// Remove committed anchors; unknown ids are ignored
    fn erase(&self, ids: &[AnchorId]) -> Result<(), StoreError>;

    /// Ids of every committed root node
    fn root_ids(&self) -> Result<Vec<AnchorId>, StoreError>;
}

/// Write-back cache in front of a [`Backend`]
///
/// Misses load through from the backend. Persistent anchors reach the
/// backend only on [`commit`](Self::commit); deletions of persistent
/// anchors are remembered until then.
pub struct AnchorStore {
    cache: RwLock<HashMap<AnchorId, Anchor>>,
    /// Persistent anchors deleted since the last commit
    removed: Mutex<HashSet<AnchorId>>,
    backend: Arc<dyn Backend>,
}

impl AnchorStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            removed: Mutex::new(HashSet::new()),
            backend,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Make sure `id` is cached, loading it from the backend if needed
    fn ensure_loaded(&self, id: &AnchorId) -> Result<bool, StoreError> {
        if self.cache.read().contains_key(id) {
            return Ok(true);
        }
        if self.removed.lock().contains(id) {
            return Ok(false);
        }
        match self.backend.load(id)? {
            Some(anchor) => {
                // A concurrent loader may have won; keep the first instance.
                self.cache.write().entry(*id).or_insert(anchor);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Snapshot of the canonical instance
    pub fn get(&self, id: &AnchorId) -> Result<Option<Anchor>, StoreError> {
        self.with(id, Anchor::clone)
    }

    /// Read the canonical instance in place
    pub fn with<R>(
        &self,
        id: &AnchorId,
        f: impl FnOnce(&Anchor) -> R,
    ) -> Result<Option<R>, StoreError> {
        if !self.ensure_loaded(id)? {
            return Ok(None);
        }
        Ok(self.cache.read().get(id).map(f))
    }

    /// Mutate the canonical instance in place
    pub fn with_mut<R>(
        &self,
        id: &AnchorId,
        f: impl FnOnce(&mut Anchor) -> R,
    ) -> Result<Option<R>, StoreError> {
        if !self.ensure_loaded(id)? {
            return Ok(None);
        }
        Ok(self.cache.write().get_mut(id).map(f))
    }

    /// Whether `id` is resident in the cache
    pub fn is_cached(&self, id: &AnchorId) -> bool {
        self.cache.read().contains_key(id)
    }

    /// Insert or replace the canonical instance
    pub fn put(&self, anchor: Anchor) {
        self.removed.lock().remove(&anchor.id);
        self.cache.write().insert(anchor.id, anchor);
    }

    /// Drop an anchor from the cache
    ///
    /// Persistent anchors are erased from the backend on the next commit.
    pub fn delete(&self, id: &AnchorId) -> Option<Anchor> {
        let removed = self.cache.write().remove(id);
        if removed.as_ref().is_some_and(|a| a.persistent) {
            self.removed.lock().insert(*id);
        }
        removed
    }

    /// Every known root, cached or committed
    pub fn get_roots(&self) -> Result<Vec<AnchorId>, StoreError> {
        let mut roots: BTreeSet<AnchorId> = self
            .cache
            .read()
            .values()
            .filter(|a| a.is_root())
            .map(|a| a.id)
            .collect();
        roots.extend(self.backend.root_ids()?);

        let removed = self.removed.lock();
        Ok(roots.into_iter().filter(|id| !removed.contains(id)).collect())
    }

    /// Flush persistent anchors and pending deletions to the backend
    ///
    /// With `Some(id)` only that anchor is flushed. Returns the number of
    /// anchors written or erased.
    pub fn commit(&self, id: Option<AnchorId>) -> Result<usize, StoreError> {
        let (dirty, erased): (Vec<Anchor>, Vec<AnchorId>) = match id {
            Some(id) => {
                let dirty = self
                    .cache
                    .read()
                    .get(&id)
                    .filter(|a| a.persistent)
                    .cloned()
                    .into_iter()
                    .collect();
                let mut removed = self.removed.lock();
                let erased = if removed.remove(&id) { vec![id] } else { Vec::new() };
                (dirty, erased)
            }
            None => {
                let dirty = self
                    .cache
                    .read()
                    .values()
                    .filter(|a| a.persistent)
                    .cloned()
                    .collect();
                let erased = self.removed.lock().drain().collect();
                (dirty, erased)
            }
        };

        if !erased.is_empty() {
            self.backend.erase(&erased)?;
        }
        if !dirty.is_empty() {
            self.backend.write(&dirty)?;
        }

        tracing::debug!(
            written = dirty.len(),
            erased = erased.len(),
            "committed anchors"
        );
        Ok(dirty.len() + erased.len())
    }

    /// Number of cached anchors
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    /// Number of cached persistent anchors
    pub fn persistent_count(&self) -> usize {
        self.cache.read().values().filter(|a| a.persistent).count()
    }
}
