//! In-memory backend

use super::{Backend, StoreError};
use crate::anchor::Anchor;
use osp_types::AnchorId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Process-local committed anchors
#[derive(Debug, Default)]
pub struct MemoryBackend {
    anchors: RwLock<HashMap<AnchorId, Anchor>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.anchors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.read().is_empty()
    }
}

impl Backend for MemoryBackend {
    fn load(&self, id: &AnchorId) -> Result<Option<Anchor>, StoreError> {
        Ok(self.anchors.read().get(id).cloned())
    }

    fn write(&self, anchors: &[Anchor]) -> Result<(), StoreError> {
        let mut map = self.anchors.write();
        for anchor in anchors {
            map.insert(anchor.id, anchor.clone());
        }
        Ok(())
    }

    fn erase(&self, ids: &[AnchorId]) -> Result<(), StoreError> {
        let mut map = self.anchors.write();
        for id in ids {
            map.remove(id);
        }
        Ok(())
    }

    fn root_ids(&self) -> Result<Vec<AnchorId>, StoreError> {
        Ok(self
            .anchors
            .read()
            .values()
            .filter(|a| a.is_root())
            .map(|a| a.id)
            .collect())
    }
}
