//! JSON file backend
//!
//! The whole committed graph lives in one JSON document. Every write
//! rewrites it through a temporary file in the same directory and renames
//! it into place, so readers never observe a partial document.

use super::{Backend, StoreError};
use crate::anchor::Anchor;
use osp_types::AnchorId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct Document {
    #[allow(dead_code)]
    version: u32,
    anchors: Vec<Anchor>,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: u32,
    anchors: Vec<&'a Anchor>,
}

/// Committed anchors backed by a JSON document on disk
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    anchors: RwLock<HashMap<AnchorId, Anchor>>,
}

impl FileBackend {
    /// Open the document at `path`, starting empty if it does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let anchors = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            let document: Document = serde_json::from_str(&contents)?;
            document.anchors.into_iter().map(|a| (a.id, a)).collect()
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            HashMap::new()
        };

        tracing::debug!(path = %path.display(), anchors = anchors.len(), "opened file store");
        Ok(Self {
            path,
            anchors: RwLock::new(anchors),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, anchors: &HashMap<AnchorId, Anchor>) -> Result<(), StoreError> {
        let mut sorted: Vec<&Anchor> = anchors.values().collect();
        sorted.sort_by_key(|a| a.id);
        let document = DocumentRef {
            version: FORMAT_VERSION,
            anchors: sorted,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &document)?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::Persist(e.to_string()))?;
        Ok(())
    }
}

impl Backend for FileBackend {
    fn load(&self, id: &AnchorId) -> Result<Option<Anchor>, StoreError> {
        Ok(self.anchors.read().get(id).cloned())
    }

    fn write(&self, anchors: &[Anchor]) -> Result<(), StoreError> {
        let mut map = self.anchors.write();
        for anchor in anchors {
            map.insert(anchor.id, anchor.clone());
        }
        self.flush(&map)
    }

    fn erase(&self, ids: &[AnchorId]) -> Result<(), StoreError> {
        let mut map = self.anchors.write();
        for id in ids {
            map.remove(id);
        }
        self.flush(&map)
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
