//! Runtime coordinator for the object-spatial engine
//!
//! The runtime owns:
//! - Configuration
//! - The archetype registry (immutable once the runtime starts)
//! - The anchor store and its durable backend
//! - The system root (bootstrapped on start)
//! - The task pool (created on first use)
//!
//! Roots act through [`Context`] handles obtained from the runtime.

use crate::anchor::Anchor;
use crate::archetype::ArchetypeRegistry;
use crate::config::EngineConfig;
use crate::context::Context;
use crate::error::{EngineError, Result};
use crate::pool::TaskPool;
use crate::store::{AnchorStore, Backend, FileBackend, MemoryBackend};
use once_cell::sync::OnceCell;
use osp_types::AnchorId;
use std::fmt;
use std::sync::Arc;

struct RuntimeInner {
    config: EngineConfig,
    registry: ArchetypeRegistry,
    store: AnchorStore,
    pool: OnceCell<TaskPool>,
}

impl Drop for RuntimeInner {
    fn drop(&mut self) {
        if !self.config.store.commit_on_drop {
            return;
        }
        if let Err(e) = self.store.commit(None) {
            tracing::error!(error = %e, "failed to commit anchors on shutdown");
        }
    }
}

/// Shared engine state
///
/// Cheap to clone; all clones refer to the same store.
///
/// # Example
///
/// ```
/// use osp_runtime::{ArchetypeDef, ArchetypeRegistry, Runtime};
///
/// let registry = ArchetypeRegistry::new()
///     .with(ArchetypeDef::node("City"))
///     .unwrap();
/// let runtime = Runtime::new(registry).unwrap();
///
/// let root = runtime.create_root().unwrap();
/// let ctx = runtime.context(root).unwrap();
/// let city = ctx.create_node("City").unwrap();
/// ctx.connect(&[root], &[city], &Default::default()).unwrap();
/// assert_eq!(ctx.edges_of(root).unwrap().len(), 1);
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// In-memory runtime with default configuration
    pub fn new(registry: ArchetypeRegistry) -> Result<Self> {
        Self::with_config(EngineConfig::default(), registry)
    }

    /// Runtime whose backend is chosen by `config.store`
    pub fn with_config(config: EngineConfig, registry: ArchetypeRegistry) -> Result<Self> {
        let backend: Arc<dyn Backend> = match config.store_path() {
            Some(path) => Arc::new(FileBackend::open(path)?),
            None => Arc::new(MemoryBackend::new()),
        };
        Self::with_backend(config, registry, backend)
    }

    /// Runtime over an explicit backend
    pub fn with_backend(
        config: EngineConfig,
        registry: ArchetypeRegistry,
        backend: Arc<dyn Backend>,
    ) -> Result<Self> {
        let runtime = Self {
            inner: Arc::new(RuntimeInner {
                config,
                registry,
                store: AnchorStore::new(backend),
                pool: OnceCell::new(),
            }),
        };
        runtime.bootstrap()?;
        Ok(runtime)
    }

    /// Make sure the system root exists
    fn bootstrap(&self) -> Result<()> {
        let id = AnchorId::SYSTEM_ROOT;
        if self.store().get(&id)?.is_none() {
            self.store().put(Anchor::root_node(id));
            tracing::info!(root = %id, "created system root");
        }
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &ArchetypeRegistry {
        &self.inner.registry
    }

    pub fn store(&self) -> &AnchorStore {
        &self.inner.store
    }

    pub fn system_root(&self) -> AnchorId {
        AnchorId::SYSTEM_ROOT
    }

    /// Context acting as the system root
    pub fn system_context(&self) -> Context {
        Context::new(self.clone(), AnchorId::SYSTEM_ROOT)
    }

    /// Context acting as `root`
    pub fn context(&self, root: AnchorId) -> Result<Context> {
        let anchor = self
            .store()
            .get(&root)?
            .ok_or(EngineError::AnchorNotFound(root))?;
        if !anchor.is_root() {
            return Err(EngineError::invalid_archetype(
                anchor.type_name().unwrap_or("<unpopulated>"),
                format!("anchor {root} is not a root"),
            ));
        }
        Ok(Context::new(self.clone(), root))
    }

    /// Create a new persistent, self-owned root
    pub fn create_root(&self) -> Result<AnchorId> {
        let id = AnchorId::new();
        self.store().put(Anchor::root_node(id));
        tracing::info!(root = %id, "created root");
        Ok(id)
    }

    /// Every known root, the system root included
    pub fn roots(&self) -> Result<Vec<AnchorId>> {
        Ok(self.store().get_roots()?)
    }

    /// Flush persistent anchors to the backend
    pub fn commit(&self) -> Result<usize> {
        Ok(self.store().commit(None)?)
    }

    /// Task pool, created on first use
    pub fn pool(&self) -> Result<&TaskPool> {
        self.inner
            .pool
            .get_or_try_init(|| TaskPool::new(self.config().pool.workers))
    }

    /// Get statistics about the runtime
    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            cached_anchors: self.store().len(),
            persistent_anchors: self.store().persistent_count(),
            pool_started: self.inner.pool.get().is_some(),
        }
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Statistics about the runtime
#[derive(Debug, Clone)]
pub struct RuntimeStats {
    /// Anchors resident in the cache
    pub cached_anchors: usize,
    /// Cached anchors that will be committed
    pub persistent_anchors: usize,
    /// Whether the task pool has been created
    pub pool_started: bool,
}
