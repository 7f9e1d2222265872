//! Persistence bridge
//!
//! `save` promotes anchors to persistent and pulls their ephemeral
//! neighbourhood along with them; `destroy` removes anchors the context may
//! write; `commit` flushes the store's persistent anchors to the backend.

use crate::anchor::AnchorState;
use crate::context::Context;
use crate::error::{EngineError, Result};
use osp_types::AnchorId;

impl Context {
    /// Mark an anchor persistent and write it into the store
    ///
    /// Rootless anchors are adopted by the context's root. Saving a node
    /// also saves its cached ephemeral edges; saving an edge also saves its
    /// cached ephemeral endpoints.
    pub fn save(&self, id: AnchorId) -> Result<()> {
        let user_root = self.user_root();
        let related = self
            .store()
            .with_mut(&id, |anchor| {
                if !anchor.persistent {
                    anchor.persistent = true;
                    if anchor.root.is_none() {
                        anchor.root = Some(user_root);
                    }
                    tracing::trace!(anchor = %anchor.id, root = ?anchor.root, "saved anchor");
                }
                match &anchor.state {
                    AnchorState::Node(node) => node.edges.clone(),
                    AnchorState::Edge(edge) => vec![edge.source(), edge.target()],
                    AnchorState::Walker(_) => Vec::new(),
                }
            })?
            .ok_or(EngineError::AnchorNotFound(id))?;

        for other in related {
            if !self.store().is_cached(&other) {
                continue;
            }
            let pending = self
                .store()
                .with(&other, |a| a.is_populated() && !a.persistent)?
                .unwrap_or(false);
            if pending {
                self.save(other)?;
            }
        }
        Ok(())
    }

    /// Destroy anchors the context has write access to
    ///
    /// Destroying a node first destroys its edges; destroying an edge
    /// detaches it from its endpoints. Anchors without write access, or
    /// that no longer exist, are skipped.
    pub fn destroy(&self, ids: &[AnchorId]) -> Result<()> {
        for &id in ids {
            let Some(anchor) = self.get(id)? else {
                tracing::debug!(anchor = %id, "destroy skipped missing anchor");
                continue;
            };
            if !self.check_write_access(id)? {
                continue;
            }

            match &anchor.state {
                AnchorState::Node(node) => {
                    let mut edges = node.edges.clone();
                    edges.dedup();
                    self.destroy(&edges)?;
                }
                AnchorState::Edge(_) => self.detach(id)?,
                AnchorState::Walker(_) => {}
            }

            self.store().delete(&id);
            tracing::debug!(anchor = %id, persistent = anchor.persistent, "destroyed anchor");
        }
        Ok(())
    }

    /// Flush every persistent anchor to the backend
    pub fn commit(&self) -> Result<usize> {
        Ok(self.store().commit(None)?)
    }

    /// Flush a single anchor to the backend
    pub fn commit_anchor(&self, id: AnchorId) -> Result<usize> {
        Ok(self.store().commit(Some(id))?)
    }
}

#[cfg(test)]
mod tests {
    use crate::archetype::{ArchetypeDef, ArchetypeRegistry};
    use crate::graph::ConnectOptions;
    use crate::runtime::Runtime;
    use crate::store::{Backend, MemoryBackend};
    use crate::EngineConfig;
    use std::sync::Arc;

    fn registry() -> ArchetypeRegistry {
        ArchetypeRegistry::new()
            .with(ArchetypeDef::node("City"))
            .unwrap()
    }

    #[test]
    fn test_save_adopts_rootless_anchor() {
        let runtime = Runtime::new(registry()).unwrap();
        let root = runtime.create_root().unwrap();
        let ctx = runtime.context(root).unwrap();
        let city = ctx.create_node("City").unwrap();

        ctx.save(city).unwrap();
        let anchor = ctx.get(city).unwrap().unwrap();
        assert!(anchor.persistent);
        assert_eq!(anchor.root, Some(root));
    }

    #[test]
    fn test_save_cascades_through_edges() {
        let ctx = Runtime::new(registry()).unwrap().system_context();
        let a = ctx.create_node("City").unwrap();
        let b = ctx.create_node("City").unwrap();
        let c = ctx.create_node("City").unwrap();
        ctx.connect(&[a], &[b], &ConnectOptions::new()).unwrap();
        ctx.connect(&[b], &[c], &ConnectOptions::new()).unwrap();

        ctx.save(a).unwrap();
        for id in [a, b, c] {
            assert!(ctx.get(id).unwrap().unwrap().persistent);
        }
        for edge in ctx.edges_of(b).unwrap() {
            assert!(ctx.get(edge).unwrap().unwrap().persistent);
        }
    }

    #[test]
    fn test_destroy_node_removes_its_edges() {
        let ctx = Runtime::new(registry()).unwrap().system_context();
        let a = ctx.create_node("City").unwrap();
        let b = ctx.create_node("City").unwrap();
        let edges = ctx
            .connect(&[a], &[b], &ConnectOptions::new().edges_only())
            .unwrap();

        ctx.destroy(&[a]).unwrap();
        assert!(ctx.get(a).unwrap().is_none());
        assert!(ctx.get(edges[0]).unwrap().is_none());
        assert!(ctx.edges_of(b).unwrap().is_empty());
    }

    #[test]
    fn test_destroy_without_write_access_is_noop() {
        let runtime = Runtime::new(registry()).unwrap();
        let owner = runtime.context(runtime.create_root().unwrap()).unwrap();
        let city = owner.create_node("City").unwrap();
        owner.save(city).unwrap();

        let stranger = runtime.context(runtime.create_root().unwrap()).unwrap();
        stranger.destroy(&[city]).unwrap();
        assert!(owner.get(city).unwrap().is_some());
    }

    #[test]
    fn test_destroyed_persistent_anchor_erased_on_commit() {
        let backend = Arc::new(MemoryBackend::new());
        let runtime =
            Runtime::with_backend(EngineConfig::default(), registry(), backend.clone()).unwrap();
        let ctx = runtime.system_context();
        let city = ctx.create_node("City").unwrap();
        ctx.save(city).unwrap();
        ctx.commit().unwrap();
        assert!(backend.load(&city).unwrap().is_some());

        ctx.destroy(&[city]).unwrap();
        ctx.commit_anchor(city).unwrap();
        assert!(backend.load(&city).unwrap().is_none());
    }
}
