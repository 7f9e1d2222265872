//! Graph mutation
//!
//! Edges are created by `connect` (through an [`EdgeBuilder`]) and removed
//! by `disconnect`. Both sides of a connection must grant the context at
//! least `Connect` access; pairs that do not are skipped, not failed.

mod path;

pub use path::{ArchetypeFilter, EdgeStep, SpatialPath, VisitTarget};

use crate::anchor::Anchor;
use crate::archetype::{Archetype, GENERIC_EDGE};
use crate::context::Context;
use crate::error::{EngineError, Result};
use osp_types::{AnchorId, AnchorKind, EdgeDir};
use serde_json::Value;

/// Which edge archetype `connect` builds
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeSpec {
    /// Instantiate a registered edge type with its defaults
    Type(String),
    /// Use this payload for every edge built
    Instance(Archetype),
}

impl Default for EdgeSpec {
    fn default() -> Self {
        EdgeSpec::Type(GENERIC_EDGE.to_string())
    }
}

/// Options for [`Context::connect`]
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub edge: EdgeSpec,
    pub undirected: bool,
    /// Field assignments applied to each new edge
    pub assign: Vec<(String, Value)>,
    /// Return the created edges instead of the right-hand nodes
    pub edges_only: bool,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edge_type(mut self, name: impl Into<String>) -> Self {
        self.edge = EdgeSpec::Type(name.into());
        self
    }

    pub fn edge_instance(mut self, archetype: Archetype) -> Self {
        self.edge = EdgeSpec::Instance(archetype);
        self
    }

    pub fn undirected(mut self) -> Self {
        self.undirected = true;
        self
    }

    pub fn assign(mut self, field: impl Into<String>, value: Value) -> Self {
        self.assign.push((field.into(), value));
        self
    }

    pub fn edges_only(mut self) -> Self {
        self.edges_only = true;
        self
    }
}

/// Edge factory produced by [`Context::build_edge`]
///
/// The payload is validated once, when the builder is created.
#[derive(Debug)]
pub struct EdgeBuilder<'a> {
    ctx: &'a Context,
    archetype: Archetype,
    undirected: bool,
}

impl EdgeBuilder<'_> {
    /// Create an edge from `source` to `target`
    ///
    /// The edge is registered on both endpoints and saved if either
    /// endpoint is persistent.
    pub fn build(&self, source: AnchorId, target: AnchorId) -> Result<AnchorId> {
        let anchor = Anchor::edge(self.archetype.clone(), source, target, self.undirected);
        let id = anchor.id;
        let store = self.ctx.store();
        store.put(anchor);

        let mut persistent = false;
        for endpoint in [source, target] {
            let attached = store.with_mut(&endpoint, |a| {
                if let Some(node) = a.as_node_mut() {
                    node.edges.push(id);
                }
                a.persistent
            })?;
            persistent |= attached.ok_or(EngineError::AnchorNotFound(endpoint))?;
        }

        if persistent {
            self.ctx.save(id)?;
        }

        tracing::trace!(
            edge = %id,
            archetype = %self.archetype.type_name(),
            source = %source,
            target = %target,
            "built edge"
        );
        Ok(id)
    }
}

impl Context {
    /// Validate an edge payload and return a factory for it
    pub fn build_edge(
        &self,
        undirected: bool,
        edge: &EdgeSpec,
        assign: &[(String, Value)],
    ) -> Result<EdgeBuilder<'_>> {
        let archetype = match edge {
            EdgeSpec::Type(name) => {
                self.registry().expect_kind(name, AnchorKind::Edge)?;
                self.registry().instantiate_with(name, assign)?
            }
            EdgeSpec::Instance(archetype) => {
                let name = archetype.type_name();
                self.registry().expect_kind(name, AnchorKind::Edge)?;
                self.registry()
                    .check_fields(name, assign.iter().map(|(k, _)| k.as_str()))?;
                let mut archetype = archetype.clone();
                for (field, value) in assign {
                    archetype.set(field.clone(), value.clone());
                }
                archetype
            }
        };

        Ok(EdgeBuilder {
            ctx: self,
            archetype,
            undirected,
        })
    }

    /// Connect every left node to every right node
    ///
    /// Returns the right-hand nodes, or the created edges with
    /// `edges_only`. Pairs where either side lacks connect access are
    /// skipped.
    pub fn connect(
        &self,
        left: &[AnchorId],
        right: &[AnchorId],
        options: &ConnectOptions,
    ) -> Result<Vec<AnchorId>> {
        for &id in left.iter().chain(right) {
            self.require(id)?.expect_kind(AnchorKind::Node)?;
        }

        let builder = self.build_edge(options.undirected, &options.edge, &options.assign)?;
        let mut edges = Vec::new();

        for &l in left {
            if !self.check_connect_access(l)? {
                continue;
            }
            for &r in right {
                if !self.check_connect_access(r)? {
                    continue;
                }
                edges.push(builder.build(l, r)?);
            }
        }

        tracing::debug!(
            left = left.len(),
            right = right.len(),
            edges = edges.len(),
            "connected nodes"
        );

        if options.edges_only {
            Ok(edges)
        } else {
            Ok(right.to_vec())
        }
    }

    /// Remove edges between `left` and `right`
    ///
    /// With `Out`, `left` must be the source; with `In`, the target; `Any`
    /// accepts both. The far node must grant connect access. Returns true
    /// if at least one matching edge was found.
    pub fn disconnect(
        &self,
        left: &[AnchorId],
        right: &[AnchorId],
        dir: EdgeDir,
        filter: Option<&ArchetypeFilter>,
    ) -> Result<bool> {
        for &id in left.iter().chain(right) {
            self.require(id)?.expect_kind(AnchorKind::Node)?;
        }

        let mut occurred = false;
        for &l in left {
            let mut edge_ids = self.edges_of(l)?;
            let mut seen = std::collections::HashSet::new();
            edge_ids.retain(|e| seen.insert(*e));

            for edge_id in edge_ids {
                let Some(edge) = self.get(edge_id)? else {
                    continue;
                };
                let (Some(archetype), Some(state)) = (edge.archetype.as_ref(), edge.as_edge())
                else {
                    continue;
                };
                if let Some(filter) = filter {
                    if !filter.matches(self.registry(), archetype) {
                        continue;
                    }
                }
                let (source, target) = (state.source(), state.target());

                let far = if dir.includes_out() && source == l && right.contains(&target) {
                    Some(target)
                } else if dir.includes_in() && target == l && right.contains(&source) {
                    Some(source)
                } else {
                    None
                };
                let Some(far) = far else {
                    continue;
                };
                if !self.check_connect_access(far)? {
                    continue;
                }

                if edge.persistent {
                    self.destroy(&[edge_id])?;
                } else {
                    self.detach(edge_id)?;
                    self.store().delete(&edge_id);
                }
                occurred = true;
            }
        }
        Ok(occurred)
    }

    /// Remove an edge from both endpoints' edge lists
    ///
    /// The edge anchor itself is left in the store.
    pub fn detach(&self, edge: AnchorId) -> Result<()> {
        let anchor = self.require(edge)?;
        anchor.expect_kind(AnchorKind::Edge)?;
        let Some(state) = anchor.as_edge() else {
            return Ok(());
        };

        for endpoint in [state.source(), state.target()] {
            self.store().with_mut(&endpoint, |a| {
                if let Some(node) = a.as_node_mut() {
                    node.edges.retain(|e| *e != edge);
                }
            })?;
        }
        tracing::trace!(edge = %edge, "detached edge");
        Ok(())
    }
}
