//! Spatial paths and edge-reference queries

use crate::archetype::{Archetype, ArchetypeRegistry};
use crate::context::Context;
use crate::error::Result;
use osp_types::{AnchorId, AnchorKind, EdgeDir};
use std::fmt;
use std::sync::Arc;

type Predicate = Arc<dyn Fn(&Archetype) -> bool + Send + Sync>;

/// Filter on archetype type and/or contents
///
/// Type matching is subtype-aware. An empty filter matches everything.
#[derive(Clone, Default)]
pub struct ArchetypeFilter {
    types: Vec<String>,
    predicate: Option<Predicate>,
}

impl ArchetypeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn types(names: &[&str]) -> Self {
        Self {
            types: names.iter().map(|n| n.to_string()).collect(),
            predicate: None,
        }
    }

    pub fn of_type(name: impl Into<String>) -> Self {
        Self {
            types: vec![name.into()],
            predicate: None,
        }
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Archetype) -> bool + Send + Sync + 'static,
    {
        Self::new().and(f)
    }

    /// Add a content predicate
    pub fn and<F>(mut self, f: F) -> Self
    where
        F: Fn(&Archetype) -> bool + Send + Sync + 'static,
    {
        let combined: Predicate = match self.predicate.take() {
            Some(prev) => Arc::new(move |a: &Archetype| prev(a) && f(a)),
            None => Arc::new(f),
        };
        self.predicate = Some(combined);
        self
    }

    pub fn matches(&self, registry: &ArchetypeRegistry, archetype: &Archetype) -> bool {
        let type_ok = self.types.is_empty()
            || self
                .types
                .iter()
                .any(|t| registry.is_subtype(archetype.type_name(), t));
        type_ok && self.predicate.as_ref().map_or(true, |p| p(archetype))
    }
}

impl fmt::Debug for ArchetypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchetypeFilter")
            .field("types", &self.types)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

/// One hop of a spatial path
#[derive(Debug, Clone, Default)]
pub struct EdgeStep {
    pub dir: EdgeDir,
    pub edge_filter: Option<ArchetypeFilter>,
    pub node_filter: Option<ArchetypeFilter>,
}

impl EdgeStep {
    pub fn new(dir: EdgeDir) -> Self {
        Self {
            dir,
            ..Default::default()
        }
    }
}

/// Origin nodes followed by a chain of edge steps
///
/// ```
/// use osp_runtime::graph::SpatialPath;
/// use osp_runtime::AnchorId;
///
/// // [here ->:Road:-> City]
/// let here = AnchorId::new();
/// let path = SpatialPath::from_node(here).out().edge_type("Road").node_type("City");
/// assert_eq!(path.steps().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SpatialPath {
    origin: Vec<AnchorId>,
    steps: Vec<EdgeStep>,
    edges_only: bool,
}

impl SpatialPath {
    pub fn new(origin: Vec<AnchorId>) -> Self {
        Self {
            origin,
            steps: Vec::new(),
            edges_only: false,
        }
    }

    pub fn from_node(node: AnchorId) -> Self {
        Self::new(vec![node])
    }

    pub fn step(mut self, step: EdgeStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step_dir(self, dir: EdgeDir) -> Self {
        self.step(EdgeStep::new(dir))
    }

    pub fn out(self) -> Self {
        self.step_dir(EdgeDir::Out)
    }

    pub fn inbound(self) -> Self {
        self.step_dir(EdgeDir::In)
    }

    pub fn any(self) -> Self {
        self.step_dir(EdgeDir::Any)
    }

    fn last_step(&mut self) -> &mut EdgeStep {
        if self.steps.is_empty() {
            self.steps.push(EdgeStep::default());
        }
        let last = self.steps.len() - 1;
        &mut self.steps[last]
    }

    /// Restrict the last step's edges to a type
    pub fn edge_type(self, name: &str) -> Self {
        self.edge_filter(ArchetypeFilter::of_type(name))
    }

    pub fn edge_filter(mut self, filter: ArchetypeFilter) -> Self {
        self.last_step().edge_filter = Some(filter);
        self
    }

    /// Restrict the last step's far nodes to a type
    pub fn node_type(self, name: &str) -> Self {
        self.node_filter(ArchetypeFilter::of_type(name))
    }

    pub fn node_filter(mut self, filter: ArchetypeFilter) -> Self {
        self.last_step().node_filter = Some(filter);
        self
    }

    /// Yield the last step's edges instead of its far nodes
    pub fn edges_only(mut self) -> Self {
        self.edges_only = true;
        self
    }

    pub fn origin(&self) -> &[AnchorId] {
        &self.origin
    }

    pub fn steps(&self) -> &[EdgeStep] {
        &self.steps
    }

    pub fn is_edges_only(&self) -> bool {
        self.edges_only
    }
}

/// Something a walker can be told to visit
#[derive(Debug, Clone)]
pub enum VisitTarget {
    One(AnchorId),
    Many(Vec<AnchorId>),
    Path(SpatialPath),
}

impl From<AnchorId> for VisitTarget {
    fn from(id: AnchorId) -> Self {
        VisitTarget::One(id)
    }
}

impl From<Vec<AnchorId>> for VisitTarget {
    fn from(ids: Vec<AnchorId>) -> Self {
        VisitTarget::Many(ids)
    }
}

impl From<&[AnchorId]> for VisitTarget {
    fn from(ids: &[AnchorId]) -> Self {
        VisitTarget::Many(ids.to_vec())
    }
}

impl From<SpatialPath> for VisitTarget {
    fn from(path: SpatialPath) -> Self {
        VisitTarget::Path(path)
    }
}

impl Context {
    /// Evaluate a spatial path
    ///
    /// Each step follows the incident edges of the current frontier in the
    /// requested direction; undirected edges match either way. Far nodes the
    /// context cannot read are dropped.
    pub fn refs(&self, path: &SpatialPath) -> Result<Vec<AnchorId>> {
        let mut frontier = Vec::with_capacity(path.origin.len());
        for &origin in &path.origin {
            self.require(origin)?.expect_kind(AnchorKind::Node)?;
            frontier.push(origin);
        }

        let registry = self.registry();
        for (i, step) in path.steps.iter().enumerate() {
            let mut nodes = Vec::new();
            let mut edges = Vec::new();

            for &origin in &frontier {
                for edge_id in self.edges_of(origin)? {
                    let Some(edge) = self.get(edge_id)? else {
                        continue;
                    };
                    let (Some(archetype), Some(state)) = (edge.archetype.as_ref(), edge.as_edge())
                    else {
                        continue;
                    };
                    if let Some(filter) = &step.edge_filter {
                        if !filter.matches(registry, archetype) {
                            continue;
                        }
                    }

                    let leaves = state.source() == origin
                        || (state.is_undirected() && state.target() == origin);
                    let arrives = state.target() == origin
                        || (state.is_undirected() && state.source() == origin);
                    if !((step.dir.includes_out() && leaves) || (step.dir.includes_in() && arrives))
                    {
                        continue;
                    }
                    let Some(far) = state.other(origin) else {
                        continue;
                    };

                    let Some(far_anchor) = self.get(far)? else {
                        continue;
                    };
                    let Some(far_archetype) = far_anchor.archetype.as_ref() else {
                        continue;
                    };
                    if let Some(filter) = &step.node_filter {
                        if !filter.matches(registry, far_archetype) {
                            continue;
                        }
                    }
                    if !self.check_read_access(far)? {
                        continue;
                    }

                    edges.push(edge_id);
                    nodes.push(far);
                }
            }

            if path.edges_only && i + 1 == path.steps.len() {
                return Ok(edges);
            }
            frontier = nodes;
        }

        Ok(frontier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_matches_subtypes_and_predicates() {
        let registry = ArchetypeRegistry::new()
            .with(crate::archetype::ArchetypeDef::node("City"))
            .unwrap()
            .with(crate::archetype::ArchetypeDef::node("Capital").extends("City"))
            .unwrap();

        let mut big = Archetype::new("Capital");
        big.set("population", json!(1_000_000));
        let small = Archetype::new("City");

        let filter = ArchetypeFilter::of_type("City");
        assert!(filter.matches(&registry, &big));
        assert!(filter.matches(&registry, &small));

        let filter = filter.and(|a| a.get("population").is_some());
        assert!(filter.matches(&registry, &big));
        assert!(!filter.matches(&registry, &small));

        assert!(ArchetypeFilter::new().matches(&registry, &small));
    }

    #[test]
    fn test_path_builder_targets_last_step() {
        let path = SpatialPath::from_node(AnchorId::new())
            .out()
            .edge_type("Road")
            .inbound()
            .node_type("City")
            .edges_only();

        assert_eq!(path.steps().len(), 2);
        assert!(path.steps()[0].edge_filter.is_some());
        assert!(path.steps()[0].node_filter.is_none());
        assert_eq!(path.steps()[1].dir, EdgeDir::In);
        assert!(path.steps()[1].node_filter.is_some());
        assert!(path.is_edges_only());
    }
}
