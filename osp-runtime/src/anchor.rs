//! Anchors: identity, structural links and access metadata
//!
//! An anchor wraps an archetype payload with everything the engine needs
//! to place it in the graph. Anchors never own each other; nodes list the
//! ids of their incident edges, edges name their endpoints by id, and the
//! canonical instances live in the [`AnchorStore`](crate::store::AnchorStore).

use crate::archetype::{Archetype, ROOT_ARCHETYPE};
use crate::error::{EngineError, Result};
use osp_types::{AnchorId, AnchorKind, Permission};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashSet, VecDeque};

/// A node's structural state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    /// Incident edges, in connection order
    #[serde(default)]
    pub edges: Vec<AnchorId>,
}

/// An edge's structural state
///
/// Endpoints are fixed when the edge is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeState {
    source: AnchorId,
    target: AnchorId,
    #[serde(default)]
    is_undirected: bool,
}

impl EdgeState {
    pub fn new(source: AnchorId, target: AnchorId, is_undirected: bool) -> Self {
        Self {
            source,
            target,
            is_undirected,
        }
    }

    pub fn source(&self) -> AnchorId {
        self.source
    }

    pub fn target(&self) -> AnchorId {
        self.target
    }

    pub fn is_undirected(&self) -> bool {
        self.is_undirected
    }

    /// The endpoint opposite `node`, if `node` is an endpoint
    pub fn other(&self, node: AnchorId) -> Option<AnchorId> {
        if node == self.source {
            Some(self.target)
        } else if node == self.target {
            Some(self.source)
        } else {
            None
        }
    }
}

/// A walker's traversal state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalkerState {
    /// Pending visit queue (FIFO)
    #[serde(default)]
    pub next: VecDeque<AnchorId>,
    /// Locations entered during the current spawn, in order
    #[serde(default)]
    pub path: Vec<AnchorId>,
    /// Locations to skip for the rest of the current spawn
    #[serde(default)]
    pub ignores: HashSet<AnchorId>,
    #[serde(default)]
    pub disengaged: bool,
    /// Values reported during the most recent spawn
    #[serde(default)]
    pub reports: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnchorState {
    Node(NodeState),
    Edge(EdgeState),
    Walker(WalkerState),
}

/// Runtime wrapper for an archetype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub id: AnchorId,
    /// Payload; `None` means the anchor is known but not populated
    #[serde(default)]
    pub archetype: Option<Archetype>,
    #[serde(default)]
    pub persistent: bool,
    /// Owning root, assigned on first save
    #[serde(default)]
    pub root: Option<AnchorId>,
    #[serde(default)]
    pub access: Permission,
    pub state: AnchorState,
}

impl Anchor {
    fn with_state(archetype: Archetype, state: AnchorState) -> Self {
        Self {
            id: AnchorId::new(),
            archetype: Some(archetype),
            persistent: false,
            root: None,
            access: Permission::default(),
            state,
        }
    }

    /// Create an ephemeral node anchor
    pub fn node(archetype: Archetype) -> Self {
        Self::with_state(archetype, AnchorState::Node(NodeState::default()))
    }

    /// Create an ephemeral edge anchor between two nodes
    pub fn edge(
        archetype: Archetype,
        source: AnchorId,
        target: AnchorId,
        is_undirected: bool,
    ) -> Self {
        Self::with_state(
            archetype,
            AnchorState::Edge(EdgeState::new(source, target, is_undirected)),
        )
    }

    /// Create an ephemeral walker anchor
    pub fn walker(archetype: Archetype) -> Self {
        Self::with_state(archetype, AnchorState::Walker(WalkerState::default()))
    }

    /// Create a root node that owns itself
    pub fn root_node(id: AnchorId) -> Self {
        let mut anchor = Self::node(Archetype::new(ROOT_ARCHETYPE));
        anchor.id = id;
        anchor.persistent = true;
        anchor.root = Some(id);
        anchor
    }

    pub fn kind(&self) -> AnchorKind {
        match self.state {
            AnchorState::Node(_) => AnchorKind::Node,
            AnchorState::Edge(_) => AnchorKind::Edge,
            AnchorState::Walker(_) => AnchorKind::Walker,
        }
    }

    /// Archetype type name, if populated
    pub fn type_name(&self) -> Option<&str> {
        self.archetype.as_ref().map(|a| a.type_name())
    }

    pub fn is_populated(&self) -> bool {
        self.archetype.is_some()
    }

    pub fn is_root(&self) -> bool {
        self.kind() == AnchorKind::Node && self.type_name() == Some(ROOT_ARCHETYPE)
    }

    pub fn as_node(&self) -> Option<&NodeState> {
        match &self.state {
            AnchorState::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut NodeState> {
        match &mut self.state {
            AnchorState::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<&EdgeState> {
        match &self.state {
            AnchorState::Edge(edge) => Some(edge),
            _ => None,
        }
    }

    pub fn as_walker(&self) -> Option<&WalkerState> {
        match &self.state {
            AnchorState::Walker(walker) => Some(walker),
            _ => None,
        }
    }

    pub fn as_walker_mut(&mut self) -> Option<&mut WalkerState> {
        match &mut self.state {
            AnchorState::Walker(walker) => Some(walker),
            _ => None,
        }
    }

    /// Require a specific kind, failing with [`EngineError::WrongKind`]
    pub fn expect_kind(&self, expected: AnchorKind) -> Result<()> {
        let found = self.kind();
        if found == expected {
            Ok(())
        } else {
            Err(EngineError::WrongKind {
                id: self.id,
                expected,
                found,
            })
        }
    }
}
