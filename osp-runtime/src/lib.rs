//! osp-runtime - object-spatial graph runtime
//!
//! This crate runs walkers over a persistent graph of nodes and edges. Data
//! lives in anchors; behaviour lives in abilities attached to archetypes and
//! fires as walkers enter and leave locations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Runtime                            │
//! │  (config, archetype registry, task pool, system root)       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌──────────────┐   ┌──────────────┐                        │
//! │  │  Context A   │   │  Context B   │  ...   (one per root)  │
//! │  │ (user root)  │   │ (user root)  │                        │
//! │  └──────┬───────┘   └──────┬───────┘                        │
//! │         │  access checks   │                                │
//! │         ▼                  ▼                                │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                   AnchorStore                       │    │
//! │  │    nodes ──edges──▶ nodes        walkers            │    │
//! │  │    (canonical instances, write-back cache)          │    │
//! │  └──────────────────────────┬──────────────────────────┘    │
//! │                             │ commit                        │
//! │                             ▼                               │
//! │                 Backend (memory / JSON file)                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! ## Anchors and archetypes
//!
//! An **anchor** is the engine's record for a node, edge or walker: its id,
//! owning root, persistence flag, access metadata and structural links. The
//! **archetype** is the user payload it carries. Archetype types are
//! registered up front in an [`ArchetypeRegistry`] with their fields,
//! bases and abilities.
//!
//! ## Walkers
//!
//! A walker is spawned onto a location and works through a visit queue.
//! Entering a location runs the walker's abilities typed for that location
//! and the location's abilities (untyped, then typed for the walker); the
//! queue is then drained depth-first before the matching exit abilities
//! run in reverse order.
//!
//! ## Access
//!
//! Every root acts through a [`Context`]. Reads, connections and writes on
//! persistent anchors are checked against the anchor's permissions and its
//! owning root's. Denied operations are skipped and logged.
//!
//! ## Persistence
//!
//! Anchors start ephemeral. `save` makes them persistent (and adopts them
//! into the acting root); `commit` flushes persistent anchors to the
//! backend.
//!
//! # Example
//!
//! ```rust
//! use osp_runtime::{Ability, ArchetypeDef, ArchetypeRegistry, ConnectOptions, Runtime};
//! use serde_json::json;
//!
//! let registry = ArchetypeRegistry::new()
//!     .with(ArchetypeDef::node("City").field("name", json!("")))
//!     .unwrap()
//!     .with(
//!         ArchetypeDef::walker("Tour")
//!             .on_entry(Ability::on("start", &["Root"], |cx| {
//!                 cx.visit_neighbors(Default::default())?;
//!                 Ok(())
//!             }))
//!             .on_entry(Ability::on("stop", &["City"], |cx| {
//!                 let name = cx.here_field("name").unwrap_or_default();
//!                 cx.report(name);
//!                 Ok(())
//!             })),
//!     )
//!     .unwrap();
//!
//! let runtime = Runtime::new(registry).unwrap();
//! let root = runtime.create_root().unwrap();
//! let ctx = runtime.context(root).unwrap();
//!
//! let oslo = ctx
//!     .create_node_with("City", &[("name".into(), json!("Oslo"))])
//!     .unwrap();
//! ctx.connect(&[root], &[oslo], &ConnectOptions::new()).unwrap();
//!
//! let tour = ctx.create_walker("Tour").unwrap();
//! ctx.spawn(tour, root).unwrap();
//! assert_eq!(ctx.walker_reports(tour).unwrap(), vec![json!("Oslo")]);
//! ```

// Modules
pub mod access;
pub mod anchor;
pub mod archetype;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod persistence;
pub mod pool;
pub mod runtime;
pub mod store;
pub mod walker;

// Re-exports for convenience
pub use anchor::{Anchor, AnchorState, EdgeState, NodeState, WalkerState};
pub use archetype::{
    Ability, AbilityCx, AccessHook, Archetype, ArchetypeDef, ArchetypeRegistry, Phase, Trigger,
    GENERIC_EDGE, ROOT_ARCHETYPE,
};
pub use config::{ConfigError, EngineConfig};
pub use context::Context;
pub use error::{EngineError, Result};
pub use graph::{
    ArchetypeFilter, ConnectOptions, EdgeBuilder, EdgeSpec, EdgeStep, SpatialPath, VisitTarget,
};
pub use osp_types::{AccessLevel, AnchorId, AnchorKind, EdgeDir, Permission};
pub use pool::{TaskHandle, TaskPool};
pub use runtime::{Runtime, RuntimeStats};
pub use store::{AnchorStore, Backend, FileBackend, MemoryBackend, StoreError};
pub use walker::SpawnTarget;
