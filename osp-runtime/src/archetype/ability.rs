//! Abilities and the handle they run with

use crate::context::Context;
use crate::error::Result;
use crate::graph::{SpatialPath, VisitTarget};
use futures::future::BoxFuture;
use osp_types::{AnchorId, EdgeDir};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Synchronous ability body
pub type SyncBody = Arc<dyn Fn(&mut AbilityCx) -> Result<()> + Send + Sync>;

/// Asynchronous ability body
pub type AsyncBody =
    Arc<dyn for<'a> Fn(&'a mut AbilityCx) -> BoxFuture<'a, Result<()>> + Send + Sync>;

#[derive(Clone)]
pub enum AbilityBody {
    Sync(SyncBody),
    Async(AsyncBody),
}

/// Entry or exit side of a visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Entry,
    Exit,
}

/// What an ability reacts to
///
/// `Any` fires regardless of the counterpart. `Types` fires only when the
/// counterpart's archetype is one of (or a subtype of one of) the names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Any,
    Types(Vec<String>),
}

impl Trigger {
    pub fn types(names: &[&str]) -> Self {
        Trigger::Types(names.iter().map(|n| n.to_string()).collect())
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Trigger::Any)
    }
}

/// How ability bodies are driven by the traversal core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Driver {
    /// Sync bodies run inline, async bodies are blocked on
    Blocking,
    /// Async bodies are awaited
    Async,
}

/// A named callable attached to an archetype
#[derive(Clone)]
pub struct Ability {
    name: String,
    trigger: Trigger,
    body: AbilityBody,
}

impl Ability {
    pub fn new<F>(name: impl Into<String>, trigger: Trigger, body: F) -> Self
    where
        F: Fn(&mut AbilityCx) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            trigger,
            body: AbilityBody::Sync(Arc::new(body)),
        }
    }

    pub fn new_async<F>(name: impl Into<String>, trigger: Trigger, body: F) -> Self
    where
        F: for<'a> Fn(&'a mut AbilityCx) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            trigger,
            body: AbilityBody::Async(Arc::new(body)),
        }
    }

    /// Fires for every counterpart
    pub fn any<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut AbilityCx) -> Result<()> + Send + Sync + 'static,
    {
        Self::new(name, Trigger::Any, body)
    }

    /// Fires only for counterparts of the given types
    pub fn on<F>(name: impl Into<String>, types: &[&str], body: F) -> Self
    where
        F: Fn(&mut AbilityCx) -> Result<()> + Send + Sync + 'static,
    {
        Self::new(name, Trigger::types(types), body)
    }

    pub fn any_async<F>(name: impl Into<String>, body: F) -> Self
    where
        F: for<'a> Fn(&'a mut AbilityCx) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        Self::new_async(name, Trigger::Any, body)
    }

    pub fn on_async<F>(name: impl Into<String>, types: &[&str], body: F) -> Self
    where
        F: for<'a> Fn(&'a mut AbilityCx) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        Self::new_async(name, Trigger::types(types), body)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn is_async(&self) -> bool {
        matches!(self.body, AbilityBody::Async(_))
    }

    pub(crate) async fn invoke(&self, cx: &mut AbilityCx, driver: Driver) -> Result<()> {
        match (&self.body, driver) {
            (AbilityBody::Sync(body), _) => body(cx),
            (AbilityBody::Async(body), Driver::Async) => body(cx).await,
            (AbilityBody::Async(body), Driver::Blocking) => futures::executor::block_on(body(cx)),
        }
    }
}

impl fmt::Debug for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ability")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("async", &self.is_async())
            .finish()
    }
}

/// Handle passed to a running ability
///
/// `this` is the anchor that owns the ability: the walker for walker
/// abilities, the location for node and edge abilities.
pub struct AbilityCx {
    ctx: Context,
    walker: AnchorId,
    here: AnchorId,
    this: AnchorId,
}

impl AbilityCx {
    pub(crate) fn new(ctx: Context, walker: AnchorId, here: AnchorId, this: AnchorId) -> Self {
        Self {
            ctx,
            walker,
            here,
            this,
        }
    }

    /// Full engine API, bound to the spawning root
    pub fn ctx(&self) -> &Context {
        &self.ctx
    }

    pub fn walker(&self) -> AnchorId {
        self.walker
    }

    pub fn here(&self) -> AnchorId {
        self.here
    }

    pub fn this(&self) -> AnchorId {
        self.this
    }

    /// Type name of the current location
    pub fn here_type(&self) -> Option<String> {
        self.ctx.type_of(self.here)
    }

    /// Queue targets at the end of the walker's visit queue
    pub fn visit(&mut self, target: impl Into<VisitTarget>) -> Result<bool> {
        self.ctx.visit(self.walker, target)
    }

    /// Queue targets at a position in the walker's visit queue
    pub fn visit_at(&mut self, target: impl Into<VisitTarget>, insert_loc: isize) -> Result<bool> {
        self.ctx.visit_at(self.walker, target, insert_loc)
    }

    /// Queue the nodes one step away from here
    pub fn visit_neighbors(&mut self, dir: EdgeDir) -> Result<bool> {
        let path = SpatialPath::from_node(self.here).step_dir(dir);
        self.ctx.visit(self.walker, path)
    }

    pub fn ignore(&mut self, target: impl Into<VisitTarget>) -> Result<()> {
        self.ctx.ignore(self.walker, target)
    }

    pub fn disengage(&mut self) -> Result<bool> {
        self.ctx.disengage(self.walker)
    }

    pub fn report(&mut self, value: Value) {
        self.ctx.report(value);
    }

    pub fn refs(&self, path: &SpatialPath) -> Result<Vec<AnchorId>> {
        self.ctx.refs(path)
    }

    /// Field on the ability's owner
    pub fn field(&self, name: &str) -> Option<Value> {
        self.ctx.field(self.this, name)
    }

    pub fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
        self.ctx.set_field(self.this, name, value)
    }

    pub fn here_field(&self, name: &str) -> Option<Value> {
        self.ctx.field(self.here, name)
    }

    pub fn set_here_field(&mut self, name: &str, value: Value) -> Result<()> {
        self.ctx.set_field(self.here, name, value)
    }

    pub fn walker_field(&self, name: &str) -> Option<Value> {
        self.ctx.field(self.walker, name)
    }

    pub fn set_walker_field(&mut self, name: &str, value: Value) -> Result<()> {
        self.ctx.set_field(self.walker, name, value)
    }
}

impl fmt::Debug for AbilityCx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbilityCx")
            .field("walker", &self.walker)
            .field("here", &self.here)
            .field("this", &self.this)
            .finish()
    }
}
