//! Execution context
//!
//! A `Context` binds the shared [`Runtime`] to the root that is acting.
//! Every engine operation is a method on `Context`; the implementations are
//! spread across the modules that own each concern (`access`, `graph`,
//! `walker`, `persistence`).

use crate::anchor::Anchor;
use crate::archetype::{ArchetypeRegistry, ROOT_ARCHETYPE};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::pool::TaskHandle;
use crate::runtime::Runtime;
use crate::store::AnchorStore;
use osp_types::{AnchorId, AnchorKind};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type Sink = Arc<Mutex<Vec<Value>>>;

/// Per-root handle onto the runtime
#[derive(Clone)]
pub struct Context {
    runtime: Runtime,
    user_root: AnchorId,
    /// Everything reported through this context and its clones
    reports: Sink,
    /// Reports of the spawn currently running on this handle
    frame: Option<Sink>,
}

impl Context {
    pub(crate) fn new(runtime: Runtime, user_root: AnchorId) -> Self {
        Self {
            runtime,
            user_root,
            reports: Sink::default(),
            frame: None,
        }
    }

    /// Clone of this context that also collects reports into a fresh frame
    pub(crate) fn scoped(&self) -> (Self, Sink) {
        let frame = Sink::default();
        let mut scoped = self.clone();
        scoped.frame = Some(frame.clone());
        (scoped, frame)
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// The root acting through this context
    pub fn user_root(&self) -> AnchorId {
        self.user_root
    }

    pub fn system_root(&self) -> AnchorId {
        self.runtime.system_root()
    }

    pub fn registry(&self) -> &ArchetypeRegistry {
        self.runtime.registry()
    }

    pub fn store(&self) -> &AnchorStore {
        self.runtime.store()
    }

    pub fn config(&self) -> &EngineConfig {
        self.runtime.config()
    }

    /// Record a value for the running spawn and the context
    pub fn report(&self, value: Value) {
        if let Some(frame) = &self.frame {
            frame.lock().push(value.clone());
        }
        self.reports.lock().push(value);
    }

    /// Everything reported so far through this context
    pub fn reports(&self) -> Vec<Value> {
        self.reports.lock().clone()
    }

    pub fn take_reports(&self) -> Vec<Value> {
        std::mem::take(&mut *self.reports.lock())
    }

    /// Snapshot of an anchor
    pub fn get(&self, id: AnchorId) -> Result<Option<Anchor>> {
        Ok(self.store().get(&id)?)
    }

    pub(crate) fn require(&self, id: AnchorId) -> Result<Anchor> {
        self.get(id)?.ok_or(EngineError::AnchorNotFound(id))
    }

    pub fn kind_of(&self, id: AnchorId) -> Result<AnchorKind> {
        Ok(self.require(id)?.kind())
    }

    /// Archetype type name, if the anchor exists and is populated
    pub fn type_of(&self, id: AnchorId) -> Option<String> {
        self.store()
            .with(&id, |a| a.type_name().map(str::to_string))
            .ok()
            .flatten()
            .flatten()
    }

    pub fn field(&self, id: AnchorId, name: &str) -> Option<Value> {
        self.store()
            .with(&id, |a| a.archetype.as_ref().and_then(|arch| arch.get(name).cloned()))
            .ok()
            .flatten()
            .flatten()
    }

    /// Assign a declared field on a populated anchor
    pub fn set_field(&self, id: AnchorId, name: &str, value: Value) -> Result<()> {
        let type_name = self
            .type_of(id)
            .ok_or(EngineError::AnchorNotFound(id))?;
        self.registry().check_fields(&type_name, [name])?;
        self.store()
            .with_mut(&id, |a| {
                if let Some(archetype) = a.archetype.as_mut() {
                    archetype.set(name, value);
                }
            })?
            .ok_or(EngineError::AnchorNotFound(id))
    }

    /// Incident edges of a node, in connection order
    pub fn edges_of(&self, node: AnchorId) -> Result<Vec<AnchorId>> {
        let anchor = self.require(node)?;
        anchor.expect_kind(AnchorKind::Node)?;
        Ok(anchor.as_node().map(|n| n.edges.clone()).unwrap_or_default())
    }

    fn create(&self, kind: AnchorKind, type_name: &str, assign: &[(String, Value)]) -> Result<AnchorId> {
        self.registry().expect_kind(type_name, kind)?;
        if type_name == ROOT_ARCHETYPE {
            return Err(EngineError::invalid_archetype(
                type_name,
                "roots are created by the runtime",
            ));
        }
        let archetype = self.registry().instantiate_with(type_name, assign)?;
        let anchor = match kind {
            AnchorKind::Node => Anchor::node(archetype),
            AnchorKind::Walker => Anchor::walker(archetype),
            AnchorKind::Edge => {
                return Err(EngineError::invalid_archetype(
                    type_name,
                    "edges are created by connect",
                ))
            }
        };
        let id = anchor.id;
        self.store().put(anchor);
        tracing::trace!(anchor = %id, archetype = %type_name, kind = %kind, "created anchor");
        Ok(id)
    }

    /// Create an ephemeral node
    pub fn create_node(&self, type_name: &str) -> Result<AnchorId> {
        self.create(AnchorKind::Node, type_name, &[])
    }

    pub fn create_node_with(&self, type_name: &str, assign: &[(String, Value)]) -> Result<AnchorId> {
        self.create(AnchorKind::Node, type_name, assign)
    }

    /// Create an ephemeral walker
    pub fn create_walker(&self, type_name: &str) -> Result<AnchorId> {
        self.create(AnchorKind::Walker, type_name, &[])
    }

    pub fn create_walker_with(
        &self,
        type_name: &str,
        assign: &[(String, Value)],
    ) -> Result<AnchorId> {
        self.create(AnchorKind::Walker, type_name, assign)
    }

    /// Run a blocking job on the runtime's task pool
    pub fn flow<F, T>(&self, job: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        Ok(self.runtime.pool()?.flow(job))
    }

    /// Block until a pooled job finishes
    pub fn wait<T>(&self, handle: TaskHandle<T>) -> Result<T> {
        handle.wait()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("user_root", &self.user_root)
            .field("in_spawn", &self.frame.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archetype::ArchetypeDef;
    use serde_json::json;

    fn runtime() -> Runtime {
        let registry = ArchetypeRegistry::new()
            .with(ArchetypeDef::node("City").field("name", json!("")))
            .unwrap()
            .with(ArchetypeDef::walker("Visitor"))
            .unwrap();
        Runtime::new(registry).unwrap()
    }

    #[test]
    fn test_create_node_uses_defaults() {
        let ctx = runtime().system_context();
        let city = ctx.create_node("City").unwrap();
        assert_eq!(ctx.field(city, "name"), Some(json!("")));
        assert_eq!(ctx.type_of(city).as_deref(), Some("City"));
    }

    #[test]
    fn test_create_rejects_wrong_kind_and_roots() {
        let ctx = runtime().system_context();
        assert!(matches!(
            ctx.create_walker("City"),
            Err(EngineError::InvalidArchetype { .. })
        ));
        assert!(matches!(
            ctx.create_node("Root"),
            Err(EngineError::InvalidArchetype { .. })
        ));
        assert!(matches!(
            ctx.create_node("Village"),
            Err(EngineError::UnknownArchetype(_))
        ));
    }

    #[test]
    fn test_set_field_requires_declaration() {
        let ctx = runtime().system_context();
        let city = ctx.create_node("City").unwrap();
        ctx.set_field(city, "name", json!("Bergen")).unwrap();
        assert_eq!(ctx.field(city, "name"), Some(json!("Bergen")));
        assert!(matches!(
            ctx.set_field(city, "mayor", json!("x")),
            Err(EngineError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn test_scoped_reports_reach_frame_and_context() {
        let ctx = runtime().system_context();
        ctx.report(json!(1));
        let (scoped, frame) = ctx.scoped();
        scoped.report(json!(2));

        assert_eq!(*frame.lock(), vec![json!(2)]);
        assert_eq!(ctx.reports(), vec![json!(1), json!(2)]);
        assert_eq!(ctx.take_reports().len(), 2);
        assert!(ctx.reports().is_empty());
    }
}
