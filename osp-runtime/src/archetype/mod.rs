//! Archetypes: user payloads and their load-time definitions
//!
//! This module provides:
//! - `Archetype`: the payload carried by an anchor (type name + field values)
//! - `ArchetypeDef`: a registered type with bases, field defaults, ordered
//!   entry/exit abilities and an optional custom access hook
//! - `ArchetypeRegistry`: name → definition lookup with subtype resolution
//! - `Ability` / `AbilityCx`: the callables run during traversal

mod ability;
mod registry;

pub use ability::{Ability, AbilityBody, AbilityCx, AsyncBody, Phase, SyncBody, Trigger};
pub use registry::ArchetypeRegistry;

pub(crate) use ability::Driver;

use crate::anchor::Anchor;
use osp_types::{AccessLevel, AnchorId, AnchorKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Built-in node type for roots
pub const ROOT_ARCHETYPE: &str = "Root";

/// Built-in edge type used when `connect` is not given one
pub const GENERIC_EDGE: &str = "GenericEdge";

/// Archetype payload carried by an anchor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archetype {
    type_name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl Archetype {
    /// A payload with no field values
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Map::new(),
        }
    }

    pub fn with_fields(type_name: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            type_name: type_name.into(),
            fields,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Set a field value, returning the previous one
    pub fn set(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(field.into(), value)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Custom access hook
///
/// Called with the target anchor and the requesting root. Returning `Some`
/// overrides the computed access level.
pub type AccessHook = Arc<dyn Fn(&Anchor, AnchorId) -> Option<AccessLevel> + Send + Sync>;

/// A registered archetype type
#[derive(Clone)]
pub struct ArchetypeDef {
    name: String,
    kind: AnchorKind,
    bases: Vec<String>,
    fields: Map<String, Value>,
    entries: Vec<Ability>,
    exits: Vec<Ability>,
    access_hook: Option<AccessHook>,
}

impl ArchetypeDef {
    fn new(name: impl Into<String>, kind: AnchorKind) -> Self {
        Self {
            name: name.into(),
            kind,
            bases: Vec::new(),
            fields: Map::new(),
            entries: Vec::new(),
            exits: Vec::new(),
            access_hook: None,
        }
    }

    pub fn node(name: impl Into<String>) -> Self {
        Self::new(name, AnchorKind::Node)
    }

    pub fn edge(name: impl Into<String>) -> Self {
        Self::new(name, AnchorKind::Edge)
    }

    pub fn walker(name: impl Into<String>) -> Self {
        Self::new(name, AnchorKind::Walker)
    }

    /// Declare a base type; abilities, fields and hooks are inherited
    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    /// Declare a field with its default value
    pub fn field(mut self, name: impl Into<String>, default: Value) -> Self {
        self.fields.insert(name.into(), default);
        self
    }

    /// Append an entry ability
    pub fn on_entry(mut self, ability: Ability) -> Self {
        self.entries.push(ability);
        self
    }

    /// Append an exit ability
    pub fn on_exit(mut self, ability: Ability) -> Self {
        self.exits.push(ability);
        self
    }

    /// Install a custom access hook
    pub fn access_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Anchor, AnchorId) -> Option<AccessLevel> + Send + Sync + 'static,
    {
        self.access_hook = Some(Arc::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AnchorKind {
        self.kind
    }

    pub fn bases(&self) -> &[String] {
        &self.bases
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn abilities(&self, phase: Phase) -> &[Ability] {
        match phase {
            Phase::Entry => &self.entries,
            Phase::Exit => &self.exits,
        }
    }

    pub fn hook(&self) -> Option<&AccessHook> {
        self.access_hook.as_ref()
    }
}

impl fmt::Debug for ArchetypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchetypeDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("bases", &self.bases)
            .field("fields", &self.fields)
            .field("entries", &self.entries)
            .field("exits", &self.exits)
            .field("access_hook", &self.access_hook.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_archetype_fields() {
        let mut archetype = Archetype::new("City");
        assert!(archetype.get("name").is_none());

        assert_eq!(archetype.set("name", json!("Oslo")), None);
        assert_eq!(archetype.get("name"), Some(&json!("Oslo")));
        assert!(archetype.has_field("name"));
    }

    #[test]
    fn test_def_builder() {
        let def = ArchetypeDef::walker("Visitor")
            .extends("Base")
            .field("count", json!(0))
            .on_entry(Ability::any("greet", |_cx| Ok(())))
            .on_exit(Ability::on("leave", &["City"], |_cx| Ok(())));

        assert_eq!(def.kind(), AnchorKind::Walker);
        assert_eq!(def.bases(), ["Base".to_string()]);
        assert_eq!(def.abilities(Phase::Entry).len(), 1);
        assert_eq!(def.abilities(Phase::Exit).len(), 1);
        assert!(def.hook().is_none());
    }
}
