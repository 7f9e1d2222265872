//! Archetype registry
//!
//! Definitions are registered once, before the runtime starts. A definition
//! may only extend types that are already registered, so the base graph is
//! acyclic by construction.

use super::{
    Ability, AccessHook, Archetype, ArchetypeDef, Phase, Trigger, GENERIC_EDGE, ROOT_ARCHETYPE,
};
use crate::error::{EngineError, Result};
use osp_types::AnchorKind;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Name → definition lookup
#[derive(Debug, Clone)]
pub struct ArchetypeRegistry {
    defs: HashMap<String, Arc<ArchetypeDef>>,
}

impl Default for ArchetypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchetypeRegistry {
    /// Registry holding only the built-in `Root` and `GenericEdge` types
    pub fn new() -> Self {
        let mut defs = HashMap::new();
        for def in [
            ArchetypeDef::node(ROOT_ARCHETYPE),
            ArchetypeDef::edge(GENERIC_EDGE),
        ] {
            defs.insert(def.name().to_string(), Arc::new(def));
        }
        Self { defs }
    }

    pub fn register(&mut self, def: ArchetypeDef) -> Result<()> {
        if self.defs.contains_key(def.name()) {
            return Err(EngineError::DuplicateArchetype(def.name().to_string()));
        }

        for base in def.bases() {
            let base_def = self
                .defs
                .get(base)
                .ok_or_else(|| EngineError::UnknownArchetype(base.clone()))?;
            if base_def.kind() != def.kind() {
                return Err(EngineError::invalid_archetype(
                    def.name(),
                    format!("cannot extend {} {}", base_def.kind(), base),
                ));
            }
        }

        tracing::debug!(archetype = %def.name(), kind = %def.kind(), "registered archetype");
        self.defs.insert(def.name().to_string(), Arc::new(def));
        Ok(())
    }

    /// Builder form of [`register`](Self::register)
    pub fn with(mut self, def: ArchetypeDef) -> Result<Self> {
        self.register(def)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ArchetypeDef>> {
        self.defs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(|k| k.as_str())
    }

    /// Definition chain for `name`, bases first, each type once
    fn lineage(&self, name: &str) -> Vec<&ArchetypeDef> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.collect_lineage(name, &mut seen, &mut out);
        out
    }

    fn collect_lineage<'a>(
        &'a self,
        name: &str,
        seen: &mut HashSet<String>,
        out: &mut Vec<&'a ArchetypeDef>,
    ) {
        if !seen.insert(name.to_string()) {
            return;
        }
        let Some(def) = self.defs.get(name) else {
            return;
        };
        for base in def.bases() {
            self.collect_lineage(base, seen, out);
        }
        out.push(def);
    }

    /// Reflexive, transitive subtype test
    pub fn is_subtype(&self, name: &str, of: &str) -> bool {
        name == of || self.lineage(name).iter().any(|def| def.name() == of)
    }

    /// Whether `trigger` fires for a counterpart of type `name`
    pub fn matches(&self, trigger: &Trigger, name: &str) -> bool {
        match trigger {
            Trigger::Any => true,
            Trigger::Types(types) => types.iter().any(|t| self.is_subtype(name, t)),
        }
    }

    /// Abilities for a phase, inherited ones first
    ///
    /// An ability redefined by a subtype replaces the inherited one in place.
    pub fn abilities(&self, name: &str, phase: Phase) -> Vec<Ability> {
        let mut out: Vec<Ability> = Vec::new();
        for def in self.lineage(name) {
            for ability in def.abilities(phase) {
                match out.iter_mut().find(|a| a.name() == ability.name()) {
                    Some(slot) => *slot = ability.clone(),
                    None => out.push(ability.clone()),
                }
            }
        }
        out
    }

    /// Most derived custom access hook
    pub fn access_hook(&self, name: &str) -> Option<AccessHook> {
        self.lineage(name)
            .into_iter()
            .rev()
            .find_map(|def| def.hook().cloned())
    }

    /// Declared fields with defaults, including inherited ones
    pub fn fields(&self, name: &str) -> Map<String, Value> {
        let mut fields = Map::new();
        for def in self.lineage(name) {
            for (key, value) in def.fields() {
                fields.insert(key.clone(), value.clone());
            }
        }
        fields
    }

    pub fn kind_of(&self, name: &str) -> Option<AnchorKind> {
        self.defs.get(name).map(|def| def.kind())
    }

    /// Require `name` to be registered with the given kind
    pub fn expect_kind(&self, name: &str, kind: AnchorKind) -> Result<()> {
        match self.kind_of(name) {
            None => Err(EngineError::UnknownArchetype(name.to_string())),
            Some(found) if found == kind => Ok(()),
            Some(found) => Err(EngineError::invalid_archetype(
                name,
                format!("is a {found}, expected a {kind}"),
            )),
        }
    }

    /// Reject assignments to undeclared fields
    pub fn check_fields<'a>(
        &self,
        name: &str,
        assigned: impl IntoIterator<Item = &'a str>,
    ) -> Result<()> {
        if !self.contains(name) {
            return Err(EngineError::UnknownArchetype(name.to_string()));
        }
        let declared = self.fields(name);
        for field in assigned {
            if !declared.contains_key(field) {
                return Err(EngineError::InvalidAttribute {
                    archetype: name.to_string(),
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Fresh payload with default field values
    pub fn instantiate(&self, name: &str) -> Result<Archetype> {
        self.instantiate_with(name, &[])
    }

    /// Fresh payload with defaults overridden by `assign`
    pub fn instantiate_with(&self, name: &str, assign: &[(String, Value)]) -> Result<Archetype> {
        self.check_fields(name, assign.iter().map(|(k, _)| k.as_str()))?;
        let mut fields = self.fields(name);
        for (key, value) in assign {
            fields.insert(key.clone(), value.clone());
        }
        Ok(Archetype::with_fields(name, fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> ArchetypeRegistry {
        ArchetypeRegistry::new()
            .with(ArchetypeDef::node("Place").field("name", json!("")))
            .unwrap()
            .with(
                ArchetypeDef::node("City")
                    .extends("Place")
                    .field("population", json!(0)),
            )
            .unwrap()
            .with(ArchetypeDef::node("Capital").extends("City"))
            .unwrap()
            .with(ArchetypeDef::edge("Road").field("km", json!(1)))
            .unwrap()
    }

    #[test]
    fn test_builtins_registered() {
        let registry = ArchetypeRegistry::new();
        assert_eq!(registry.kind_of(ROOT_ARCHETYPE), Some(AnchorKind::Node));
        assert_eq!(registry.kind_of(GENERIC_EDGE), Some(AnchorKind::Edge));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = registry();
        let err = registry.register(ArchetypeDef::node("City")).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateArchetype(name) if name == "City"));
    }

    #[test]
    fn test_unknown_base_rejected() {
        let mut registry = ArchetypeRegistry::new();
        let err = registry
            .register(ArchetypeDef::node("Town").extends("Nowhere"))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownArchetype(_)));
    }

    #[test]
    fn test_cross_kind_base_rejected() {
        let mut registry = registry();
        let err = registry
            .register(ArchetypeDef::edge("Path").extends("City"))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArchetype { .. }));
    }

    #[test]
    fn test_subtype_is_transitive() {
        let registry = registry();
        assert!(registry.is_subtype("Capital", "Capital"));
        assert!(registry.is_subtype("Capital", "City"));
        assert!(registry.is_subtype("Capital", "Place"));
        assert!(!registry.is_subtype("Place", "City"));
        assert!(registry.matches(&Trigger::types(&["Place"]), "Capital"));
        assert!(!registry.matches(&Trigger::types(&["Road"]), "Capital"));
    }

    #[test]
    fn test_instantiate_merges_inherited_defaults() {
        let registry = registry();
        let capital = registry
            .instantiate_with("Capital", &[("name".to_string(), json!("Oslo"))])
            .unwrap();
        assert_eq!(capital.get("name"), Some(&json!("Oslo")));
        assert_eq!(capital.get("population"), Some(&json!(0)));
    }

    #[test]
    fn test_undeclared_field_rejected() {
        let registry = registry();
        let err = registry
            .instantiate_with("Road", &[("lanes".to_string(), json!(2))])
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidAttribute { archetype, field } if archetype == "Road" && field == "lanes"
        ));
    }

    #[test]
    fn test_inherited_abilities_and_override() {
        let registry = ArchetypeRegistry::new()
            .with(
                ArchetypeDef::walker("Base")
                    .on_entry(Ability::any("first", |_cx| Ok(())))
                    .on_entry(Ability::any("second", |_cx| Ok(()))),
            )
            .unwrap()
            .with(
                ArchetypeDef::walker("Derived")
                    .extends("Base")
                    .on_entry(Ability::on("first", &["City"], |_cx| Ok(())))
                    .on_entry(Ability::any("third", |_cx| Ok(()))),
            )
            .unwrap();

        let entries = registry.abilities("Derived", Phase::Entry);
        let names: Vec<_> = entries.iter().map(|a| a.name()).collect();
        assert_eq!(names, ["first", "second", "third"]);
        assert!(!entries[0].trigger().is_any());
        assert!(registry.abilities("Derived", Phase::Exit).is_empty());
    }
}
