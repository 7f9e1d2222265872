//! Depth-first traversal core
//!
//! Dispatch order for a location `L` of type `T` visited by walker `W`:
//!
//! ```text
//! entry:  W's entries typed for T   (owner W)
//!         L's untyped entries       (owner L)
//!         L's entries typed for W   (owner L)
//! queue:  everything queued meanwhile, recursively
//! exit:   L's exits typed for W     (owner L)
//!         L's untyped exits         (owner L)
//!         W's exits typed for T     (owner W)
//! ```
//!
//! W's untyped entries run once before the queue is drained and its untyped
//! exits once after. Disengagement is checked after every ability and every
//! child visit.

use crate::archetype::{Ability, AbilityCx, Driver, Phase};
use crate::context::Context;
use crate::error::Result;
use futures::future::{BoxFuture, FutureExt};
use osp_types::AnchorId;

/// Abilities to run for one phase, each paired with its owner
type Plan = Vec<(Ability, AnchorId)>;

impl Context {
    /// Drive a prepared walker from `start` until its queue is empty or it
    /// disengages
    ///
    /// The walker's ignores are cleared and its reports replaced even when
    /// an ability fails.
    pub(crate) async fn spawn_call(
        &self,
        walker: AnchorId,
        start: AnchorId,
        driver: Driver,
    ) -> Result<()> {
        self.with_walker_mut(walker, |w| w.path.clear())?;
        let (scoped, frame) = self.scoped();

        let outcome = scoped.traverse(walker, start, driver).await;

        let reports = std::mem::take(&mut *frame.lock());
        self.with_walker_mut(walker, |w| {
            w.ignores.clear();
            w.reports = reports;
        })?;

        match &outcome {
            Ok(()) => tracing::debug!(walker = %walker, "walker finished"),
            Err(e) => tracing::warn!(walker = %walker, error = %e, "walker aborted"),
        }
        outcome
    }

    async fn traverse(&self, walker: AnchorId, start: AnchorId, driver: Driver) -> Result<()> {
        let walker_type = self.walker_type(walker)?;

        let entries = self.untyped(&walker_type, Phase::Entry, walker);
        if self.run_plan(entries, walker, start, driver).await? {
            return Ok(());
        }

        while let Some(next) = self.pop_next(walker)? {
            if !self.visit_node_recursive(walker, next, driver).await? {
                break;
            }
        }

        if self.is_disengaged(walker)? {
            return Ok(());
        }
        let here = self
            .with_walker(walker, |w| w.path.last().copied())?
            .unwrap_or(start);
        let exits = self.untyped(&walker_type, Phase::Exit, walker);
        self.run_plan(exits, walker, here, driver).await?;
        Ok(())
    }

    /// Enter `loc`, drain what its abilities queued, then leave it
    ///
    /// Returns false as soon as the walker disengages.
    fn visit_node_recursive(
        &self,
        walker: AnchorId,
        loc: AnchorId,
        driver: Driver,
    ) -> BoxFuture<'_, Result<bool>> {
        async move {
            let Some(loc_type) = self.type_of(loc) else {
                tracing::debug!(walker = %walker, anchor = %loc, "skipping unpopulated location");
                return Ok(true);
            };
            self.with_walker_mut(walker, |w| w.path.push(loc))?;
            let walker_type = self.walker_type(walker)?;
            tracing::trace!(walker = %walker, anchor = %loc, archetype = %loc_type, "entering");

            let entries = self.dispatch_plan(Phase::Entry, walker, &walker_type, loc, &loc_type);
            if self.run_plan(entries, walker, loc, driver).await? {
                return Ok(false);
            }

            while let Some(next) = self.pop_next(walker)? {
                if !self.visit_node_recursive(walker, next, driver).await? {
                    return Ok(false);
                }
            }

            let exits = self.dispatch_plan(Phase::Exit, walker, &walker_type, loc, &loc_type);
            if self.run_plan(exits, walker, loc, driver).await? {
                return Ok(false);
            }
            Ok(true)
        }
        .boxed()
    }

    /// Run abilities in order; returns true if the walker disengaged
    async fn run_plan(
        &self,
        plan: Plan,
        walker: AnchorId,
        here: AnchorId,
        driver: Driver,
    ) -> Result<bool> {
        for (ability, owner) in plan {
            tracing::trace!(
                walker = %walker,
                here = %here,
                owner = %owner,
                ability = %ability.name(),
                "running ability"
            );
            let mut cx = AbilityCx::new(self.clone(), walker, here, owner);
            ability.invoke(&mut cx, driver).await?;
            if self.is_disengaged(walker)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Next queued location the walker is not ignoring
    fn pop_next(&self, walker: AnchorId) -> Result<Option<AnchorId>> {
        self.with_walker_mut(walker, |w| {
            while let Some(next) = w.next.pop_front() {
                if !w.ignores.contains(&next) {
                    return Some(next);
                }
            }
            None
        })
    }

    fn walker_type(&self, walker: AnchorId) -> Result<String> {
        self.type_of(walker).ok_or_else(|| {
            crate::error::EngineError::InvalidSpawnOperand(format!(
                "walker {walker} is not populated"
            ))
        })
    }

    /// Walker abilities with no type trigger
    fn untyped(&self, walker_type: &str, phase: Phase, walker: AnchorId) -> Plan {
        self.registry()
            .abilities(walker_type, phase)
            .into_iter()
            .filter(|a| a.trigger().is_any())
            .map(|a| (a, walker))
            .collect()
    }

    fn dispatch_plan(
        &self,
        phase: Phase,
        walker: AnchorId,
        walker_type: &str,
        loc: AnchorId,
        loc_type: &str,
    ) -> Plan {
        let registry = self.registry();
        let walker_typed: Plan = registry
            .abilities(walker_type, phase)
            .into_iter()
            .filter(|a| !a.trigger().is_any() && registry.matches(a.trigger(), loc_type))
            .map(|a| (a, walker))
            .collect();

        let loc_abilities = registry.abilities(loc_type, phase);
        let loc_any = loc_abilities
            .iter()
            .filter(|a| a.trigger().is_any())
            .map(|a| (a.clone(), loc));
        let loc_typed = loc_abilities
            .iter()
            .filter(|a| !a.trigger().is_any() && registry.matches(a.trigger(), walker_type))
            .map(|a| (a.clone(), loc));

        match phase {
            Phase::Entry => walker_typed
                .into_iter()
                .chain(loc_any)
                .chain(loc_typed)
                .collect(),
            Phase::Exit => loc_typed
                .chain(loc_any)
                .chain(walker_typed)
                .collect(),
        }
    }
}
