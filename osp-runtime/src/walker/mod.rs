//! Walker engine
//!
//! A walker is spawned onto a node, an edge or a list of them. It then
//! works through its visit queue depth-first: entering a location runs the
//! matching entry abilities, drains whatever those abilities queued, then
//! runs the exit abilities. `disengage` stops the whole traversal at the
//! next check.
//!
//! `spawn` and `spawn_async` share one traversal core; the blocking form
//! runs it to completion without an executor.

mod traversal;

use crate::anchor::WalkerState;
use crate::archetype::Driver;
use crate::context::Context;
use crate::error::{EngineError, Result};
use crate::graph::VisitTarget;
use futures::FutureExt;
use osp_types::{AnchorId, AnchorKind};
use serde_json::Value;
use std::collections::VecDeque;

/// Where a walker is spawned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnTarget {
    One(AnchorId),
    Many(Vec<AnchorId>),
}

impl From<AnchorId> for SpawnTarget {
    fn from(id: AnchorId) -> Self {
        SpawnTarget::One(id)
    }
}

impl From<Vec<AnchorId>> for SpawnTarget {
    fn from(ids: Vec<AnchorId>) -> Self {
        SpawnTarget::Many(ids)
    }
}

impl From<&[AnchorId]> for SpawnTarget {
    fn from(ids: &[AnchorId]) -> Self {
        SpawnTarget::Many(ids.to_vec())
    }
}

/// Insert position for `visit_at`, resolved against a queue of `len`
///
/// Negative positions count from the end, `-1` meaning after the last
/// element. Out-of-range positions clamp to the nearest end.
fn insert_position(insert_loc: isize, len: usize) -> usize {
    let len = len as isize;
    let pos = if insert_loc < -len {
        0
    } else if insert_loc < 0 {
        insert_loc + len + 1
    } else {
        insert_loc
    };
    pos.clamp(0, len) as usize
}

impl Context {
    /// Run a walker to completion, blocking the calling thread
    ///
    /// Async abilities are driven inline. Prefer [`spawn_async`] from async
    /// code.
    ///
    /// [`spawn_async`]: Context::spawn_async
    pub fn spawn(&self, walker: AnchorId, target: impl Into<SpawnTarget>) -> Result<AnchorId> {
        self.run_spawn(walker, target.into(), Driver::Blocking)
            .now_or_never()
            .unwrap_or(Err(EngineError::Suspended))
    }

    /// Run a walker to completion, awaiting async abilities
    pub async fn spawn_async(
        &self,
        walker: AnchorId,
        target: impl Into<SpawnTarget>,
    ) -> Result<AnchorId> {
        self.run_spawn(walker, target.into(), Driver::Async).await
    }

    async fn run_spawn(
        &self,
        walker: AnchorId,
        target: SpawnTarget,
        driver: Driver,
    ) -> Result<AnchorId> {
        let start = self.prepare_spawn(walker, target)?;
        self.spawn_call(walker, start, driver).await?;
        Ok(walker)
    }

    /// Validate operands and load the walker's queue
    fn prepare_spawn(&self, walker: AnchorId, target: SpawnTarget) -> Result<AnchorId> {
        let walker_anchor = self.get(walker)?.ok_or_else(|| {
            EngineError::InvalidSpawnOperand(format!("walker {walker} does not exist"))
        })?;
        if walker_anchor.kind() != AnchorKind::Walker || !walker_anchor.is_populated() {
            return Err(EngineError::InvalidSpawnOperand(format!(
                "{walker} is not a populated walker"
            )));
        }

        let ids = match target {
            SpawnTarget::One(id) => vec![id],
            SpawnTarget::Many(ids) => ids,
        };
        if ids.is_empty() {
            return Err(EngineError::InvalidSpawnOperand(
                "empty spawn target".to_string(),
            ));
        }

        let mut queue = VecDeque::new();
        for id in ids {
            let anchor = self
                .get(id)?
                .ok_or_else(|| EngineError::InvalidSpawnOperand(format!("{id} does not exist")))?;
            match anchor.as_edge() {
                Some(edge) => {
                    queue.push_back(id);
                    queue.push_back(edge.target());
                }
                None if anchor.kind() == AnchorKind::Node => queue.push_back(id),
                None => {
                    return Err(EngineError::InvalidSpawnOperand(format!(
                        "cannot spawn onto {} {id}",
                        anchor.kind()
                    )))
                }
            }
        }
        let start = queue
            .front()
            .copied()
            .ok_or_else(|| EngineError::InvalidSpawnOperand("empty spawn target".to_string()))?;

        self.with_walker_mut(walker, |w| {
            w.next = queue;
            w.disengaged = false;
        })?;
        tracing::debug!(walker = %walker, start = %start, "spawning walker");
        Ok(start)
    }

    pub(crate) fn with_walker<R>(
        &self,
        walker: AnchorId,
        f: impl FnOnce(&WalkerState) -> R,
    ) -> Result<R> {
        let found = self
            .store()
            .with(&walker, |a| a.as_walker().map(f))?
            .ok_or(EngineError::AnchorNotFound(walker))?;
        found.ok_or_else(|| self.not_a_walker(walker))
    }

    pub(crate) fn with_walker_mut<R>(
        &self,
        walker: AnchorId,
        f: impl FnOnce(&mut WalkerState) -> R,
    ) -> Result<R> {
        let found = self
            .store()
            .with_mut(&walker, |a| a.as_walker_mut().map(f))?
            .ok_or(EngineError::AnchorNotFound(walker))?;
        found.ok_or_else(|| self.not_a_walker(walker))
    }

    fn not_a_walker(&self, id: AnchorId) -> EngineError {
        match self.kind_of(id) {
            Ok(found) => EngineError::WrongKind {
                id,
                expected: AnchorKind::Walker,
                found,
            },
            Err(e) => e,
        }
    }

    /// Resolve visit targets to queue entries
    ///
    /// Edges bring their target node along. Ids that no longer resolve are
    /// skipped.
    fn visit_candidates(&self, target: VisitTarget, expand_edges: bool) -> Result<Vec<AnchorId>> {
        let ids = match target {
            VisitTarget::One(id) => vec![id],
            VisitTarget::Many(ids) => ids,
            VisitTarget::Path(path) => self.refs(&path)?,
        };

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(anchor) = self.get(id)? else {
                tracing::debug!(anchor = %id, "visit skipped missing anchor");
                continue;
            };
            match anchor.kind() {
                AnchorKind::Node => out.push(id),
                AnchorKind::Edge => {
                    out.push(id);
                    if expand_edges {
                        if let Some(edge) = anchor.as_edge() {
                            out.push(edge.target());
                        }
                    }
                }
                AnchorKind::Walker => {
                    return Err(EngineError::WrongKind {
                        id,
                        expected: AnchorKind::Node,
                        found: AnchorKind::Walker,
                    })
                }
            }
        }
        Ok(out)
    }

    /// Append targets to the walker's queue
    ///
    /// Returns true if anything was queued.
    pub fn visit(&self, walker: AnchorId, target: impl Into<VisitTarget>) -> Result<bool> {
        self.visit_at(walker, target, -1)
    }

    /// Insert targets into the walker's queue at `insert_loc`
    ///
    /// Targets the walker ignores are dropped.
    pub fn visit_at(
        &self,
        walker: AnchorId,
        target: impl Into<VisitTarget>,
        insert_loc: isize,
    ) -> Result<bool> {
        let candidates = self.visit_candidates(target.into(), true)?;
        self.with_walker_mut(walker, |w| {
            let before = w.next.len();
            let pos = insert_position(insert_loc, before);
            let survivors = candidates.into_iter().filter(|id| !w.ignores.contains(id));
            for (offset, id) in survivors.enumerate() {
                w.next.insert(pos + offset, id);
            }
            w.next.len() > before
        })
    }

    /// Skip targets for the rest of the current spawn
    pub fn ignore(&self, walker: AnchorId, target: impl Into<VisitTarget>) -> Result<()> {
        let ids = self.visit_candidates(target.into(), false)?;
        self.with_walker_mut(walker, |w| {
            w.next.retain(|id| !ids.contains(id));
            w.ignores.extend(ids);
        })
    }

    /// Stop the walker's traversal
    pub fn disengage(&self, walker: AnchorId) -> Result<bool> {
        self.with_walker_mut(walker, |w| w.disengaged = true)?;
        tracing::debug!(walker = %walker, "walker disengaged");
        Ok(true)
    }

    pub fn is_disengaged(&self, walker: AnchorId) -> Result<bool> {
        self.with_walker(walker, |w| w.disengaged)
    }

    /// Values reported during the walker's most recent spawn
    pub fn walker_reports(&self, walker: AnchorId) -> Result<Vec<Value>> {
        self.with_walker(walker, |w| w.reports.clone())
    }

    /// Locations entered during the walker's most recent spawn
    pub fn walker_path(&self, walker: AnchorId) -> Result<Vec<AnchorId>> {
        self.with_walker(walker, |w| w.path.clone())
    }

    /// Pending visit queue
    pub fn walker_queue(&self, walker: AnchorId) -> Result<Vec<AnchorId>> {
        self.with_walker(walker, |w| w.next.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archetype::{ArchetypeDef, ArchetypeRegistry};
    use crate::graph::ConnectOptions;
    use crate::runtime::Runtime;

    #[test]
    fn test_insert_position() {
        assert_eq!(insert_position(-1, 0), 0);
        assert_eq!(insert_position(-1, 3), 3);
        assert_eq!(insert_position(-2, 3), 2);
        assert_eq!(insert_position(-3, 3), 1);
        assert_eq!(insert_position(-4, 3), 0);
        assert_eq!(insert_position(-100, 3), 0);
        assert_eq!(insert_position(0, 3), 0);
        assert_eq!(insert_position(2, 3), 2);
        assert_eq!(insert_position(7, 3), 3);
    }

    fn setup() -> (Context, AnchorId) {
        let registry = ArchetypeRegistry::new()
            .with(ArchetypeDef::node("City"))
            .unwrap()
            .with(ArchetypeDef::walker("Visitor"))
            .unwrap();
        let ctx = Runtime::new(registry).unwrap().system_context();
        let walker = ctx.create_walker("Visitor").unwrap();
        (ctx, walker)
    }

    #[test]
    fn test_visit_inserts_and_reports_growth() {
        let (ctx, walker) = setup();
        let a = ctx.create_node("City").unwrap();
        let b = ctx.create_node("City").unwrap();
        let c = ctx.create_node("City").unwrap();

        assert!(ctx.visit(walker, vec![a, b]).unwrap());
        assert!(ctx.visit_at(walker, c, 0).unwrap());
        assert_eq!(ctx.walker_queue(walker).unwrap(), vec![c, a, b]);
        assert!(!ctx.visit(walker, Vec::<AnchorId>::new()).unwrap());
    }

    #[test]
    fn test_visit_edge_queues_edge_and_target() {
        let (ctx, walker) = setup();
        let a = ctx.create_node("City").unwrap();
        let b = ctx.create_node("City").unwrap();
        let edge = ctx
            .connect(&[a], &[b], &ConnectOptions::new().edges_only())
            .unwrap()[0];

        ctx.visit(walker, edge).unwrap();
        assert_eq!(ctx.walker_queue(walker).unwrap(), vec![edge, b]);
    }

    #[test]
    fn test_ignore_drops_queued_and_future_targets() {
        let (ctx, walker) = setup();
        let a = ctx.create_node("City").unwrap();
        let b = ctx.create_node("City").unwrap();

        ctx.visit(walker, vec![a, b]).unwrap();
        ctx.ignore(walker, a).unwrap();
        assert_eq!(ctx.walker_queue(walker).unwrap(), vec![b]);
        assert!(!ctx.visit(walker, a).unwrap());
    }

    #[test]
    fn test_visit_rejects_walkers() {
        let (ctx, walker) = setup();
        let other = ctx.create_walker("Visitor").unwrap();
        assert!(matches!(
            ctx.visit(walker, other),
            Err(EngineError::WrongKind { .. })
        ));
    }

    #[test]
    fn test_spawn_rejects_bad_operands() {
        let (ctx, walker) = setup();
        let city = ctx.create_node("City").unwrap();

        assert!(matches!(
            ctx.spawn(walker, Vec::<AnchorId>::new()),
            Err(EngineError::InvalidSpawnOperand(_))
        ));
        assert!(matches!(
            ctx.spawn(walker, walker),
            Err(EngineError::InvalidSpawnOperand(_))
        ));
        assert!(matches!(
            ctx.spawn(city, city),
            Err(EngineError::InvalidSpawnOperand(_))
        ));
    }
}
