//! Access control
//!
//! Levels are resolved for the context's root against a target anchor:
//!
//! 1. Ephemeral anchors, the system root, the target's owner and the
//!    target itself always get `Write`.
//! 2. A custom hook on the target's archetype may decide outright.
//! 3. Otherwise the level starts at the target's `all`, is raised by the
//!    owning root's `all`, and is then replaced by any per-root override,
//!    first on the owning root and finally on the target.
//!
//! Denials are logged, never raised.

use crate::anchor::Anchor;
use crate::config::DenialLogLevel;
use crate::context::Context;
use crate::error::Result;
use osp_types::{AccessLevel, AnchorId, LevelInput};

impl Context {
    /// Level the context's root holds on `target`
    pub fn check_access_level(&self, target: AnchorId) -> Result<AccessLevel> {
        self.check_access_level_for(self.user_root(), target, false)
    }

    /// Level `requester` holds on `target`
    ///
    /// With `no_custom` the archetype's access hook is skipped.
    pub fn check_access_level_for(
        &self,
        requester: AnchorId,
        target: AnchorId,
        no_custom: bool,
    ) -> Result<AccessLevel> {
        let anchor = self.require(target)?;
        self.resolve_level(requester, &anchor, no_custom)
    }

    fn resolve_level(
        &self,
        requester: AnchorId,
        anchor: &Anchor,
        no_custom: bool,
    ) -> Result<AccessLevel> {
        if !anchor.persistent
            || requester == self.system_root()
            || Some(requester) == anchor.root
            || requester == anchor.id
        {
            return Ok(AccessLevel::Write);
        }

        if !no_custom {
            let hook = anchor
                .type_name()
                .and_then(|name| self.registry().access_hook(name));
            if let Some(level) = hook.and_then(|hook| hook(anchor, requester)) {
                return Ok(level);
            }
        }

        let mut level = anchor.access.all;

        if let Some(owner) = anchor.root.and_then(|r| self.get(r).transpose()) {
            let owner = owner?;
            if owner.access.all > level {
                level = owner.access.all;
            }
            if let Some(granted) = owner.access.roots.check(&requester) {
                level = granted;
            }
        }

        if let Some(granted) = anchor.access.roots.check(&requester) {
            level = granted;
        }

        Ok(level)
    }

    fn log_denial(&self, needed: AccessLevel, target: AnchorId) {
        let root = self.user_root();
        match self.config().access.denial_log_level {
            DenialLogLevel::Info => {
                tracing::info!(root = %root, anchor = %target, needed = %needed, "access denied")
            }
            DenialLogLevel::Debug => {
                tracing::debug!(root = %root, anchor = %target, needed = %needed, "access denied")
            }
        }
    }

    fn check_at_least(&self, target: AnchorId, needed: AccessLevel) -> Result<bool> {
        let allowed = self.check_access_level(target)? >= needed;
        if !allowed {
            self.log_denial(needed, target);
        }
        Ok(allowed)
    }

    pub fn check_read_access(&self, target: AnchorId) -> Result<bool> {
        self.check_at_least(target, AccessLevel::Read)
    }

    pub fn check_connect_access(&self, target: AnchorId) -> Result<bool> {
        self.check_at_least(target, AccessLevel::Connect)
    }

    pub fn check_write_access(&self, target: AnchorId) -> Result<bool> {
        self.check_at_least(target, AccessLevel::Write)
    }

    /// Grant `root` a specific level on `target`
    ///
    /// Requires write access to `target`. Returns true if the stored level
    /// changed.
    pub fn allow_root<'a>(
        &self,
        target: AnchorId,
        root: AnchorId,
        level: impl Into<LevelInput<'a>>,
    ) -> Result<bool> {
        let level = AccessLevel::cast(level)?;
        self.update_access(target, |anchor| anchor.access.roots.set(root, level))
    }

    /// Remove `root`'s override on `target`
    pub fn disallow_root(&self, target: AnchorId, root: AnchorId) -> Result<bool> {
        self.update_access(target, |anchor| anchor.access.roots.remove(&root))
    }

    /// Set the level every requester gets on `target`
    pub fn perm_grant<'a>(&self, target: AnchorId, level: impl Into<LevelInput<'a>>) -> Result<bool> {
        let level = AccessLevel::cast(level)?;
        self.update_access(target, |anchor| {
            let changed = anchor.access.all != level;
            anchor.access.all = level;
            changed
        })
    }

    /// Reset the level every requester gets on `target` to `NoAccess`
    pub fn perm_revoke(&self, target: AnchorId) -> Result<bool> {
        self.perm_grant(target, AccessLevel::NoAccess)
    }

    fn update_access(&self, target: AnchorId, f: impl FnOnce(&mut Anchor) -> bool) -> Result<bool> {
        if !self.check_write_access(target)? {
            return Ok(false);
        }
        let changed = self.store().with_mut(&target, f)?.unwrap_or(false);
        if changed {
            tracing::debug!(root = %self.user_root(), anchor = %target, "updated access");
        }
        Ok(changed)
    }
}
