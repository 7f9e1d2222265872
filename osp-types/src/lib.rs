//! Shared types for the osp graph runtime
//!
//! This crate provides the identity and permission vocabulary used across
//! the runtime: anchor identifiers, anchor kinds, edge directions and the
//! ordered access-level tiers with their per-anchor permission maps.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Anchor identifier
///
/// Every node, edge and walker in the graph is addressed by one of these.
/// The nil UUID is reserved for the system root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnchorId(pub Uuid);

impl AnchorId {
    /// Identifier of the super-user root
    pub const SYSTEM_ROOT: AnchorId = AnchorId(Uuid::nil());

    /// Create a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }

    pub fn is_system_root(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for AnchorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AnchorId {
    fn from(uuid: Uuid) -> Self {
        AnchorId(uuid)
    }
}

/// The three shapes an anchor can take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorKind {
    Node,
    Edge,
    Walker,
}

impl fmt::Display for AnchorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorKind::Node => write!(f, "node"),
            AnchorKind::Edge => write!(f, "edge"),
            AnchorKind::Walker => write!(f, "walker"),
        }
    }
}

/// Direction filter for edge lookups, relative to the origin node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeDir {
    In,
    #[default]
    Out,
    Any,
}

impl EdgeDir {
    /// Whether edges leaving the origin are included
    pub fn includes_out(&self) -> bool {
        matches!(self, EdgeDir::Out | EdgeDir::Any)
    }

    /// Whether edges arriving at the origin are included
    pub fn includes_in(&self) -> bool {
        matches!(self, EdgeDir::In | EdgeDir::Any)
    }
}

/// Error returned when a value cannot be cast to an [`AccessLevel`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessLevelError {
    #[error("no access level with value {0}")]
    UnknownValue(i64),

    #[error("no access level named {0:?}")]
    UnknownName(String),
}

/// Ordered permission tiers
///
/// `NoAccess < Read < Connect < Write`. The discriminants match the integer
/// form accepted by [`AccessLevel::cast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessLevel {
    NoAccess = -1,
    Read = 0,
    Connect = 1,
    Write = 2,
}

impl AccessLevel {
    /// Normalize an integer, name or level into an access level
    pub fn cast<'a>(value: impl Into<LevelInput<'a>>) -> Result<AccessLevel, AccessLevelError> {
        match value.into() {
            LevelInput::Level(level) => Ok(level),
            LevelInput::Int(value) => AccessLevel::try_from(value),
            LevelInput::Name(name) => name.parse(),
        }
    }

    pub fn as_i64(&self) -> i64 {
        *self as i64
    }

    /// Anything above `NoAccess`
    pub fn allows_read(&self) -> bool {
        *self > AccessLevel::NoAccess
    }

    /// Anything above `Read`
    pub fn allows_connect(&self) -> bool {
        *self > AccessLevel::Read
    }

    /// Anything above `Connect`
    pub fn allows_write(&self) -> bool {
        *self > AccessLevel::Connect
    }
}

impl Default for AccessLevel {
    fn default() -> Self {
        AccessLevel::NoAccess
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessLevel::NoAccess => write!(f, "NO_ACCESS"),
            AccessLevel::Read => write!(f, "READ"),
            AccessLevel::Connect => write!(f, "CONNECT"),
            AccessLevel::Write => write!(f, "WRITE"),
        }
    }
}

impl TryFrom<i64> for AccessLevel {
    type Error = AccessLevelError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(AccessLevel::NoAccess),
            0 => Ok(AccessLevel::Read),
            1 => Ok(AccessLevel::Connect),
            2 => Ok(AccessLevel::Write),
            other => Err(AccessLevelError::UnknownValue(other)),
        }
    }
}

impl FromStr for AccessLevel {
    type Err = AccessLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "NO_ACCESS" => Ok(AccessLevel::NoAccess),
            "READ" => Ok(AccessLevel::Read),
            "CONNECT" => Ok(AccessLevel::Connect),
            "WRITE" => Ok(AccessLevel::Write),
            _ => Err(AccessLevelError::UnknownName(s.to_string())),
        }
    }
}

/// Accepted inputs for [`AccessLevel::cast`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelInput<'a> {
    Int(i64),
    Name(&'a str),
    Level(AccessLevel),
}

impl From<i64> for LevelInput<'_> {
    fn from(value: i64) -> Self {
        LevelInput::Int(value)
    }
}

impl From<i32> for LevelInput<'_> {
    fn from(value: i32) -> Self {
        LevelInput::Int(value as i64)
    }
}

impl<'a> From<&'a str> for LevelInput<'a> {
    fn from(value: &'a str) -> Self {
        LevelInput::Name(value)
    }
}

impl From<AccessLevel> for LevelInput<'_> {
    fn from(value: AccessLevel) -> Self {
        LevelInput::Level(value)
    }
}

/// Per-root access overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Access {
    pub anchors: HashMap<AnchorId, AccessLevel>,
}

impl Access {
    /// Level explicitly granted to `root`, if any
    pub fn check(&self, root: &AnchorId) -> Option<AccessLevel> {
        self.anchors.get(root).copied()
    }

    /// Returns true if the stored level changed
    pub fn set(&mut self, root: AnchorId, level: AccessLevel) -> bool {
        self.anchors.insert(root, level) != Some(level)
    }

    /// Returns true if an override was present
    pub fn remove(&mut self, root: &AnchorId) -> bool {
        self.anchors.remove(root).is_some()
    }
}

/// Access metadata carried by every anchor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Level granted to every requester
    pub all: AccessLevel,
    /// Per-root overrides
    pub roots: Access,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(AccessLevel::NoAccess < AccessLevel::Read);
        assert!(AccessLevel::Read < AccessLevel::Connect);
        assert!(AccessLevel::Connect < AccessLevel::Write);
    }

    #[test]
    fn test_cast_inputs() {
        assert_eq!(AccessLevel::cast(2i64), Ok(AccessLevel::Write));
        assert_eq!(AccessLevel::cast(-1i64), Ok(AccessLevel::NoAccess));
        assert_eq!(AccessLevel::cast("connect"), Ok(AccessLevel::Connect));
        assert_eq!(AccessLevel::cast("NO_ACCESS"), Ok(AccessLevel::NoAccess));
        assert_eq!(AccessLevel::cast(AccessLevel::Read), Ok(AccessLevel::Read));
        assert_eq!(AccessLevel::cast(7i64), Err(AccessLevelError::UnknownValue(7)));
        assert!(matches!(
            AccessLevel::cast("admin"),
            Err(AccessLevelError::UnknownName(_))
        ));
    }

    #[test]
    fn test_thresholds() {
        assert!(!AccessLevel::NoAccess.allows_read());
        assert!(AccessLevel::Read.allows_read());
        assert!(!AccessLevel::Read.allows_connect());
        assert!(AccessLevel::Connect.allows_connect());
        assert!(!AccessLevel::Connect.allows_write());
        assert!(AccessLevel::Write.allows_write());
    }

    #[test]
    fn test_access_overrides() {
        let mut access = Access::default();
        let root = AnchorId::new();

        assert_eq!(access.check(&root), None);
        assert!(access.set(root, AccessLevel::Read));
        assert!(!access.set(root, AccessLevel::Read));
        assert_eq!(access.check(&root), Some(AccessLevel::Read));
        assert!(access.remove(&root));
        assert!(!access.remove(&root));
    }

    #[test]
    fn test_system_root_id() {
        assert!(AnchorId::SYSTEM_ROOT.is_system_root());
        assert!(!AnchorId::new().is_system_root());
    }

    #[test]
    fn test_level_serde_names() {
        let json = serde_json::to_string(&AccessLevel::Connect).unwrap();
        assert_eq!(json, "\"CONNECT\"");
        let level: AccessLevel = serde_json::from_str("\"WRITE\"").unwrap();
        assert_eq!(level, AccessLevel::Write);
    }
}
