//! Error types for the osp runtime

use crate::config::ConfigError;
use crate::store::StoreError;
use osp_types::{AccessLevelError, AnchorId, AnchorKind};
use thiserror::Error;

/// Top-level engine error
///
/// Only malformed operands, storage failures and errors raised by ability
/// bodies surface here. Access denials never do; they are logged and
/// reported through boolean results instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Spawn was given something that is not a walker / node / edge
    #[error("invalid spawn operand: {0}")]
    InvalidSpawnOperand(String),

    /// An anchor of the wrong kind was passed where a specific kind is required
    #[error("anchor {id} is a {found}, expected a {expected}")]
    WrongKind {
        id: AnchorId,
        expected: AnchorKind,
        found: AnchorKind,
    },

    /// The id does not resolve in the store
    #[error("anchor {0} not found")]
    AnchorNotFound(AnchorId),

    /// No archetype registered under this name
    #[error("unknown archetype: {0}")]
    UnknownArchetype(String),

    /// An archetype was registered twice
    #[error("archetype already registered: {0}")]
    DuplicateArchetype(String),

    /// A definition or instance does not fit where it was used
    #[error("invalid archetype {name}: {reason}")]
    InvalidArchetype { name: String, reason: String },

    /// Attribute assignment on an archetype that does not declare the field
    #[error("invalid attribute {field:?} for archetype {archetype}")]
    InvalidAttribute { archetype: String, field: String },

    /// Access level casting failed
    #[error("access level error: {0}")]
    AccessLevel(#[from] AccessLevelError),

    /// Storage backend failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration failure
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Background task panicked or was cancelled
    #[error("background task failed: {0}")]
    Task(String),

    /// A blocking spawn was left pending by an ability
    #[error("traversal suspended during a blocking spawn")]
    Suspended,

    /// Error raised by an ability body
    #[error("ability error: {0}")]
    Ability(String),
}

impl EngineError {
    /// Convenience constructor for ability bodies
    pub fn ability(message: impl Into<String>) -> Self {
        EngineError::Ability(message.into())
    }

    pub(crate) fn invalid_archetype(name: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::InvalidArchetype {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;
