//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::arena::NodeId;

/// Domain errors represent violations of the arena and tree invariants.
/// All of them are recoverable except `IdSpaceExhausted`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("node not found: {0}")]
    NotFound(NodeId),

    #[error("node {child} already has parent {parent}")]
    AlreadyParented { child: NodeId, parent: NodeId },

    #[error("attaching {child} under {parent} would create a cycle")]
    CycleDetected { parent: NodeId, child: NodeId },

    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("node {0} still has children")]
    HasChildren(NodeId),

    #[error("node {0} cannot be an alternative of itself")]
    SelfReference(NodeId),

    #[error("multiple roots found: {0:?}")]
    MultipleRoots(Vec<NodeId>),

    #[error("tree is empty or node has no path to the root")]
    Empty,

    #[error("node id space exhausted")]
    IdSpaceExhausted,

    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("unknown parent path: {0}")]
    UnknownParentPath(String),

    #[error("checksum mismatch on node {0}")]
    ChecksumMismatch(NodeId),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("analysis result requires a non-empty file path")]
    EmptyFilePath,
}

/// Result type for arena and tree operations.
pub type DomainResult<T> = Result<T, DomainError>;
