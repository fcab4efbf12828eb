//! Error types for the permission engine

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Recoverable policy and input errors.
///
/// None of these leave partial state behind: the mutation API validates the
/// full in-memory copy before anything is persisted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Empty node or pattern string
    #[error("permission node must not be empty")]
    EmptyNode,

    /// Node or pattern exceeds the maximum length
    #[error("permission node exceeds {max} characters: {len}")]
    NodeTooLong { len: usize, max: usize },

    /// Segment contains characters outside `[a-z0-9]`
    #[error("invalid segment '{segment}' in '{node}': only lowercase letters and digits allowed")]
    BadSegment { node: String, segment: String },

    /// A `*` segment somewhere other than the final position
    #[error("wildcard segment only allowed in final position: '{0}'")]
    WildcardPosition(String),

    /// A wildcard used where a concrete node is required
    #[error("a requested node must not be a wildcard: '{0}'")]
    WildcardNode(String),

    /// Empty group identifier
    #[error("group id must not be empty")]
    EmptyGroupId,

    /// Group referenced by a mutation does not exist
    #[error("unknown group: {0}")]
    UnknownGroup(String),

    /// Group id already taken
    #[error("group already exists: {0}")]
    DuplicateGroup(String),

    /// Group cannot be deleted while other groups inherit from it
    #[error("group '{id}' is inherited by: {}", .referenced_by.join(", "))]
    GroupInUse {
        id: String,
        referenced_by: Vec<String>,
    },

    /// Inheritance cycle introduced by a mutation
    #[error("inheritance cycle detected: {0}")]
    CycleDetected(String),

    /// Wildcard grant on a group below the weight gate, without force
    #[error(
        "group '{group}' (weight {weight}) is below weight {gate} required for \
         wildcard grant '{pattern}'; pass force to override"
    )]
    WildcardWeight {
        group: String,
        weight: i64,
        pattern: String,
        gate: i64,
    },

    /// A stored pattern failed validation (health check finding)
    #[error("group '{group}' holds invalid pattern '{pattern}': {reason}")]
    BadStoredPattern {
        group: String,
        pattern: String,
        reason: String,
    },

    /// `inherits` references a group that does not exist (health check finding)
    #[error("group '{group}' inherits unknown group '{parent}'")]
    DanglingParent { group: String, parent: String },

    /// Group resolves to no permissions at all (health check finding)
    #[error("group '{0}' has no effective permissions")]
    InertGroup(String),
}

/// Persistence-layer errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not acquire the file lock within the configured wait
    #[error("timed out after {waited:?} waiting for lock on {}", .path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    /// Underlying filesystem I/O failure
    #[error("policy store I/O error: {0}")]
    Io(#[from] io::Error),

    /// Document on disk is not valid JSON for a policy document
    #[error("corrupt policy document at {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Document could not be serialized for writing
    #[error("failed to encode policy document: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Top-level error for all engine operations.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Recoverable validation failure, reported to the caller verbatim
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for permission engine operations
pub type Result<T> = std::result::Result<T, PolicyError>;
