//! Engine Error Types
//!
//! `TreeError` is returned by every repository, mutator and maintenance
//! operation. Callers outside the engine should branch on
//! [`TreeError::category`] rather than on individual variants, so nested-set
//! internals never leak into the API contract.

use crate::db::DatabaseError;
use crate::models::{TreeKind, TreeNode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the hierarchy engine
///
/// # Examples
///
/// ```rust
/// use hierarchy_core::{ErrorCategory, TreeError};
/// use hierarchy_core::models::TreeKind;
///
/// let err = TreeError::node_not_found(TreeKind::Menu, "menu-42");
/// assert_eq!(err.category(), ErrorCategory::NotFound);
/// assert_eq!(err.to_string(), "menu node 'menu-42' does not exist");
/// ```
#[derive(Error, Debug)]
pub enum TreeError {
    /// Referenced node does not exist or is soft-deleted
    #[error("{kind} node '{node_id}' does not exist")]
    NodeNotFound { kind: TreeKind, node_id: String },

    /// A node cannot be moved under itself or one of its descendants
    ///
    /// Detected by interval containment before anything is written.
    #[error("Cyclic move: node '{node_id}' cannot be placed under '{target_id}', which is inside its own subtree")]
    CyclicMove { node_id: String, target_id: String },

    /// The requested placement makes no sense (e.g. relative to the node itself)
    #[error("Invalid placement: {reason}")]
    InvalidPlacement { reason: String },

    /// Swap was requested for two nodes that do not share a parent
    #[error("Nodes '{first}' and '{second}' are not siblings")]
    NotSiblings { first: String, second: String },

    /// A node with this ID already exists in the tree
    #[error("{kind} node '{node_id}' already exists")]
    DuplicateId { kind: TreeKind, node_id: String },

    /// Caller input rejected before touching storage
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The tree's write lock could not be acquired in time
    ///
    /// Nothing was written; the caller may retry.
    #[error("The {kind} tree is busy (lock not acquired within {waited_ms} ms)")]
    TreeBusy { kind: TreeKind, waited_ms: u64 },

    /// Parent pointers do not form a forest, so coordinates cannot be rebuilt
    #[error("Parent pointers of the {kind} tree are inconsistent; unreachable nodes: {node_ids:?}")]
    InconsistentParents {
        kind: TreeKind,
        node_ids: Vec<String>,
    },

    /// A stored interval is inverted or empty; run Validate and Rebuild
    #[error("{kind} node '{node_id}' has a corrupt interval ({left}, {right})")]
    CorruptInterval {
        kind: TreeKind,
        node_id: String,
        left: u32,
        right: u32,
    },

    /// Storage failure; the enclosing transaction was rolled back
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Coarse, user-visible error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Conflict,
    NotFound,
    Internal,
}

impl TreeError {
    /// Create a NodeNotFound error
    pub fn node_not_found(kind: TreeKind, node_id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            kind,
            node_id: node_id.into(),
        }
    }

    /// Create a CyclicMove error
    pub fn cyclic_move(node_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self::CyclicMove {
            node_id: node_id.into(),
            target_id: target_id.into(),
        }
    }

    /// Create an InvalidPlacement error
    pub fn invalid_placement(reason: impl Into<String>) -> Self {
        Self::InvalidPlacement {
            reason: reason.into(),
        }
    }

    /// Create a NotSiblings error
    pub fn not_siblings(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self::NotSiblings {
            first: first.into(),
            second: second.into(),
        }
    }

    /// Create an InvalidInput error
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Create a TreeBusy error
    pub fn tree_busy(kind: TreeKind, waited_ms: u64) -> Self {
        Self::TreeBusy { kind, waited_ms }
    }

    /// Create a CorruptInterval error for `node`
    pub fn corrupt_interval(kind: TreeKind, node: &TreeNode) -> Self {
        Self::CorruptInterval {
            kind,
            node_id: node.id.clone(),
            left: node.left,
            right: node.right,
        }
    }

    /// Map to the category exposed to API callers
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CyclicMove { .. }
            | Self::InvalidPlacement { .. }
            | Self::NotSiblings { .. }
            | Self::InvalidInput { .. } => ErrorCategory::Validation,
            Self::DuplicateId { .. } | Self::TreeBusy { .. } => ErrorCategory::Conflict,
            Self::NodeNotFound { .. } => ErrorCategory::NotFound,
            Self::InconsistentParents { .. }
            | Self::CorruptInterval { .. }
            | Self::Database(_) => ErrorCategory::Internal,
        }
    }

    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TreeBusy { .. })
    }

    /// Convert a failure to start a write transaction, treating SQLite lock
    /// contention as a busy tree
    pub(crate) fn from_begin(kind: TreeKind, waited_ms: u64, err: DatabaseError) -> Self {
        if err.is_busy() {
            Self::tree_busy(kind, waited_ms)
        } else {
            Self::Database(err)
        }
    }
}

/// Result alias used throughout the engine
pub type TreeResult<T> = Result<T, TreeError>;
