//! TreeRepository Trait - Read Abstraction
//!
//! This module defines the read contract of the hierarchy engine. Every
//! method is a range query over the nested-set interval (or an O(1)
//! computation on it); none walks parent pointers recursively.
//!
//! # Design Decisions
//!
//! 1. **Async-first**: storage round-trips are awaited, never blocked on.
//! 2. **Active rows only**: soft-deleted nodes are invisible. Looking one up
//!    yields `TreeError::NodeNotFound`, never a zero-valued node.
//! 3. **No locking**: reads rely on the storage snapshot and never take the
//!    tree's write lock.
//! 4. **No caching**: every call re-queries the store.

use crate::error::TreeResult;
use crate::models::{TreeBranch, TreeKind, TreeNode, TreeStats};
use async_trait::async_trait;

/// Read operations over one tree kind
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a single instance can serve
/// concurrent request handlers.
#[async_trait]
pub trait TreeRepository: Send + Sync {
    //
    // SINGLE NODE
    //

    /// Fetch one active node
    async fn get_node(&self, kind: TreeKind, id: &str) -> TreeResult<TreeNode>;

    /// Number of active descendants of the node
    async fn get_subtree_size(&self, kind: TreeKind, id: &str) -> TreeResult<u32>;

    /// Whether `id` lies strictly inside `ancestor_id`'s interval
    async fn is_descendant_of(&self, kind: TreeKind, id: &str, ancestor_id: &str)
        -> TreeResult<bool>;

    //
    // RANGE QUERIES
    //

    /// All active nodes strictly inside the node's interval, ordered by `left`
    async fn get_descendants(&self, kind: TreeKind, id: &str) -> TreeResult<Vec<TreeNode>>;

    /// All active nodes whose interval strictly contains the node's, root first
    async fn get_ancestors(&self, kind: TreeKind, id: &str) -> TreeResult<Vec<TreeNode>>;

    /// Ancestors followed by the node itself, root first
    async fn get_path(&self, kind: TreeKind, id: &str) -> TreeResult<Vec<TreeNode>>;

    /// Active nodes sharing the node's parent (itself excluded), by `ordering`
    async fn get_siblings(&self, kind: TreeKind, id: &str) -> TreeResult<Vec<TreeNode>>;

    /// Active direct children, by `ordering`
    async fn get_children(&self, kind: TreeKind, id: &str) -> TreeResult<Vec<TreeNode>>;

    /// Active roots, by `ordering`
    async fn get_roots(&self, kind: TreeKind) -> TreeResult<Vec<TreeNode>>;

    /// Active nodes without active descendants, within `under` (inclusive)
    /// or across the whole tree
    async fn get_leaves(&self, kind: TreeKind, under: Option<&str>) -> TreeResult<Vec<TreeNode>>;

    //
    // RENDERING & DIAGNOSTICS
    //

    /// The node and its active descendants as a nested branch
    async fn get_subtree(&self, kind: TreeKind, id: &str) -> TreeResult<TreeBranch>;

    /// Every active node as a forest, roots in `ordering`
    async fn get_tree(&self, kind: TreeKind) -> TreeResult<Vec<TreeBranch>>;

    /// Height, per-level width, node/root/leaf counts over active nodes
    async fn tree_stats(&self, kind: TreeKind) -> TreeResult<TreeStats>;
}
