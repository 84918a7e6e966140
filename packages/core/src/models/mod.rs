//! Data Models
//!
//! - `TreeNode` - one hierarchy member with its nested-set coordinates
//! - `TreeKind` - which independent tree a node belongs to
//! - `NewNode` / `Placement` - input to inserts and moves
//! - `TreeBranch` / `TreeStats` - read-side renderings
//!
//! Relationships live only in `parent_id` and the interval columns; no model
//! holds references to other nodes.

mod tree_node;
mod tree_view;

pub use tree_node::{NewNode, Placement, TreeKind, TreeNode};
pub use tree_view::{TreeBranch, TreeStats};
