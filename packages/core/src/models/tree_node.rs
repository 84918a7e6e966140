//! Tree Node Data Structures
//!
//! This module defines `TreeNode`, the typed representation of one member of a
//! nested-set hierarchy (menu item, taxonomy term, organization unit), and the
//! request types used to place new or moved nodes.
//!
//! # Architecture
//!
//! - **Arena + index**: nodes never hold references to each other. Parent,
//!   child, ancestor and descendant relationships are expressed only through
//!   `parent_id` and the `(left, right)` interval.
//! - **Always positioned**: coordinates are assigned atomically at insert time,
//!   so a `TreeNode` always carries a valid interval.
//! - **Pure JSON metadata**: entity-specific fields live in `properties`.
//!
//! # Examples
//!
//! ```rust
//! use hierarchy_core::models::{NewNode, Placement};
//! use serde_json::json;
//!
//! // A root menu entry
//! let root = NewNode::root("Main menu");
//!
//! // A child placed as the last child of the root
//! let child = NewNode::child_of("menu-root", "About")
//!     .with_properties(json!({"url": "/about"}));
//! assert_eq!(
//!     child.placement,
//!     Placement::LastChildOf(Some("menu-root".to_string()))
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// The independent trees managed by the engine
///
/// Each kind owns its own coordinate space, table and database file. Trees of
/// different kinds are never interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeKind {
    Menu,
    Taxonomy,
    Organization,
}

impl TreeKind {
    /// Every tree kind, in a stable order
    pub const ALL: [TreeKind; 3] = [TreeKind::Menu, TreeKind::Taxonomy, TreeKind::Organization];

    /// Table holding this tree's rows
    pub fn table(self) -> &'static str {
        match self {
            Self::Menu => "menus",
            Self::Taxonomy => "taxonomies",
            Self::Organization => "organizations",
        }
    }

    /// Database file holding this tree's table
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Menu => "menus.db",
            Self::Taxonomy => "taxonomies.db",
            Self::Organization => "organizations.db",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Menu => "menu",
            Self::Taxonomy => "taxonomy",
            Self::Organization => "organization",
        }
    }
}

impl FromStr for TreeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "menu" | "menus" => Ok(Self::Menu),
            "taxonomy" | "taxonomies" => Ok(Self::Taxonomy),
            "organization" | "organizations" => Ok(Self::Organization),
            _ => Err(format!("Invalid tree kind: {}", s)),
        }
    }
}

impl std::fmt::Display for TreeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted hierarchy member
///
/// Invariants for every active node N with parent P:
/// - `P.left < N.left` and `N.right < P.right`
/// - `N.depth == P.depth + 1`
/// - `right - left` is odd
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Unique identifier (UUID unless supplied by the caller)
    pub id: String,

    /// Parent node ID (`None` marks a root)
    pub parent_id: Option<String>,

    /// Left boundary of the node's preorder interval
    pub left: u32,

    /// Right boundary of the node's preorder interval
    pub right: u32,

    /// Number of ancestors (roots are at depth 0)
    pub depth: u32,

    /// Left-to-right position among siblings
    pub ordering: i64,

    /// Soft-delete marker; deleted nodes keep their interval until purged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,

    /// Display label (menu title, term name, unit name)
    pub label: String,

    /// Entity-specific fields
    pub properties: serde_json::Value,

    pub created_at: DateTime<Utc>,

    pub modified_at: DateTime<Utc>,
}

impl TreeNode {
    /// Number of descendants encoded by the interval, `(right - left - 1) / 2`
    ///
    /// Soft-deleted descendants still occupy their interval, so this counts them.
    /// `None` when the stored interval is inverted or empty (`right <= left`).
    pub fn interval_size(&self) -> Option<u32> {
        self.span().map(|span| (span - 1) / 2)
    }

    /// Width of the interval, `right - left + 1`, or `None` when `right <= left`
    pub fn width(&self) -> Option<u32> {
        self.span().and_then(|span| span.checked_add(1))
    }

    fn span(&self) -> Option<u32> {
        self.right.checked_sub(self.left).filter(|&span| span > 0)
    }

    /// Whether `other` lies strictly inside this node's interval
    pub fn contains(&self, other: &TreeNode) -> bool {
        self.left < other.left && other.right < self.right
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// True when the interval encloses no rows at all
    pub fn is_leaf_interval(&self) -> bool {
        self.right == self.left + 1
    }
}

/// Where a new or moved node is placed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "target", rename_all = "camelCase")]
pub enum Placement {
    /// Last child of the given parent; `None` appends a root
    LastChildOf(Option<String>),

    /// First child of the given parent; `None` prepends a root
    FirstChildOf(Option<String>),

    /// Immediately after the given sibling, under the same parent
    After(String),

    /// Immediately before the given sibling, under the same parent
    Before(String),
}

impl Placement {
    /// The anchor node the placement refers to, if any
    pub fn anchor_id(&self) -> Option<&str> {
        match self {
            Self::LastChildOf(parent) | Self::FirstChildOf(parent) => parent.as_deref(),
            Self::After(sibling) | Self::Before(sibling) => Some(sibling),
        }
    }
}

/// Request to insert a node
///
/// Coordinates are never supplied by the caller; they are computed by the
/// mutator inside the insert transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNode {
    /// Caller-supplied ID; a UUID is generated when absent
    #[serde(default)]
    pub id: Option<String>,

    pub label: String,

    #[serde(default = "empty_properties")]
    pub properties: serde_json::Value,

    pub placement: Placement,
}

fn empty_properties() -> serde_json::Value {
    serde_json::json!({})
}

impl NewNode {
    /// A new root appended after the existing roots
    pub fn root(label: impl Into<String>) -> Self {
        Self {
            id: None,
            label: label.into(),
            properties: empty_properties(),
            placement: Placement::LastChildOf(None),
        }
    }

    /// A new last child of `parent_id`
    pub fn child_of(parent_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: None,
            label: label.into(),
            properties: empty_properties(),
            placement: Placement::LastChildOf(Some(parent_id.into())),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = properties;
        self
    }

    pub fn placed(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    /// The ID this node will be stored under
    pub(crate) fn resolve_id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(left: u32, right: u32) -> TreeNode {
        let now = Utc::now();
        TreeNode {
            id: format!("n-{}", left),
            parent_id: None,
            left,
            right,
            depth: 0,
            ordering: 0,
            deleted_at: None,
            label: "n".to_string(),
            properties: json!({}),
            created_at: now,
            modified_at: now,
        }
    }

    #[test]
    fn test_interval_size_counts_descendants() {
        assert_eq!(node(1, 2).interval_size(), Some(0));
        assert_eq!(node(1, 6).interval_size(), Some(2));
        assert_eq!(node(1, 6).width(), Some(6));
    }

    #[test]
    fn test_degenerate_interval_has_no_size() {
        for (left, right) in [(1, 1), (5, 1), (0, 0)] {
            assert_eq!(node(left, right).interval_size(), None);
            assert_eq!(node(left, right).width(), None);
        }
        assert_eq!(node(0, u32::MAX).width(), None);
    }

    #[test]
    fn test_contains_is_strict() {
        let root = node(1, 6);
        let child = node(2, 3);
        assert!(root.contains(&child));
        assert!(!child.contains(&root));
        assert!(!root.contains(&root));
    }

    #[test]
    fn test_tree_kind_round_trips_through_str() {
        for kind in TreeKind::ALL {
            assert_eq!(kind.as_str().parse::<TreeKind>().unwrap(), kind);
            assert_eq!(kind.table().parse::<TreeKind>().unwrap(), kind);
        }
        assert!("tags".parse::<TreeKind>().is_err());
    }

    #[test]
    fn test_new_node_builders() {
        let n = NewNode::child_of("p", "Child")
            .with_id("c")
            .with_properties(json!({"slug": "child"}));
        assert_eq!(n.resolve_id(), "c");
        assert_eq!(n.placement.anchor_id(), Some("p"));
        assert_eq!(NewNode::root("R").placement.anchor_id(), None);
    }

    #[test]
    fn test_placement_serializes_with_tag() {
        let value = serde_json::to_value(Placement::After("x".to_string())).unwrap();
        assert_eq!(value, json!({"type": "after", "target": "x"}));
    }
}
