//! Structural row reads for the maintenance path
//!
//! The request path decodes rows into [`TreeNode`], which rejects
//! coordinates that do not fit a `u32`. Validation and rebuild exist for
//! exactly that kind of data, so they read the structural columns here
//! instead: raw `i64` coordinates for the validator, and parent pointers
//! alone for the rebuilder.

use crate::db::rows::{get_integer, get_optional_string, get_string};
use crate::db::DatabaseError;
use crate::models::{TreeKind, TreeNode};
use libsql::Connection;

/// Structural columns of one stored row, coordinates undecoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub id: String,
    pub parent_id: Option<String>,
    pub left: i64,
    pub right: i64,
    pub depth: i64,
    pub ordering: i64,
    pub deleted: bool,
}

impl StoredRow {
    /// Whether `other` lies strictly inside this row's interval
    pub fn contains(&self, other: &StoredRow) -> bool {
        self.left < other.left && other.right < self.right
    }
}

impl From<&TreeNode> for StoredRow {
    fn from(node: &TreeNode) -> Self {
        Self {
            id: node.id.clone(),
            parent_id: node.parent_id.clone(),
            left: i64::from(node.left),
            right: i64::from(node.right),
            depth: i64::from(node.depth),
            ordering: node.ordering,
            deleted: node.is_deleted(),
        }
    }
}

/// What the rebuilder trusts: identity, parent pointer and sibling order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    pub id: String,
    pub parent_id: Option<String>,
    pub ordering: i64,
}

impl From<&TreeNode> for ParentLink {
    fn from(node: &TreeNode) -> Self {
        Self {
            id: node.id.clone(),
            parent_id: node.parent_id.clone(),
            ordering: node.ordering,
        }
    }
}

/// Every row of `kind` with raw coordinates, soft-deleted rows included
pub(crate) async fn read_structure(
    conn: &Connection,
    kind: TreeKind,
) -> Result<Vec<StoredRow>, DatabaseError> {
    let sql = format!(
        "SELECT id, parent_id, lft, rgt, depth, ordering, deleted_at IS NOT NULL FROM {} ORDER BY id",
        kind.table()
    );
    let mut rows = conn
        .query(&sql, ())
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to read tree structure: {}", e)))?;

    let mut stored = Vec::new();
    while let Some(row) = rows.next().await? {
        stored.push(StoredRow {
            id: get_string(&row, 0, "id")?,
            parent_id: get_optional_string(&row, 1, "parent_id")?,
            left: get_integer(&row, 2, "lft")?,
            right: get_integer(&row, 3, "rgt")?,
            depth: get_integer(&row, 4, "depth")?,
            ordering: get_integer(&row, 5, "ordering")?,
            deleted: get_integer(&row, 6, "deleted")? != 0,
        });
    }
    Ok(stored)
}

/// Every row of `kind` reduced to its parent pointer, coordinates never read
pub(crate) async fn read_parent_links(
    conn: &Connection,
    kind: TreeKind,
) -> Result<Vec<ParentLink>, DatabaseError> {
    let sql = format!("SELECT id, parent_id, ordering FROM {} ORDER BY id", kind.table());
    let mut rows = conn
        .query(&sql, ())
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to read parent links: {}", e)))?;

    let mut links = Vec::new();
    while let Some(row) = rows.next().await? {
        links.push(ParentLink {
            id: get_string(&row, 0, "id")?,
            parent_id: get_optional_string(&row, 1, "parent_id")?,
            ordering: get_integer(&row, 2, "ordering")?,
        });
    }
    Ok(links)
}
