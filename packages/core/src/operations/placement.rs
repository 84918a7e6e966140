//! Placement resolution
//!
//! Turns a `Placement` into the concrete gap position, parent, depth and
//! sibling ordering for the node being inserted or moved. Must run inside the
//! mutation's write transaction, after any detach, so the coordinates it
//! reads are the ones the subsequent `open_gap` will shift.

use crate::db::rows::{query_scalar, Visibility};
use crate::db::tree_store::require_node;
use crate::db::DatabaseError;
use crate::error::{TreeError, TreeResult};
use crate::models::{Placement, TreeKind, TreeNode};
use crate::operations::OrderingCalculator;
use libsql::Connection;

/// Where a node lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Target {
    /// First position of the gap to open
    pub position: i64,
    pub parent_id: Option<String>,
    pub depth: i64,
    pub ordering: i64,
}

/// Validate a placement against the node that will occupy it
///
/// Rejects placing a node relative to itself and, for moves, anchoring it
/// inside its own subtree. Runs before anything is written.
pub(crate) async fn check_anchor(
    conn: &Connection,
    kind: TreeKind,
    placement: &Placement,
    moving: Option<&TreeNode>,
) -> TreeResult<()> {
    let Some(anchor_id) = placement.anchor_id() else {
        return Ok(());
    };
    let anchor = require_node(conn, kind, anchor_id, Visibility::Active).await?;

    let Some(node) = moving else {
        return Ok(());
    };

    match placement {
        Placement::LastChildOf(_) | Placement::FirstChildOf(_) => {
            if anchor.id == node.id || node.contains(&anchor) {
                return Err(TreeError::cyclic_move(&node.id, &anchor.id));
            }
        }
        Placement::After(_) | Placement::Before(_) => {
            if anchor.id == node.id {
                return Err(TreeError::invalid_placement(format!(
                    "node '{}' cannot be placed relative to itself",
                    node.id
                )));
            }
            if node.contains(&anchor) {
                return Err(TreeError::cyclic_move(&node.id, &anchor.id));
            }
        }
    }
    Ok(())
}

/// Resolve `placement` into a gap position and sibling ordering
///
/// `exclude_id` is the node being moved; it is ignored when looking at the
/// target's siblings. May renumber sibling orderings when no free key exists
/// between the neighbours.
pub(crate) async fn resolve(
    conn: &Connection,
    kind: TreeKind,
    placement: &Placement,
    exclude_id: Option<&str>,
) -> TreeResult<Target> {
    let exclude = exclude_id.unwrap_or("");
    let table = kind.table();

    match placement {
        Placement::LastChildOf(Some(parent_id)) => {
            let parent = require_node(conn, kind, parent_id, Visibility::Active).await?;
            let last = max_ordering(conn, kind, Some(parent_id.as_str()), exclude).await?;
            Ok(Target {
                position: i64::from(parent.right),
                parent_id: Some(parent.id),
                depth: i64::from(parent.depth) + 1,
                ordering: OrderingCalculator::between(last, None).unwrap_or(0),
            })
        }
        Placement::LastChildOf(None) => {
            // Roots append after everything currently in the coordinate space
            let end = query_scalar(
                conn,
                &format!("SELECT COALESCE(MAX(rgt), 0) FROM {table} WHERE rgt > 0"),
                (),
            )
            .await?;
            let last = max_ordering(conn, kind, None, exclude).await?;
            Ok(Target {
                position: end + 1,
                parent_id: None,
                depth: 0,
                ordering: OrderingCalculator::between(last, None).unwrap_or(0),
            })
        }
        Placement::FirstChildOf(Some(parent_id)) => {
            let parent = require_node(conn, kind, parent_id, Visibility::Active).await?;
            let first = min_ordering(conn, kind, Some(parent_id.as_str()), exclude).await?;
            Ok(Target {
                position: i64::from(parent.left) + 1,
                parent_id: Some(parent.id),
                depth: i64::from(parent.depth) + 1,
                ordering: OrderingCalculator::between(None, first).unwrap_or(0),
            })
        }
        Placement::FirstChildOf(None) => {
            let start = query_scalar(
                conn,
                &format!("SELECT COALESCE(MIN(lft), 1) FROM {table} WHERE lft > 0"),
                (),
            )
            .await?;
            let first = min_ordering(conn, kind, None, exclude).await?;
            Ok(Target {
                position: start,
                parent_id: None,
                depth: 0,
                ordering: OrderingCalculator::between(None, first).unwrap_or(0),
            })
        }
        Placement::After(sibling_id) => {
            let sibling = require_node(conn, kind, sibling_id, Visibility::Active).await?;
            let parent_id = sibling.parent_id.as_deref();
            let next = neighbour_ordering(conn, kind, parent_id, sibling.ordering, true, exclude)
                .await?;
            let ordering = match OrderingCalculator::between(Some(sibling.ordering), next) {
                Some(ordering) => ordering,
                None => {
                    renumber_from(conn, kind, parent_id, sibling.ordering + 1, exclude).await?;
                    sibling.ordering + 1
                }
            };
            Ok(Target {
                position: i64::from(sibling.right) + 1,
                parent_id: sibling.parent_id.clone(),
                depth: i64::from(sibling.depth),
                ordering,
            })
        }
        Placement::Before(sibling_id) => {
            let sibling = require_node(conn, kind, sibling_id, Visibility::Active).await?;
            let parent_id = sibling.parent_id.as_deref();
            let prev = neighbour_ordering(conn, kind, parent_id, sibling.ordering, false, exclude)
                .await?;
            let ordering = match OrderingCalculator::between(prev, Some(sibling.ordering)) {
                Some(ordering) => ordering,
                None => {
                    renumber_from(conn, kind, parent_id, sibling.ordering, exclude).await?;
                    sibling.ordering
                }
            };
            Ok(Target {
                position: i64::from(sibling.left),
                parent_id: sibling.parent_id.clone(),
                depth: i64::from(sibling.depth),
                ordering,
            })
        }
    }
}

//
// SIBLING ORDERING QUERIES
// Soft-deleted siblings still hold their position, so these see every row.
//

async fn max_ordering(
    conn: &Connection,
    kind: TreeKind,
    parent_id: Option<&str>,
    exclude: &str,
) -> Result<Option<i64>, DatabaseError> {
    sibling_aggregate(conn, kind, "MAX(ordering)", "?3 = ?3", parent_id, exclude, None).await
}

async fn min_ordering(
    conn: &Connection,
    kind: TreeKind,
    parent_id: Option<&str>,
    exclude: &str,
) -> Result<Option<i64>, DatabaseError> {
    sibling_aggregate(conn, kind, "MIN(ordering)", "?3 = ?3", parent_id, exclude, None).await
}

/// Ordering of the closest sibling after (`after = true`) or before `ordering`
async fn neighbour_ordering(
    conn: &Connection,
    kind: TreeKind,
    parent_id: Option<&str>,
    ordering: i64,
    after: bool,
    exclude: &str,
) -> Result<Option<i64>, DatabaseError> {
    let (aggregate, condition) = if after {
        ("MIN(ordering)", "ordering > ?3")
    } else {
        ("MAX(ordering)", "ordering < ?3")
    };
    sibling_aggregate(conn, kind, aggregate, condition, parent_id, exclude, Some(ordering)).await
}

async fn sibling_aggregate(
    conn: &Connection,
    kind: TreeKind,
    aggregate: &str,
    condition: &str,
    parent_id: Option<&str>,
    exclude: &str,
    ordering: Option<i64>,
) -> Result<Option<i64>, DatabaseError> {
    let sql = format!(
        "SELECT {aggregate} FROM {} WHERE parent_id IS ?1 AND id != ?2 AND {condition}",
        kind.table()
    );
    let mut rows = conn
        .query(&sql, libsql::params![parent_id, exclude, ordering.unwrap_or(0)])
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to read sibling ordering: {}", e)))?;

    match rows.next().await? {
        Some(row) => row
            .get::<Option<i64>>(0)
            .map_err(|e| DatabaseError::malformed_row(format!("Failed to get ordering: {}", e))),
        None => Ok(None),
    }
}

/// Shift every sibling with `ordering >= from` one step right
async fn renumber_from(
    conn: &Connection,
    kind: TreeKind,
    parent_id: Option<&str>,
    from: i64,
    exclude: &str,
) -> Result<u64, DatabaseError> {
    tracing::debug!("{}: renumbering siblings from ordering {}", kind, from);
    conn.execute(
        &format!(
            "UPDATE {} SET ordering = ordering + 1 WHERE parent_id IS ?1 AND id != ?2 AND ordering >= ?3",
            kind.table()
        ),
        libsql::params![parent_id, exclude, from],
    )
    .await
    .map_err(|e| DatabaseError::sql_execution(format!("Failed to renumber siblings: {}", e)))
}
