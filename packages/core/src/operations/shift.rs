//! Coordinate shifting primitives
//!
//! These statements are only ever run inside a write transaction that holds
//! the tree's lock. Each primitive touches every row whose coordinates must
//! move, soft-deleted rows included, because deleted rows keep their interval.
//!
//! A subtree being moved is *detached* by negating its coordinates. Negative
//! rows are invisible to `open_gap`/`close_gap` (which only match positive
//! positions) and are translated back in one statement by `reattach`.

use crate::db::DatabaseError;
use crate::models::{TreeKind, TreeNode};
use libsql::Connection;

/// Open a `width`-wide gap starting at position `at`
///
/// Every boundary `>= at` moves right by `width`. Afterwards positions
/// `at..at + width` are free.
pub(crate) async fn open_gap(
    conn: &Connection,
    kind: TreeKind,
    at: i64,
    width: i64,
) -> Result<(), DatabaseError> {
    let table = kind.table();
    tracing::debug!("{}: opening gap of {} at {}", kind, width, at);

    conn.execute(
        &format!("UPDATE {table} SET rgt = rgt + ?1 WHERE rgt >= ?2"),
        (width, at),
    )
    .await
    .map_err(|e| DatabaseError::sql_execution(format!("Failed to shift rgt: {}", e)))?;

    conn.execute(
        &format!("UPDATE {table} SET lft = lft + ?1 WHERE lft >= ?2"),
        (width, at),
    )
    .await
    .map_err(|e| DatabaseError::sql_execution(format!("Failed to shift lft: {}", e)))?;

    Ok(())
}

/// Close a `width`-wide gap that ends at position `after`
///
/// Every boundary `> after` moves left by `width`.
pub(crate) async fn close_gap(
    conn: &Connection,
    kind: TreeKind,
    after: i64,
    width: i64,
) -> Result<(), DatabaseError> {
    let table = kind.table();
    tracing::debug!("{}: closing gap of {} after {}", kind, width, after);

    conn.execute(
        &format!("UPDATE {table} SET lft = lft - ?1 WHERE lft > ?2"),
        (width, after),
    )
    .await
    .map_err(|e| DatabaseError::sql_execution(format!("Failed to close lft gap: {}", e)))?;

    conn.execute(
        &format!("UPDATE {table} SET rgt = rgt - ?1 WHERE rgt > ?2"),
        (width, after),
    )
    .await
    .map_err(|e| DatabaseError::sql_execution(format!("Failed to close rgt gap: {}", e)))?;

    Ok(())
}

/// Lift `node`'s subtree out of the coordinate space by negating it
pub(crate) async fn detach(
    conn: &Connection,
    kind: TreeKind,
    node: &TreeNode,
) -> Result<u64, DatabaseError> {
    conn.execute(
        &format!(
            "UPDATE {} SET lft = -lft, rgt = -rgt WHERE lft >= ?1 AND rgt <= ?2",
            kind.table()
        ),
        (i64::from(node.left), i64::from(node.right)),
    )
    .await
    .map_err(|e| DatabaseError::sql_execution(format!("Failed to detach subtree: {}", e)))
}

/// Put the detached subtree back, translated by `delta` and re-leveled by
/// `depth_delta`
pub(crate) async fn reattach(
    conn: &Connection,
    kind: TreeKind,
    delta: i64,
    depth_delta: i64,
) -> Result<u64, DatabaseError> {
    conn.execute(
        &format!(
            "UPDATE {} SET lft = -lft + ?1, rgt = -rgt + ?1, depth = depth + ?2 WHERE lft < 0",
            kind.table()
        ),
        (delta, depth_delta),
    )
    .await
    .map_err(|e| DatabaseError::sql_execution(format!("Failed to reattach subtree: {}", e)))
}

/// Exchange the intervals of two sibling subtrees, `first` lying left of `second`
///
/// Both intervals must be well formed (`right > left`).
///
/// In a single statement: `first`'s subtree moves to end where `second`
/// ended, `second`'s subtree moves to start where `first` started, and any
/// siblings between them shift by the width difference.
pub(crate) async fn swap_intervals(
    conn: &Connection,
    kind: TreeKind,
    first: &TreeNode,
    second: &TreeNode,
) -> Result<u64, DatabaseError> {
    let (first_left, first_right) = (i64::from(first.left), i64::from(first.right));
    let (second_left, second_right) = (i64::from(second.left), i64::from(second.right));
    let first_delta = second_right - first_right;
    let second_delta = first_left - second_left;
    let between_delta = (second_right - second_left) - (first_right - first_left);

    // SQLite evaluates every SET expression against the original row, so
    // both CASEs classify the row by its old lft.
    let delta_case = "CASE
            WHEN lft BETWEEN ?1 AND ?2 THEN ?5
            WHEN lft BETWEEN ?3 AND ?4 THEN ?6
            ELSE ?7
        END";

    conn.execute(
        &format!(
            "UPDATE {} SET lft = lft + {delta_case}, rgt = rgt + {delta_case}
             WHERE lft >= ?1 AND lft <= ?4",
            kind.table()
        ),
        libsql::params![
            first_left,
            first_right,
            second_left,
            second_right,
            first_delta,
            second_delta,
            between_delta
        ],
    )
    .await
    .map_err(|e| DatabaseError::sql_execution(format!("Failed to swap intervals: {}", e)))
}
