//! Tree Mutator
//!
//! Every coordinate-changing operation follows the same shape: take the
//! tree's lock, open a `BEGIN IMMEDIATE` transaction on the tree's database,
//! run the shift primitives, and commit. Any error rolls the whole
//! transaction back, so readers never observe a partial shift.
//!
//! The per-operation bodies (`*_in` functions) only need a connection with an
//! open transaction, which lets the batch operations run many of them inside
//! one transaction.
//!
//! # Examples
//!
//! ```rust,no_run
//! use hierarchy_core::config::EngineConfig;
//! use hierarchy_core::db::DatabaseService;
//! use hierarchy_core::models::{NewNode, Placement, TreeKind};
//! use hierarchy_core::operations::{TreeLocks, TreeMutator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EngineConfig::new("./data");
//!     let db = DatabaseService::new(&config).await?;
//!     let mutator = TreeMutator::new(db, TreeLocks::new(config.lock_timeout()));
//!
//!     let root = mutator.insert(TreeKind::Menu, NewNode::root("Main")).await?;
//!     let about = mutator
//!         .insert(TreeKind::Menu, NewNode::child_of(&root.id, "About"))
//!         .await?;
//!     let home = mutator
//!         .insert(
//!             TreeKind::Menu,
//!             NewNode::child_of(&root.id, "Home").placed(Placement::Before(about.id.clone())),
//!         )
//!         .await?;
//!
//!     mutator.swap(TreeKind::Menu, &home.id, &about.id).await?;
//!     Ok(())
//! }
//! ```

use crate::db::database::{begin_write, finish};
use crate::db::rows::{now_timestamp, query_node, Visibility, NODE_COLUMNS};
use crate::db::tree_store::{fetch_node, require_node};
use crate::db::{DatabaseError, DatabaseService};
use crate::error::{TreeError, TreeResult};
use crate::models::{NewNode, Placement, TreeKind, TreeNode};
use crate::operations::placement::{check_anchor, resolve};
use crate::operations::shift::{close_gap, detach, open_gap, reattach, swap_intervals};
use crate::operations::{TreeLockGuard, TreeLocks};
use libsql::Connection;
use serde_json::Value;

/// A write transaction together with the tree lock that protects it
///
/// The guard must outlive the commit, so both travel together.
struct WriteTx {
    conn: Connection,
    guard: TreeLockGuard,
}

/// Applies insert/move/delete/swap to one tree at a time
#[derive(Debug, Clone)]
pub struct TreeMutator {
    db: DatabaseService,
    locks: TreeLocks,
}

impl TreeMutator {
    pub fn new(db: DatabaseService, locks: TreeLocks) -> Self {
        Self { db, locks }
    }

    pub fn locks(&self) -> &TreeLocks {
        &self.locks
    }

    /// Take the tree lock and begin an immediate write transaction
    async fn begin(&self, kind: TreeKind) -> TreeResult<WriteTx> {
        let guard = self.locks.acquire(kind).await?;
        let conn = self.db.connect_with_timeout(kind).await?;
        let waited_ms = self.locks.timeout().as_millis() as u64;
        begin_write(&conn)
            .await
            .map_err(|e| TreeError::from_begin(kind, waited_ms, e))?;
        Ok(WriteTx { conn, guard })
    }

    /// Commit or roll back, then release the lock
    async fn commit<T>(tx: WriteTx, result: TreeResult<T>) -> TreeResult<T> {
        if let Err(e) = &result {
            tracing::warn!("Rolling back {} mutation: {}", tx.guard.kind(), e);
        }
        let outcome = finish(&tx.conn, result).await;
        drop(tx.guard);
        outcome
    }

    /// Insert a new leaf at `new_node.placement`
    ///
    /// # Errors
    ///
    /// - `NodeNotFound` if the placement's anchor is missing or soft-deleted
    /// - `DuplicateId` if the caller-supplied ID is taken (deleted rows included)
    /// - `InvalidInput` for an empty label or non-object properties
    pub async fn insert(&self, kind: TreeKind, new_node: NewNode) -> TreeResult<TreeNode> {
        let tx = self.begin(kind).await?;
        let result = insert_in(&tx.conn, kind, new_node).await;
        Self::commit(tx, result).await
    }

    /// Move `id` and its whole subtree to `placement`
    ///
    /// # Errors
    ///
    /// - `CyclicMove` if the placement is inside the moved subtree
    /// - `InvalidPlacement` if the node is placed relative to itself
    /// - `NodeNotFound` if the node or the anchor is missing or soft-deleted
    pub async fn move_subtree(
        &self,
        kind: TreeKind,
        id: &str,
        placement: Placement,
    ) -> TreeResult<TreeNode> {
        let tx = self.begin(kind).await?;
        let result = move_in(&tx.conn, kind, id, &placement).await;
        Self::commit(tx, result).await
    }

    /// Soft-delete `id` and every active descendant
    ///
    /// Coordinates are left untouched. Returns the number of rows marked.
    pub async fn soft_delete(&self, kind: TreeKind, id: &str) -> TreeResult<u64> {
        let tx = self.begin(kind).await?;
        let result = soft_delete_in(&tx.conn, kind, id).await;
        Self::commit(tx, result).await
    }

    /// Undo a soft delete of `id`
    ///
    /// Only the descendants deleted together with `id` come back; a child
    /// deleted earlier on its own stays deleted. The parent must be active.
    /// Restoring an active node is a no-op returning 0.
    pub async fn restore(&self, kind: TreeKind, id: &str) -> TreeResult<u64> {
        let tx = self.begin(kind).await?;
        let result = restore_in(&tx.conn, kind, id).await;
        Self::commit(tx, result).await
    }

    /// Hard-delete `id` and its subtree, closing the gap
    ///
    /// Works on active and soft-deleted nodes alike. Maintenance path: it
    /// rewrites every coordinate to the right of the subtree.
    pub async fn purge(&self, kind: TreeKind, id: &str) -> TreeResult<u64> {
        let tx = self.begin(kind).await?;
        let result = purge_in(&tx.conn, kind, id).await;
        let removed = Self::commit(tx, result).await?;
        tracing::info!("Purged {} rows from the {} tree", removed, kind);
        Ok(removed)
    }

    /// Hard-delete every soft-deleted subtree of the tree
    pub async fn purge_deleted(&self, kind: TreeKind) -> TreeResult<u64> {
        let tx = self.begin(kind).await?;
        let result = purge_deleted_in(&tx.conn, kind).await;
        let removed = Self::commit(tx, result).await?;
        tracing::info!("Purged {} soft-deleted rows from the {} tree", removed, kind);
        Ok(removed)
    }

    /// Swap two siblings
    ///
    /// Exchanges their `ordering` and their intervals (full subtrees
    /// included), so left-to-right coordinate order keeps mirroring sibling
    /// order. Returns both nodes, in argument order, as stored afterwards.
    pub async fn swap(&self, kind: TreeKind, a: &str, b: &str) -> TreeResult<(TreeNode, TreeNode)> {
        let tx = self.begin(kind).await?;
        let result = swap_in(&tx.conn, kind, a, b).await;
        Self::commit(tx, result).await
    }

    /// Edit label and/or properties
    ///
    /// No coordinates change, so the tree lock is not taken; SQLite's own
    /// write lock serializes this with any running mutation.
    pub async fn update_metadata(
        &self,
        kind: TreeKind,
        id: &str,
        label: Option<String>,
        properties: Option<Value>,
    ) -> TreeResult<TreeNode> {
        let conn = self.db.connect_with_timeout(kind).await?;
        let waited_ms = self.db.busy_timeout_ms();
        begin_write(&conn)
            .await
            .map_err(|e| TreeError::from_begin(kind, waited_ms, e))?;
        let result = update_metadata_in(&conn, kind, id, label, properties).await;
        finish(&conn, result).await
    }

    /// Insert several nodes in one transaction, in submission order
    ///
    /// A later item may be placed relative to a node created by an earlier
    /// one. If any item fails, nothing is inserted.
    pub async fn batch_insert(
        &self,
        kind: TreeKind,
        nodes: Vec<NewNode>,
    ) -> TreeResult<Vec<TreeNode>> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }
        let count = nodes.len();
        let tx = self.begin(kind).await?;
        let result = async {
            let mut inserted = Vec::with_capacity(count);
            for node in nodes {
                inserted.push(insert_in(&tx.conn, kind, node).await?);
            }
            Ok::<_, TreeError>(inserted)
        }
        .await;
        let inserted = Self::commit(tx, result).await?;
        tracing::debug!("Batch inserted {} nodes into the {} tree", count, kind);
        Ok(inserted)
    }

    /// Move several subtrees in one transaction, in submission order
    pub async fn batch_move(
        &self,
        kind: TreeKind,
        moves: Vec<(String, Placement)>,
    ) -> TreeResult<Vec<TreeNode>> {
        if moves.is_empty() {
            return Ok(Vec::new());
        }
        let count = moves.len();
        let tx = self.begin(kind).await?;
        let result = async {
            let mut moved = Vec::with_capacity(count);
            for (id, placement) in &moves {
                moved.push(move_in(&tx.conn, kind, id, placement).await?);
            }
            Ok::<_, TreeError>(moved)
        }
        .await;
        let moved = Self::commit(tx, result).await?;
        tracing::debug!("Batch moved {} subtrees in the {} tree", count, kind);
        Ok(moved)
    }
}

//
// OPERATION BODIES
// Each runs inside a write transaction opened by the caller.
//

fn validate_metadata(label: &str, properties: &Value) -> TreeResult<()> {
    if label.trim().is_empty() {
        return Err(TreeError::invalid_input("label must not be empty"));
    }
    if !properties.is_object() {
        return Err(TreeError::invalid_input(format!(
            "properties must be a JSON object, got {}",
            properties
        )));
    }
    Ok(())
}

fn encode_properties(properties: &Value) -> TreeResult<String> {
    serde_json::to_string(properties)
        .map_err(|e| TreeError::invalid_input(format!("properties are not serializable: {}", e)))
}

async fn insert_in(conn: &Connection, kind: TreeKind, new_node: NewNode) -> TreeResult<TreeNode> {
    validate_metadata(&new_node.label, &new_node.properties)?;
    if matches!(&new_node.id, Some(id) if id.trim().is_empty()) {
        return Err(TreeError::invalid_input("id must not be empty"));
    }

    let id = new_node.resolve_id();
    if fetch_node(conn, kind, &id, Visibility::All).await?.is_some() {
        return Err(TreeError::DuplicateId { kind, node_id: id });
    }

    let target = resolve(conn, kind, &new_node.placement, None).await?;
    open_gap(conn, kind, target.position, 2).await?;

    let now = now_timestamp();
    conn.execute(
        &format!(
            "INSERT INTO {} ({NODE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8, ?9, ?9)",
            kind.table()
        ),
        libsql::params![
            id.as_str(),
            target.parent_id.as_deref(),
            target.position,
            target.position + 1,
            target.depth,
            target.ordering,
            new_node.label.as_str(),
            encode_properties(&new_node.properties)?,
            now.as_str()
        ],
    )
    .await
    .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert node: {}", e)))?;

    tracing::debug!(
        "Inserted {} node '{}' at ({}, {}) depth {}",
        kind,
        id,
        target.position,
        target.position + 1,
        target.depth
    );
    require_node(conn, kind, &id, Visibility::All).await
}

async fn move_in(
    conn: &Connection,
    kind: TreeKind,
    id: &str,
    placement: &Placement,
) -> TreeResult<TreeNode> {
    let node = require_node(conn, kind, id, Visibility::Active).await?;
    check_anchor(conn, kind, placement, Some(&node)).await?;

    let width = node
        .width()
        .ok_or_else(|| TreeError::corrupt_interval(kind, &node))?;
    let width = i64::from(width);
    detach(conn, kind, &node).await?;
    close_gap(conn, kind, i64::from(node.right), width).await?;

    // Resolved after the old gap is closed, so the target reflects the
    // coordinates the new gap will be opened in
    let target = resolve(conn, kind, placement, Some(&node.id)).await?;
    open_gap(conn, kind, target.position, width).await?;

    let delta = target.position - i64::from(node.left);
    let depth_delta = target.depth - i64::from(node.depth);
    let moved = reattach(conn, kind, delta, depth_delta).await?;

    conn.execute(
        &format!(
            "UPDATE {} SET parent_id = ?1, ordering = ?2, modified_at = ?3 WHERE id = ?4",
            kind.table()
        ),
        libsql::params![
            target.parent_id.as_deref(),
            target.ordering,
            now_timestamp(),
            node.id.as_str()
        ],
    )
    .await
    .map_err(|e| DatabaseError::sql_execution(format!("Failed to re-parent node: {}", e)))?;

    tracing::debug!(
        "Moved {} subtree '{}' ({} rows) by {} positions, depth {:+}",
        kind,
        node.id,
        moved,
        delta,
        depth_delta
    );
    require_node(conn, kind, &node.id, Visibility::All).await
}

async fn soft_delete_in(conn: &Connection, kind: TreeKind, id: &str) -> TreeResult<u64> {
    let node = require_node(conn, kind, id, Visibility::Active).await?;
    let marked = conn
        .execute(
            &format!(
                "UPDATE {} SET deleted_at = ?3, modified_at = ?3
                 WHERE lft >= ?1 AND rgt <= ?2 AND deleted_at IS NULL",
                kind.table()
            ),
            libsql::params![i64::from(node.left), i64::from(node.right), now_timestamp()],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to soft-delete subtree: {}", e)))?;

    tracing::debug!("Soft-deleted {} rows under {} node '{}'", marked, kind, node.id);
    Ok(marked)
}

async fn restore_in(conn: &Connection, kind: TreeKind, id: &str) -> TreeResult<u64> {
    let node = require_node(conn, kind, id, Visibility::All).await?;
    if !node.is_deleted() {
        return Ok(0);
    }
    if let Some(parent_id) = &node.parent_id {
        if fetch_node(conn, kind, parent_id, Visibility::Active).await?.is_none() {
            return Err(TreeError::invalid_placement(format!(
                "cannot restore '{}' while its parent '{}' is deleted",
                node.id, parent_id
            )));
        }
    }

    let table = kind.table();
    let restored = conn
        .execute(
            &format!(
                "UPDATE {table} SET deleted_at = NULL, modified_at = ?4
                 WHERE lft >= ?1 AND rgt <= ?2
                   AND deleted_at = (SELECT deleted_at FROM {table} WHERE id = ?3)"
            ),
            libsql::params![
                i64::from(node.left),
                i64::from(node.right),
                node.id.as_str(),
                now_timestamp()
            ],
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to restore subtree: {}", e)))?;

    tracing::debug!("Restored {} rows under {} node '{}'", restored, kind, node.id);
    Ok(restored)
}

async fn purge_in(conn: &Connection, kind: TreeKind, id: &str) -> TreeResult<u64> {
    let node = require_node(conn, kind, id, Visibility::All).await?;
    purge_node(conn, kind, &node).await
}

async fn purge_node(conn: &Connection, kind: TreeKind, node: &TreeNode) -> TreeResult<u64> {
    let width = node
        .width()
        .ok_or_else(|| TreeError::corrupt_interval(kind, node))?;
    let removed = conn
        .execute(
            &format!("DELETE FROM {} WHERE lft >= ?1 AND rgt <= ?2", kind.table()),
            (i64::from(node.left), i64::from(node.right)),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to delete subtree: {}", e)))?;
    close_gap(conn, kind, i64::from(node.right), i64::from(width)).await?;
    Ok(removed)
}

async fn purge_deleted_in(conn: &Connection, kind: TreeKind) -> TreeResult<u64> {
    let next_deleted = format!(
        "SELECT {NODE_COLUMNS} FROM {} WHERE deleted_at IS NOT NULL ORDER BY lft LIMIT 1",
        kind.table()
    );

    // The left-most deleted row is always the top of a deleted subtree
    let mut removed = 0;
    while let Some(node) = query_node(conn, &next_deleted, ()).await? {
        removed += purge_node(conn, kind, &node).await?;
    }
    Ok(removed)
}

async fn swap_in(
    conn: &Connection,
    kind: TreeKind,
    a: &str,
    b: &str,
) -> TreeResult<(TreeNode, TreeNode)> {
    let first = require_node(conn, kind, a, Visibility::Active).await?;
    let second = require_node(conn, kind, b, Visibility::Active).await?;

    if first.id == second.id {
        return Ok((first, second));
    }
    if first.parent_id != second.parent_id {
        return Err(TreeError::not_siblings(&first.id, &second.id));
    }
    for node in [&first, &second] {
        if node.width().is_none() {
            return Err(TreeError::corrupt_interval(kind, node));
        }
    }

    let (left, right) = if first.left < second.left {
        (&first, &second)
    } else {
        (&second, &first)
    };
    let shifted = swap_intervals(conn, kind, left, right).await?;

    conn.execute(
        &format!(
            "UPDATE {} SET ordering = CASE id WHEN ?1 THEN ?2 ELSE ?4 END, modified_at = ?5
             WHERE id IN (?1, ?3)",
            kind.table()
        ),
        libsql::params![
            first.id.as_str(),
            second.ordering,
            second.id.as_str(),
            first.ordering,
            now_timestamp()
        ],
    )
    .await
    .map_err(|e| DatabaseError::sql_execution(format!("Failed to swap orderings: {}", e)))?;

    tracing::debug!(
        "Swapped {} siblings '{}' and '{}' ({} rows shifted)",
        kind,
        first.id,
        second.id,
        shifted
    );
    Ok((
        require_node(conn, kind, &first.id, Visibility::All).await?,
        require_node(conn, kind, &second.id, Visibility::All).await?,
    ))
}

async fn update_metadata_in(
    conn: &Connection,
    kind: TreeKind,
    id: &str,
    label: Option<String>,
    properties: Option<Value>,
) -> TreeResult<TreeNode> {
    let node = require_node(conn, kind, id, Visibility::Active).await?;
    let label = label.unwrap_or(node.label);
    let properties = properties.unwrap_or(node.properties);
    validate_metadata(&label, &properties)?;

    conn.execute(
        &format!(
            "UPDATE {} SET label = ?1, properties = ?2, modified_at = ?3 WHERE id = ?4",
            kind.table()
        ),
        libsql::params![
            label.as_str(),
            encode_properties(&properties)?,
            now_timestamp(),
            node.id.as_str()
        ],
    )
    .await
    .map_err(|e| DatabaseError::sql_execution(format!("Failed to update metadata: {}", e)))?;

    require_node(conn, kind, &node.id, Visibility::Active).await
}
