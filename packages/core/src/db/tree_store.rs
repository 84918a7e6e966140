//! TreeStore - TreeRepository Implementation for libsql
//!
//! Answers every read with a single range predicate over `(lft, rgt)`.
//! Reads that need more than one statement (look up the target, then query
//! its range) run inside a deferred transaction so both statements see the
//! same snapshot.
//!
//! # Examples
//!
//! ```rust,no_run
//! use hierarchy_core::config::EngineConfig;
//! use hierarchy_core::db::{DatabaseService, TreeRepository, TreeStore};
//! use hierarchy_core::models::TreeKind;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = DatabaseService::new(&EngineConfig::new("./data")).await?;
//!     let store = TreeStore::new(db);
//!
//!     let breadcrumbs = store.get_path(TreeKind::Menu, "menu-item-7").await?;
//!     for node in breadcrumbs {
//!         println!("{}", node.label);
//!     }
//!     Ok(())
//! }
//! ```

use crate::db::database::{begin_read, finish};
use crate::db::rows::{query_node, query_nodes, query_scalar, Visibility, NODE_COLUMNS};
use crate::db::{DatabaseError, DatabaseService, TreeRepository};
use crate::error::{TreeError, TreeResult};
use crate::models::{TreeBranch, TreeKind, TreeNode, TreeStats};
use async_trait::async_trait;
use libsql::Connection;

/// libsql-backed Tree Repository
#[derive(Debug, Clone)]
pub struct TreeStore {
    db: DatabaseService,
}

impl TreeStore {
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    /// Every row of the tree ordered by `left`, soft-deleted rows included
    /// when `visibility` is `All`
    ///
    /// Used by maintenance paths (validation, statistics).
    pub async fn list_nodes(
        &self,
        kind: TreeKind,
        visibility: Visibility,
    ) -> TreeResult<Vec<TreeNode>> {
        let conn = self.db.connect_with_timeout(kind).await?;
        Ok(list_nodes(&conn, kind, visibility).await?)
    }

    /// Fetch a node even if it is soft-deleted
    pub async fn get_node_including_deleted(
        &self,
        kind: TreeKind,
        id: &str,
    ) -> TreeResult<TreeNode> {
        let conn = self.db.connect_with_timeout(kind).await?;
        require_node(&conn, kind, id, Visibility::All).await
    }

    /// Open a connection and start a snapshot read
    async fn snapshot(&self, kind: TreeKind) -> TreeResult<Connection> {
        let conn = self.db.connect_with_timeout(kind).await?;
        begin_read(&conn).await?;
        Ok(conn)
    }

    /// Look up `id`, then fetch the active rows selected by `range_sql`
    ///
    /// `range_sql` receives the target's `lft` and `rgt` as `?1` and `?2`.
    async fn range_of(&self, kind: TreeKind, id: &str, range_sql: &str) -> TreeResult<Vec<TreeNode>> {
        let conn = self.snapshot(kind).await?;
        let result = async {
            let target = require_node(&conn, kind, id, Visibility::Active).await?;
            let nodes = query_nodes(
                &conn,
                range_sql,
                (i64::from(target.left), i64::from(target.right)),
            )
            .await?;
            Ok::<_, TreeError>(nodes)
        }
        .await;
        finish(&conn, result).await
    }
}

//
// CONNECTION-LEVEL HELPERS
// Shared with the mutator and maintenance paths, which run them inside
// their own write transactions.
//

/// Fetch a node by ID with the given visibility
pub(crate) async fn fetch_node(
    conn: &Connection,
    kind: TreeKind,
    id: &str,
    visibility: Visibility,
) -> Result<Option<TreeNode>, DatabaseError> {
    query_node(
        conn,
        &format!(
            "SELECT {NODE_COLUMNS} FROM {} WHERE id = ? AND {}",
            kind.table(),
            visibility.predicate(None)
        ),
        libsql::params![id],
    )
    .await
}

/// Fetch a node by ID or fail with `NodeNotFound`
pub(crate) async fn require_node(
    conn: &Connection,
    kind: TreeKind,
    id: &str,
    visibility: Visibility,
) -> TreeResult<TreeNode> {
    fetch_node(conn, kind, id, visibility)
        .await?
        .ok_or_else(|| TreeError::node_not_found(kind, id))
}

/// Every row of the tree ordered by `left`
pub(crate) async fn list_nodes(
    conn: &Connection,
    kind: TreeKind,
    visibility: Visibility,
) -> Result<Vec<TreeNode>, DatabaseError> {
    query_nodes(
        conn,
        &format!(
            "SELECT {NODE_COLUMNS} FROM {} WHERE {} ORDER BY lft",
            kind.table(),
            visibility.predicate(None)
        ),
        (),
    )
    .await
}

#[async_trait]
impl TreeRepository for TreeStore {
    async fn get_node(&self, kind: TreeKind, id: &str) -> TreeResult<TreeNode> {
        let conn = self.db.connect_with_timeout(kind).await?;
        require_node(&conn, kind, id, Visibility::Active).await
    }

    async fn get_subtree_size(&self, kind: TreeKind, id: &str) -> TreeResult<u32> {
        let conn = self.snapshot(kind).await?;
        let result = async {
            let node = require_node(&conn, kind, id, Visibility::Active).await?;
            // Soft-deleted rows still occupy the interval; discount them
            let deleted = query_scalar(
                &conn,
                &format!(
                    "SELECT COUNT(*) FROM {} WHERE lft > ? AND rgt < ? AND deleted_at IS NOT NULL",
                    kind.table()
                ),
                (i64::from(node.left), i64::from(node.right)),
            )
            .await?;
            let deleted = u32::try_from(deleted).unwrap_or(u32::MAX);
            let encoded = node
                .interval_size()
                .ok_or_else(|| TreeError::corrupt_interval(kind, &node))?;
            Ok::<_, TreeError>(encoded.saturating_sub(deleted))
        }
        .await;
        finish(&conn, result).await
    }

    async fn is_descendant_of(
        &self,
        kind: TreeKind,
        id: &str,
        ancestor_id: &str,
    ) -> TreeResult<bool> {
        let conn = self.snapshot(kind).await?;
        let result = async {
            let node = require_node(&conn, kind, id, Visibility::Active).await?;
            let ancestor = require_node(&conn, kind, ancestor_id, Visibility::Active).await?;
            Ok::<_, TreeError>(ancestor.contains(&node))
        }
        .await;
        finish(&conn, result).await
    }

    async fn get_descendants(&self, kind: TreeKind, id: &str) -> TreeResult<Vec<TreeNode>> {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM {} WHERE lft > ?1 AND rgt < ?2 AND {} ORDER BY lft",
            kind.table(),
            Visibility::Active.predicate(None)
        );
        self.range_of(kind, id, &sql).await
    }

    async fn get_ancestors(&self, kind: TreeKind, id: &str) -> TreeResult<Vec<TreeNode>> {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM {} WHERE lft < ?1 AND rgt > ?2 AND {} ORDER BY depth",
            kind.table(),
            Visibility::Active.predicate(None)
        );
        self.range_of(kind, id, &sql).await
    }

    async fn get_path(&self, kind: TreeKind, id: &str) -> TreeResult<Vec<TreeNode>> {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM {} WHERE lft <= ?1 AND rgt >= ?2 AND {} ORDER BY depth",
            kind.table(),
            Visibility::Active.predicate(None)
        );
        self.range_of(kind, id, &sql).await
    }

    async fn get_siblings(&self, kind: TreeKind, id: &str) -> TreeResult<Vec<TreeNode>> {
        let conn = self.snapshot(kind).await?;
        let result = async {
            let node = require_node(&conn, kind, id, Visibility::Active).await?;
            let siblings = query_nodes(
                &conn,
                &format!(
                    "SELECT {NODE_COLUMNS} FROM {} WHERE parent_id IS ? AND id != ? AND {} ORDER BY ordering",
                    kind.table(),
                    Visibility::Active.predicate(None)
                ),
                (node.parent_id.clone(), node.id.clone()),
            )
            .await?;
            Ok::<_, TreeError>(siblings)
        }
        .await;
        finish(&conn, result).await
    }

    async fn get_children(&self, kind: TreeKind, id: &str) -> TreeResult<Vec<TreeNode>> {
        let conn = self.snapshot(kind).await?;
        let result = async {
            let node = require_node(&conn, kind, id, Visibility::Active).await?;
            let children = query_nodes(
                &conn,
                &format!(
                    "SELECT {NODE_COLUMNS} FROM {} WHERE parent_id = ? AND {} ORDER BY ordering",
                    kind.table(),
                    Visibility::Active.predicate(None)
                ),
                libsql::params![node.id.as_str()],
            )
            .await?;
            Ok::<_, TreeError>(children)
        }
        .await;
        finish(&conn, result).await
    }

    async fn get_roots(&self, kind: TreeKind) -> TreeResult<Vec<TreeNode>> {
        let conn = self.db.connect_with_timeout(kind).await?;
        Ok(query_nodes(
            &conn,
            &format!(
                "SELECT {NODE_COLUMNS} FROM {} WHERE parent_id IS NULL AND {} ORDER BY ordering",
                kind.table(),
                Visibility::Active.predicate(None)
            ),
            (),
        )
        .await?)
    }

    async fn get_leaves(&self, kind: TreeKind, under: Option<&str>) -> TreeResult<Vec<TreeNode>> {
        let table = kind.table();
        let no_active_descendant = format!(
            "NOT EXISTS (SELECT 1 FROM {table} d WHERE d.lft > n.lft AND d.rgt < n.rgt AND {})",
            Visibility::Active.predicate(Some("d"))
        );

        match under {
            None => {
                let conn = self.db.connect_with_timeout(kind).await?;
                Ok(query_nodes(
                    &conn,
                    &format!(
                        "SELECT {NODE_COLUMNS} FROM {table} n WHERE {} AND {no_active_descendant} ORDER BY n.lft",
                        Visibility::Active.predicate(Some("n"))
                    ),
                    (),
                )
                .await?)
            }
            Some(id) => {
                let sql = format!(
                    "SELECT {NODE_COLUMNS} FROM {table} n WHERE n.lft >= ?1 AND n.rgt <= ?2 AND {} AND {no_active_descendant} ORDER BY n.lft",
                    Visibility::Active.predicate(Some("n"))
                );
                self.range_of(kind, id, &sql).await
            }
        }
    }

    async fn get_subtree(&self, kind: TreeKind, id: &str) -> TreeResult<TreeBranch> {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM {} WHERE lft >= ?1 AND rgt <= ?2 AND {} ORDER BY lft",
            kind.table(),
            Visibility::Active.predicate(None)
        );
        let nodes = self.range_of(kind, id, &sql).await?;
        TreeBranch::from_preorder(nodes)
            .into_iter()
            .next()
            .ok_or_else(|| TreeError::node_not_found(kind, id))
    }

    async fn get_tree(&self, kind: TreeKind) -> TreeResult<Vec<TreeBranch>> {
        let nodes = self.list_nodes(kind, Visibility::Active).await?;
        Ok(TreeBranch::from_preorder(nodes))
    }

    async fn tree_stats(&self, kind: TreeKind) -> TreeResult<TreeStats> {
        let nodes = self.list_nodes(kind, Visibility::Active).await?;
        Ok(TreeStats::from_nodes(&nodes))
    }
}
