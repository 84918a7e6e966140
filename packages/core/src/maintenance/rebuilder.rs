//! Tree Rebuilder
//!
//! Recomputes `left`, `right` and `depth` for every row of a tree from
//! `id`/`parent_id`/`ordering` alone, with a depth-first preorder walk that
//! hands out contiguous coordinates starting at 1. Siblings are visited by
//! `ordering`, ties broken by `id`.
//!
//! Stored coordinates are never read, so a tree whose `lft`/`rgt`/`depth`
//! are negative or garbage is still rebuilt. Soft-deleted rows are rebuilt
//! like any other row so they keep a valid interval until purged. If some
//! rows cannot be reached from a root (dangling `parent_id`, parent cycle)
//! nothing is written.

use crate::db::database::{begin_write, finish};
use crate::db::{DatabaseError, DatabaseService};
use crate::error::{TreeError, TreeResult};
use crate::maintenance::structure::{read_parent_links, ParentLink};
use crate::models::TreeKind;
use crate::operations::TreeLocks;
use std::collections::{HashMap, HashSet};

/// Fresh coordinates for one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coordinates {
    pub id: String,
    pub left: u32,
    pub right: u32,
    pub depth: u32,
}

enum Visit<'a> {
    Enter(&'a ParentLink, u32),
    Exit(&'a ParentLink, u32, u32),
}

/// Rewrites nested-set columns from parent pointers
#[derive(Debug, Clone)]
pub struct TreeRebuilder {
    db: DatabaseService,
    locks: TreeLocks,
}

impl TreeRebuilder {
    pub fn new(db: DatabaseService, locks: TreeLocks) -> Self {
        Self { db, locks }
    }

    /// Rebuild every row of `kind` in one transaction
    ///
    /// Returns the number of rows rewritten.
    ///
    /// # Errors
    ///
    /// - `InconsistentParents` when some rows are unreachable from a root
    /// - `TreeBusy` when the tree lock is not acquired in time
    pub async fn rebuild(&self, kind: TreeKind) -> TreeResult<u64> {
        let _guard = self.locks.acquire(kind).await?;
        let conn = self.db.connect_with_timeout(kind).await?;
        let waited_ms = self.locks.timeout().as_millis() as u64;
        begin_write(&conn)
            .await
            .map_err(|e| TreeError::from_begin(kind, waited_ms, e))?;

        let result = async {
            let links = read_parent_links(&conn, kind).await?;
            let plan = Self::plan(kind, &links)?;

            let sql = format!(
                "UPDATE {} SET lft = ?1, rgt = ?2, depth = ?3 WHERE id = ?4",
                kind.table()
            );
            let mut rewritten = 0;
            for coords in &plan {
                rewritten += conn
                    .execute(
                        &sql,
                        libsql::params![
                            i64::from(coords.left),
                            i64::from(coords.right),
                            i64::from(coords.depth),
                            coords.id.as_str()
                        ],
                    )
                    .await
                    .map_err(|e| {
                        DatabaseError::sql_execution(format!("Failed to rewrite coordinates: {}", e))
                    })?;
            }
            Ok::<_, TreeError>(rewritten)
        }
        .await;

        if let Err(e) = &result {
            tracing::warn!("Rebuild of the {} tree rolled back: {}", kind, e);
        }
        let rewritten = finish(&conn, result).await?;
        tracing::info!("Rebuilt {} tree: {} rows rewritten", kind, rewritten);
        Ok(rewritten)
    }

    /// Compute fresh coordinates for `nodes` without touching storage
    ///
    /// The result is in preorder.
    pub fn plan(kind: TreeKind, nodes: &[ParentLink]) -> TreeResult<Vec<Coordinates>> {
        let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

        let mut children: HashMap<Option<&str>, Vec<&ParentLink>> = HashMap::new();
        for node in nodes {
            // A dangling parent pointer leaves the row unreachable
            let parent = node.parent_id.as_deref();
            if parent.map_or(true, |p| ids.contains(p)) {
                children.entry(parent).or_default().push(node);
            }
        }
        for group in children.values_mut() {
            group.sort_by(|a, b| (a.ordering, &a.id).cmp(&(b.ordering, &b.id)));
        }

        let mut plan = Vec::with_capacity(nodes.len());
        let mut counter: u32 = 1;
        let mut stack: Vec<Visit> = children
            .get(&None)
            .map(|roots| roots.iter().rev().map(|&root| Visit::Enter(root, 0)).collect())
            .unwrap_or_default();

        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(node, depth) => {
                    let left = counter;
                    counter += 1;
                    stack.push(Visit::Exit(node, left, depth));
                    if let Some(kids) = children.get(&Some(node.id.as_str())) {
                        stack.extend(kids.iter().rev().map(|&kid| Visit::Enter(kid, depth + 1)));
                    }
                }
                Visit::Exit(node, left, depth) => {
                    plan.push(Coordinates {
                        id: node.id.clone(),
                        left,
                        right: counter,
                        depth,
                    });
                    counter += 1;
                }
            }
        }

        if plan.len() < nodes.len() {
            let reached: HashSet<&str> = plan.iter().map(|c| c.id.as_str()).collect();
            let mut unreachable: Vec<String> = nodes
                .iter()
                .filter(|n| !reached.contains(n.id.as_str()))
                .map(|n| n.id.clone())
                .collect();
            unreachable.sort();
            return Err(TreeError::InconsistentParents {
                kind,
                node_ids: unreachable,
            });
        }

        plan.sort_by_key(|c| c.left);
        Ok(plan)
    }
}
