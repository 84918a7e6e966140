//! HierarchyService - the engine facade
//!
//! The single entry point handed to CRUD/API handlers, seed/import tooling
//! and admin tooling. It wires one `DatabaseService` into the Tree
//! Repository, the Tree Mutator, the Validator and the Rebuilder, all sharing
//! the same per-tree locks.
//!
//! Callers pass entity-scoped IDs and never see coordinates change hands:
//! they receive nodes back, or a `TreeError` whose `category()` is the
//! contract. Every read, write and maintenance operation is available here;
//! the component accessors exist for tooling that needs storage-level reads
//! (`store()`) or the lock table (`mutator().locks()`).

use crate::config::EngineConfig;
use crate::db::{DatabaseService, TreeRepository, TreeStore};
use crate::error::TreeResult;
use crate::maintenance::{TreeRebuilder, TreeValidator, ValidationReport};
use crate::models::{NewNode, Placement, TreeBranch, TreeKind, TreeNode, TreeStats};
use crate::operations::{TreeLocks, TreeMutator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How `delete` removes a subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Mark rows deleted, keep their coordinates (request path)
    #[default]
    Soft,
    /// Remove rows and close the gap (maintenance path)
    Hard,
}

/// Hierarchy engine facade
#[derive(Clone)]
pub struct HierarchyService {
    config: EngineConfig,
    store: TreeStore,
    reader: Arc<dyn TreeRepository>,
    mutator: TreeMutator,
    validator: TreeValidator,
    rebuilder: TreeRebuilder,
}

impl std::fmt::Debug for HierarchyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HierarchyService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HierarchyService {
    /// Open the databases under `config.data_dir` and build the engine
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use hierarchy_core::config::EngineConfig;
    /// use hierarchy_core::models::{NewNode, TreeKind};
    /// use hierarchy_core::services::HierarchyService;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let service = HierarchyService::open(EngineConfig::from_env()).await?;
    ///     let root = service.insert(TreeKind::Taxonomy, NewNode::root("Animals")).await?;
    ///     service
    ///         .insert(TreeKind::Taxonomy, NewNode::child_of(&root.id, "Birds"))
    ///         .await?;
    ///     assert_eq!(service.get_subtree_size(TreeKind::Taxonomy, &root.id).await?, 1);
    ///     Ok(())
    /// }
    /// ```
    pub async fn open(config: EngineConfig) -> TreeResult<Self> {
        let db = DatabaseService::new(&config).await?;
        let locks = TreeLocks::new(config.lock_timeout());
        let store = TreeStore::new(db.clone());

        tracing::info!(
            "Hierarchy engine ready in {:?} (lock timeout {} ms)",
            config.data_dir,
            config.lock_timeout_ms
        );
        Ok(Self {
            reader: Arc::new(store.clone()),
            validator: TreeValidator::new(db.clone()),
            mutator: TreeMutator::new(db.clone(), locks.clone()),
            rebuilder: TreeRebuilder::new(db, locks),
            store,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The full read contract
    pub fn repository(&self) -> Arc<dyn TreeRepository> {
        Arc::clone(&self.reader)
    }

    /// Storage-level reads that see soft-deleted rows
    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    pub fn mutator(&self) -> &TreeMutator {
        &self.mutator
    }

    pub fn validator(&self) -> &TreeValidator {
        &self.validator
    }

    pub fn rebuilder(&self) -> &TreeRebuilder {
        &self.rebuilder
    }

    //
    // READS
    //

    pub async fn get_node(&self, kind: TreeKind, id: &str) -> TreeResult<TreeNode> {
        self.reader.get_node(kind, id).await
    }

    pub async fn get_descendants(&self, kind: TreeKind, id: &str) -> TreeResult<Vec<TreeNode>> {
        self.reader.get_descendants(kind, id).await
    }

    pub async fn get_ancestors(&self, kind: TreeKind, id: &str) -> TreeResult<Vec<TreeNode>> {
        self.reader.get_ancestors(kind, id).await
    }

    pub async fn get_siblings(&self, kind: TreeKind, id: &str) -> TreeResult<Vec<TreeNode>> {
        self.reader.get_siblings(kind, id).await
    }

    pub async fn get_children(&self, kind: TreeKind, id: &str) -> TreeResult<Vec<TreeNode>> {
        self.reader.get_children(kind, id).await
    }

    pub async fn get_roots(&self, kind: TreeKind) -> TreeResult<Vec<TreeNode>> {
        self.reader.get_roots(kind).await
    }

    pub async fn get_subtree_size(&self, kind: TreeKind, id: &str) -> TreeResult<u32> {
        self.reader.get_subtree_size(kind, id).await
    }

    pub async fn get_path(&self, kind: TreeKind, id: &str) -> TreeResult<Vec<TreeNode>> {
        self.reader.get_path(kind, id).await
    }

    /// Active nodes without active descendants, tree-wide or under `under`
    pub async fn get_leaves(&self, kind: TreeKind, under: Option<&str>) -> TreeResult<Vec<TreeNode>> {
        self.reader.get_leaves(kind, under).await
    }

    pub async fn is_descendant_of(
        &self,
        kind: TreeKind,
        id: &str,
        ancestor_id: &str,
    ) -> TreeResult<bool> {
        self.reader.is_descendant_of(kind, id, ancestor_id).await
    }

    pub async fn get_subtree(&self, kind: TreeKind, id: &str) -> TreeResult<TreeBranch> {
        self.reader.get_subtree(kind, id).await
    }

    /// Every active node of the tree, rendered as a forest
    pub async fn get_tree(&self, kind: TreeKind) -> TreeResult<Vec<TreeBranch>> {
        self.reader.get_tree(kind).await
    }

    pub async fn tree_stats(&self, kind: TreeKind) -> TreeResult<TreeStats> {
        self.reader.tree_stats(kind).await
    }

    //
    // WRITES
    //

    pub async fn insert(&self, kind: TreeKind, node: NewNode) -> TreeResult<TreeNode> {
        self.mutator.insert(kind, node).await
    }

    pub async fn move_subtree(
        &self,
        kind: TreeKind,
        id: &str,
        placement: Placement,
    ) -> TreeResult<TreeNode> {
        self.mutator.move_subtree(kind, id, placement).await
    }

    /// Delete `id` and its subtree; returns the number of rows affected
    pub async fn delete(&self, kind: TreeKind, id: &str, mode: DeleteMode) -> TreeResult<u64> {
        match mode {
            DeleteMode::Soft => self.mutator.soft_delete(kind, id).await,
            DeleteMode::Hard => self.mutator.purge(kind, id).await,
        }
    }

    /// Undo a soft delete of `id` and the rows deleted with it
    pub async fn restore(&self, kind: TreeKind, id: &str) -> TreeResult<u64> {
        self.mutator.restore(kind, id).await
    }

    pub async fn swap(&self, kind: TreeKind, a: &str, b: &str) -> TreeResult<(TreeNode, TreeNode)> {
        self.mutator.swap(kind, a, b).await
    }

    pub async fn update_metadata(
        &self,
        kind: TreeKind,
        id: &str,
        label: Option<String>,
        properties: Option<serde_json::Value>,
    ) -> TreeResult<TreeNode> {
        self.mutator.update_metadata(kind, id, label, properties).await
    }

    /// All-or-nothing, applied in submission order
    pub async fn batch_insert(&self, kind: TreeKind, nodes: Vec<NewNode>) -> TreeResult<Vec<TreeNode>> {
        self.mutator.batch_insert(kind, nodes).await
    }

    /// All-or-nothing, applied in submission order
    pub async fn batch_move(
        &self,
        kind: TreeKind,
        moves: Vec<(String, Placement)>,
    ) -> TreeResult<Vec<TreeNode>> {
        self.mutator.batch_move(kind, moves).await
    }

    //
    // MAINTENANCE
    //

    pub async fn validate(&self, kind: TreeKind) -> TreeResult<ValidationReport> {
        self.validator.validate(kind).await
    }

    pub async fn rebuild(&self, kind: TreeKind) -> TreeResult<u64> {
        self.rebuilder.rebuild(kind).await
    }

    /// Hard-delete every soft-deleted subtree; returns the rows removed
    pub async fn purge_deleted(&self, kind: TreeKind) -> TreeResult<u64> {
        self.mutator.purge_deleted(kind).await
    }
}
