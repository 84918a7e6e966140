//! Tree Repository Tests
//!
//! Read-side integration tests: range queries, sibling/children ordering,
//! leaves, rendered trees and statistics. Every read must treat soft-deleted
//! nodes as absent.
//!
//! Fixture (taxonomy):
//!
//! ```text
//! animals
//!   birds
//!     eagle
//!     owl
//!   mammals
//!     cat
//! plants
//! ```

#[cfg(test)]
mod tree_queries_tests {
    use anyhow::Result;
    use hierarchy_core::db::TreeRepository;
    use hierarchy_core::models::{NewNode, TreeKind, TreeNode};
    use hierarchy_core::{DeleteMode, EngineConfig, ErrorCategory, HierarchyService, TreeError};
    use tempfile::TempDir;

    const TAXONOMY: TreeKind = TreeKind::Taxonomy;

    async fn create_test_service() -> Result<(HierarchyService, TempDir)> {
        let temp_dir = TempDir::new()?;
        let service = HierarchyService::open(EngineConfig::new(temp_dir.path())).await?;

        let fixture = [
            (None, "animals"),
            (Some("animals"), "birds"),
            (Some("birds"), "eagle"),
            (Some("birds"), "owl"),
            (Some("animals"), "mammals"),
            (Some("mammals"), "cat"),
            (None, "plants"),
        ];
        for (parent, id) in fixture {
            let node = match parent {
                Some(parent) => NewNode::child_of(parent, id),
                None => NewNode::root(id),
            };
            service.insert(TAXONOMY, node.with_id(id)).await?;
        }
        Ok((service, temp_dir))
    }

    fn ids(nodes: &[TreeNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_descendants_in_preorder() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        let descendants = service.get_descendants(TAXONOMY, "animals").await?;
        assert_eq!(
            ids(&descendants),
            vec!["birds", "eagle", "owl", "mammals", "cat"]
        );
        assert!(service.get_descendants(TAXONOMY, "owl").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_ancestors_and_path() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        assert_eq!(
            ids(&service.get_ancestors(TAXONOMY, "owl").await?),
            vec!["animals", "birds"]
        );
        assert!(service.get_ancestors(TAXONOMY, "plants").await?.is_empty());

        let path = service.get_path(TAXONOMY, "cat").await?;
        let breadcrumbs: Vec<&str> = path.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(breadcrumbs.join(" > "), "animals > mammals > cat");
        Ok(())
    }

    #[tokio::test]
    async fn test_siblings_children_roots() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        assert_eq!(ids(&service.get_siblings(TAXONOMY, "eagle").await?), vec!["owl"]);
        assert_eq!(
            ids(&service.get_siblings(TAXONOMY, "plants").await?),
            vec!["animals"]
        );
        assert_eq!(
            ids(&service.get_children(TAXONOMY, "animals").await?),
            vec!["birds", "mammals"]
        );
        assert_eq!(
            ids(&service.get_roots(TAXONOMY).await?),
            vec!["animals", "plants"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_subtree_size_and_containment() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        assert_eq!(service.get_subtree_size(TAXONOMY, "animals").await?, 5);
        assert_eq!(service.get_subtree_size(TAXONOMY, "birds").await?, 2);
        assert_eq!(service.get_subtree_size(TAXONOMY, "plants").await?, 0);

        assert!(service.is_descendant_of(TAXONOMY, "owl", "animals").await?);
        assert!(!service.is_descendant_of(TAXONOMY, "owl", "mammals").await?);
        assert!(!service.is_descendant_of(TAXONOMY, "birds", "birds").await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_leaves() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        assert_eq!(
            ids(&service.get_leaves(TAXONOMY, None).await?),
            vec!["eagle", "owl", "cat", "plants"]
        );
        assert_eq!(
            ids(&service.get_leaves(TAXONOMY, Some("birds")).await?),
            vec!["eagle", "owl"]
        );

        // A node whose only children are deleted becomes a leaf
        service.delete(TAXONOMY, "cat", DeleteMode::Soft).await?;
        assert_eq!(
            ids(&service.get_leaves(TAXONOMY, Some("animals")).await?),
            vec!["eagle", "owl", "mammals"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_rendered_tree() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        let subtree = service.get_subtree(TAXONOMY, "animals").await?;
        assert_eq!(subtree.node_count(), 6);
        assert_eq!(
            subtree.render(),
            "animals\n  birds\n    eagle\n    owl\n  mammals\n    cat\n"
        );

        let forest = service.get_tree(TAXONOMY).await?;
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[1].node.id, "plants");
        Ok(())
    }

    #[tokio::test]
    async fn test_tree_stats() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        let stats = service.tree_stats(TAXONOMY).await?;
        assert_eq!(stats.node_count, 7);
        assert_eq!(stats.root_count, 2);
        assert_eq!(stats.leaf_count, 4);
        assert_eq!(stats.height, 3);
        assert_eq!(stats.level_widths, vec![2, 2, 3]);

        service.delete(TAXONOMY, "birds", DeleteMode::Soft).await?;
        let stats = service.tree_stats(TAXONOMY).await?;
        assert_eq!(stats.node_count, 4);
        assert_eq!(stats.level_widths, vec![2, 1, 1]);
        Ok(())
    }

    #[tokio::test]
    async fn test_deleted_nodes_are_not_found_everywhere() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;
        service.delete(TAXONOMY, "birds", DeleteMode::Soft).await?;
        let repository = service.repository();

        for id in ["birds", "eagle"] {
            let results = [
                repository.get_node(TAXONOMY, id).await.map(|_| ()),
                repository.get_descendants(TAXONOMY, id).await.map(|_| ()),
                repository.get_ancestors(TAXONOMY, id).await.map(|_| ()),
                repository.get_siblings(TAXONOMY, id).await.map(|_| ()),
                repository.get_path(TAXONOMY, id).await.map(|_| ()),
                repository.get_subtree_size(TAXONOMY, id).await.map(|_| ()),
                repository.get_subtree(TAXONOMY, id).await.map(|_| ()),
            ];
            for result in results {
                let err = result.unwrap_err();
                assert!(matches!(err, TreeError::NodeNotFound { .. }));
                assert_eq!(err.category(), ErrorCategory::NotFound);
            }
        }

        assert_eq!(ids(&service.get_siblings(TAXONOMY, "mammals").await?), Vec::<&str>::new());
        assert_eq!(service.get_subtree_size(TAXONOMY, "animals").await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_trees_are_independent() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;

        // Same ID in another tree is a different node
        service
            .insert(TreeKind::Organization, NewNode::root("HQ").with_id("animals"))
            .await?;
        let org = service.get_node(TreeKind::Organization, "animals").await?;
        assert_eq!((org.left, org.right), (1, 2));
        assert_eq!(service.get_subtree_size(TAXONOMY, "animals").await?, 5);

        let err = service.get_node(TreeKind::Menu, "animals").await.unwrap_err();
        assert!(matches!(err, TreeError::NodeNotFound { kind: TreeKind::Menu, .. }));
        Ok(())
    }
}
