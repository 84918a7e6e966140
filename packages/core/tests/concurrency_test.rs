//! Concurrency Tests
//!
//! Per-tree locking: mutations on different trees proceed in parallel,
//! mutations on the same tree serialize, and a mutation that cannot get its
//! tree's lock in time fails with a retryable "tree busy" error without
//! writing anything.

#[cfg(test)]
mod concurrency_tests {
    use anyhow::Result;
    use futures::future::join_all;
    use hierarchy_core::models::{NewNode, Placement, TreeKind};
    use hierarchy_core::{EngineConfig, ErrorCategory, HierarchyService, TreeError};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_test::assert_ok;

    async fn create_test_service(lock_timeout: Duration) -> Result<(HierarchyService, TempDir)> {
        let temp_dir = TempDir::new()?;
        let config = EngineConfig::new(temp_dir.path()).with_lock_timeout(lock_timeout);
        let service = HierarchyService::open(config).await?;
        Ok((service, temp_dir))
    }

    async fn create_r_a_b(service: &HierarchyService, kind: TreeKind) -> Result<()> {
        service.insert(kind, NewNode::root("R").with_id("r")).await?;
        service
            .insert(kind, NewNode::child_of("r", "A").with_id("a"))
            .await?;
        service
            .insert(kind, NewNode::child_of("r", "B").with_id("b"))
            .await?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_moves_on_different_trees() -> Result<()> {
        let (service, _temp_dir) = create_test_service(Duration::from_secs(5)).await?;
        create_r_a_b(&service, TreeKind::Menu).await?;
        create_r_a_b(&service, TreeKind::Taxonomy).await?;

        let menu = service.clone();
        let taxonomy = service.clone();
        let (menu_result, taxonomy_result) = tokio::join!(
            tokio::spawn(async move {
                menu.move_subtree(
                    TreeKind::Menu,
                    "b",
                    Placement::LastChildOf(Some("a".to_string())),
                )
                .await
            }),
            tokio::spawn(async move {
                taxonomy
                    .move_subtree(
                        TreeKind::Taxonomy,
                        "a",
                        Placement::LastChildOf(Some("b".to_string())),
                    )
                    .await
            }),
        );
        assert_ok!(menu_result?);
        assert_ok!(taxonomy_result?);

        for (kind, outer, inner) in [
            (TreeKind::Menu, "a", "b"),
            (TreeKind::Taxonomy, "b", "a"),
        ] {
            let r = service.get_node(kind, "r").await?;
            let outer = service.get_node(kind, outer).await?;
            let inner = service.get_node(kind, inner).await?;
            assert!(r.contains(&outer) && outer.contains(&inner));
            assert!(service.validate(kind).await?.is_valid());
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_held_lock_yields_tree_busy() -> Result<()> {
        let (service, _temp_dir) = create_test_service(Duration::from_millis(50)).await?;
        create_r_a_b(&service, TreeKind::Menu).await?;

        let guard = service.mutator().locks().acquire(TreeKind::Menu).await?;

        let err = service
            .insert(TreeKind::Menu, NewNode::child_of("r", "C").with_id("c"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TreeError::TreeBusy {
                kind: TreeKind::Menu,
                ..
            }
        ));
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert!(err.is_retryable());

        let err = service.rebuild(TreeKind::Menu).await.unwrap_err();
        assert!(err.is_retryable());

        // Other trees are unaffected
        service
            .insert(TreeKind::Organization, NewNode::root("HQ"))
            .await?;

        // Reads never take the lock
        assert_eq!(service.get_subtree_size(TreeKind::Menu, "r").await?, 2);

        drop(guard);
        let c = service
            .insert(TreeKind::Menu, NewNode::child_of("r", "C").with_id("c"))
            .await?;
        assert_eq!((c.left, c.right), (6, 7));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_tree_mutations_serialize() -> Result<()> {
        let (service, _temp_dir) = create_test_service(Duration::from_secs(10)).await?;
        service
            .insert(TreeKind::Taxonomy, NewNode::root("Root").with_id("root"))
            .await?;

        let inserts = (0..16).map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .insert(
                        TreeKind::Taxonomy,
                        NewNode::child_of("root", format!("Term {}", i)),
                    )
                    .await
            })
        });
        for result in join_all(inserts).await {
            assert_ok!(result?);
        }

        assert_eq!(service.get_subtree_size(TreeKind::Taxonomy, "root").await?, 16);
        let children = service.get_children(TreeKind::Taxonomy, "root").await?;
        assert!(children.windows(2).all(|pair| pair[0].ordering < pair[1].ordering));
        assert!(service.validate(TreeKind::Taxonomy).await?.is_valid());
        Ok(())
    }
}
