//! Performance benchmarks for hierarchy engine mutations
//!
//! Run with: `cargo bench -p hierarchy-core`
//!
//! Every mutation rewrites coordinates to the right of its target, so cost
//! grows with the number of rows after the insertion point. These benchmarks
//! measure:
//! - Appending leaves under a populated parent (worst case: rightmost rows only)
//! - Inserting as first child (every row to the right shifts)
//! - Moving a subtree back and forth across the tree
//! - Batch insert vs sequential inserts
//! - Full rebuild from parent pointers

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hierarchy_core::models::{NewNode, Placement, TreeKind};
use hierarchy_core::{EngineConfig, HierarchyService};
use tempfile::TempDir;
use tokio::runtime::Runtime;

const KIND: TreeKind = TreeKind::Taxonomy;

/// Setup a service with a fresh data directory
async fn setup_test_service() -> (HierarchyService, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let service = HierarchyService::open(EngineConfig::new(temp_dir.path()))
        .await
        .unwrap();
    (service, temp_dir)
}

/// Generate a taxonomy of `sections` top-level terms with `per_section` children each
async fn generate_tree(service: &HierarchyService, sections: usize, per_section: usize) {
    let mut nodes = vec![NewNode::root("Root").with_id("root")];
    for s in 0..sections {
        let section = format!("section-{}", s);
        nodes.push(NewNode::child_of("root", format!("Section {}", s)).with_id(&section));
        for t in 0..per_section {
            nodes.push(
                NewNode::child_of(&section, format!("Term {}.{}", s, t))
                    .with_id(format!("term-{}-{}", s, t)),
            );
        }
    }
    service.batch_insert(KIND, nodes).await.unwrap();
}

/// Benchmark leaf inserts at the end and at the start of a 500-node tree
fn bench_insert(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("insert");
    group.sample_size(20);

    group.bench_function("append_last_child", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let (service, _temp) = setup_test_service().await;
                generate_tree(&service, 20, 25).await;

                let start = std::time::Instant::now();
                for i in 0..iters {
                    black_box(
                        service
                            .insert(KIND, NewNode::child_of("section-19", format!("Leaf {}", i)))
                            .await
                            .unwrap(),
                    );
                }
                start.elapsed()
            })
        });
    });

    group.bench_function("prepend_first_child", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let (service, _temp) = setup_test_service().await;
                generate_tree(&service, 20, 25).await;

                let start = std::time::Instant::now();
                for i in 0..iters {
                    let node = NewNode::child_of("section-0", format!("Leaf {}", i))
                        .placed(Placement::FirstChildOf(Some("section-0".to_string())));
                    black_box(service.insert(KIND, node).await.unwrap());
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

/// Benchmark moving a 26-node subtree between the two ends of the tree
fn bench_move(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("move_subtree", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let (service, _temp) = setup_test_service().await;
                generate_tree(&service, 20, 25).await;

                let start = std::time::Instant::now();
                for i in 0..iters {
                    let placement = if i % 2 == 0 {
                        Placement::After("section-19".to_string())
                    } else {
                        Placement::Before("section-1".to_string())
                    };
                    black_box(
                        service
                            .move_subtree(KIND, "section-0", placement)
                            .await
                            .unwrap(),
                    );
                }
                start.elapsed()
            })
        });
    });
}

/// Benchmark 100 inserts in one transaction vs 100 separate mutations
fn bench_batch_insert(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("batch_operations");
    group.sample_size(10);

    group.bench_function("insert_100_sequential", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let mut total = std::time::Duration::ZERO;

                for _ in 0..iters {
                    let (service, _temp) = setup_test_service().await;
                    service
                        .insert(KIND, NewNode::root("Root").with_id("root"))
                        .await
                        .unwrap();

                    let start = std::time::Instant::now();
                    for i in 0..100 {
                        service
                            .insert(KIND, NewNode::child_of("root", format!("Term {}", i)))
                            .await
                            .unwrap();
                    }
                    total += start.elapsed();
                }

                total
            })
        });
    });

    group.bench_function("insert_100_batch", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let mut total = std::time::Duration::ZERO;

                for _ in 0..iters {
                    let (service, _temp) = setup_test_service().await;
                    service
                        .insert(KIND, NewNode::root("Root").with_id("root"))
                        .await
                        .unwrap();
                    let nodes = (0..100)
                        .map(|i| NewNode::child_of("root", format!("Term {}", i)))
                        .collect();

                    let start = std::time::Instant::now();
                    black_box(service.batch_insert(KIND, nodes).await.unwrap());
                    total += start.elapsed();
                }

                total
            })
        });
    });

    group.finish();
}

/// Benchmark a full rebuild of a 1000-node tree
fn bench_rebuild(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("maintenance");
    group.sample_size(10);

    group.bench_function("rebuild_1000_nodes", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let (service, _temp) = setup_test_service().await;
                generate_tree(&service, 40, 24).await;

                let start = std::time::Instant::now();
                for _ in 0..iters {
                    black_box(service.rebuild(KIND).await.unwrap());
                }
                start.elapsed()
            })
        });
    });

    group.bench_function("validate_1000_nodes", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let (service, _temp) = setup_test_service().await;
                generate_tree(&service, 40, 24).await;

                let start = std::time::Instant::now();
                for _ in 0..iters {
                    black_box(service.validate(KIND).await.unwrap());
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_insert,
    bench_move,
    bench_batch_insert,
    bench_rebuild
);
criterion_main!(benches);
