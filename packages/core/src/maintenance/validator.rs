//! Tree Validator
//!
//! Read-only health check of one tree's nested-set encoding. The check works
//! on a snapshot of every row ordered by `left`, with coordinates read as raw
//! integers so that values no node could hold are reported, not rejected:
//!
//! - per active node: coordinate range, interval shape, width parity,
//!   descendant count, containment in and depth relative to its parent
//! - across all rows: a stack sweep that reports overlapping intervals, since
//!   soft-deleted rows still occupy their interval
//! - per sibling group: ordering ties and intervals out of sibling order
//!
//! Violations are reported, never repaired; repair is an explicit
//! [`TreeRebuilder`](crate::maintenance::TreeRebuilder) call.

use crate::db::database::{begin_read, finish};
use crate::db::DatabaseService;
use crate::error::{TreeError, TreeResult};
use crate::maintenance::structure::{read_structure, StoredRow};
use crate::models::TreeKind;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// One broken invariant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Violation {
    /// A coordinate column holds a value no node can have
    /// (`lft`/`rgt` below 1, `depth` below 0, or beyond `u32`)
    CoordinateOutOfRange {
        node_id: String,
        column: &'static str,
        value: i64,
    },
    /// `right <= left`
    InvalidInterval { node_id: String, left: i64, right: i64 },
    /// `right - left` is even
    EvenWidth { node_id: String, left: i64, right: i64 },
    /// `(right - left - 1) / 2` differs from the rows inside the interval
    DescendantCount {
        node_id: String,
        encoded: i64,
        actual: i64,
    },
    /// Two intervals partially overlap or share a boundary
    Overlap { node_id: String, other_id: String },
    /// `parent_id` names a row that does not exist
    OrphanParent { node_id: String, parent_id: String },
    /// The parent's interval does not strictly contain the node's
    NotContained { node_id: String, parent_id: String },
    /// Depth differs from parent depth + 1 (or from 0 for a root)
    DepthMismatch {
        node_id: String,
        depth: i64,
        expected: i64,
    },
    /// Active node whose parent is soft-deleted
    ActiveUnderDeleted { node_id: String, parent_id: String },
    /// Two siblings share an ordering value
    OrderingTie {
        node_id: String,
        other_id: String,
        ordering: i64,
    },
    /// `ordering` puts `node_id` first but its interval is not left of `other_id`'s
    SiblingOrder { node_id: String, other_id: String },
}

impl Violation {
    /// The node the violation is reported against
    pub fn node_id(&self) -> &str {
        match self {
            Self::CoordinateOutOfRange { node_id, .. }
            | Self::InvalidInterval { node_id, .. }
            | Self::EvenWidth { node_id, .. }
            | Self::DescendantCount { node_id, .. }
            | Self::Overlap { node_id, .. }
            | Self::OrphanParent { node_id, .. }
            | Self::NotContained { node_id, .. }
            | Self::DepthMismatch { node_id, .. }
            | Self::ActiveUnderDeleted { node_id, .. }
            | Self::OrderingTie { node_id, .. }
            | Self::SiblingOrder { node_id, .. } => node_id,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CoordinateOutOfRange {
                node_id,
                column,
                value,
            } => write!(f, "node {}: {} ({}) is out of range", node_id, column, value),
            Self::InvalidInterval {
                node_id,
                left,
                right,
            } => write!(f, "node {}: right ({}) <= left ({})", node_id, right, left),
            Self::EvenWidth {
                node_id,
                left,
                right,
            } => write!(
                f,
                "node {}: interval ({}, {}) has an even width",
                node_id, left, right
            ),
            Self::DescendantCount {
                node_id,
                encoded,
                actual,
            } => write!(
                f,
                "node {}: interval encodes {} descendants but contains {}",
                node_id, encoded, actual
            ),
            Self::Overlap { node_id, other_id } => {
                write!(f, "node {}: overlaps node {}", node_id, other_id)
            }
            Self::OrphanParent { node_id, parent_id } => {
                write!(f, "node {}: parent {} does not exist", node_id, parent_id)
            }
            Self::NotContained { node_id, parent_id } => write!(
                f,
                "node {}: interval is not inside parent {}",
                node_id, parent_id
            ),
            Self::DepthMismatch {
                node_id,
                depth,
                expected,
            } => write!(
                f,
                "node {}: depth ({}) != expected ({})",
                node_id, depth, expected
            ),
            Self::ActiveUnderDeleted { node_id, parent_id } => write!(
                f,
                "node {}: active under deleted parent {}",
                node_id, parent_id
            ),
            Self::OrderingTie {
                node_id,
                other_id,
                ordering,
            } => write!(
                f,
                "node {}: shares ordering {} with sibling {}",
                node_id, ordering, other_id
            ),
            Self::SiblingOrder { node_id, other_id } => write!(
                f,
                "node {}: ordered before sibling {} but its interval is not left of it",
                node_id, other_id
            ),
        }
    }
}

/// Outcome of one validation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub kind: TreeKind,
    /// Rows examined, soft-deleted included
    pub rows_checked: usize,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Human-readable violation lines, in report order
    pub fn descriptions(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }
}

/// Checks nested-set invariants without mutating anything
#[derive(Debug, Clone)]
pub struct TreeValidator {
    db: DatabaseService,
}

impl TreeValidator {
    pub fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    /// Validate the stored tree of `kind`
    ///
    /// Rows are read in one snapshot without the tree lock.
    pub async fn validate(&self, kind: TreeKind) -> TreeResult<ValidationReport> {
        let conn = self.db.connect_with_timeout(kind).await?;
        begin_read(&conn).await?;
        let rows = finish(
            &conn,
            read_structure(&conn, kind).await.map_err(TreeError::from),
        )
        .await?;
        let report = Self::check(kind, &rows);

        if report.is_valid() {
            tracing::debug!("{} tree is valid ({} rows)", kind, report.rows_checked);
        } else {
            tracing::warn!(
                "{} tree has {} violations, first: {}",
                kind,
                report.violations.len(),
                report.violations[0]
            );
        }
        Ok(report)
    }

    /// Validate an in-memory row set
    ///
    /// `rows` may be in any order; the result is deterministic for a given
    /// set of rows.
    pub fn check(kind: TreeKind, rows: &[StoredRow]) -> ValidationReport {
        let mut sorted: Vec<&StoredRow> = rows.iter().collect();
        sorted.sort_by(|a, b| (a.left, a.right, &a.id).cmp(&(b.left, b.right, &b.id)));

        let by_id: HashMap<&str, &StoredRow> = sorted.iter().map(|n| (n.id.as_str(), *n)).collect();
        let lefts: Vec<i64> = sorted.iter().map(|n| n.left).collect();

        let mut violations = Vec::new();
        let mut open: Vec<&StoredRow> = Vec::new();

        for node in &sorted {
            if !node.deleted {
                check_node(node, &by_id, &lefts, &mut violations);
            }

            // Overlap sweep over every row
            while open.last().is_some_and(|top| top.right < node.left) {
                open.pop();
            }
            if let Some(top) = open.last() {
                if top.left == node.left || node.right >= top.right {
                    violations.push(Violation::Overlap {
                        node_id: node.id.clone(),
                        other_id: top.id.clone(),
                    });
                }
            }
            open.push(*node);
        }

        check_siblings(&sorted, &mut violations);

        ValidationReport {
            kind,
            rows_checked: rows.len(),
            violations,
        }
    }
}

const MAX_COORDINATE: i64 = u32::MAX as i64;

/// Columns holding values no node can have; later checks are meaningless for such a row
fn out_of_range(node: &StoredRow) -> Vec<Violation> {
    [
        ("lft", node.left, 1),
        ("rgt", node.right, 1),
        ("depth", node.depth, 0),
    ]
    .into_iter()
    .filter(|&(_, value, min)| value < min || value > MAX_COORDINATE)
    .map(|(column, value, _)| Violation::CoordinateOutOfRange {
        node_id: node.id.clone(),
        column,
        value,
    })
    .collect()
}

fn check_node(
    node: &StoredRow,
    by_id: &HashMap<&str, &StoredRow>,
    lefts: &[i64],
    violations: &mut Vec<Violation>,
) {
    let out_of_range = out_of_range(node);
    if !out_of_range.is_empty() {
        violations.extend(out_of_range);
        return;
    }

    if node.right <= node.left {
        violations.push(Violation::InvalidInterval {
            node_id: node.id.clone(),
            left: node.left,
            right: node.right,
        });
        return;
    }

    if (node.right - node.left) % 2 == 0 {
        violations.push(Violation::EvenWidth {
            node_id: node.id.clone(),
            left: node.left,
            right: node.right,
        });
    } else {
        // Rows starting strictly inside the interval
        let start = lefts.partition_point(|&l| l <= node.left);
        let end = lefts.partition_point(|&l| l < node.right);
        let actual = i64::try_from(end.saturating_sub(start)).unwrap_or(i64::MAX);
        let encoded = (node.right - node.left - 1) / 2;
        if actual != encoded {
            violations.push(Violation::DescendantCount {
                node_id: node.id.clone(),
                encoded,
                actual,
            });
        }
    }

    let Some(parent_id) = &node.parent_id else {
        if node.depth != 0 {
            violations.push(Violation::DepthMismatch {
                node_id: node.id.clone(),
                depth: node.depth,
                expected: 0,
            });
        }
        return;
    };

    let Some(parent) = by_id.get(parent_id.as_str()) else {
        violations.push(Violation::OrphanParent {
            node_id: node.id.clone(),
            parent_id: parent_id.clone(),
        });
        return;
    };

    if parent.deleted {
        violations.push(Violation::ActiveUnderDeleted {
            node_id: node.id.clone(),
            parent_id: parent_id.clone(),
        });
    }
    if !parent.contains(node) {
        violations.push(Violation::NotContained {
            node_id: node.id.clone(),
            parent_id: parent_id.clone(),
        });
    }
    if node.depth != parent.depth + 1 {
        violations.push(Violation::DepthMismatch {
            node_id: node.id.clone(),
            depth: node.depth,
            expected: parent.depth + 1,
        });
    }
}

/// Active siblings, taken in ordering order, must have left-to-right intervals
fn check_siblings(sorted: &[&StoredRow], violations: &mut Vec<Violation>) {
    let mut groups: Vec<Vec<&StoredRow>> = Vec::new();
    let mut group_of: HashMap<Option<&str>, usize> = HashMap::new();

    for node in sorted.iter().copied().filter(|n| !n.deleted) {
        let key = node.parent_id.as_deref();
        let index = *group_of.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[index].push(node);
    }

    for mut siblings in groups {
        siblings.sort_by_key(|n| (n.ordering, n.left));
        for pair in siblings.windows(2) {
            let (first, second) = (pair[0], pair[1]);
            if first.ordering == second.ordering {
                violations.push(Violation::OrderingTie {
                    node_id: second.id.clone(),
                    other_id: first.id.clone(),
                    ordering: second.ordering,
                });
            } else if first.right >= second.left {
                violations.push(Violation::SiblingOrder {
                    node_id: first.id.clone(),
                    other_id: second.id.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, parent: Option<&str>, left: i64, right: i64, depth: i64, ordering: i64) -> StoredRow {
        StoredRow {
            id: id.to_string(),
            parent_id: parent.map(str::to_string),
            left,
            right,
            depth,
            ordering,
            deleted: false,
        }
    }

    fn valid_tree() -> Vec<StoredRow> {
        vec![
            node("r", None, 1, 6, 0, 0),
            node("a", Some("r"), 2, 3, 1, 0),
            node("b", Some("r"), 4, 5, 1, 1),
        ]
    }

    #[test]
    fn test_valid_tree_has_no_violations() {
        let report = TreeValidator::check(TreeKind::Menu, &valid_tree());
        assert!(report.is_valid(), "{:?}", report.descriptions());
        assert_eq!(report.rows_checked, 3);
    }

    #[test]
    fn test_empty_tree_is_valid() {
        assert!(TreeValidator::check(TreeKind::Taxonomy, &[]).is_valid());
    }

    #[test]
    fn test_inverted_interval_message() {
        let mut nodes = valid_tree();
        nodes[1].left = 12;
        nodes[1].right = 10;

        let report = TreeValidator::check(TreeKind::Menu, &nodes);
        assert!(report
            .descriptions()
            .contains(&"node a: right (10) <= left (12)".to_string()));
    }

    #[test]
    fn test_overlap_is_reported() {
        let mut nodes = valid_tree();
        // b now starts inside a and ends outside it
        nodes[1].right = 5;
        nodes[2].left = 4;
        nodes[2].right = 7;
        nodes[0].right = 8;

        let report = TreeValidator::check(TreeKind::Menu, &nodes);
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, Violation::Overlap { node_id, other_id } if node_id == "b" && other_id == "a")));
        assert!(report.descriptions().contains(&"node b: overlaps node a".to_string()));
    }

    #[test]
    fn test_depth_and_orphan_checks() {
        let mut nodes = valid_tree();
        nodes[1].depth = 3;
        nodes.push(node("lost", Some("ghost"), 7, 8, 0, 0));

        let report = TreeValidator::check(TreeKind::Organization, &nodes);
        assert!(report.violations.contains(&Violation::DepthMismatch {
            node_id: "a".to_string(),
            depth: 3,
            expected: 1,
        }));
        assert!(report.violations.contains(&Violation::OrphanParent {
            node_id: "lost".to_string(),
            parent_id: "ghost".to_string(),
        }));
    }

    #[test]
    fn test_sibling_order_and_ties() {
        let mut nodes = valid_tree();
        nodes[1].ordering = 5;
        let report = TreeValidator::check(TreeKind::Menu, &nodes);
        assert!(report.violations.contains(&Violation::SiblingOrder {
            node_id: "b".to_string(),
            other_id: "a".to_string(),
        }));

        let mut nodes = valid_tree();
        nodes[2].ordering = 0;
        let report = TreeValidator::check(TreeKind::Menu, &nodes);
        assert!(matches!(
            report.violations.as_slice(),
            [Violation::OrderingTie { ordering: 0, .. }]
        ));
    }

    #[test]
    fn test_deleted_rows_count_towards_interval() {
        let mut nodes = valid_tree();
        nodes[1].deleted = true;
        assert!(TreeValidator::check(TreeKind::Menu, &nodes).is_valid());

        // Dropping the deleted row leaves a hole in the parent's interval
        nodes.remove(1);
        let report = TreeValidator::check(TreeKind::Menu, &nodes);
        assert!(report.violations.contains(&Violation::DescendantCount {
            node_id: "r".to_string(),
            encoded: 2,
            actual: 1,
        }));
    }

    #[test]
    fn test_negative_and_oversized_coordinates_are_reported() {
        let mut nodes = valid_tree();
        nodes[1].left = -7;
        nodes[2].right = i64::from(u32::MAX) + 1;
        nodes[2].depth = -1;

        let report = TreeValidator::check(TreeKind::Menu, &nodes);
        assert!(report.violations.contains(&Violation::CoordinateOutOfRange {
            node_id: "a".to_string(),
            column: "lft",
            value: -7,
        }));
        assert!(report.violations.contains(&Violation::CoordinateOutOfRange {
            node_id: "b".to_string(),
            column: "rgt",
            value: 4_294_967_296,
        }));
        assert!(report
            .descriptions()
            .contains(&"node b: depth (-1) is out of range".to_string()));
    }

    #[test]
    fn test_check_is_deterministic() {
        let mut nodes = valid_tree();
        nodes[2].depth = 0;
        nodes[1].ordering = 9;
        let first = TreeValidator::check(TreeKind::Menu, &nodes);
        nodes.reverse();
        let second = TreeValidator::check(TreeKind::Menu, &nodes);
        assert_eq!(first, second);
    }
}
