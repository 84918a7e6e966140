//! Rendered trees and tree statistics
//!
//! `TreeBranch` is an owned, acyclic rendering of a subtree built from a flat
//! preorder (left-ordered) list of nodes. It is a read-side view only: the
//! persisted representation stays flat.

use crate::models::TreeNode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A node together with its rendered children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeBranch {
    pub node: TreeNode,
    pub children: Vec<TreeBranch>,
}

impl TreeBranch {
    /// Build a forest from nodes sorted by `left`
    ///
    /// Nesting comes from interval containment alone. A node whose interval
    /// is not contained by anything still open on the stack becomes a top-level
    /// branch.
    pub fn from_preorder(nodes: Vec<TreeNode>) -> Vec<TreeBranch> {
        let mut forest = Vec::new();
        let mut stack: Vec<TreeBranch> = Vec::new();

        for node in nodes {
            while stack.last().is_some_and(|top| top.node.right < node.left) {
                if let Some(finished) = stack.pop() {
                    attach(&mut stack, &mut forest, finished);
                }
            }
            stack.push(TreeBranch {
                node,
                children: Vec::new(),
            });
        }

        while let Some(finished) = stack.pop() {
            attach(&mut stack, &mut forest, finished);
        }

        forest
    }

    /// Number of nodes in this branch, itself included
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(TreeBranch::node_count)
            .sum::<usize>()
    }

    /// Labels in preorder, indented two spaces per level
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(0, &mut out);
        out
    }

    fn render_into(&self, level: usize, out: &mut String) {
        out.push_str(&"  ".repeat(level));
        out.push_str(&self.node.label);
        out.push('\n');
        for child in &self.children {
            child.render_into(level + 1, out);
        }
    }
}

fn attach(stack: &mut [TreeBranch], forest: &mut Vec<TreeBranch>, branch: TreeBranch) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(branch),
        None => forest.push(branch),
    }
}

/// Shape statistics for one tree, computed over active nodes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeStats {
    pub node_count: usize,
    pub root_count: usize,
    pub leaf_count: usize,
    /// Number of levels (0 for an empty tree)
    pub height: usize,
    /// Node count per depth, index 0 = roots
    pub level_widths: Vec<usize>,
}

impl TreeStats {
    /// Compute statistics from a set of active nodes
    pub fn from_nodes(nodes: &[TreeNode]) -> Self {
        let parents: HashSet<&str> = nodes
            .iter()
            .filter_map(|n| n.parent_id.as_deref())
            .collect();

        let mut level_widths: Vec<usize> = Vec::new();
        for node in nodes {
            let depth = node.depth as usize;
            if level_widths.len() <= depth {
                level_widths.resize(depth + 1, 0);
            }
            level_widths[depth] += 1;
        }

        Self {
            node_count: nodes.len(),
            root_count: nodes.iter().filter(|n| n.is_root()).count(),
            leaf_count: nodes
                .iter()
                .filter(|n| !parents.contains(n.id.as_str()))
                .count(),
            height: level_widths.len(),
            level_widths,
        }
    }
}
