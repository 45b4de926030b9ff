//! Decision tree structures for the boosted ensemble
//!
//! Nodes are stored in a flat vector, root first; children always come after
//! their parent, which `validate` enforces so traversal of a loaded tree
//! terminates.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes:
/// - `feature_idx >= 0`: column index into the feature row
/// - `left` and `right` point to child node indices
/// - `leaf` is `None`
///
/// For leaf nodes:
/// - `feature_idx == -1`
/// - `leaf` contains the raw-score contribution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Node ID (for reference, not used in traversal)
    pub id: i32,

    /// Left child index (-1 for leaf nodes)
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    pub feature_idx: i32,

    /// Rows with `value <= threshold` go left
    pub threshold: f64,

    /// Leaf value (Some for leaf nodes, None for internal nodes)
    pub leaf: Option<f64>,
}

impl Node {
    /// Create a new internal (split) node
    pub fn internal(id: i32, feature_idx: i32, threshold: f64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
        }
    }

    /// Create a new leaf node
    pub fn leaf(id: i32, value: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            leaf: Some(value),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }
}

/// A single regression tree scaled by `weight` (the shrinkage it was fitted with)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,

    /// Multiplier applied to the leaf value
    pub weight: f64,
}

impl Tree {
    pub fn new(nodes: Vec<Node>, weight: f64) -> Self {
        Self { nodes, weight }
    }

    /// Weighted leaf value reached by `features`
    pub fn evaluate(&self, features: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0usize;

        while let Some(node) = self.nodes.get(idx) {
            if node.is_leaf() {
                return node.leaf.unwrap_or(0.0) * self.weight;
            }

            let value = match features.get(node.feature_idx as usize) {
                Some(&v) => v,
                None => return 0.0,
            };

            let next = if value <= node.threshold {
                node.left
            } else {
                node.right
            };
            if next < 0 {
                return 0.0;
            }
            idx = next as usize;
        }

        0.0
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(node) if !node.is_leaf() => {
                    1 + walk(nodes, node.left as usize).max(walk(nodes, node.right as usize))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    /// Validate tree structure against the expected feature count
    pub fn validate(&self, feature_count: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }
        if !self.weight.is_finite() {
            return Err(format!("Tree weight is not finite: {}", self.weight));
        }

        let len = self.nodes.len() as i32;
        for (i, node) in self.nodes.iter().enumerate() {
            let i = i as i32;
            if node.is_leaf() {
                match node.leaf {
                    Some(v) if v.is_finite() => {}
                    _ => return Err(format!("Leaf node {i} has no finite leaf value")),
                }
                continue;
            }

            if node.left <= i || node.left >= len {
                return Err(format!("Node {} has invalid left child: {}", i, node.left));
            }
            if node.right <= i || node.right >= len {
                return Err(format!("Node {} has invalid right child: {}", i, node.right));
            }
            if node.feature_idx < 0 || node.feature_idx as usize >= feature_count {
                return Err(format!(
                    "Internal node {} has invalid feature index: {}",
                    i, node.feature_idx
                ));
            }
            if node.threshold.is_nan() {
                return Err(format!("Internal node {i} has NaN threshold"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    fn stump() -> Tree {
        Tree::new(
            vec![
                Node::internal(0, 0, 50.0, 1, 2),
                Node::leaf(1, 100.0),
                Node::leaf(2, 200.0),
            ],
            0.5,
        )
    }

    #[test]
    fn test_node_creation() {
        let internal = Node::internal(0, 3, 1.5, 1, 2);
        assert_eq!(internal.feature_idx, 3);
        assert!(!internal.is_leaf());

        let leaf = Node::leaf(1, -2.5);
        assert_eq!(leaf.feature_idx, -1);
        assert!(leaf.is_leaf());
        assert_eq!(leaf.leaf, Some(-2.5));
    }

    #[test]
    fn test_tree_evaluation() {
        let tree = stump();
        assert_eq!(tree.evaluate(arr1(&[30.0]).view()), 50.0);
        // equal goes left
        assert_eq!(tree.evaluate(arr1(&[50.0]).view()), 50.0);
        assert_eq!(tree.evaluate(arr1(&[60.0]).view()), 100.0);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn test_tree_validation() {
        assert!(stump().validate(1).is_ok());
        // feature index beyond the schema
        assert!(stump().validate(0).is_err());

        let backwards = Tree::new(
            vec![
                Node::leaf(0, 1.0),
                Node::internal(1, 0, 0.0, 0, 0),
            ],
            1.0,
        );
        assert!(backwards.validate(1).is_err());

        let out_of_bounds = Tree::new(
            vec![
                Node::internal(0, 0, 50.0, 5, 2),
                Node::leaf(1, 100.0),
                Node::leaf(2, 200.0),
            ],
            1.0,
        );
        assert!(out_of_bounds.validate(1).is_err());
    }
}
