//! CART (Classification and Regression Tree) builder
//!
//! Exact-greedy second-order tree construction: every distinct feature value
//! in a node is a candidate cut, scored from prefix sums of gradients and
//! hessians. Equal gains are resolved by [`SplitTieBreaker`] so a given input
//! always produces the same tree.

use super::tree::{Node, Tree};
use crate::deterministic::SplitTieBreaker;
use ndarray::ArrayView2;

/// Growth limits for a single tree
#[derive(Clone, Debug, PartialEq)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// L2 penalty on leaf values
    pub lambda: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            min_samples_leaf: 20,
            lambda: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn beats(&self, other: &SplitCandidate) -> bool {
        self.gain > other.gain || (self.gain == other.gain && self.tie_breaker < other.tie_breaker)
    }
}

/// Fits one regression tree to per-row gradients and hessians
pub struct CartBuilder<'a> {
    features: ArrayView2<'a, f64>,
    gradients: &'a [f64],
    hessians: &'a [f64],
    config: &'a TreeConfig,
}

impl<'a> CartBuilder<'a> {
    /// `features` rows align with `gradients` and `hessians`; callers check lengths.
    pub fn new(
        features: ArrayView2<'a, f64>,
        gradients: &'a [f64],
        hessians: &'a [f64],
        config: &'a TreeConfig,
    ) -> Self {
        debug_assert_eq!(features.nrows(), gradients.len());
        debug_assert_eq!(features.nrows(), hessians.len());
        Self {
            features,
            gradients,
            hessians,
            config,
        }
    }

    /// Build a tree whose leaves are scaled by `weight`
    pub fn build(&self, weight: f64) -> Tree {
        let mut nodes = Vec::new();
        let indices: Vec<usize> = (0..self.gradients.len()).collect();
        self.build_node(&indices, 0, &mut nodes);
        Tree::new(nodes, weight)
    }

    fn build_node(&self, indices: &[usize], depth: usize, nodes: &mut Vec<Node>) -> i32 {
        let current = nodes.len() as i32;
        let (sum_g, sum_h) = self.sums(indices);
        let leaf_value = -sum_g / (sum_h + self.config.lambda);

        let split = if depth >= self.config.max_depth
            || indices.len() < 2 * self.config.min_samples_leaf.max(1)
        {
            None
        } else {
            self.find_best_split(indices, current as usize, sum_g, sum_h)
        };

        let Some(split) = split else {
            nodes.push(Node::leaf(current, leaf_value));
            return current;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.features[[i, split.feature_idx]] <= split.threshold);

        // placeholder children, patched once the subtrees exist
        nodes.push(Node::internal(
            current,
            split.feature_idx as i32,
            split.threshold,
            -1,
            -1,
        ));
        let left_idx = self.build_node(&left, depth + 1, nodes);
        let right_idx = self.build_node(&right, depth + 1, nodes);
        let node = &mut nodes[current as usize];
        node.left = left_idx;
        node.right = right_idx;

        current
    }

    fn find_best_split(
        &self,
        indices: &[usize],
        node_id: usize,
        sum_g: f64,
        sum_h: f64,
    ) -> Option<SplitCandidate> {
        let lambda = self.config.lambda;
        let min_leaf = self.config.min_samples_leaf.max(1);
        let parent_score = sum_g * sum_g / (sum_h + lambda);
        let mut best: Option<SplitCandidate> = None;
        let mut order = indices.to_vec();

        for feature_idx in 0..self.features.ncols() {
            let column = self.features.column(feature_idx);
            order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

            let mut left_g = 0.0;
            let mut left_h = 0.0;
            let mut rank = 0usize;
            for pos in 0..order.len() - 1 {
                let row = order[pos];
                left_g += self.gradients[row];
                left_h += self.hessians[row];

                let value = column[row];
                let next = column[order[pos + 1]];
                if value == next {
                    continue;
                }
                rank += 1;

                let left_count = pos + 1;
                if left_count < min_leaf || order.len() - left_count < min_leaf {
                    continue;
                }

                let right_g = sum_g - left_g;
                let right_h = sum_h - left_h;
                let gain = left_g * left_g / (left_h + lambda)
                    + right_g * right_g / (right_h + lambda)
                    - parent_score;
                if !gain.is_finite() || gain <= 0.0 {
                    continue;
                }

                let candidate = SplitCandidate {
                    feature_idx,
                    threshold: value + (next - value) / 2.0,
                    gain,
                    tie_breaker: SplitTieBreaker::new(feature_idx, rank, node_id),
                };
                if best.as_ref().map_or(true, |current| candidate.beats(current)) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    fn sums(&self, indices: &[usize]) -> (f64, f64) {
        indices.iter().fold((0.0, 0.0), |(g, h), &i| {
            (g + self.gradients[i], h + self.hessians[i])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_simple_tree() {
        let features = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0], [4.0, 5.0]];
        let gradients = [1.0, 1.0, -1.0, -1.0];
        let hessians = [0.25; 4];
        let config = TreeConfig {
            max_depth: 2,
            min_samples_leaf: 1,
            lambda: 0.0,
        };

        let tree = CartBuilder::new(features.view(), &gradients, &hessians, &config).build(1.0);

        // constant column 1 can never split
        assert_eq!(tree.nodes[0].feature_idx, 0);
        assert_eq!(tree.nodes[0].threshold, 2.5);
        assert!(tree.validate(2).is_ok());
        assert!(tree.evaluate(features.row(0)) < 0.0);
        assert!(tree.evaluate(features.row(3)) > 0.0);
    }

    #[test]
    fn test_leaf_only_tree() {
        let features = array![[1.0]];
        let config = TreeConfig::default();
        let tree = CartBuilder::new(features.view(), &[-1.0], &[1.0], &config).build(0.5);

        assert_eq!(tree.nodes.len(), 1);
        // -G / (H + lambda) = 1 / 2
        assert_eq!(tree.nodes[0].leaf, Some(0.5));
        assert_eq!(tree.evaluate(features.row(0)), 0.25);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let features = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let gradients = [1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        let hessians = [0.25; 6];
        let config = TreeConfig {
            max_depth: 3,
            min_samples_leaf: 3,
            lambda: 1.0,
        };
        let tree = CartBuilder::new(features.view(), &gradients, &hessians, &config).build(1.0);

        let leaf_rows = |value: f64| {
            (0..6)
                .filter(|&i| tree.evaluate(features.row(i)) == value)
                .count()
        };
        for node in tree.nodes.iter().filter(|n| n.is_leaf()) {
            assert!(leaf_rows(node.leaf.unwrap()) >= 3);
        }
    }

    #[test]
    fn test_equal_gain_prefers_lower_feature() {
        // two identical columns give identical gains
        let features = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let gradients = [1.0, 1.0, -1.0, -1.0];
        let hessians = [0.25; 4];
        let config = TreeConfig {
            max_depth: 1,
            min_samples_leaf: 1,
            lambda: 1.0,
        };
        let tree = CartBuilder::new(features.view(), &gradients, &hessians, &config).build(1.0);
        assert_eq!(tree.nodes[0].feature_idx, 0);
    }
}
