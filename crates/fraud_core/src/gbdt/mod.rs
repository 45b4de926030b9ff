//! Gradient-boosted decision trees for binary classification
//!
//! - [`tree`]: flat-array regression trees and traversal
//! - [`cart`]: exact-greedy second-order tree construction
//! - [`model`]: the logistic boosting ensemble with early stopping
//!
//! Inference is a sum of leaf contributions on top of a log-odds bias,
//! squashed by a sigmoid. Splits go left on `value <= threshold`.

pub mod cart;
pub mod model;
pub mod tree;

pub use cart::{CartBuilder, TreeConfig};
pub use model::{BoostedTrees, BoostingConfig};
pub use tree::{Node, Tree};
