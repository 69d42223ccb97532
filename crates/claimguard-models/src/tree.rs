//! Weighted CART decision tree.
//!
//! The tree is the building block for every ensemble in this crate. It fits
//! either a class-1 probability (Gini/entropy) or a regression value (squared
//! error) per leaf, honours per-sample weights, and is stored as a flat node
//! arena so it serializes cleanly.

use crate::error::{ModelError, ModelResult};
use ndarray::{ArrayView1, ArrayView2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const MIN_GAIN: f64 = 1e-12;

/// Impurity measure used when scoring candidate splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    #[default]
    Gini,
    Entropy,
    /// Variance reduction. `friedman_mse` is accepted as an alias.
    #[serde(alias = "friedman_mse")]
    SquaredError,
}

impl FromStr for Criterion {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gini" => Ok(Self::Gini),
            "entropy" | "log_loss" => Ok(Self::Entropy),
            "squared_error" | "friedman_mse" => Ok(Self::SquaredError),
            other => Err(ModelError::invalid_param("criterion", format!("unsupported criterion '{other}'"))),
        }
    }
}

/// Number of features considered at each split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    #[default]
    All,
    Sqrt,
    Log2,
}

impl MaxFeatures {
    #[must_use]
    pub fn resolve(self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match self {
            Self::All => n_features,
            Self::Sqrt => n.sqrt() as usize,
            Self::Log2 => n.log2() as usize,
        };
        k.clamp(1, n_features.max(1))
    }
}

impl FromStr for MaxFeatures {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" | "none" => Ok(Self::All),
            "sqrt" => Ok(Self::Sqrt),
            "log2" => Ok(Self::Log2),
            other => Err(ModelError::invalid_param("max_features", format!("unsupported value '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub criterion: Criterion,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            criterion: Criterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Leaf { value: f64 },
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

/// Running weighted sums for one side of a split.
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    count: usize,
    w: f64,
    wy: f64,
    wy2: f64,
}

impl Moments {
    fn push(&mut self, y: f64, w: f64) {
        self.count += 1;
        self.w += w;
        self.wy += w * y;
        self.wy2 += w * y * y;
    }

    fn minus(self, other: Self) -> Self {
        Self {
            count: self.count - other.count,
            w: self.w - other.w,
            wy: self.wy - other.wy,
            wy2: self.wy2 - other.wy2,
        }
    }

    fn mean(self) -> f64 {
        if self.w > 0.0 { self.wy / self.w } else { 0.0 }
    }

    /// Impurity scaled by total weight.
    fn weighted_impurity(self, criterion: Criterion) -> f64 {
        if self.w <= 0.0 {
            return 0.0;
        }
        let p = (self.wy / self.w).clamp(0.0, 1.0);
        let impurity = match criterion {
            Criterion::Gini => 2.0 * p * (1.0 - p),
            Criterion::Entropy => {
                let term = |q: f64| if q > 0.0 { -q * q.ln() } else { 0.0 };
                term(p) + term(1.0 - p)
            }
            Criterion::SquaredError => {
                let mean = self.wy / self.w;
                (self.wy2 / self.w - mean * mean).max(0.0)
            }
        };
        impurity * self.w
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    params: TreeParams,
    n_features: usize,
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Fits a tree on the rows of `x` with non-zero weight.
    ///
    /// `weights` defaults to one per row. Rows with zero weight (out-of-bag
    /// bootstrap rows, unsampled boosting rows) are ignored entirely.
    pub fn fit<R: Rng + ?Sized>(
        params: &TreeParams,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        weights: Option<&[f64]>,
        rng: &mut R,
    ) -> ModelResult<Self> {
        let (n_rows, n_features) = x.dim();
        if n_rows != y.len() {
            return Err(ModelError::ShapeMismatch(format!("x has {n_rows} rows but y has {}", y.len())));
        }
        if n_features == 0 {
            return Err(ModelError::InvalidData("no features".to_string()));
        }
        if let Some(w) = weights {
            if w.len() != n_rows {
                return Err(ModelError::ShapeMismatch(format!(
                    "x has {n_rows} rows but {} sample weights were given",
                    w.len()
                )));
            }
        }
        let weight = |i: usize| weights.map_or(1.0, |w| w[i]);
        let root_rows: Vec<usize> = (0..n_rows).filter(|&i| weight(i) > 0.0).collect();
        if root_rows.is_empty() {
            return Err(ModelError::InvalidData("no rows with positive weight".to_string()));
        }

        let min_leaf = params.min_samples_leaf.max(1);
        let min_split = params.min_samples_split.max(2);
        let n_candidates = params.max_features.resolve(n_features);

        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut stack = vec![(0_usize, root_rows, 0_usize)];

        while let Some((slot, rows, depth)) = stack.pop() {
            let mut total = Moments::default();
            for &i in &rows {
                total.push(y[i], weight(i));
            }
            let parent_impurity = total.weighted_impurity(params.criterion);

            let depth_exhausted = params.max_depth.is_some_and(|d| depth >= d);
            if depth_exhausted || rows.len() < min_split || rows.len() < 2 * min_leaf || parent_impurity <= MIN_GAIN {
                nodes[slot] = Node::Leaf { value: total.mean() };
                continue;
            }

            let features: Vec<usize> = if n_candidates >= n_features {
                (0..n_features).collect()
            } else {
                rand::seq::index::sample(rng, n_features, n_candidates).into_vec()
            };

            let mut best: Option<BestSplit> = None;
            let mut sorted = rows.clone();
            for &feature in &features {
                sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
                let mut left = Moments::default();
                for pos in 0..sorted.len() - 1 {
                    let i = sorted[pos];
                    left.push(y[i], weight(i));
                    let current = x[[i, feature]];
                    let next = x[[sorted[pos + 1], feature]];
                    if next <= current {
                        continue;
                    }
                    let right = total.minus(left);
                    if left.count < min_leaf || right.count < min_leaf {
                        continue;
                    }
                    let gain = parent_impurity
                        - left.weighted_impurity(params.criterion)
                        - right.weighted_impurity(params.criterion);
                    if gain > MIN_GAIN && best.as_ref().is_none_or(|b| gain > b.gain) {
                        let mut threshold = current + (next - current) / 2.0;
                        if threshold >= next {
                            threshold = current;
                        }
                        best = Some(BestSplit { feature, threshold, gain });
                    }
                }
            }

            let Some(split) = best else {
                nodes[slot] = Node::Leaf { value: total.mean() };
                continue;
            };

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
                rows.iter().copied().partition(|&i| x[[i, split.feature]] <= split.threshold);
            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf { value: 0.0 });
            nodes.push(Node::Leaf { value: 0.0 });
            nodes[slot] = Node::Split { feature: split.feature, threshold: split.threshold, left, right };
            stack.push((right, right_rows, depth + 1));
            stack.push((left, left_rows, depth + 1));
        }

        Ok(Self { params: params.clone(), n_features, nodes })
    }

    #[must_use]
    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0_usize, 0_usize)];
        while let Some((idx, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Node::Split { left, right, .. } = self.nodes[idx] {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
        }
        max_depth
    }

    /// Index of the leaf a row falls into.
    #[must_use]
    pub fn apply(&self, row: ArrayView1<'_, f64>) -> usize {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { .. } => return idx,
                Node::Split { feature, threshold, left, right } => {
                    idx = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    #[must_use]
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        match self.nodes[self.apply(row)] {
            Node::Leaf { value } => value,
            Node::Split { .. } => unreachable!("apply always ends on a leaf"),
        }
    }

    /// Overwrites the value of a leaf. Used by boosting's Newton step.
    pub fn set_leaf_value(&mut self, leaf: usize, value: f64) -> ModelResult<()> {
        match self.nodes.get_mut(leaf) {
            Some(Node::Leaf { value: v }) => {
                *v = value;
                Ok(())
            }
            _ => Err(ModelError::InvalidData(format!("node {leaf} is not a leaf"))),
        }
    }

    pub(crate) fn check_width(&self, x: ArrayView2<'_, f64>) -> ModelResult<()> {
        if x.ncols() == self.n_features {
            Ok(())
        } else {
            Err(ModelError::ShapeMismatch(format!(
                "model expects {} features, got {}",
                self.n_features,
                x.ncols()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_separable_data_gets_pure_leaves() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut rng = StdRng::seed_from_u64(7);
        let tree = DecisionTree::fit(&TreeParams::default(), x.view(), y.view(), None, &mut rng).unwrap();

        assert_eq!(tree.depth(), 1);
        assert!((tree.predict_row(array![2.5].view()) - 0.0).abs() < 1e-12);
        assert!((tree.predict_row(array![9.0].view()) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_max_depth_zero_is_a_single_leaf() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];
        let params = TreeParams { max_depth: Some(0), ..TreeParams::default() };
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(&params, x.view(), y.view(), None, &mut rng).unwrap();

        assert_eq!(tree.node_count(), 1);
        assert!((tree.predict_row(array![5.0].view()) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_zero_weight_rows_are_ignored() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let weights = [1.0, 1.0, 0.0, 0.0];
        let mut rng = StdRng::seed_from_u64(1);
        let tree =
            DecisionTree::fit(&TreeParams::default(), x.view(), y.view(), Some(&weights), &mut rng).unwrap();

        assert_eq!(tree.node_count(), 1);
        assert!(tree.predict_row(array![3.0].view()).abs() < 1e-12);
    }

    #[test]
    fn test_squared_error_fits_regression_targets() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y: Array1<f64> = array![-1.5, -1.5, 2.0, 2.0];
        let params = TreeParams { criterion: Criterion::SquaredError, ..TreeParams::default() };
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(&params, x.view(), y.view(), None, &mut rng).unwrap();

        assert!((tree.predict_row(array![0.5].view()) + 1.5).abs() < 1e-12);
        assert!((tree.predict_row(array![2.5].view()) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_min_samples_leaf_blocks_small_children() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![1.0, 0.0, 0.0, 0.0];
        let params = TreeParams { min_samples_leaf: 2, ..TreeParams::default() };
        let mut rng = StdRng::seed_from_u64(3);
        let tree = DecisionTree::fit(&params, x.view(), y.view(), None, &mut rng).unwrap();

        // Only the 2|2 split is allowed.
        assert_eq!(tree.depth(), 1);
        assert!((tree.predict_row(array![0.0].view()) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_shape_mismatch() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0];
        let mut rng = StdRng::seed_from_u64(1);
        let err = DecisionTree::fit(&TreeParams::default(), x.view(), y.view(), None, &mut rng).unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch(_)));
    }

    #[test]
    fn test_criterion_parsing() {
        assert_eq!("friedman_mse".parse::<Criterion>().unwrap(), Criterion::SquaredError);
        assert_eq!("entropy".parse::<Criterion>().unwrap(), Criterion::Entropy);
        assert!("poisson".parse::<Criterion>().is_err());
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::Sqrt.resolve(16), 4);
        assert_eq!(MaxFeatures::Log2.resolve(16), 4);
        assert_eq!(MaxFeatures::Log2.resolve(1), 1);
        assert_eq!(MaxFeatures::All.resolve(7), 7);
    }
}
