//! Gradient-boosted decision trees for binary classification.
//!
//! Second-order boosting on the logistic loss with histogram split finding.
//! Feature values are bucketed once into at most `max_bins` bins per feature;
//! every tree is then grown depth-first on gradient/hessian histograms.

use crate::config::BoostingConfig;
use crate::error::MlError;
use crate::features::definition::{FEATURE_COUNT, FeatureVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Hessians are floored here so leaves of saturated samples stay finite.
const MIN_HESSIAN: f64 = 1e-16;
/// Splits whose gain does not exceed this are not taken.
const MIN_GAIN: f64 = 1e-12;
/// Probability at which the native decision rule flips to class 1.
pub const DECISION_THRESHOLD: f64 = 0.5;

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// A node of a regression tree. Every node records how many training samples reached it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Rows with `x[feature] < threshold` go left, everything else right.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        cover: f64,
    },
    Leaf { value: f64, cover: f64 },
}

impl TreeNode {
    pub fn cover(&self) -> f64 {
        match self {
            Self::Split { cover, .. } | Self::Leaf { cover, .. } => *cover,
        }
    }
}

/// One tree of the ensemble; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> &TreeNode {
        &self.nodes[index]
    }

    /// Margin contribution of this tree for `row`.
    pub fn predict(&self, row: &FeatureVector) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    index = if row[*feature] < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Cover-weighted mean of the leaf values.
    pub fn expected_value(&self) -> f64 {
        self.expected_value_at(0)
    }

    fn expected_value_at(&self, index: usize) -> f64 {
        match &self.nodes[index] {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split {
                left, right, cover, ..
            } => {
                let lc = self.nodes[*left].cover();
                let rc = self.nodes[*right].cover();
                (lc * self.expected_value_at(*left) + rc * self.expected_value_at(*right)) / cover
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.depth_at(0)
    }

    fn depth_at(&self, index: usize) -> usize {
        match &self.nodes[index] {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => {
                1 + self.depth_at(*left).max(self.depth_at(*right))
            }
        }
    }
}

/// Boosted tree ensemble producing log-odds of class 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    base_margin: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    /// Fit the ensemble on (already scaled) rows and binary labels.
    pub fn fit(
        rows: &[FeatureVector],
        labels: &[u8],
        config: &BoostingConfig,
    ) -> Result<Self, MlError> {
        validate(rows, labels, config)?;

        let cuts: Vec<Vec<f64>> = (0..FEATURE_COUNT)
            .map(|f| {
                let column: Vec<f64> = rows.iter().map(|r| r[f]).collect();
                bin_cuts(&column, config.max_bins)
            })
            .collect();
        let binned: Vec<[u16; FEATURE_COUNT]> = rows
            .iter()
            .map(|row| {
                let mut bins = [0u16; FEATURE_COUNT];
                for f in 0..FEATURE_COUNT {
                    bins[f] = bin_of(&cuts[f], row[f]) as u16;
                }
                bins
            })
            .collect();

        // Base score 0.5 is a zero margin.
        let base_margin = 0.0;
        let targets: Vec<f64> = labels.iter().map(|&l| f64::from(l)).collect();
        let mut margins = vec![base_margin; rows.len()];
        let mut grad = vec![0.0; rows.len()];
        let mut hess = vec![0.0; rows.len()];
        let mut trees = Vec::with_capacity(config.n_trees);

        for round in 0..config.n_trees {
            for i in 0..rows.len() {
                let p = sigmoid(margins[i]);
                grad[i] = p - targets[i];
                hess[i] = (p * (1.0 - p)).max(MIN_HESSIAN);
            }

            let mut builder = TreeBuilder {
                binned: &binned,
                cuts: &cuts,
                grad: &grad,
                hess: &hess,
                config,
                nodes: Vec::new(),
            };
            builder.grow((0..rows.len()).collect(), 0);
            let tree = RegressionTree {
                nodes: builder.nodes,
            };

            for (margin, row) in margins.iter_mut().zip(rows) {
                *margin += tree.predict(row);
            }
            if round % 25 == 0 {
                debug!(
                    round,
                    nodes = tree.nodes.len(),
                    loss = log_loss(&margins, &targets),
                    "Boosting round"
                );
            }
            trees.push(tree);
        }

        info!(
            trees = trees.len(),
            rows = rows.len(),
            loss = log_loss(&margins, &targets),
            "Fitted gradient-boosted trees"
        );

        Ok(Self { base_margin, trees })
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub fn base_margin(&self) -> f64 {
        self.base_margin
    }

    /// Raw log-odds of class 1.
    pub fn margin(&self, row: &FeatureVector) -> f64 {
        self.base_margin + self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    /// Expected margin over the training distribution, weighted by node cover.
    pub fn expected_margin(&self) -> f64 {
        self.base_margin + self.trees.iter().map(RegressionTree::expected_value).sum::<f64>()
    }

    pub fn predict_probability(&self, rows: &[FeatureVector]) -> Vec<f64> {
        rows.iter().map(|r| sigmoid(self.margin(r))).collect()
    }

    pub fn predict(&self, rows: &[FeatureVector]) -> Vec<u8> {
        self.predict_probability(rows)
            .into_iter()
            .map(|p| u8::from(p > DECISION_THRESHOLD))
            .collect()
    }
}

fn validate(rows: &[FeatureVector], labels: &[u8], config: &BoostingConfig) -> Result<(), MlError> {
    if rows.is_empty() {
        return Err(MlError::training("cannot fit trees on an empty dataset"));
    }
    if rows.len() != labels.len() {
        return Err(MlError::training(format!(
            "{} rows but {} labels",
            rows.len(),
            labels.len()
        )));
    }
    if rows.iter().flatten().any(|v| !v.is_finite()) {
        return Err(MlError::training("training rows contain non-finite values"));
    }
    if config.n_trees == 0 || config.max_depth == 0 {
        return Err(MlError::training("n_trees and max_depth must be positive"));
    }
    if !(config.learning_rate > 0.0) || config.lambda < 0.0 || config.gamma < 0.0 {
        return Err(MlError::training(
            "learning_rate must be positive, lambda and gamma non-negative",
        ));
    }
    if !(2..=u16::MAX as usize).contains(&config.max_bins) {
        return Err(MlError::training(format!(
            "max_bins must be in [2, {}], got {}",
            u16::MAX,
            config.max_bins
        )));
    }
    Ok(())
}

/// Candidate thresholds for one feature, strictly increasing.
///
/// With few distinct values every midpoint is a cut; otherwise cuts sit at
/// evenly spaced quantiles.
fn bin_cuts(values: &[f64], max_bins: usize) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut distinct = sorted.clone();
    distinct.dedup();

    let mut cuts: Vec<f64> = if distinct.len() <= max_bins {
        distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
    } else {
        (1..max_bins)
            .map(|i| sorted[i * sorted.len() / max_bins])
            .filter(|&c| c > sorted[0])
            .collect()
    };
    cuts.dedup();
    cuts
}

/// Number of cuts `<= x`; rows in bin `b` satisfy `cuts[b-1] <= x < cuts[b]`.
fn bin_of(cuts: &[f64], x: f64) -> usize {
    cuts.partition_point(|&c| c <= x)
}

fn log_loss(margins: &[f64], targets: &[f64]) -> f64 {
    let eps = 1e-15;
    let total: f64 = margins
        .iter()
        .zip(targets)
        .map(|(&m, &y)| {
            let p = sigmoid(m).clamp(eps, 1.0 - eps);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / margins.len().max(1) as f64
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

struct TreeBuilder<'a> {
    binned: &'a [[u16; FEATURE_COUNT]],
    cuts: &'a [Vec<f64>],
    grad: &'a [f64],
    hess: &'a [f64],
    config: &'a BoostingConfig,
    nodes: Vec<TreeNode>,
}

impl TreeBuilder<'_> {
    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let g: f64 = indices.iter().map(|&i| self.grad[i]).sum();
        let h: f64 = indices.iter().map(|&i| self.hess[i]).sum();
        let cover = indices.len() as f64;

        let split = if depth < self.config.max_depth && indices.len() >= 2 {
            self.best_split(&indices, g, h)
        } else {
            None
        };

        let Some(split) = split else {
            let value = -g / (h + self.config.lambda) * self.config.learning_rate;
            self.nodes.push(TreeNode::Leaf { value, cover });
            return self.nodes.len() - 1;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| usize::from(self.binned[i][split.feature]) <= split.bin);

        let id = self.nodes.len();
        // Placeholder until both children exist.
        self.nodes.push(TreeNode::Leaf { value: 0.0, cover });
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[id] = TreeNode::Split {
            feature: split.feature,
            threshold: self.cuts[split.feature][split.bin],
            left,
            right,
            cover,
        };
        id
    }

    fn best_split(&self, indices: &[usize], g: f64, h: f64) -> Option<SplitCandidate> {
        let lambda = self.config.lambda;
        let min_child = self.config.min_child_weight;
        let parent_score = g * g / (h + lambda);
        let mut best: Option<SplitCandidate> = None;

        for feature in 0..FEATURE_COUNT {
            let cuts = &self.cuts[feature];
            if cuts.is_empty() {
                continue;
            }
            let n_bins = cuts.len() + 1;
            let mut hist_g = vec![0.0; n_bins];
            let mut hist_h = vec![0.0; n_bins];
            let mut hist_n = vec![0usize; n_bins];
            for &i in indices {
                let b = usize::from(self.binned[i][feature]);
                hist_g[b] += self.grad[i];
                hist_h[b] += self.hess[i];
                hist_n[b] += 1;
            }

            let (mut gl, mut hl, mut nl) = (0.0, 0.0, 0usize);
            for bin in 0..cuts.len() {
                gl += hist_g[bin];
                hl += hist_h[bin];
                nl += hist_n[bin];
                let (gr, hr, nr) = (g - gl, h - hl, indices.len() - nl);
                if nl == 0 || hl < min_child {
                    continue;
                }
                if nr == 0 || hr < min_child {
                    break;
                }
                let gain = 0.5
                    * (gl * gl / (hl + lambda) + gr * gr / (hr + lambda) - parent_score)
                    - self.config.gamma;
                if gain > MIN_GAIN && best.is_none_or(|b| gain > b.gain) {
                    best = Some(SplitCandidate { feature, bin, gain });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable(n: usize) -> (Vec<FeatureVector>, Vec<u8>) {
        let rows: Vec<FeatureVector> = (0..n)
            .map(|i| {
                let x = i as f64 / n as f64;
                [x, (i % 7) as f64, 0.0, 1.0 - x, (i % 3) as f64]
            })
            .collect();
        let labels = rows.iter().map(|r| u8::from(r[0] > 0.6)).collect();
        (rows, labels)
    }

    fn small_config() -> BoostingConfig {
        BoostingConfig {
            n_trees: 20,
            ..BoostingConfig::default()
        }
    }

    #[test]
    fn test_fits_threshold_rule() {
        let (rows, labels) = separable(200);
        let model = GradientBoostedTrees::fit(&rows, &labels, &small_config()).unwrap();
        assert_eq!(model.predict(&rows), labels);
        assert_eq!(model.trees().len(), 20);
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let (rows, labels) = separable(200);
        let model = GradientBoostedTrees::fit(&rows, &labels, &small_config()).unwrap();
        for p in model.predict_probability(&rows) {
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_predict_matches_probability_rule() {
        let (rows, labels) = separable(300);
        let model = GradientBoostedTrees::fit(&rows, &labels, &small_config()).unwrap();
        let probs = model.predict_probability(&rows);
        let preds = model.predict(&rows);
        for (p, l) in probs.iter().zip(&preds) {
            assert_eq!(*l, u8::from(*p > 0.5));
        }
    }

    #[test]
    fn test_depth_and_cover_invariants() {
        let (rows, labels) = separable(500);
        let config = BoostingConfig {
            n_trees: 5,
            max_depth: 3,
            ..BoostingConfig::default()
        };
        let model = GradientBoostedTrees::fit(&rows, &labels, &config).unwrap();
        for tree in model.trees() {
            assert!(tree.depth() <= 3);
            assert_eq!(tree.node(0).cover(), 500.0);
            for node in tree.nodes() {
                if let TreeNode::Split {
                    left, right, cover, ..
                } = node
                {
                    assert_eq!(tree.node(*left).cover() + tree.node(*right).cover(), *cover);
                }
            }
        }
    }

    #[test]
    fn test_single_class_yields_leaves_only() {
        let rows: Vec<FeatureVector> = (0..50).map(|i| [i as f64; FEATURE_COUNT]).collect();
        let labels = vec![1u8; 50];
        let model = GradientBoostedTrees::fit(&rows, &labels, &small_config()).unwrap();
        assert!(model.predict(&rows).iter().all(|&l| l == 1));
    }

    #[test]
    fn test_rejects_bad_input() {
        let config = small_config();
        assert!(GradientBoostedTrees::fit(&[], &[], &config).is_err());
        assert!(GradientBoostedTrees::fit(&[[0.0; 5]], &[1, 0], &config).is_err());
        assert!(GradientBoostedTrees::fit(&[[f64::NAN; 5]], &[1], &config).is_err());
        let zero_trees = BoostingConfig {
            n_trees: 0,
            ..BoostingConfig::default()
        };
        assert!(GradientBoostedTrees::fit(&[[0.0; 5]], &[1], &zero_trees).is_err());
    }

    #[test]
    fn test_bin_cuts() {
        assert_eq!(bin_cuts(&[1.0, 2.0, 2.0, 4.0], 256), vec![1.5, 3.0]);
        assert!(bin_cuts(&[3.0, 3.0], 256).is_empty());

        let many: Vec<f64> = (0..1000).map(f64::from).collect();
        let cuts = bin_cuts(&many, 16);
        assert!(cuts.len() <= 15);
        assert!(cuts.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(bin_of(&cuts, -1.0), 0);
        assert_eq!(bin_of(&cuts, 1e9), cuts.len());
    }
}
