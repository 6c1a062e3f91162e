//! Exact path-dependent TreeSHAP for the boosted ensemble.
//!
//! Attributions are in margin (log-odds) space. For each row,
//! `sum(phi) + expected_margin == margin`.

use crate::algorithms::boosting::{GradientBoostedTrees, RegressionTree, TreeNode};
use crate::features::definition::{FEATURE_COUNT, FeatureVector};

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    weight: f64,
}

/// SHAP values of one row over every tree of the ensemble.
pub fn shap_values(model: &GradientBoostedTrees, row: &FeatureVector) -> FeatureVector {
    let mut phi = [0.0; FEATURE_COUNT];
    for tree in model.trees() {
        recurse(tree, 0, row, &mut phi, Vec::new(), 1.0, 1.0, None);
    }
    phi
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &RegressionTree,
    index: usize,
    row: &FeatureVector,
    phi: &mut FeatureVector,
    mut path: Vec<PathElement>,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    extend(&mut path, zero_fraction, one_fraction, feature);

    match tree.node(index) {
        TreeNode::Leaf { value, .. } => {
            for i in 1..path.len() {
                let el = path[i];
                let w = unwound_sum(&path, i);
                if let Some(f) = el.feature {
                    phi[f] += w * (el.one_fraction - el.zero_fraction) * value;
                }
            }
        }
        TreeNode::Split {
            feature: split,
            threshold,
            left,
            right,
            cover,
        } => {
            let (hot, cold) = if row[*split] < *threshold {
                (*left, *right)
            } else {
                (*right, *left)
            };
            let hot_fraction = tree.node(hot).cover() / cover;
            let cold_fraction = tree.node(cold).cover() / cover;

            // A feature seen earlier on the path is merged rather than counted twice.
            let (mut incoming_zero, mut incoming_one) = (1.0, 1.0);
            if let Some(k) = path.iter().position(|el| el.feature == Some(*split)) {
                incoming_zero = path[k].zero_fraction;
                incoming_one = path[k].one_fraction;
                unwind(&mut path, k);
            }

            recurse(
                tree,
                hot,
                row,
                phi,
                path.clone(),
                hot_fraction * incoming_zero,
                incoming_one,
                Some(*split),
            );
            recurse(
                tree,
                cold,
                row,
                phi,
                path,
                cold_fraction * incoming_zero,
                0.0,
                Some(*split),
            );
        }
    }
}

fn extend(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });
    let d = depth as f64;
    for i in (0..depth).rev() {
        let fi = i as f64;
        path[i + 1].weight += one_fraction * path[i].weight * (fi + 1.0) / (d + 1.0);
        path[i].weight = zero_fraction * path[i].weight * (d - fi) / (d + 1.0);
    }
}

fn unwind(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let d = depth as f64;
    let one = path[index].one_fraction;
    let zero = path[index].zero_fraction;
    let mut next_one = path[depth].weight;

    for i in (0..depth).rev() {
        let fi = i as f64;
        if one != 0.0 {
            let tmp = path[i].weight;
            path[i].weight = next_one * (d + 1.0) / ((fi + 1.0) * one);
            next_one = tmp - path[i].weight * zero * (d - fi) / (d + 1.0);
        } else {
            path[i].weight = path[i].weight * (d + 1.0) / (zero * (d - fi));
        }
    }
    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight of the path with element `index` removed.
fn unwound_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let d = depth as f64;
    let one = path[index].one_fraction;
    let zero = path[index].zero_fraction;
    let mut next_one = path[depth].weight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        let fi = i as f64;
        if one != 0.0 {
            let tmp = next_one * (d + 1.0) / ((fi + 1.0) * one);
            total += tmp;
            next_one = path[i].weight - tmp * zero * ((d - fi) / (d + 1.0));
        } else {
            total += path[i].weight / zero / ((d - fi) / (d + 1.0));
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoostingConfig;

    fn model() -> (GradientBoostedTrees, Vec<FeatureVector>) {
        let rows: Vec<FeatureVector> = (0..300)
            .map(|i| {
                let a = (i % 17) as f64 / 17.0;
                let b = (i % 11) as f64 / 11.0;
                [a, b, (i % 5) as f64, a * b, 1.0 - a]
            })
            .collect();
        let labels: Vec<u8> = rows.iter().map(|r| u8::from(r[0] + r[1] > 1.0)).collect();
        let config = BoostingConfig {
            n_trees: 15,
            max_depth: 4,
            ..BoostingConfig::default()
        };
        let model = GradientBoostedTrees::fit(&rows, &labels, &config).unwrap();
        (model, rows)
    }

    #[test]
    fn test_additivity() {
        let (model, rows) = model();
        let base = model.expected_margin();
        for row in rows.iter().take(60) {
            let phi = shap_values(&model, row);
            let total: f64 = phi.iter().sum::<f64>() + base;
            assert!((total - model.margin(row)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_unused_feature_gets_zero() {
        let (model, rows) = model();
        let used: Vec<bool> = (0..FEATURE_COUNT)
            .map(|f| {
                model.trees().iter().any(|t| {
                    t.nodes()
                        .iter()
                        .any(|n| matches!(n, TreeNode::Split { feature, .. } if *feature == f))
                })
            })
            .collect();
        let phi = shap_values(&model, &rows[3]);
        for f in 0..FEATURE_COUNT {
            if !used[f] {
                assert_eq!(phi[f], 0.0);
            }
        }
    }

    #[test]
    fn test_single_split_stump() {
        // One split on feature 0: phi_0 = f(x) - E[f], everything else zero.
        let rows: Vec<FeatureVector> = (0..40)
            .map(|i| [f64::from(u8::from(i >= 10)), 0.0, 0.0, 0.0, 0.0])
            .collect();
        let labels: Vec<u8> = (0..40).map(|i| u8::from(i >= 10)).collect();
        let config = BoostingConfig {
            n_trees: 1,
            ..BoostingConfig::default()
        };
        let model = GradientBoostedTrees::fit(&rows, &labels, &config).unwrap();
        let phi = shap_values(&model, &rows[0]);
        let expected = model.margin(&rows[0]) - model.expected_margin();
        assert!((phi[0] - expected).abs() < 1e-12);
        assert!(phi[1..].iter().all(|&v| v == 0.0));
    }
}
