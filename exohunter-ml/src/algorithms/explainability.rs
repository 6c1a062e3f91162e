//! Per-feature attributions for tree classifier predictions.

use crate::algorithms::boosting::GradientBoostedTrees;
use crate::config::ExplainConfig;
use crate::error::MlError;
use crate::features::definition::{FEATURE_COUNT, FEATURE_NAMES, FeatureVector};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Whether attributions can be computed in this build and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplainCapability {
    Available,
    Unavailable,
}

impl ExplainCapability {
    pub fn detect(config: &ExplainConfig) -> Self {
        if !cfg!(feature = "explain") {
            warn!("Explainability not compiled in");
            Self::Unavailable
        } else if !config.enabled {
            debug!("Explainability disabled by configuration");
            Self::Unavailable
        } else {
            Self::Available
        }
    }
}

/// Attribution report for a batch of predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainabilityReport {
    pub feature_names: Vec<String>,
    /// Mean absolute attribution per feature.
    pub feature_importance: HashMap<String, f64>,
    /// One attribution per feature per row, in log-odds.
    pub shap_values: Vec<FeatureVector>,
    /// Expected model margin; each row's attributions sum to its margin minus this.
    pub base_value: f64,
    pub method_used: String,
}

impl ExplainabilityReport {
    pub fn from_shap_values(shap_values: Vec<FeatureVector>, base_value: f64) -> Self {
        let n = shap_values.len().max(1) as f64;
        let feature_importance = (0..FEATURE_COUNT)
            .map(|f| {
                let mean_abs = shap_values.iter().map(|row| row[f].abs()).sum::<f64>() / n;
                (FEATURE_NAMES[f].to_string(), mean_abs)
            })
            .collect();
        Self {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            feature_importance,
            shap_values,
            base_value,
            method_used: "tree_shap".to_string(),
        }
    }

    /// Rename the features, slot for slot, e.g. to an upload's own column headers.
    ///
    /// Left unchanged unless `names` has one distinct entry per feature.
    pub fn with_feature_names(mut self, names: &[String]) -> Self {
        let distinct: HashSet<&String> = names.iter().collect();
        if names.len() != self.feature_names.len() || distinct.len() != names.len() {
            return self;
        }
        let mut importance = HashMap::with_capacity(names.len());
        for (old, new) in self.feature_names.iter().zip(names) {
            if let Some(value) = self.feature_importance.remove(old) {
                importance.insert(new.clone(), value);
            }
        }
        self.feature_importance = importance;
        self.feature_names = names.to_vec();
        self
    }

    /// Get the top N most important features.
    pub fn top_features(&self, n: usize) -> Vec<(&String, &f64)> {
        let mut items: Vec<_> = self.feature_importance.iter().collect();
        items.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
        items.into_iter().take(n).collect()
    }

    /// All features, most important first.
    pub fn ranking(&self) -> Vec<(String, f64)> {
        self.top_features(FEATURE_COUNT)
            .into_iter()
            .map(|(name, value)| (name.clone(), *value))
            .collect()
    }
}

/// Outcome of an attribution request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "report", rename_all = "snake_case")]
pub enum Explanation {
    Available(ExplainabilityReport),
    Unavailable,
}

impl Explanation {
    pub fn report(&self) -> Option<&ExplainabilityReport> {
        match self {
            Self::Available(report) => Some(report),
            Self::Unavailable => None,
        }
    }
}

/// Attribute each scaled row's prediction to its features.
///
/// Returns `Explanation::Unavailable` without computing anything when the
/// capability is missing. An empty batch is an error.
pub fn explain(
    model: &GradientBoostedTrees,
    rows: &[FeatureVector],
    capability: ExplainCapability,
) -> Result<Explanation, MlError> {
    match capability {
        ExplainCapability::Unavailable => Ok(Explanation::Unavailable),
        ExplainCapability::Available => attribute(model, rows),
    }
}

#[cfg(feature = "explain")]
fn attribute(model: &GradientBoostedTrees, rows: &[FeatureVector]) -> Result<Explanation, MlError> {
    use crate::algorithms::shap::shap_values;

    if rows.is_empty() {
        return Err(MlError::explain("no rows to explain"));
    }
    let values: Vec<FeatureVector> = rows.iter().map(|r| shap_values(model, r)).collect();
    if values.iter().flatten().any(|v| !v.is_finite()) {
        return Err(MlError::explain("attribution produced non-finite values"));
    }
    debug!(rows = rows.len(), "Computed tree attributions");
    Ok(Explanation::Available(ExplainabilityReport::from_shap_values(
        values,
        model.expected_margin(),
    )))
}

#[cfg(not(feature = "explain"))]
fn attribute(_model: &GradientBoostedTrees, _rows: &[FeatureVector]) -> Result<Explanation, MlError> {
    Ok(Explanation::Unavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoostingConfig;

    fn model() -> GradientBoostedTrees {
        let rows: Vec<FeatureVector> = (0..100)
            .map(|i| [i as f64, (i % 4) as f64, 0.0, 0.0, 0.0])
            .collect();
        let labels: Vec<u8> = (0..100).map(|i| u8::from(i > 50)).collect();
        let config = BoostingConfig {
            n_trees: 5,
            ..BoostingConfig::default()
        };
        GradientBoostedTrees::fit(&rows, &labels, &config).unwrap()
    }

    #[test]
    fn test_unavailable_is_noop() {
        let result = explain(&model(), &[], ExplainCapability::Unavailable).unwrap();
        assert_eq!(result, Explanation::Unavailable);
        assert!(result.report().is_none());
    }

    #[test]
    fn test_disabled_config_detects_unavailable() {
        let config = ExplainConfig { enabled: false };
        assert_eq!(ExplainCapability::detect(&config), ExplainCapability::Unavailable);
    }

    #[cfg(feature = "explain")]
    #[test]
    fn test_empty_batch_is_error() {
        let err = explain(&model(), &[], ExplainCapability::Available).unwrap_err();
        assert!(matches!(err, MlError::Explain(_)));
    }

    #[cfg(feature = "explain")]
    #[test]
    fn test_importance_ranks_informative_feature_first() {
        let rows: Vec<FeatureVector> = (0..100)
            .map(|i| [i as f64, (i % 4) as f64, 0.0, 0.0, 0.0])
            .collect();
        let explanation = explain(&model(), &rows, ExplainCapability::Available).unwrap();
        let report = explanation.report().unwrap();
        assert_eq!(report.shap_values.len(), 100);
        assert_eq!(report.top_features(1)[0].0, "koi_period");
        assert_eq!(report.ranking().len(), FEATURE_COUNT);
        assert_eq!(report.feature_importance["koi_duration"], 0.0);
    }

    #[test]
    fn test_feature_names_follow_upload_headers() {
        let report = ExplainabilityReport::from_shap_values(vec![[1.0, -3.0, 0.5, 0.0, 0.2]], 0.0);
        let headers: Vec<String> = ["p", "d", "t", "b", "r"].iter().map(|s| s.to_string()).collect();
        let renamed = report.clone().with_feature_names(&headers);
        assert_eq!(renamed.feature_names, headers);
        assert_eq!(renamed.feature_importance["d"], 3.0);
        assert_eq!(renamed.ranking()[0].0, "d");

        let duplicated: Vec<String> = ["a", "a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        assert_eq!(report.clone().with_feature_names(&duplicated), report);
    }

    #[test]
    fn test_top_features_sorted() {
        let report = ExplainabilityReport::from_shap_values(
            vec![[1.0, -3.0, 0.5, 0.0, 0.0], [-1.0, 1.0, 0.5, 0.0, 0.0]],
            0.0,
        );
        let top = report.top_features(2);
        assert_eq!(top[0].0, "koi_depth");
        assert_eq!(*top[0].1, 2.0);
        assert_eq!(top[1].0, "koi_period");
    }
}
