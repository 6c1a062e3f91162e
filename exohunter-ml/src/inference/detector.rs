//! Detection over uploaded tables with a trained bundle.

use crate::algorithms::explainability::{self, ExplainCapability, Explanation};
use crate::data::schema::{MatchStrategy, MatchedSchema};
use crate::data::table::DataTable;
use crate::error::MlError;
use crate::features::definition::FeatureVector;
use crate::inference::result::{DetectionResult, IndividualPredictions};
use crate::training::bundle::TrainedModelBundle;
use std::sync::Arc;
use tracing::{debug, info};

/// Classifies uploaded tables against a shared, read-only bundle.
#[derive(Debug, Clone)]
pub struct Detector {
    bundle: Arc<TrainedModelBundle>,
    explain: ExplainCapability,
}

impl Detector {
    pub fn new(bundle: Arc<TrainedModelBundle>, explain: ExplainCapability) -> Self {
        Self { bundle, explain }
    }

    pub fn bundle(&self) -> &Arc<TrainedModelBundle> {
        &self.bundle
    }

    pub fn explain_capability(&self) -> ExplainCapability {
        self.explain
    }

    /// Fused prediction for every row of `table`, in row order.
    ///
    /// Fails without a partial result when fewer than five numeric columns exist.
    pub fn detect(&self, table: &DataTable) -> Result<DetectionResult, MlError> {
        let (rows, schema) = self.feature_rows(table)?;
        let fused = self.bundle.predict(&rows);

        let result = DetectionResult::new(
            fused.labels,
            fused.probabilities,
            self.bundle.accuracies(),
            IndividualPredictions {
                tree: fused.tree_labels,
                sequence: fused.sequence_labels,
            },
            self.bundle.suite().is_hybrid(),
        );
        info!(
            rows = result.len(),
            positives = result.exoplanet_count,
            max_probability = result.max_probability,
            strategy = ?schema.strategy,
            "Detection complete"
        );
        Ok(result)
    }

    /// Per-feature attributions of the tree classifier over `table`.
    pub fn explain(&self, table: &DataTable) -> Result<Explanation, MlError> {
        if self.explain == ExplainCapability::Unavailable {
            debug!("Explainability unavailable, skipping attribution");
            return Ok(Explanation::Unavailable);
        }
        let (rows, schema) = self.feature_rows(table)?;
        let scaled = self.bundle.scaler().transform(&rows);
        let explanation = explainability::explain(self.bundle.tree(), &scaled, self.explain)?;
        Ok(match (explanation, schema.strategy) {
            (Explanation::Available(report), MatchStrategy::Positional) => {
                Explanation::Available(report.with_feature_names(&schema.column_names))
            }
            (explanation, _) => explanation,
        })
    }

    fn feature_rows(
        &self,
        table: &DataTable,
    ) -> Result<(Vec<FeatureVector>, MatchedSchema), MlError> {
        if table.is_empty() {
            return Err(MlError::invalid_input("uploaded table has no data rows"));
        }
        let schema = MatchedSchema::resolve(table)?;
        debug!(columns = ?schema.column_names, strategy = ?schema.strategy, "Matched upload schema");
        Ok((schema.extract(table)?, schema))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoostingConfig, SequenceConfig, TrainingConfig};
    use crate::data::synthetic;
    use crate::error::SchemaError;

    fn detector(explain: ExplainCapability) -> Detector {
        let config = TrainingConfig {
            boosting: BoostingConfig {
                n_trees: 10,
                ..BoostingConfig::default()
            },
            sequence: SequenceConfig {
                enabled: false,
                ..SequenceConfig::default()
            },
            ..TrainingConfig::default()
        };
        let ds = synthetic::generate(600, 11).unwrap();
        let bundle = TrainedModelBundle::train(&ds, &config).unwrap();
        Detector::new(Arc::new(bundle), explain)
    }

    #[test]
    fn test_detect_by_name() {
        let table = DataTable::from_csv_str(
            "kepoi_name,koi_prad,koi_period,koi_depth,koi_duration,koi_impact\n\
             a,2.1,3.5,0.004,2.5,0.3\n\
             b,1.0,200,0.0001,5.0,0.9\n\
             c,,10,0.001,3.0,0.5\n",
        )
        .unwrap();
        let result = detector(ExplainCapability::Unavailable).detect(&table).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result.individual.tree, result.individual.sequence);
        assert!(!result.hybrid);
    }

    #[test]
    fn test_detect_insufficient_features() {
        let table = DataTable::from_csv_str("x,y,z,name\n1,2,3,a\n4,5,6,b\n").unwrap();
        let err = detector(ExplainCapability::Unavailable).detect(&table).unwrap_err();
        assert!(matches!(
            err,
            MlError::Schema(SchemaError::InsufficientFeatures {
                found: 3,
                required: 5
            })
        ));
    }

    #[test]
    fn test_detect_empty_table() {
        let table = DataTable::from_csv_str("a,b,c,d,e\n").unwrap();
        assert!(detector(ExplainCapability::Unavailable).detect(&table).is_err());
    }

    #[test]
    fn test_explain_unavailable() {
        let table = DataTable::from_csv_str("x\n1\n").unwrap();
        let explanation = detector(ExplainCapability::Unavailable).explain(&table).unwrap();
        assert_eq!(explanation, Explanation::Unavailable);
    }

    #[cfg(feature = "explain")]
    #[test]
    fn test_explain_available() {
        let table = DataTable::from_csv_str(
            "p,d,t,b,r\n3.5,0.004,2.5,0.3,2.1\n200,0.0001,5.0,0.9,1.0\n",
        )
        .unwrap();
        let explanation = detector(ExplainCapability::Available).explain(&table).unwrap();
        let report = explanation.report().unwrap();
        assert_eq!(report.shap_values.len(), 2);
        assert_eq!(report.feature_names, vec!["p", "d", "t", "b", "r"]);
        assert!(report.feature_importance.contains_key("d"));
    }

    #[cfg(feature = "explain")]
    #[test]
    fn test_explain_by_name_keeps_canonical_names() {
        let table = DataTable::from_csv_str(
            "koi_period,koi_depth,koi_duration,koi_impact,koi_prad
3.5,0.004,2.5,0.3,2.1
",
        )
        .unwrap();
        let explanation = detector(ExplainCapability::Available).explain(&table).unwrap();
        let report = explanation.report().unwrap();
        assert_eq!(report.feature_names[0], "koi_period");
    }
}
