//! The trained model bundle: scaler, classifiers, held-out split and accuracies.

use crate::algorithms::boosting::GradientBoostedTrees;
use crate::algorithms::fusion::{ClassifierSuite, FusedPredictions};
use crate::config::TrainingConfig;
use crate::data::dataset::{LabeledDataset, Provenance};
use crate::data::split::stratified_split;
use crate::error::MlError;
use crate::features::definition::FeatureVector;
use crate::features::scaler::StandardScaler;
use crate::training::metrics::{ClassificationMetrics, accuracy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Datasets smaller than this are not trained on.
pub const MIN_TRAINING_ROWS: usize = 500;

/// Held-out accuracy of each model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelAccuracies {
    pub tree: f64,
    /// Zero when no sequence classifier is present.
    pub sequence: f64,
    /// Equals `tree` when no sequence classifier is present.
    pub fusion: f64,
}

/// Scaled held-out rows and their labels.
#[derive(Debug, Clone)]
pub struct EvaluationSplit {
    pub rows: Vec<FeatureVector>,
    pub labels: Vec<u8>,
}

impl EvaluationSplit {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Everything needed to classify uploads. Immutable once trained.
#[derive(Debug, Clone)]
pub struct TrainedModelBundle {
    scaler: StandardScaler,
    tree: GradientBoostedTrees,
    suite: ClassifierSuite,
    evaluation: EvaluationSplit,
    accuracies: ModelAccuracies,
    fusion_metrics: ClassificationMetrics,
    provenance: Provenance,
    dataset_fingerprint: String,
    trained_at: DateTime<Utc>,
}

impl TrainedModelBundle {
    /// Split, scale and fit every model, then score each on the held-out rows.
    pub fn train(dataset: &LabeledDataset, config: &TrainingConfig) -> Result<Self, MlError> {
        if dataset.len() < MIN_TRAINING_ROWS {
            return Err(MlError::training(format!(
                "dataset has {} rows, at least {MIN_TRAINING_ROWS} required",
                dataset.len()
            )));
        }

        let split = stratified_split(dataset.labels(), config.test_fraction, config.seed)?;
        let vectors = dataset.feature_vectors();
        let pick = |idx: &[usize]| -> (Vec<FeatureVector>, Vec<u8>) {
            idx.iter()
                .map(|&i| (vectors[i], dataset.labels()[i]))
                .unzip()
        };
        let (train_raw, train_labels) = pick(&split.train);
        let (test_raw, test_labels) = pick(&split.test);

        let scaler = StandardScaler::fit(&train_raw)?;
        let train_rows = scaler.transform(&train_raw);
        let test_rows = scaler.transform(&test_raw);

        let tree = GradientBoostedTrees::fit(&train_rows, &train_labels, &config.boosting)?;
        let suite = fit_suite(&train_rows, &train_labels, config)?;

        let evaluation = EvaluationSplit {
            rows: test_rows,
            labels: test_labels,
        };
        let fused = predict_scaled(&tree, &suite, &evaluation.rows);
        let tree_accuracy = accuracy(&evaluation.labels, &fused.tree_labels);
        let fusion_metrics = ClassificationMetrics::from_predictions(&evaluation.labels, &fused.labels);
        let accuracies = ModelAccuracies {
            tree: tree_accuracy,
            sequence: if suite.is_hybrid() {
                accuracy(&evaluation.labels, &fused.sequence_labels)
            } else {
                0.0
            },
            fusion: fusion_metrics.accuracy,
        };

        info!(
            suite = suite.name(),
            train_rows = train_rows.len(),
            test_rows = evaluation.len(),
            tree = accuracies.tree,
            sequence = accuracies.sequence,
            fusion = accuracies.fusion,
            "Trained model bundle"
        );

        Ok(Self {
            scaler,
            tree,
            suite,
            evaluation,
            accuracies,
            fusion_metrics,
            provenance: dataset.provenance().clone(),
            dataset_fingerprint: dataset.fingerprint(),
            trained_at: Utc::now(),
        })
    }

    /// Scale raw feature rows and run the fused prediction.
    pub fn predict(&self, rows: &[FeatureVector]) -> FusedPredictions {
        self.predict_scaled(&self.scaler.transform(rows))
    }

    pub fn predict_scaled(&self, rows: &[FeatureVector]) -> FusedPredictions {
        predict_scaled(&self.tree, &self.suite, rows)
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn tree(&self) -> &GradientBoostedTrees {
        &self.tree
    }

    pub fn suite(&self) -> &ClassifierSuite {
        &self.suite
    }

    pub fn evaluation(&self) -> &EvaluationSplit {
        &self.evaluation
    }

    pub fn accuracies(&self) -> ModelAccuracies {
        self.accuracies
    }

    pub fn fusion_metrics(&self) -> &ClassificationMetrics {
        &self.fusion_metrics
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn dataset_fingerprint(&self) -> &str {
        &self.dataset_fingerprint
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// Copy of this bundle with the sequence classifier removed.
    pub fn tree_only(&self) -> Self {
        let mut bundle = self.clone();
        bundle.suite = ClassifierSuite::TreeOnly;
        bundle.accuracies.sequence = 0.0;
        bundle.accuracies.fusion = bundle.accuracies.tree;
        bundle
    }
}

fn predict_scaled(
    tree: &GradientBoostedTrees,
    suite: &ClassifierSuite,
    rows: &[FeatureVector],
) -> FusedPredictions {
    let tree_probabilities = tree.predict_probability(rows);
    let tree_labels = tree.predict(rows);
    let sequence = suite.sequence_probabilities(rows);
    FusedPredictions::from_outputs(&tree_probabilities, &tree_labels, sequence.as_deref())
}

#[cfg(feature = "sequence")]
fn fit_suite(
    rows: &[FeatureVector],
    labels: &[u8],
    config: &TrainingConfig,
) -> Result<ClassifierSuite, MlError> {
    use crate::algorithms::sequence::SequenceClassifier;

    if !config.sequence.enabled {
        info!("Sequence classifier disabled by configuration");
        return Ok(ClassifierSuite::TreeOnly);
    }
    let model = SequenceClassifier::fit(rows, labels, &config.sequence)?;
    if !model.is_finite() {
        warn!("Sequence classifier diverged, continuing with trees only");
        return Ok(ClassifierSuite::TreeOnly);
    }
    Ok(ClassifierSuite::TreeAndSequence(model))
}

#[cfg(not(feature = "sequence"))]
fn fit_suite(
    _rows: &[FeatureVector],
    _labels: &[u8],
    _config: &TrainingConfig,
) -> Result<ClassifierSuite, MlError> {
    warn!("Sequence classifier not compiled in, continuing with trees only");
    Ok(ClassifierSuite::TreeOnly)
}
