//! Fusion of tree and sequence classifier outputs.

#[cfg(feature = "sequence")]
use crate::algorithms::sequence::SequenceClassifier;
use crate::features::definition::FeatureVector;
use serde::{Deserialize, Serialize};

/// Fused probabilities above this are labeled 1.
pub const FUSION_THRESHOLD: f64 = 0.5;

/// Which classifiers take part in a prediction. Decided once when models are trained.
#[derive(Debug, Clone)]
pub enum ClassifierSuite {
    TreeOnly,
    #[cfg(feature = "sequence")]
    TreeAndSequence(SequenceClassifier),
}

impl ClassifierSuite {
    pub fn is_hybrid(&self) -> bool {
        !matches!(self, Self::TreeOnly)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TreeOnly => "tree_only",
            #[cfg(feature = "sequence")]
            Self::TreeAndSequence(_) => "tree_and_sequence",
        }
    }

    /// Sequence classifier probabilities, or `None` without one.
    pub fn sequence_probabilities(&self, rows: &[FeatureVector]) -> Option<Vec<f64>> {
        match self {
            Self::TreeOnly => None,
            #[cfg(feature = "sequence")]
            Self::TreeAndSequence(model) => Some(model.predict_probability(rows)),
        }
    }
}

/// Fuse one row.
///
/// With a sequence probability the two are averaged and thresholded strictly
/// at 0.5. Without one the tree probability and the tree's own label pass
/// through unchanged.
pub fn fuse(tree_probability: f64, sequence_probability: Option<f64>, tree_label: u8) -> (u8, f64) {
    match sequence_probability {
        Some(seq) => {
            let p = (tree_probability + seq) / 2.0;
            (u8::from(p > FUSION_THRESHOLD), p)
        }
        None => (tree_label, tree_probability),
    }
}

/// Row-aligned outputs of a fused prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedPredictions {
    pub labels: Vec<u8>,
    pub probabilities: Vec<f64>,
    pub tree_labels: Vec<u8>,
    /// Mirrors `tree_labels` when no sequence classifier is present.
    pub sequence_labels: Vec<u8>,
}

impl FusedPredictions {
    pub fn from_outputs(
        tree_probabilities: &[f64],
        tree_labels: &[u8],
        sequence_probabilities: Option<&[f64]>,
    ) -> Self {
        let (labels, probabilities) = tree_probabilities
            .iter()
            .zip(tree_labels)
            .enumerate()
            .map(|(i, (&tp, &tl))| fuse(tp, sequence_probabilities.map(|s| s[i]), tl))
            .unzip();
        let sequence_labels = match sequence_probabilities {
            Some(seq) => seq.iter().map(|&p| u8::from(p > FUSION_THRESHOLD)).collect(),
            None => tree_labels.to_vec(),
        };
        Self {
            labels,
            probabilities,
            tree_labels: tree_labels.to_vec(),
            sequence_labels,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
