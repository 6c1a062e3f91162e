//! Labeled training dataset.

use crate::features::definition::{FeatureRow, FeatureVector};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Where a dataset came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Provenance {
    /// Cleaned rows from the remote catalog.
    Remote { location: String },
    /// Generated rows.
    Synthetic { seed: u64 },
}

/// Ordered (row, label) pairs. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledDataset {
    rows: Vec<FeatureRow>,
    labels: Vec<u8>,
    provenance: Provenance,
}

impl LabeledDataset {
    /// Build a dataset; `rows` and `labels` must be the same length and labels 0 or 1.
    pub fn new(rows: Vec<FeatureRow>, labels: Vec<u8>, provenance: Provenance) -> Self {
        debug_assert_eq!(rows.len(), labels.len());
        debug_assert!(labels.iter().all(|&l| l <= 1));
        Self {
            rows,
            labels,
            provenance,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.provenance, Provenance::Synthetic { .. })
    }

    pub fn feature_vectors(&self) -> Vec<FeatureVector> {
        self.rows.iter().map(FeatureRow::to_vector).collect()
    }

    pub fn positive_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }

    /// SHA-256 over the exact bit patterns of every row and label.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (row, label) in self.rows.iter().zip(&self.labels) {
            for v in row.to_vector() {
                hasher.update(v.to_bits().to_le_bytes());
            }
            hasher.update([*label]);
        }
        format!("{:x}", hasher.finalize())
    }
}
