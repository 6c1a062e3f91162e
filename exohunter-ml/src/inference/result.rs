//! Per-upload detection results and their summaries.

use crate::training::bundle::ModelAccuracies;
use serde::{Deserialize, Serialize};

/// Maximum probability above which positive detections count as confirmed.
pub const CONFIRMED_THRESHOLD: f64 = 0.8;
pub const HISTOGRAM_BINS: usize = 20;

/// Overall outcome of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Confirmed,
    Candidate,
    NoneFound,
}

impl Verdict {
    pub fn headline(self) -> &'static str {
        match self {
            Self::Confirmed => "Exoplanet detected",
            Self::Candidate => "Possible exoplanet candidates",
            Self::NoneFound => "No exoplanets detected",
        }
    }
}

/// Per-model predictions before fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualPredictions {
    pub tree: Vec<u8>,
    /// Mirrors `tree` when no sequence classifier is present.
    pub sequence: Vec<u8>,
}

/// A single row ranked by fused probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub row: usize,
    pub probability: f64,
    pub label: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionSplit {
    pub negatives: usize,
    pub positives: usize,
}

/// Fused predictions over an uploaded table, aligned to its rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub predictions: Vec<u8>,
    pub probabilities: Vec<f64>,
    pub exoplanet_count: usize,
    pub max_probability: f64,
    pub accuracies: ModelAccuracies,
    pub individual: IndividualPredictions,
    pub hybrid: bool,
}

impl DetectionResult {
    pub fn new(
        predictions: Vec<u8>,
        probabilities: Vec<f64>,
        accuracies: ModelAccuracies,
        individual: IndividualPredictions,
        hybrid: bool,
    ) -> Self {
        let exoplanet_count = predictions.iter().filter(|&&l| l == 1).count();
        let max_probability = probabilities.iter().copied().fold(0.0, f64::max);
        Self {
            predictions,
            probabilities,
            exoplanet_count,
            max_probability,
            accuracies,
            individual,
            hybrid,
        }
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn verdict(&self) -> Verdict {
        if self.exoplanet_count == 0 {
            Verdict::NoneFound
        } else if self.max_probability > CONFIRMED_THRESHOLD {
            Verdict::Confirmed
        } else {
            Verdict::Candidate
        }
    }

    /// The `n` most probable rows, highest first; ties keep row order.
    pub fn top_candidates(&self, n: usize) -> Vec<Candidate> {
        let mut ranked: Vec<Candidate> = self
            .probabilities
            .iter()
            .zip(&self.predictions)
            .enumerate()
            .map(|(row, (&probability, &label))| Candidate {
                row,
                probability,
                label,
            })
            .collect();
        ranked.sort_by(|a, b| b.probability.total_cmp(&a.probability).then(a.row.cmp(&b.row)));
        ranked.truncate(n);
        ranked
    }

    /// Counts of fused probabilities in equal-width bins over [0, 1].
    pub fn confidence_histogram(&self, bins: usize) -> Vec<HistogramBin> {
        let bins = bins.max(1);
        let width = 1.0 / bins as f64;
        let mut counts = vec![0usize; bins];
        for &p in &self.probabilities {
            let b = ((p * bins as f64).floor() as usize).min(bins - 1);
            counts[b] += 1;
        }
        counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| HistogramBin {
                lower: i as f64 * width,
                upper: (i + 1) as f64 * width,
                count,
            })
            .collect()
    }

    pub fn prediction_split(&self) -> PredictionSplit {
        PredictionSplit {
            negatives: self.len() - self.exoplanet_count,
            positives: self.exoplanet_count,
        }
    }
}
