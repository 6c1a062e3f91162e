//! Training metrics tracking.

use serde::{Deserialize, Serialize};

/// Per-epoch loss history of an iterative fit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub epochs_completed: usize,
    pub loss_history: Vec<f64>,
    pub val_loss_history: Vec<f64>,
    pub best_epoch: Option<usize>,
    pub best_loss: Option<f64>,
}

impl TrainingMetrics {
    pub fn record_epoch(&mut self, loss: f64, val_loss: Option<f64>) {
        self.loss_history.push(loss);
        if let Some(vl) = val_loss {
            self.val_loss_history.push(vl);
        }
        self.epochs_completed += 1;

        let check_loss = val_loss.unwrap_or(loss);
        if self.best_loss.is_none_or(|best| check_loss < best) {
            self.best_loss = Some(check_loss);
            self.best_epoch = Some(self.epochs_completed);
        }
    }
}

/// Binary classification metrics against held-out labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// `[[tn, fp], [fn, tp]]`
    pub confusion_matrix: [[usize; 2]; 2],
}

impl ClassificationMetrics {
    pub fn from_predictions(labels: &[u8], predicted: &[u8]) -> Self {
        let mut cm = [[0usize; 2]; 2];
        for (&y, &p) in labels.iter().zip(predicted) {
            cm[usize::from(y != 0)][usize::from(p != 0)] += 1;
        }
        let [[tn, fp], [fn_, tp]] = cm;
        let total = tn + fp + fn_ + tp;
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            accuracy: ratio(tp + tn, total),
            precision,
            recall,
            f1_score,
            confusion_matrix: cm,
        }
    }
}

/// Fraction of positions where `predicted` equals `labels`.
pub fn accuracy(labels: &[u8], predicted: &[u8]) -> f64 {
    ClassificationMetrics::from_predictions(labels, predicted).accuracy
}
