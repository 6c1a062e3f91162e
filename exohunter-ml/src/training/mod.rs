//! Model training: the trained bundle and evaluation metrics.

pub mod bundle;
pub mod metrics;

pub use bundle::{EvaluationSplit, MIN_TRAINING_ROWS, ModelAccuracies, TrainedModelBundle};
pub use metrics::{ClassificationMetrics, TrainingMetrics};
