//! Classifiers, fusion and attribution.

pub mod boosting;
pub mod explainability;
pub mod fusion;
#[cfg(feature = "sequence")]
pub mod sequence;
#[cfg(feature = "explain")]
pub mod shap;

pub use boosting::GradientBoostedTrees;
pub use explainability::{ExplainCapability, ExplainabilityReport, Explanation};
pub use fusion::{ClassifierSuite, FusedPredictions, fuse};
#[cfg(feature = "sequence")]
pub use sequence::SequenceClassifier;
