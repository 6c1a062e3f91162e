//! # exohunter-ml: hybrid exoplanet classification
//!
//! Trains a gradient-boosted tree ensemble and, when available, a small 1-D
//! convolutional network on transit features, fuses their probabilities and
//! classifies uploaded candidate tables.
//!
//! ## Pipeline
//! 1. **Data**: remote catalog with synthetic fallback, upload parsing and schema matching
//! 2. **Features**: the five transit features and a standard scaler
//! 3. **Training**: the immutable [`TrainedModelBundle`]
//! 4. **Inference**: [`Detector`] over uploads, [`ModelCache`] for lazy training
//! 5. **Explainability**: TreeSHAP attributions
//! 6. **Report**: verdict, candidates, insights and PDF rendering
//!
//! The sequence classifier and attributions sit behind the `sequence` and
//! `explain` cargo features.

pub mod algorithms;
pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod inference;
pub mod report;
pub mod training;

pub use algorithms::{ClassifierSuite, ExplainCapability, Explanation, GradientBoostedTrees};
pub use config::{ExoConfig, load_config};
pub use data::{DataTable, DatasetInsights, DatasetProvider, LabeledDataset, MatchedSchema};
pub use error::{MlError, SchemaError};
pub use features::{FEATURE_NAMES, FeatureRow, FeatureVector, StandardScaler};
pub use inference::{DetectionResult, Detector, ModelCache, Verdict};
pub use report::{DetectionReport, ReportInputs};
pub use training::{ModelAccuracies, TrainedModelBundle};
