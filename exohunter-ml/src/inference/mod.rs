//! Inference: detection over uploads and the shared model cache.

pub mod cache;
pub mod detector;
pub mod result;

pub use cache::ModelCache;
pub use detector::Detector;
pub use result::{
    Candidate, DetectionResult, HISTOGRAM_BINS, HistogramBin, IndividualPredictions,
    PredictionSplit, Verdict,
};
