//! Feature definitions and the standard scaler.

pub mod definition;
pub mod scaler;

pub use definition::{DistributionStats, FEATURE_COUNT, FEATURE_NAMES, FeatureRow, FeatureVector};
pub use scaler::StandardScaler;
