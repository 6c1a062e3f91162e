//! Zero-mean, unit-variance feature scaling.

use crate::error::MlError;
use crate::features::definition::{FEATURE_COUNT, FEATURE_NAMES, FeatureVector};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Per-column standardization fitted once on the training split.
///
/// Constant columns get a scale of 1, so they are centered but never divided by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: FeatureVector,
    pub scale: FeatureVector,
}

impl StandardScaler {
    /// Fit column means and population standard deviations.
    pub fn fit(rows: &[FeatureVector]) -> Result<Self, MlError> {
        if rows.is_empty() {
            return Err(MlError::training("cannot fit scaler on an empty split"));
        }
        let n = rows.len() as f64;
        let mut mean = [0.0; FEATURE_COUNT];
        let mut min = [f64::INFINITY; FEATURE_COUNT];
        let mut max = [f64::NEG_INFINITY; FEATURE_COUNT];
        for row in rows {
            for j in 0..FEATURE_COUNT {
                mean[j] += row[j];
                min[j] = min[j].min(row[j]);
                max[j] = max[j].max(row[j]);
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut scale = [0.0; FEATURE_COUNT];
        for row in rows {
            for j in 0..FEATURE_COUNT {
                scale[j] += (row[j] - mean[j]).powi(2);
            }
        }
        for (j, s) in scale.iter_mut().enumerate() {
            let std = (*s / n).sqrt();
            if !std.is_finite() {
                return Err(MlError::training(format!(
                    "non-finite values in column {}",
                    FEATURE_NAMES[j]
                )));
            }
            // A summed mean can be off by rounding; constancy comes from the range.
            *s = if max[j] == min[j] || std <= f64::EPSILON {
                warn!(column = FEATURE_NAMES[j], "zero-variance column, leaving unscaled");
                if max[j] == min[j] {
                    mean[j] = min[j];
                }
                1.0
            } else {
                std
            };
        }

        Ok(Self { mean, scale })
    }

    pub fn transform_row(&self, row: &FeatureVector) -> FeatureVector {
        let mut out = [0.0; FEATURE_COUNT];
        for j in 0..FEATURE_COUNT {
            out[j] = (row[j] - self.mean[j]) / self.scale[j];
        }
        out
    }

    pub fn transform(&self, rows: &[FeatureVector]) -> Vec<FeatureVector> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }
}
