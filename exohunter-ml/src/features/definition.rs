//! The five transit features and their summary statistics.

use serde::{Deserialize, Serialize};

/// Number of feature slots every model consumes.
pub const FEATURE_COUNT: usize = 5;

/// Canonical column names, in slot order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "koi_period",
    "koi_depth",
    "koi_duration",
    "koi_impact",
    "koi_prad",
];

/// A feature row in slot order, as consumed by the scaler and classifiers.
pub type FeatureVector = [f64; FEATURE_COUNT];

/// One candidate's transit measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Orbital period in days.
    pub period: f64,
    /// Fractional transit depth.
    pub depth: f64,
    /// Transit duration in hours.
    pub duration: f64,
    /// Impact parameter, in [0, 1].
    pub impact: f64,
    /// Planet radius in Earth radii.
    pub radius: f64,
}

impl FeatureRow {
    pub fn from_vector(values: FeatureVector) -> Self {
        let [period, depth, duration, impact, radius] = values;
        Self {
            period,
            depth,
            duration,
            impact,
            radius,
        }
    }

    pub fn to_vector(&self) -> FeatureVector {
        [
            self.period,
            self.depth,
            self.duration,
            self.impact,
            self.radius,
        ]
    }

    pub fn is_complete(&self) -> bool {
        self.to_vector().iter().all(|v| v.is_finite())
    }
}

/// Summary statistics for a numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionStats {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl DistributionStats {
    /// Compute statistics over the finite values; `None` when there are none.
    ///
    /// `std_dev` is the sample standard deviation (n - 1), zero for a single value.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        let count = finite.len();
        let mean = finite.iter().sum::<f64>() / count as f64;
        let std_dev = if count > 1 {
            let ss = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
            (ss / (count - 1) as f64).sqrt()
        } else {
            0.0
        };
        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            count,
            mean,
            std_dev,
            min,
            max,
            median: median(&finite).unwrap_or(mean),
        })
    }
}

/// Median of the finite values (mean of the two middle values for even counts).
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_vector_order() {
        let row = FeatureRow::from_vector([1.0, 2.0, 3.0, 0.4, 5.0]);
        assert_eq!(row.period, 1.0);
        assert_eq!(row.radius, 5.0);
        assert_eq!(row.to_vector(), [1.0, 2.0, 3.0, 0.4, 5.0]);
        assert!(row.is_complete());
        assert!(!FeatureRow::from_vector([f64::NAN, 0.0, 0.0, 0.0, 0.0]).is_complete());
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[f64::NAN, 5.0]), Some(5.0));
        assert_eq!(median(&[f64::NAN]), None);
    }

    #[test]
    fn test_distribution_stats() {
        let stats = DistributionStats::from_values(&[1.0, 2.0, 3.0, f64::NAN]).unwrap();
        assert_eq!(stats.count, 3);
        assert!((stats.mean - 2.0).abs() < 1e-12);
        assert!((stats.std_dev - 1.0).abs() < 1e-12);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
        assert_eq!(stats.median, 2.0);
        assert!(DistributionStats::from_values(&[]).is_none());
    }
}
