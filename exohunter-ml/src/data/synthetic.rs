//! Deterministic synthetic transit catalog.
//!
//! Columns are drawn one at a time from a single seeded generator, so a given
//! `(n, seed)` always yields the same dataset bit for bit.

use crate::data::dataset::{LabeledDataset, Provenance};
use crate::error::MlError;
use crate::features::definition::FeatureRow;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Distribution, Exp, Normal, StandardNormal, Uniform};

const PERIOD_RANGE: (f64, f64) = (0.3, 500.0);
const DEPTH_SCALE: f64 = 200.0;
const DEPTH_DIVISOR: f64 = 1e5;
const RADIUS_CENTER: f64 = 1.2;
const LABEL_NOISE: f64 = 0.1;
const LABEL_THRESHOLD: f64 = 0.5;

/// Generate `n` labeled rows from `seed`.
pub fn generate(n: usize, seed: u64) -> Result<LabeledDataset, MlError> {
    let mut rng = StdRng::seed_from_u64(seed);

    let log_period: Uniform<f64> = Uniform::new(PERIOD_RANGE.0.log10(), PERIOD_RANGE.1.log10());
    let depth: Exp<f64> = Exp::new(1.0 / DEPTH_SCALE).map_err(dist_err)?;
    let duration: Normal<f64> = Normal::new(3.0, 1.0).map_err(dist_err)?;
    let impact: Beta<f64> = Beta::new(2.0, 2.0).map_err(dist_err)?;
    let radius: Normal<f64> = Normal::new(2.0, 1.0).map_err(dist_err)?;

    let periods: Vec<f64> = (0..n)
        .map(|_| 10f64.powf(log_period.sample(&mut rng)))
        .collect();
    let depths: Vec<f64> = (0..n)
        .map(|_| depth.sample(&mut rng) / DEPTH_DIVISOR)
        .collect();
    let durations: Vec<f64> = (0..n)
        .map(|_| duration.sample(&mut rng).clamp(0.1, 20.0))
        .collect();
    let impacts: Vec<f64> = (0..n)
        .map(|_| impact.sample(&mut rng).clamp(0.0, 1.0))
        .collect();
    let radii: Vec<f64> = (0..n)
        .map(|_| radius.sample(&mut rng).clamp(0.1, 20.0))
        .collect();

    let scores: Vec<f64> = (0..n)
        .map(|i| detectability(depths[i], radii[i], periods[i]))
        .collect();
    let normalized = min_max(&scores);

    let labels: Vec<u8> = normalized
        .iter()
        .map(|p| {
            let noise: f64 = rng.sample(StandardNormal);
            u8::from(p + LABEL_NOISE * noise > LABEL_THRESHOLD)
        })
        .collect();

    let rows = (0..n)
        .map(|i| {
            FeatureRow::from_vector([periods[i], depths[i], durations[i], impacts[i], radii[i]])
        })
        .collect();

    Ok(LabeledDataset::new(
        rows,
        labels,
        Provenance::Synthetic { seed },
    ))
}

/// Deeper transits around larger planets on shorter orbits are easier to detect.
fn detectability(depth: f64, radius: f64, period: f64) -> f64 {
    let size = 1.0 / (1.0 + (-(radius - RADIUS_CENTER)).exp());
    let damping = 1.0 / (1.0 + period.ln_1p());
    depth * DEPTH_DIVISOR * size * damping
}

fn min_max(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    if !span.is_finite() || span <= 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - min) / span).collect()
}

fn dist_err(e: impl std::fmt::Display) -> MlError {
    MlError::dataset(format!("invalid distribution parameters: {e}"))
}
