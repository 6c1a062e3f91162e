//! Stratified train/test split.

use crate::error::MlError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Row indices of each side of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split indices so both sides keep the label proportions of `labels`.
///
/// The test side has `ceil(test_fraction * n)` rows, apportioned across classes by
/// largest remainder. Each class is shuffled with a generator seeded from `seed`.
pub fn stratified_split(
    labels: &[u8],
    test_fraction: f64,
    seed: u64,
) -> Result<SplitIndices, MlError> {
    if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
        return Err(MlError::invalid_input(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }
    let n = labels.len();
    let n_test = (test_fraction * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(MlError::training(format!(
            "cannot hold out {n_test} of {n} rows"
        )));
    }

    let classes: [Vec<usize>; 2] = [
        (0..n).filter(|&i| labels[i] == 0).collect(),
        (0..n).filter(|&i| labels[i] != 0).collect(),
    ];

    // Largest-remainder apportionment of the test rows.
    let exact: Vec<f64> = classes
        .iter()
        .map(|c| c.len() as f64 * n_test as f64 / n as f64)
        .collect();
    let mut quota: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();
    let mut remaining = n_test - quota.iter().sum::<usize>();
    let mut order: Vec<usize> = (0..classes.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });
    for &c in &order {
        if remaining == 0 {
            break;
        }
        if quota[c] < classes[c].len() {
            quota[c] += 1;
            remaining -= 1;
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (class, &q) in classes.into_iter().zip(&quota) {
        let mut class = class;
        class.shuffle(&mut rng);
        test.extend_from_slice(&class[..q]);
        train.extend_from_slice(&class[q..]);
    }
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    Ok(SplitIndices { train, test })
}
