//! Property-based tests for fusion, scaling, splitting and result summaries.

use proptest::prelude::*;

use exohunter_ml::algorithms::fusion::{FusedPredictions, fuse};
use exohunter_ml::data::{stratified_split, synthetic};
use exohunter_ml::features::StandardScaler;
use exohunter_ml::inference::{DetectionResult, IndividualPredictions};
use exohunter_ml::training::ModelAccuracies;

fn feature_rows() -> impl Strategy<Value = Vec<[f64; 5]>> {
    prop::collection::vec(prop::array::uniform5(-1e4f64..1e4), 2..60)
}

// --- Fusion properties ---

proptest! {
    #[test]
    fn fusion_is_monotone(
        tree in 0.0f64..=1.0,
        seq in 0.0f64..=1.0,
        dt in 0.0f64..=1.0,
        ds in 0.0f64..=1.0,
    ) {
        let (_, before) = fuse(tree, Some(seq), 0);
        let (_, after) = fuse((tree + dt).min(1.0), Some((seq + ds).min(1.0)), 0);
        prop_assert!(after >= before);
    }

    #[test]
    fn fusion_label_is_strict_threshold(tree in 0.0f64..=1.0, seq in 0.0f64..=1.0) {
        let (label, p) = fuse(tree, Some(seq), 0);
        prop_assert_eq!(label, u8::from(p > 0.5));
        prop_assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn tree_only_fusion_passes_through(p in 0.0f64..=1.0, label in 0u8..=1) {
        prop_assert_eq!(fuse(p, None, label), (label, p));
    }

    #[test]
    fn batch_fusion_preserves_order_and_length(
        probs in prop::collection::vec(0.0f64..=1.0, 0..100),
    ) {
        let labels: Vec<u8> = probs.iter().map(|&p| u8::from(p > 0.5)).collect();
        let fused = FusedPredictions::from_outputs(&probs, &labels, None);
        prop_assert_eq!(fused.len(), probs.len());
        prop_assert_eq!(&fused.probabilities, &probs);
    }
}

#[test]
fn fusion_threshold_boundary() {
    assert_eq!(fuse(0.5, Some(0.5), 1).0, 0);
    assert_eq!(fuse(0.5000001, Some(0.5000001), 0).0, 1);
}

// --- Scaler properties ---

proptest! {
    #[test]
    fn scaled_columns_have_zero_mean_unit_std(rows in feature_rows()) {
        let scaler = StandardScaler::fit(&rows).unwrap();
        let scaled = scaler.transform(&rows);
        let n = rows.len() as f64;
        for f in 0..5 {
            let mean = scaled.iter().map(|r| r[f]).sum::<f64>() / n;
            let var = scaled.iter().map(|r| (r[f] - mean).powi(2)).sum::<f64>() / n;
            prop_assert!(mean.abs() < 1e-6);
            // Constant columns are centered but not scaled.
            prop_assert!((var.sqrt() - 1.0).abs() < 1e-6 || var < 1e-12);
        }
    }

    #[test]
    fn constant_column_scales_to_zero(value in -1e6f64..1e6, n in 1usize..50) {
        let rows = vec![[value, 1.0, 2.0, 3.0, 4.0]; n];
        let scaled = StandardScaler::fit(&rows).unwrap().transform(&rows);
        prop_assert!(scaled.iter().flatten().all(|&v| v == 0.0));
    }
}

// --- Split and generation ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn split_partitions_every_row(seed in any::<u64>(), n in 10usize..400) {
        let labels: Vec<u8> = (0..n).map(|i| u8::from(i % 3 == 0)).collect();
        let split = stratified_split(&labels, 0.2, seed).unwrap();
        prop_assert_eq!(split.test.len(), (0.2 * n as f64).ceil() as usize);
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        prop_assert_eq!(all, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn synthetic_generation_is_deterministic(seed in any::<u64>()) {
        let a = synthetic::generate(200, seed).unwrap();
        let b = synthetic::generate(200, seed).unwrap();
        prop_assert_eq!(a.fingerprint(), b.fingerprint());
        prop_assert_eq!(a.labels(), b.labels());
    }
}

// --- Result summaries ---

proptest! {
    #[test]
    fn histogram_counts_every_row(probs in prop::collection::vec(0.0f64..=1.0, 0..200)) {
        let labels: Vec<u8> = probs.iter().map(|&p| u8::from(p > 0.5)).collect();
        let result = DetectionResult::new(
            labels.clone(),
            probs.clone(),
            ModelAccuracies { tree: 0.0, sequence: 0.0, fusion: 0.0 },
            IndividualPredictions { tree: labels.clone(), sequence: labels },
            false,
        );
        let hist = result.confidence_histogram(20);
        prop_assert_eq!(hist.iter().map(|b| b.count).sum::<usize>(), probs.len());
        let split = result.prediction_split();
        prop_assert_eq!(split.positives + split.negatives, probs.len());
        let top = result.top_candidates(6);
        prop_assert!(top.windows(2).all(|w| w[0].probability >= w[1].probability));
    }
}
