//! Training dataset acquisition: remote catalog with synthetic fallback.

use crate::config::DatasetConfig;
use crate::data::dataset::{LabeledDataset, Provenance};
use crate::data::source::{CatalogSource, HttpCatalogSource};
use crate::data::synthetic;
use crate::data::table::DataTable;
use crate::error::MlError;
use crate::features::definition::{FEATURE_COUNT, FEATURE_NAMES, FeatureRow, median};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Disposition column of the remote catalog.
pub const DISPOSITION_COLUMN: &str = "koi_disposition";

/// Dispositions kept when cleaning the catalog (after uppercasing).
pub const RECOGNIZED_DISPOSITIONS: &[&str] = &[
    "CANDIDATE",
    "CONFIRMED",
    "FALSE POSITIVE",
    "FALSE_POSITIVE",
    "FALSE_POS",
];

/// Produces the labeled training dataset.
pub struct DatasetProvider {
    config: DatasetConfig,
    source: Option<Arc<dyn CatalogSource>>,
}

impl DatasetProvider {
    /// Provider using the configured HTTP catalog, unless remote loading is disabled.
    pub fn from_config(config: DatasetConfig) -> Self {
        let source: Option<Arc<dyn CatalogSource>> = if config.use_remote {
            Some(Arc::new(HttpCatalogSource::new(
                config.catalog_url.clone(),
                Duration::from_secs(config.fetch_timeout_secs),
            )))
        } else {
            None
        };
        Self { config, source }
    }

    /// Provider with an injected catalog source.
    pub fn with_source(config: DatasetConfig, source: Arc<dyn CatalogSource>) -> Self {
        Self {
            config,
            source: Some(source),
        }
    }

    /// Provider that always generates synthetic data.
    pub fn synthetic_only(config: DatasetConfig) -> Self {
        Self {
            config,
            source: None,
        }
    }

    /// Load the remote catalog, falling back to synthetic generation on any failure.
    pub async fn provide(&self) -> Result<LabeledDataset, MlError> {
        if let Some(source) = &self.source {
            match self.load_remote(source.as_ref()).await {
                Ok(dataset) => {
                    info!(
                        rows = dataset.len(),
                        positives = dataset.positive_count(),
                        "Loaded remote catalog"
                    );
                    return Ok(dataset);
                }
                Err(e) => {
                    warn!(error = %e, "Remote catalog unavailable, generating synthetic dataset");
                }
            }
        }

        let dataset = synthetic::generate(self.config.synthetic_rows, self.config.seed)?;
        info!(
            rows = dataset.len(),
            positives = dataset.positive_count(),
            seed = self.config.seed,
            "Generated synthetic dataset"
        );
        Ok(dataset)
    }

    async fn load_remote(&self, source: &dyn CatalogSource) -> Result<LabeledDataset, MlError> {
        let body = source.fetch().await?;
        let location = source.source_info().location;
        clean_catalog(&body, &location, self.config.seed, self.config.min_rows)
    }
}

/// Clean raw catalog CSV into a labeled dataset.
///
/// Keeps rows with a recognized disposition, labels any disposition containing
/// `FALSE` as 0, imputes feature medians, drops rows that remain incomplete and
/// shuffles with `seed`. Fails when the disposition column is absent or fewer than
/// `min_rows` rows survive.
pub fn clean_catalog(
    body: &str,
    location: &str,
    seed: u64,
    min_rows: usize,
) -> Result<LabeledDataset, MlError> {
    let table = DataTable::from_csv_str(body)?;
    let disposition_col = table
        .column_index(DISPOSITION_COLUMN)
        .ok_or_else(|| MlError::dataset("disposition column missing from catalog"))?;

    let kept: Vec<usize> = (0..table.row_count())
        .filter(|&r| {
            let disposition = table.rows[r][disposition_col].to_uppercase();
            RECOGNIZED_DISPOSITIONS.iter().any(|d| *d == disposition)
        })
        .collect();

    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(FEATURE_COUNT);
    for name in FEATURE_NAMES {
        let values = match table.column_index(name) {
            Some(col) => {
                let mut values: Vec<f64> = kept
                    .iter()
                    .map(|&r| {
                        table
                            .cell(r, col)
                            .and_then(|c| c.parse::<f64>().ok())
                            .unwrap_or(f64::NAN)
                    })
                    .collect();
                if let Some(fill) = median(&values) {
                    values
                        .iter_mut()
                        .filter(|v| !v.is_finite())
                        .for_each(|v| *v = fill);
                }
                values
            }
            None => vec![0.0; kept.len()],
        };
        columns.push(values);
    }

    let mut pairs: Vec<(FeatureRow, u8)> = kept
        .iter()
        .enumerate()
        .map(|(i, &r)| {
            let row = FeatureRow::from_vector([
                columns[0][i],
                columns[1][i],
                columns[2][i],
                columns[3][i],
                columns[4][i],
            ]);
            let label = u8::from(!table.rows[r][disposition_col].to_uppercase().contains("FALSE"));
            (row, label)
        })
        .filter(|(row, _)| row.is_complete())
        .collect();

    pairs.shuffle(&mut StdRng::seed_from_u64(seed));

    if pairs.len() < min_rows {
        return Err(MlError::dataset(format!(
            "catalog too small after cleaning: {} rows, {} required",
            pairs.len(),
            min_rows
        )));
    }

    let (rows, labels): (Vec<FeatureRow>, Vec<u8>) = pairs.into_iter().unzip();
    Ok(LabeledDataset::new(
        rows,
        labels,
        Provenance::Remote {
            location: location.to_string(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::source::InMemoryCatalogSource;

    fn catalog(rows: usize, with_disposition: bool) -> String {
        let mut out = String::from("# KOI cumulative table\n# generated for tests\n");
        if with_disposition {
            out.push_str("kepid,koi_disposition,koi_period,koi_depth,koi_duration,koi_impact,koi_prad\n");
        } else {
            out.push_str("kepid,koi_period,koi_depth,koi_duration,koi_impact,koi_prad\n");
        }
        let dispositions = ["CONFIRMED", "False Positive", "CANDIDATE", "NOT DISPOSITIONED"];
        for i in 0..rows {
            let period = if i % 10 == 3 { String::new() } else { format!("{}", 1.0 + i as f64) };
            if with_disposition {
                out.push_str(&format!(
                    "{i},{},{period},{},2.5,0.4,1.1\n",
                    dispositions[i % 4],
                    0.001 * (i % 5) as f64
                ));
            } else {
                out.push_str(&format!("{i},{period},0.002,2.5,0.4,1.1\n"));
            }
        }
        out
    }

    fn small_config() -> DatasetConfig {
        DatasetConfig {
            synthetic_rows: 600,
            ..DatasetConfig::default()
        }
    }

    #[test]
    fn test_clean_catalog_filters_and_labels() {
        let ds = clean_catalog(&catalog(800, true), "memory", 42, 500).unwrap();
        // One in four rows carries an unrecognized disposition.
        assert_eq!(ds.len(), 600);
        assert_eq!(ds.positive_count(), 400);
        assert!(ds.rows().iter().all(FeatureRow::is_complete));
        assert!(!ds.is_synthetic());
    }

    #[test]
    fn test_clean_catalog_rejects_missing_disposition() {
        let err = clean_catalog(&catalog(800, false), "memory", 42, 500).unwrap_err();
        assert!(err.to_string().contains("disposition"));
    }

    #[test]
    fn test_clean_catalog_rejects_small_tables() {
        assert!(clean_catalog(&catalog(100, true), "memory", 42, 500).is_err());
    }

    #[test]
    fn test_clean_catalog_absent_feature_column_is_zero() {
        let body = "koi_disposition,koi_period,koi_depth,koi_duration,koi_impact\n\
                    CONFIRMED,1,0.1,2,0.3\n\
                    FALSE POSITIVE,2,0.2,3,0.4\n";
        let ds = clean_catalog(body, "memory", 1, 2).unwrap();
        assert!(ds.rows().iter().all(|r| r.radius == 0.0));
    }

    #[tokio::test]
    async fn test_provider_uses_remote_when_valid() {
        let source = Arc::new(InMemoryCatalogSource::new(catalog(800, true)));
        let provider = DatasetProvider::with_source(small_config(), source);
        let ds = provider.provide().await.unwrap();
        assert_eq!(
            ds.provenance(),
            &Provenance::Remote {
                location: "memory://catalog".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_provider_falls_back_on_failure() {
        for source in [
            InMemoryCatalogSource::failing("connection reset"),
            InMemoryCatalogSource::new(catalog(800, false)),
            InMemoryCatalogSource::new(catalog(50, true)),
            InMemoryCatalogSource::new("<html>maintenance</html>"),
        ] {
            let provider = DatasetProvider::with_source(small_config(), Arc::new(source));
            let ds = provider.provide().await.unwrap();
            assert!(ds.is_synthetic());
            assert_eq!(ds.len(), 600);
        }
    }

    #[tokio::test]
    async fn test_provider_falls_back_when_fetch_hangs() {
        let source = Arc::new(HttpCatalogSource::new(
            crate::data::source::silent_catalog_url(),
            Duration::from_secs(1),
        ));
        let provider = DatasetProvider::with_source(small_config(), source);
        let started = std::time::Instant::now();
        let ds = provider.provide().await.unwrap();
        assert!(ds.is_synthetic());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_synthetic_only_provider() {
        let provider = DatasetProvider::synthetic_only(small_config());
        let ds = provider.provide().await.unwrap();
        assert_eq!(ds.provenance(), &Provenance::Synthetic { seed: 42 });
    }
}
