//! Lazily trained, process-wide model bundle.

use crate::config::TrainingConfig;
use crate::data::provider::DatasetProvider;
use crate::error::MlError;
use crate::training::bundle::TrainedModelBundle;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::info;

/// Trains the bundle on first request and hands out the same `Arc` afterwards.
///
/// Concurrent first callers wait on a single training run. A failed run leaves
/// the cache empty, so the next call trains again.
pub struct ModelCache {
    provider: DatasetProvider,
    training: TrainingConfig,
    cell: OnceCell<Arc<TrainedModelBundle>>,
}

impl ModelCache {
    pub fn new(provider: DatasetProvider, training: TrainingConfig) -> Self {
        Self {
            provider,
            training,
            cell: OnceCell::new(),
        }
    }

    /// Cache seeded with an already trained bundle.
    pub fn with_bundle(
        provider: DatasetProvider,
        training: TrainingConfig,
        bundle: Arc<TrainedModelBundle>,
    ) -> Self {
        Self {
            provider,
            training,
            cell: OnceCell::new_with(Some(bundle)),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    pub async fn get(&self) -> Result<Arc<TrainedModelBundle>, MlError> {
        self.cell
            .get_or_try_init(|| self.train())
            .await
            .map(Arc::clone)
    }

    async fn train(&self) -> Result<Arc<TrainedModelBundle>, MlError> {
        let started = Instant::now();
        let dataset = self.provider.provide().await?;
        let config = self.training.clone();
        let bundle = tokio::task::spawn_blocking(move || TrainedModelBundle::train(&dataset, &config))
            .await
            .map_err(|e| MlError::training(format!("training task failed: {e}")))??;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Model bundle ready"
        );
        Ok(Arc::new(bundle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoostingConfig, DatasetConfig, SequenceConfig};

    fn cache(rows: usize) -> ModelCache {
        let provider = DatasetProvider::synthetic_only(DatasetConfig {
            synthetic_rows: rows,
            ..DatasetConfig::default()
        });
        let training = TrainingConfig {
            boosting: BoostingConfig {
                n_trees: 5,
                ..BoostingConfig::default()
            },
            sequence: SequenceConfig {
                enabled: false,
                ..SequenceConfig::default()
            },
            ..TrainingConfig::default()
        };
        ModelCache::new(provider, training)
    }

    #[tokio::test]
    async fn test_trains_once_and_shares() {
        let cache = Arc::new(cache(600));
        assert!(!cache.is_initialized());

        let (a, b) = tokio::join!(cache.get(), cache.get());
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));

        let c = cache.get().await.unwrap();
        assert!(Arc::ptr_eq(&a, &c));
        assert!(cache.is_initialized());
    }

    #[tokio::test]
    async fn test_failure_leaves_cache_empty() {
        let cache = cache(100);
        assert!(cache.get().await.is_err());
        assert!(!cache.is_initialized());
    }

    #[tokio::test]
    async fn test_seeded_cache_skips_training() {
        let trained = cache(600).get().await.unwrap();
        let seeded = ModelCache::with_bundle(
            DatasetProvider::synthetic_only(DatasetConfig::default()),
            TrainingConfig::default(),
            Arc::clone(&trained),
        );
        assert!(seeded.is_initialized());
        assert!(Arc::ptr_eq(&seeded.get().await.unwrap(), &trained));
    }
}
