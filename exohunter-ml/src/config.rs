//! Configuration types for ExoHunter.
//!
//! Uses `figment` for layered configuration: defaults -> user config -> workspace
//! config -> explicit file -> environment. The workspace file lives at
//! `.exohunter/config.toml`; environment variables use the `EXOHUNTER_` prefix with
//! `__` separating nested keys (e.g. `EXOHUNTER_TRAINING__SEED=7`).

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Public KOI cumulative table, CSV flavour.
pub const DEFAULT_CATALOG_URL: &str =
    "https://exoplanetarchive.ipac.caltech.edu/TblView/nph-tblView?config=KOI&format=csv";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExoConfig {
    /// Training dataset acquisition.
    #[serde(default)]
    pub dataset: DatasetConfig,
    /// Classifier training.
    #[serde(default)]
    pub training: TrainingConfig,
    /// Attribution computation.
    #[serde(default)]
    pub explain: ExplainConfig,
    /// PDF report rendering.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Dataset provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Try the remote catalog before generating synthetic data.
    #[serde(default = "default_true")]
    pub use_remote: bool,
    /// Remote catalog URL (CSV with `#` comment lines).
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,
    /// Timeout for the remote fetch in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// Minimum number of cleaned remote rows before the remote table is accepted.
    #[serde(default = "default_min_rows")]
    pub min_rows: usize,
    /// Number of rows produced by the synthetic generator.
    #[serde(default = "default_synthetic_rows")]
    pub synthetic_rows: usize,
    /// Seed for the synthetic generator and the remote shuffle.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            use_remote: true,
            catalog_url: default_catalog_url(),
            fetch_timeout_secs: default_fetch_timeout(),
            min_rows: default_min_rows(),
            synthetic_rows: default_synthetic_rows(),
            seed: default_seed(),
        }
    }
}

fn default_catalog_url() -> String {
    DEFAULT_CATALOG_URL.to_string()
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_min_rows() -> usize {
    500
}

fn default_synthetic_rows() -> usize {
    9000
}

fn default_seed() -> u64 {
    42
}

/// Training pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Fraction of the dataset held out for evaluation.
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    /// Seed for the stratified split.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Gradient-boosted tree settings.
    #[serde(default)]
    pub boosting: BoostingConfig,
    /// Convolutional sequence classifier settings.
    #[serde(default)]
    pub sequence: SequenceConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: default_test_fraction(),
            seed: default_seed(),
            boosting: BoostingConfig::default(),
            sequence: SequenceConfig::default(),
        }
    }
}

fn default_test_fraction() -> f64 {
    0.2
}

/// Gradient-boosted tree hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingConfig {
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,
    #[serde(default = "default_boost_lr")]
    pub learning_rate: f64,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// L2 regularization on leaf weights.
    #[serde(default = "default_one")]
    pub lambda: f64,
    /// Minimum split gain.
    #[serde(default)]
    pub gamma: f64,
    /// Minimum hessian sum per child.
    #[serde(default = "default_one")]
    pub min_child_weight: f64,
    #[serde(default = "default_max_bins")]
    pub max_bins: usize,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_trees: default_n_trees(),
            learning_rate: default_boost_lr(),
            max_depth: default_max_depth(),
            lambda: 1.0,
            gamma: 0.0,
            min_child_weight: 1.0,
            max_bins: default_max_bins(),
        }
    }
}

fn default_n_trees() -> usize {
    100
}

fn default_boost_lr() -> f64 {
    0.3
}

fn default_max_depth() -> usize {
    6
}

fn default_max_bins() -> usize {
    256
}

fn default_one() -> f64 {
    1.0
}

/// Convolutional sequence classifier hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Train the sequence classifier when the `sequence` feature is compiled in.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_filters")]
    pub filters: usize,
    #[serde(default = "default_hidden")]
    pub hidden_units: usize,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_seq_lr")]
    pub learning_rate: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filters: default_filters(),
            hidden_units: default_hidden(),
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            learning_rate: default_seq_lr(),
            seed: default_seed(),
        }
    }
}

fn default_filters() -> usize {
    32
}

fn default_hidden() -> usize {
    32
}

fn default_epochs() -> usize {
    5
}

fn default_batch_size() -> usize {
    32
}

fn default_seq_lr() -> f64 {
    0.001
}

/// Attribution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainConfig {
    /// Compute attributions when the `explain` feature is compiled in.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// PDF report configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Directory holding the TrueType font family. System locations are tried when unset.
    #[serde(default)]
    pub font_dir: Option<PathBuf>,
    /// Font family base name (`<name>-Regular.ttf`, `<name>-Bold.ttf`, ...).
    #[serde(default = "default_font_family")]
    pub font_family: String,
    /// Number of top candidates listed in reports.
    #[serde(default = "default_top_candidates")]
    pub top_candidates: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            font_dir: None,
            font_family: default_font_family(),
            top_candidates: default_top_candidates(),
        }
    }
}

fn default_font_family() -> String {
    "LiberationSans".to_string()
}

fn default_top_candidates() -> usize {
    6
}

fn default_true() -> bool {
    true
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `EXOHUNTER_`)
/// 2. Explicit config file (`--config`)
/// 3. Workspace-local config (`.exohunter/config.toml`)
/// 4. User config (`~/.config/exohunter/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<ExoConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(ExoConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "exohunter", "exohunter") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed("EXOHUNTER_").split("__"));

    figment.extract().map_err(Box::new)
}

/// Location of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".exohunter").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExoConfig::default();
        assert!(config.dataset.use_remote);
        assert_eq!(config.dataset.min_rows, 500);
        assert_eq!(config.dataset.synthetic_rows, 9000);
        assert_eq!(config.dataset.seed, 42);
        assert_eq!(config.training.test_fraction, 0.2);
        assert_eq!(config.training.boosting.n_trees, 100);
        assert_eq!(config.training.sequence.filters, 32);
        assert_eq!(config.training.sequence.epochs, 5);
        assert!(config.explain.enabled);
        assert_eq!(config.report.top_candidates, 6);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: ExoConfig = toml_from_str("[training.boosting]\nn_trees = 10\n");
        assert_eq!(parsed.training.boosting.n_trees, 10);
        assert_eq!(parsed.training.boosting.max_depth, 6);
        assert_eq!(parsed.dataset.fetch_timeout_secs, 30);
    }

    #[test]
    fn test_layering_workspace_then_env() {
        figment::Jail::expect_with(|jail| {
            std::fs::create_dir_all(jail.directory().join(".exohunter"))
                .map_err(|e| e.to_string())?;
            jail.create_file(
                ".exohunter/config.toml",
                "[dataset]\nsynthetic_rows = 1200\nuse_remote = false\n\n[training]\nseed = 3\n",
            )?;
            jail.set_env("EXOHUNTER_TRAINING__SEED", "7");

            let config = load_config(Some(jail.directory()), None).map_err(|e| e.to_string())?;
            assert_eq!(config.dataset.synthetic_rows, 1200);
            assert!(!config.dataset.use_remote);
            assert_eq!(config.training.seed, 7);
            assert_eq!(config.training.boosting.n_trees, 100);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_overrides_workspace() {
        figment::Jail::expect_with(|jail| {
            std::fs::create_dir_all(jail.directory().join(".exohunter"))
                .map_err(|e| e.to_string())?;
            jail.create_file(".exohunter/config.toml", "[explain]\nenabled = true\n")?;
            jail.create_file("override.toml", "[explain]\nenabled = false\n")?;

            let explicit = jail.directory().join("override.toml");
            let config = load_config(Some(jail.directory()), Some(&explicit))
                .map_err(|e| e.to_string())?;
            assert!(!config.explain.enabled);
            Ok(())
        });
    }

    fn toml_from_str(raw: &str) -> ExoConfig {
        Figment::from(Toml::string(raw)).extract().unwrap()
    }
}
