//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use exohunter_ml::algorithms::{ExplainCapability, Explanation};
use exohunter_ml::config::{ExoConfig, load_config, workspace_config_path};
use exohunter_ml::data::{DataTable, DatasetInsights, DatasetProvider, Provenance};
use exohunter_ml::inference::{DetectionResult, Detector, ModelCache};
use exohunter_ml::report::{DetectionReport, ReportInputs};
use std::path::Path;
use tracing::warn;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Train => handle_train(&load(workspace, config_path)?).await,
        Commands::Detect { csv, json } => {
            handle_detect(&load(workspace, config_path)?, &csv, json).await
        }
        Commands::Explain { csv, json } => {
            handle_explain(&load(workspace, config_path)?, &csv, json).await
        }
        Commands::Insights { csv, json } => handle_insights(&csv, json),
        Commands::Report { csv, output } => {
            handle_report(&load(workspace, config_path)?, &csv, &output).await
        }
        Commands::Config { action } => handle_config(action, workspace, config_path),
    }
}

fn load(workspace: &Path, config_path: Option<&Path>) -> anyhow::Result<ExoConfig> {
    load_config(Some(workspace), config_path)
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let path = workspace_config_path(workspace);
            if path.exists() {
                println!("Configuration file already exists at: {}", path.display());
                return Ok(());
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let toml_str = toml::to_string_pretty(&ExoConfig::default())?;
            std::fs::write(&path, &toml_str)?;
            println!("Created default configuration at: {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace, config_path)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Train (or fetch from the cache) the bundle and wrap it in a detector.
async fn build_detector(config: &ExoConfig) -> anyhow::Result<Detector> {
    let provider = DatasetProvider::from_config(config.dataset.clone());
    let cache = ModelCache::new(provider, config.training.clone());
    let bundle = cache.get().await?;
    Ok(Detector::new(bundle, ExplainCapability::detect(&config.explain)))
}

fn read_table(csv: &Path) -> anyhow::Result<DataTable> {
    DataTable::from_path(csv)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", csv.display(), e))
}

async fn handle_train(config: &ExoConfig) -> anyhow::Result<()> {
    let detector = build_detector(config).await?;
    let bundle = detector.bundle();
    let acc = bundle.accuracies();
    let metrics = bundle.fusion_metrics();

    println!("Training data: {}", describe_provenance(bundle.provenance()));
    println!("Dataset fingerprint: {}", bundle.dataset_fingerprint());
    println!("Classifier suite: {}", bundle.suite().name());
    println!("Held-out rows: {}", bundle.evaluation().len());
    println!();
    println!("  Tree accuracy:     {:.4}", acc.tree);
    println!("  Sequence accuracy: {:.4}", acc.sequence);
    println!("  Fused accuracy:    {:.4}", acc.fusion);
    println!(
        "  Fused precision {:.4}, recall {:.4}, F1 {:.4}",
        metrics.precision, metrics.recall, metrics.f1_score
    );
    Ok(())
}

async fn handle_detect(config: &ExoConfig, csv: &Path, json: bool) -> anyhow::Result<()> {
    let table = read_table(csv)?;
    let detector = build_detector(config).await?;
    let result = detector.detect(&table)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    print_detection(&result, config.report.top_candidates);
    Ok(())
}

fn print_detection(result: &DetectionResult, top: usize) {
    println!("{}", result.verdict().headline());
    println!(
        "  {} of {} objects classified as exoplanets (max probability {:.1}%)",
        result.exoplanet_count,
        result.len(),
        result.max_probability * 100.0
    );
    let acc = result.accuracies;
    if result.hybrid {
        println!(
            "  Model accuracy: tree {:.1}%, sequence {:.1}%, fused {:.1}%",
            acc.tree * 100.0,
            acc.sequence * 100.0,
            acc.fusion * 100.0
        );
    } else {
        println!("  Model accuracy: tree {:.1}% (sequence classifier unavailable)", acc.tree * 100.0);
    }

    println!();
    println!("Top candidates:");
    for (rank, c) in result.top_candidates(top).iter().enumerate() {
        println!(
            "  {}. row {:>5}  p = {:.3}  {}",
            rank + 1,
            c.row,
            c.probability,
            if c.label == 1 { "exoplanet" } else { "-" }
        );
    }
}

async fn handle_explain(config: &ExoConfig, csv: &Path, json: bool) -> anyhow::Result<()> {
    let table = read_table(csv)?;
    let detector = build_detector(config).await?;
    let explanation = detector.explain(&table)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&explanation)?);
        return Ok(());
    }
    match explanation {
        Explanation::Unavailable => println!("Explainability unavailable"),
        Explanation::Available(report) => {
            println!("Feature importance (mean |SHAP|, log-odds):");
            for (name, value) in report.ranking() {
                println!("  {:<14} {:.4}", name, value);
            }
            println!("Base value: {:.4}", report.base_value);
        }
    }
    Ok(())
}

fn handle_insights(csv: &Path, json: bool) -> anyhow::Result<()> {
    let table = read_table(csv)?;
    let insights = DatasetInsights::from_table(&table);

    if json {
        println!("{}", serde_json::to_string_pretty(&insights)?);
        return Ok(());
    }
    println!("Records:          {}", insights.total_records);
    println!(
        "Columns:          {} ({} numeric)",
        insights.total_columns, insights.numeric_columns
    );
    println!("Missing data:     {:.1}%", insights.missing_percentage);
    println!(
        "Complete records: {} ({:.1}% quality)",
        insights.complete_records, insights.data_quality
    );
    if let Some(known) = insights.known_exoplanets {
        println!("Known exoplanets: {known}");
    }
    println!();
    for (name, stats) in &insights.column_stats {
        println!(
            "  {:<16} mean {:>12.4}  std {:>12.4}  min {:>12.4}  median {:>12.4}  max {:>12.4}",
            name, stats.mean, stats.std_dev, stats.min, stats.median, stats.max
        );
    }
    Ok(())
}

async fn handle_report(config: &ExoConfig, csv: &Path, output: &Path) -> anyhow::Result<()> {
    let table = read_table(csv)?;
    let detector = build_detector(config).await?;
    let detection = detector.detect(&table)?;
    let explanation = detector.explain(&table).unwrap_or_else(|e| {
        warn!(error = %e, "Attribution failed, report will omit feature importance");
        Explanation::Unavailable
    });
    let insights = DatasetInsights::from_table(&table);

    let source_name = csv
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| csv.display().to_string());
    let report = DetectionReport::build(
        &ReportInputs {
            source_name: &source_name,
            detection: &detection,
            explanation: &explanation,
            insights: &insights,
            provenance: detector.bundle().provenance(),
        },
        &config.report,
    );
    report.write_pdf(&config.report, output)?;
    println!(
        "{} Report written to {}",
        report.verdict.headline(),
        output.display()
    );
    Ok(())
}

fn describe_provenance(provenance: &Provenance) -> String {
    match provenance {
        Provenance::Remote { location } => format!("remote catalog ({location})"),
        Provenance::Synthetic { seed } => format!("synthetic (seed {seed})"),
    }
}
