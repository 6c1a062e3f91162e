//! Detection report: structured sections and PDF rendering.

use crate::algorithms::explainability::Explanation;
use crate::config::ReportConfig;
use crate::data::dataset::Provenance;
use crate::data::validate::DatasetInsights;
use crate::error::MlError;
use crate::inference::result::{DetectionResult, HISTOGRAM_BINS, Verdict};
use chrono::{DateTime, Utc};
use genpdf::elements::{Break, FrameCellDecorator, Paragraph, TableLayout};
use genpdf::fonts::{FontData, FontFamily};
use genpdf::style::{Style, StyledString};
use genpdf::{Document, SimplePageDecorator};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// System font locations tried when no font directory is configured.
const FALLBACK_FONTS: &[(&str, &str)] = &[
    ("/usr/share/fonts/truetype/liberation", "LiberationSans"),
    ("/usr/share/fonts/liberation", "LiberationSans"),
    ("/usr/share/fonts/truetype/dejavu", "DejaVuSans"),
    ("/System/Library/Fonts", "Helvetica"),
    ("/Library/Fonts", "Arial"),
];

/// A titled block of the report: free text lines and an optional table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    pub title: String,
    pub lines: Vec<String>,
    /// First row is the header.
    pub table: Vec<Vec<String>>,
}

impl ReportSection {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: Vec::new(),
            table: Vec::new(),
        }
    }

    fn line(mut self, text: impl Into<String>) -> Self {
        self.lines.push(text.into());
        self
    }

    fn table(mut self, rows: Vec<Vec<String>>) -> Self {
        self.table = rows;
        self
    }
}

/// Inputs gathered for one report.
pub struct ReportInputs<'a> {
    pub source_name: &'a str,
    pub detection: &'a DetectionResult,
    pub explanation: &'a Explanation,
    pub insights: &'a DatasetInsights,
    pub provenance: &'a Provenance,
}

/// A complete detection report, renderable to PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub title: String,
    pub verdict: Verdict,
    pub sections: Vec<ReportSection>,
}

impl DetectionReport {
    pub fn build(inputs: &ReportInputs<'_>, config: &ReportConfig) -> Self {
        let detection = inputs.detection;
        let verdict = detection.verdict();

        let summary = ReportSection::new("Summary")
            .line(format!("Source: {}", inputs.source_name))
            .line(format!("Verdict: {}", verdict.headline()))
            .line(format!("Objects analyzed: {}", detection.len()))
            .line(format!("Exoplanets detected: {}", detection.exoplanet_count))
            .line(format!(
                "Maximum probability: {:.1}%",
                detection.max_probability * 100.0
            ))
            .line(format!("Training data: {}", describe_provenance(inputs.provenance)));

        let acc = detection.accuracies;
        let mut models = ReportSection::new("Model Performance")
            .line(format!("Tree classifier accuracy: {:.1}%", acc.tree * 100.0));
        models = if detection.hybrid {
            models
                .line(format!("Sequence classifier accuracy: {:.1}%", acc.sequence * 100.0))
                .line(format!("Fused accuracy: {:.1}%", acc.fusion * 100.0))
        } else {
            models.line("Sequence classifier unavailable, tree classifier used alone")
        };

        let mut candidate_rows = vec![header(&["Rank", "Row", "Probability", "Prediction"])];
        candidate_rows.extend(
            detection
                .top_candidates(config.top_candidates)
                .iter()
                .enumerate()
                .map(|(rank, c)| {
                    vec![
                        (rank + 1).to_string(),
                        c.row.to_string(),
                        format!("{:.3}", c.probability),
                        if c.label == 1 { "Exoplanet" } else { "Not exoplanet" }.to_string(),
                    ]
                }),
        );
        let candidates = ReportSection::new("Top Candidates").table(candidate_rows);

        let split = detection.prediction_split();
        let mut histogram_rows = vec![header(&["Confidence", "Count"])];
        histogram_rows.extend(
            detection
                .confidence_histogram(HISTOGRAM_BINS)
                .iter()
                .filter(|b| b.count > 0)
                .map(|b| vec![format!("{:.2}-{:.2}", b.lower, b.upper), b.count.to_string()]),
        );
        let distribution = ReportSection::new("Confidence Distribution")
            .line(format!(
                "Predicted exoplanets: {}, not exoplanets: {}",
                split.positives, split.negatives
            ))
            .table(histogram_rows);

        let importance = match inputs.explanation.report() {
            Some(report) => {
                let mut rows = vec![header(&["Feature", "Mean |SHAP|"])];
                rows.extend(
                    report
                        .ranking()
                        .into_iter()
                        .map(|(name, value)| vec![name, format!("{value:.4}")]),
                );
                ReportSection::new("Feature Importance").table(rows)
            }
            None => ReportSection::new("Feature Importance").line("Explainability unavailable"),
        };

        let ins = inputs.insights;
        let mut data = ReportSection::new("Dataset Insights")
            .line(format!("Records: {}", ins.total_records))
            .line(format!(
                "Columns: {} ({} numeric)",
                ins.total_columns, ins.numeric_columns
            ))
            .line(format!("Missing data: {:.1}%", ins.missing_percentage))
            .line(format!(
                "Complete records: {} ({:.1}% quality)",
                ins.complete_records, ins.data_quality
            ));
        if let Some(known) = ins.known_exoplanets {
            data = data.line(format!("Known exoplanets in upload: {known}"));
        }

        Self {
            id: Uuid::new_v4(),
            generated_at: Utc::now(),
            title: "ExoHunter Detection Report".to_string(),
            verdict,
            sections: vec![summary, models, candidates, distribution, importance, data],
        }
    }

    /// Render to PDF bytes.
    pub fn render_pdf(&self, config: &ReportConfig) -> Result<Vec<u8>, MlError> {
        let fonts = load_fonts(config)?;
        let mut doc = Document::new(fonts);
        doc.set_title(self.title.clone());

        let mut decorator = SimplePageDecorator::new();
        decorator.set_margins(20);
        doc.set_page_decorator(decorator);

        doc.push(Paragraph::new(StyledString::new(
            self.title.clone(),
            Style::new().bold().with_font_size(18),
        )));
        doc.push(Paragraph::new(format!(
            "Report {} generated {}",
            self.id,
            self.generated_at.format("%Y-%m-%d %H:%M UTC")
        )));
        doc.push(Break::new(1));

        for section in &self.sections {
            doc.push(Paragraph::new(StyledString::new(
                section.title.clone(),
                Style::new().bold().with_font_size(13),
            )));
            doc.push(Break::new(0.3));
            for line in &section.lines {
                doc.push(Paragraph::new(line.clone()));
            }
            if let Some(columns) = section.table.first().map(Vec::len) {
                let mut table = TableLayout::new(vec![1; columns]);
                table.set_cell_decorator(FrameCellDecorator::new(true, true, false));
                for (i, cells) in section.table.iter().enumerate() {
                    let mut row = table.row();
                    for cell in cells {
                        row = if i == 0 {
                            row.element(Paragraph::new(StyledString::new(
                                cell.clone(),
                                Style::new().bold(),
                            )))
                        } else {
                            row.element(Paragraph::new(cell.clone()))
                        };
                    }
                    row.push()
                        .map_err(|e| MlError::report(format!("invalid table row: {e}")))?;
                }
                doc.push(Break::new(0.3));
                doc.push(table);
            }
            doc.push(Break::new(1));
        }

        let mut bytes = Vec::new();
        doc.render(&mut bytes)
            .map_err(|e| MlError::report(format!("failed to render PDF: {e}")))?;
        info!(bytes = bytes.len(), report = %self.id, "Rendered PDF report");
        Ok(bytes)
    }

    pub fn write_pdf(&self, config: &ReportConfig, path: &Path) -> Result<(), MlError> {
        let bytes = self.render_pdf(config)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

fn header(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

fn describe_provenance(provenance: &Provenance) -> String {
    match provenance {
        Provenance::Remote { location } => format!("catalog from {location}"),
        Provenance::Synthetic { seed } => format!("synthetic (seed {seed})"),
    }
}

/// A configured font directory is used exclusively; otherwise system locations are tried.
fn load_fonts(config: &ReportConfig) -> Result<FontFamily<FontData>, MlError> {
    if let Some(dir) = &config.font_dir {
        return genpdf::fonts::from_files(dir, &config.font_family, None).map_err(|e| {
            MlError::report(format!(
                "font family '{}' not found in {}: {e}",
                config.font_family,
                dir.display()
            ))
        });
    }
    for (dir, family) in FALLBACK_FONTS {
        match genpdf::fonts::from_files(dir, family, None) {
            Ok(fonts) => return Ok(fonts),
            Err(e) => debug!(dir, family, error = %e, "Font family not usable"),
        }
    }
    Err(MlError::report(
        "no usable TrueType font found; set report.font_dir",
    ))
}
