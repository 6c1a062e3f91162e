//! Data quality summary for uploaded tables.

use crate::data::provider::DISPOSITION_COLUMN;
use crate::data::schema::infer_schema;
use crate::data::table::DataTable;
use crate::features::definition::DistributionStats;
use serde::{Deserialize, Serialize};

/// Column holding ground-truth labels in an upload.
pub const LABEL_COLUMN: &str = "label";

/// Quality and content summary of an uploaded table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInsights {
    pub total_records: usize,
    pub total_columns: usize,
    pub numeric_columns: usize,
    /// Missing cells as a percentage of all cells.
    pub missing_percentage: f64,
    /// Known exoplanets from a `label` or disposition column, `None` when neither exists.
    pub known_exoplanets: Option<usize>,
    pub complete_records: usize,
    /// Complete records as a percentage of all records.
    pub data_quality: f64,
    pub column_stats: Vec<(String, DistributionStats)>,
}

impl DatasetInsights {
    pub fn from_table(table: &DataTable) -> Self {
        let total_records = table.row_count();
        let total_columns = table.column_count();
        let schema = infer_schema(table);

        let numeric: Vec<usize> = schema
            .iter()
            .enumerate()
            .filter(|(_, c)| c.dtype.is_numeric())
            .map(|(i, _)| i)
            .collect();

        let cells = total_records * total_columns;
        let missing_percentage = if cells > 0 {
            table.missing_cells() as f64 / cells as f64 * 100.0
        } else {
            0.0
        };

        let complete_records = table.complete_rows();
        let data_quality = if total_records > 0 {
            complete_records as f64 / total_records as f64 * 100.0
        } else {
            0.0
        };

        let column_stats = numeric
            .iter()
            .filter_map(|&i| {
                let values = table.numeric_column(i)?;
                let stats = DistributionStats::from_values(&values)?;
                Some((table.columns[i].clone(), stats))
            })
            .collect();

        Self {
            total_records,
            total_columns,
            numeric_columns: numeric.len(),
            missing_percentage,
            known_exoplanets: known_exoplanets(table),
            complete_records,
            data_quality,
            column_stats,
        }
    }

    pub fn has_known_labels(&self) -> bool {
        self.known_exoplanets.is_some()
    }
}

fn known_exoplanets(table: &DataTable) -> Option<usize> {
    if let Some(col) = table.column_index(LABEL_COLUMN) {
        let sum = table
            .numeric_column(col)
            .map(|values| values.iter().filter(|v| v.is_finite()).sum::<f64>())
            .unwrap_or(0.0);
        return Some(sum.max(0.0).round() as usize);
    }
    let col = table.column_index(DISPOSITION_COLUMN)?;
    Some(
        table
            .column_cells(col)
            .filter(|cell| {
                let upper = cell.to_uppercase();
                upper.contains("CANDIDATE") || upper.contains("CONFIRMED")
            })
            .count(),
    )
}
