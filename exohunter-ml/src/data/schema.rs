//! Column type inference and feature-slot schema matching.

use crate::data::table::{DataTable, is_missing};
use crate::error::{MlError, SchemaError};
use crate::features::definition::{FEATURE_COUNT, FEATURE_NAMES, FeatureVector, median};
use serde::{Deserialize, Serialize};

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    String,
    Null,
}

impl ColumnType {
    /// Integer, float and all-missing columns count as numeric.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float | Self::Null)
    }
}

/// Schema for a single column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub dtype: ColumnType,
    pub nullable: bool,
}

/// Infer column type from its raw cells.
pub fn infer_column_type<'a>(values: impl IntoIterator<Item = &'a str>) -> ColumnType {
    let mut has_int = false;
    let mut has_float = false;

    for v in values {
        if is_missing(v) {
            continue;
        }
        if v.parse::<i64>().is_ok() {
            has_int = true;
        } else if v.parse::<f64>().is_ok() {
            has_float = true;
        } else {
            return ColumnType::String;
        }
    }

    if has_float {
        ColumnType::Float
    } else if has_int {
        ColumnType::Integer
    } else {
        ColumnType::Null
    }
}

/// Infer the schema of every column in a table.
pub fn infer_schema(table: &DataTable) -> Vec<ColumnSchema> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| ColumnSchema {
            name: name.clone(),
            dtype: infer_column_type(table.column_cells(i)),
            nullable: table.column_cells(i).any(is_missing),
        })
        .collect()
}

/// How the feature slots were resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// All five canonical feature names were present.
    ByName,
    /// Fell back to the first five numeric columns in file order.
    Positional,
}

/// Mapping from feature slot to table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedSchema {
    pub columns: [usize; FEATURE_COUNT],
    pub column_names: Vec<String>,
    pub strategy: MatchStrategy,
}

impl MatchedSchema {
    /// Resolve the feature slots of `table`.
    ///
    /// Exact canonical names win when all five are present and numeric; otherwise
    /// the first five numeric columns are used in their existing order.
    pub fn resolve(table: &DataTable) -> Result<Self, SchemaError> {
        let schema = infer_schema(table);
        let numeric = |idx: usize| schema[idx].dtype.is_numeric();

        let by_name: Option<Vec<usize>> = FEATURE_NAMES
            .iter()
            .map(|name| table.column_index(name).filter(|&i| numeric(i)))
            .collect();

        let (indices, strategy) = match by_name {
            Some(indices) => (indices, MatchStrategy::ByName),
            None => {
                let numeric_cols: Vec<usize> =
                    (0..schema.len()).filter(|&i| numeric(i)).collect();
                if numeric_cols.len() < FEATURE_COUNT {
                    return Err(SchemaError::InsufficientFeatures {
                        found: numeric_cols.len(),
                        required: FEATURE_COUNT,
                    });
                }
                (
                    numeric_cols[..FEATURE_COUNT].to_vec(),
                    MatchStrategy::Positional,
                )
            }
        };

        let mut columns = [0usize; FEATURE_COUNT];
        columns.copy_from_slice(&indices);
        Ok(Self {
            column_names: columns.iter().map(|&i| table.columns[i].clone()).collect(),
            columns,
            strategy,
        })
    }

    /// Extract feature vectors, imputing missing cells with the column median.
    ///
    /// A matched column with no values at all leaves nothing to impute from; that is
    /// `MlError::InvalidInput` for the upload, not a `SchemaError`.
    pub fn extract(&self, table: &DataTable) -> Result<Vec<FeatureVector>, MlError> {
        let mut slots: Vec<Vec<f64>> = Vec::with_capacity(FEATURE_COUNT);
        for (&col, name) in self.columns.iter().zip(&self.column_names) {
            let mut values = table.numeric_column(col).ok_or_else(|| {
                MlError::invalid_input(format!("column '{name}' is not numeric"))
            })?;
            let fill = median(&values).ok_or_else(|| {
                MlError::invalid_input(format!("column '{name}' has no values to impute from"))
            })?;
            for v in values.iter_mut().filter(|v| !v.is_finite()) {
                *v = fill;
            }
            slots.push(values);
        }

        Ok((0..table.row_count())
            .map(|r| {
                let mut row = [0.0; FEATURE_COUNT];
                for (j, slot) in slots.iter().enumerate() {
                    row[j] = slot[r];
                }
                row
            })
            .collect())
    }
}
