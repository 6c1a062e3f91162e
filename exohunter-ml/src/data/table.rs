//! In-memory CSV table used for both uploads and the remote catalog.

use crate::error::MlError;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// Cell spellings treated as missing values.
const MISSING_TOKENS: &[&str] = &["", "nan", "na", "n/a", "null", "none"];

/// A parsed table of string cells. Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DataTable {
    /// Parse CSV, skipping `#` comment lines and padding or truncating ragged rows.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, MlError> {
        let mut rdr = csv::ReaderBuilder::new()
            .comment(Some(b'#'))
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = rdr.headers()?.iter().map(String::from).collect();
        if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
            return Err(MlError::invalid_input("CSV has no header row"));
        }

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            let mut row: Vec<String> = record.iter().map(String::from).collect();
            row.resize(columns.len(), String::new());
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn from_csv_str(text: &str) -> Result<Self, MlError> {
        Self::from_csv_reader(text.as_bytes())
    }

    pub fn from_path(path: &Path) -> Result<Self, MlError> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(std::io::BufReader::new(file))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Raw cell text, `None` when the cell is missing.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .filter(|v| !is_missing(v))
    }

    /// Column cells as raw strings.
    pub fn column_cells(&self, col: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .map(move |r| r.get(col).map(String::as_str).unwrap_or(""))
    }

    /// Parse a column as floats with missing cells as NaN.
    ///
    /// Returns `None` when any present cell is not numeric.
    pub fn numeric_column(&self, col: usize) -> Option<Vec<f64>> {
        if col >= self.columns.len() {
            return None;
        }
        self.column_cells(col)
            .map(|cell| {
                if is_missing(cell) {
                    Some(f64::NAN)
                } else {
                    cell.parse::<f64>().ok()
                }
            })
            .collect()
    }

    /// Count of missing cells across the whole table.
    pub fn missing_cells(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| r.iter())
            .filter(|c| is_missing(c))
            .count()
    }

    /// Rows with no missing cell.
    pub fn complete_rows(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| !r.iter().any(|c| is_missing(c)))
            .count()
    }
}

pub(crate) fn is_missing(cell: &str) -> bool {
    let trimmed = cell.trim();
    MISSING_TOKENS
        .iter()
        .any(|token| trimmed.eq_ignore_ascii_case(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_skips_comments_and_pads_rows() {
        let table = DataTable::from_csv_str(
            "# exported from the archive\n# second comment\na,b,c\n1,2,3\n4,5\n",
        )
        .unwrap();
        assert_eq!(table.columns, vec!["a", "b", "c"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[1], vec!["4", "5", ""]);
        assert_eq!(table.cell(1, 2), None);
        assert_eq!(table.cell(0, 1), Some("2"));
    }

    #[test]
    fn test_numeric_column_detection() {
        let table = DataTable::from_csv_str("x,name,y\n1.5,alpha,\n2,beta,NaN\n").unwrap();
        let x = table.numeric_column(0).unwrap();
        assert_eq!(x, vec![1.5, 2.0]);
        assert!(table.numeric_column(1).is_none());
        let y = table.numeric_column(2).unwrap();
        assert!(y.iter().all(|v| v.is_nan()));
        assert!(table.numeric_column(9).is_none());
    }

    #[test]
    fn test_missing_and_complete_counts() {
        let table = DataTable::from_csv_str("a,b\n1,\n2,3\n,\n").unwrap();
        assert_eq!(table.missing_cells(), 3);
        assert_eq!(table.complete_rows(), 1);
    }

    #[test]
    fn test_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "koi_period,koi_depth").unwrap();
        writeln!(file, "10.5,0.001").unwrap();
        let table = DataTable::from_path(file.path()).unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.column_index("koi_depth"), Some(1));
    }
}
