//! Tabular study data
//!
//! `SleepTable` is a small row-major table with named columns. Cells are
//! typed on load: empty and NA-like strings become `Cell::Null`, numeric
//! strings become `Cell::Number`, everything else stays `Cell::Text`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::io::{Read, Write};
use std::path::Path;

use crate::error::ComputeError;

/// Strings treated as missing values when reading CSV input
const NULL_MARKERS: [&str; 5] = ["", "na", "nan", "null", "n/a"];

/// A single table cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Null,
}

impl Cell {
    /// Type a raw CSV field
    pub fn parse(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if NULL_MARKERS
            .iter()
            .any(|marker| trimmed.eq_ignore_ascii_case(marker))
        {
            return Cell::Null;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Cell::Number(value),
            _ => Cell::Text(trimmed.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    fn to_field(&self) -> String {
        match self {
            Cell::Number(v) => v.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Null => String::new(),
        }
    }
}

/// Sleep-study table with named columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
    /// Set once sleep efficiency has been rescaled to a percentage
    efficiency_scaled: bool,
}

impl SleepTable {
    /// Build a table, checking column names are unique and rows are rectangular
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, ComputeError> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(ComputeError::InvalidInput(format!(
                    "duplicate column '{column}'"
                )));
            }
        }
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(ComputeError::InvalidInput(format!(
                    "row {} has {} cells, expected {}",
                    idx,
                    row.len(),
                    columns.len()
                )));
            }
        }
        Ok(Self {
            columns,
            rows,
            efficiency_scaled: false,
        })
    }

    /// Read a CSV document with a header row
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ComputeError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            rows.push(record.iter().map(Cell::parse).collect());
        }

        Self::new(columns, rows)
    }

    pub fn from_csv_str(csv: &str) -> Result<Self, ComputeError> {
        Self::from_reader(csv.as_bytes())
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ComputeError> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    /// Write the table as CSV with a header row
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ComputeError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.columns)?;
        for row in &self.rows {
            csv_writer.write_record(row.iter().map(Cell::to_field))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String, ComputeError> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ComputeError::InvalidValue(e.to_string()))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn is_efficiency_scaled(&self) -> bool {
        self.efficiency_scaled
    }

    pub fn column_index(&self, name: &str) -> Result<usize, ComputeError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| ComputeError::UnknownFeature(format!("column '{name}' not in table")))
    }

    /// All cells of a column, which must be numeric
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>, ComputeError> {
        let idx = self.column_index(name)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(row_idx, row)| {
                row[idx].as_f64().ok_or_else(|| {
                    ComputeError::InvalidValue(format!(
                        "column '{}' row {} is not numeric: {:?}",
                        name, row_idx, row[idx]
                    ))
                })
            })
            .collect()
    }

    /// Distinct text values observed in a column, sorted
    pub fn categories(&self, name: &str) -> Result<BTreeSet<String>, ComputeError> {
        let idx = self.column_index(name)?;
        Ok(self
            .rows
            .iter()
            .filter_map(|row| row[idx].as_text().map(|s| s.to_string()))
            .collect())
    }

    /// Rows whose `column` value lies in `[min, max]`
    pub fn filter_range(&self, column: &str, min: f64, max: f64) -> Result<SleepTable, ComputeError> {
        if min > max {
            return Err(ComputeError::InvalidInput(format!(
                "range lower bound {min} exceeds upper bound {max}"
            )));
        }
        let values = self.numeric_column(column)?;
        let rows = self
            .rows
            .iter()
            .zip(values)
            .filter(|(_, v)| *v >= min && *v <= max)
            .map(|(row, _)| row.clone())
            .collect();
        Ok(SleepTable {
            columns: self.columns.clone(),
            rows,
            efficiency_scaled: self.efficiency_scaled,
        })
    }

    /// Project the table onto the named columns, in the given order
    pub fn select_columns(&self, names: &[&str]) -> Result<SleepTable, ComputeError> {
        let indices = names
            .iter()
            .map(|name| self.column_index(name))
            .collect::<Result<Vec<_>, _>>()?;
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        let columns = names.iter().map(|n| n.to_string()).collect();
        let mut table = SleepTable::new(columns, rows)?;
        table.efficiency_scaled = self.efficiency_scaled;
        Ok(table)
    }

    pub(crate) fn retain_rows<F>(&mut self, keep: F)
    where
        F: FnMut(&Vec<Cell>) -> bool,
    {
        self.rows.retain(keep);
    }

    /// Rewrite every cell of a column
    pub(crate) fn map_column<F>(&mut self, name: &str, mut f: F) -> Result<(), ComputeError>
    where
        F: FnMut(&Cell) -> Result<Cell, ComputeError>,
    {
        let idx = self.column_index(name)?;
        for row in &mut self.rows {
            row[idx] = f(&row[idx])?;
        }
        Ok(())
    }

    /// Returns false when `from` is absent
    pub(crate) fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.columns.iter_mut().find(|c| c.as_str() == from) {
            Some(column) => {
                *column = to.to_string();
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_column(&mut self, name: &str) -> Result<Vec<Cell>, ComputeError> {
        let idx = self.column_index(name)?;
        self.columns.remove(idx);
        Ok(self.rows.iter_mut().map(|row| row.remove(idx)).collect())
    }

    pub(crate) fn push_column(&mut self, name: &str, cells: Vec<Cell>) -> Result<(), ComputeError> {
        if self.has_column(name) {
            return Err(ComputeError::InvalidInput(format!(
                "duplicate column '{name}'"
            )));
        }
        if cells.len() != self.rows.len() {
            return Err(ComputeError::InvalidInput(format!(
                "column '{}' has {} cells, table has {} rows",
                name,
                cells.len(),
                self.rows.len()
            )));
        }
        self.columns.push(name.to_string());
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row.push(cell);
        }
        Ok(())
    }

    pub(crate) fn mark_efficiency_scaled(&mut self) {
        self.efficiency_scaled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "ID,Age,Gender,Sleep efficiency\n\
                          1,65,Female,0.88\n\
                          2,69,Male,\n\
                          3,40,Female,0.89\n";

    #[test]
    fn test_cell_parse() {
        assert_eq!(Cell::parse("0.88"), Cell::Number(0.88));
        assert_eq!(Cell::parse(" Male "), Cell::Text("Male".to_string()));
        assert_eq!(Cell::parse(""), Cell::Null);
        assert_eq!(Cell::parse("NaN"), Cell::Null);
        assert_eq!(Cell::parse("NA"), Cell::Null);
        assert_eq!(
            Cell::parse("2021-03-06 01:00:00"),
            Cell::Text("2021-03-06 01:00:00".to_string())
        );
    }

    #[test]
    fn test_from_csv_str() {
        let table = SleepTable::from_csv_str(SAMPLE).unwrap();
        assert_eq!(table.columns(), &["ID", "Age", "Gender", "Sleep efficiency"]);
        assert_eq!(table.len(), 3);
        assert!(table.rows()[1][3].is_null());
        assert!(!table.is_efficiency_scaled());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = SleepTable::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![Cell::Number(1.0)]],
        );
        assert!(matches!(result, Err(ComputeError::InvalidInput(_))));
    }

    #[test]
    fn test_numeric_column_rejects_text() {
        let table = SleepTable::from_csv_str(SAMPLE).unwrap();
        assert_eq!(table.numeric_column("Age").unwrap(), vec![65.0, 69.0, 40.0]);
        assert!(matches!(
            table.numeric_column("Gender"),
            Err(ComputeError::InvalidValue(_))
        ));
        assert!(matches!(
            table.numeric_column("Height"),
            Err(ComputeError::UnknownFeature(_))
        ));
    }

    #[test]
    fn test_categories_sorted() {
        let table = SleepTable::from_csv_str(SAMPLE).unwrap();
        let categories: Vec<String> = table.categories("Gender").unwrap().into_iter().collect();
        assert_eq!(categories, vec!["Female".to_string(), "Male".to_string()]);
    }

    #[test]
    fn test_filter_range_inclusive() {
        let table = SleepTable::from_csv_str(SAMPLE).unwrap();
        let filtered = table.filter_range("Age", 40.0, 65.0).unwrap();
        assert_eq!(filtered.len(), 2);
        assert!(table.filter_range("Age", 70.0, 40.0).is_err());
    }

    #[test]
    fn test_select_columns() {
        let table = SleepTable::from_csv_str(SAMPLE).unwrap();
        let projected = table.select_columns(&["Gender", "ID"]).unwrap();
        assert_eq!(projected.columns(), &["Gender", "ID"]);
        assert_eq!(projected.rows()[0][1], Cell::Number(1.0));
    }

    #[test]
    fn test_csv_output_keeps_nulls_empty() {
        let table = SleepTable::from_csv_str(SAMPLE).unwrap();
        let csv = table.to_csv_string().unwrap();
        assert!(csv.starts_with("ID,Age,Gender,Sleep efficiency\n"));
        assert!(csv.contains("2,69,Male,\n"));
        let reread = SleepTable::from_csv_str(&csv).unwrap();
        assert_eq!(reread.len(), 3);
    }
}
