//! Column-major tabular data with typed cells.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("column {name} has {found} rows, table has {expected}")]
    RaggedColumn { name: String, expected: usize, found: usize },

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("row index {index} out of range for {rows} rows")]
    RowOutOfRange { index: usize, rows: usize },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type TableResult<T> = std::result::Result<T, TableError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Types a raw CSV field: empty is missing, numeric parses as a number.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
            Self::Missing
        } else if let Ok(v) = raw.parse::<f64>() {
            Self::Number(v)
        } else {
            Self::Text(raw.to_string())
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Category key for encoders. Numbers render the same way they print.
    #[must_use]
    pub fn category(&self) -> Option<String> {
        match self {
            Self::Missing => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
            Self::Missing => Ok(()),
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Missing, Into::into)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

/// Rectangular table; every column has `n_rows` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns<I, S>(columns: I) -> TableResult<Self>
    where
        I: IntoIterator<Item = (S, Vec<Cell>)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (name, cells) in columns {
            table.push_column(name, cells)?;
        }
        Ok(table)
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn require_column(&self, name: &str) -> TableResult<&Column> {
        self.column(name).ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    pub fn push_column(&mut self, name: impl Into<String>, cells: Vec<Cell>) -> TableResult<()> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(TableError::DuplicateColumn(name));
        }
        if self.columns.is_empty() {
            self.n_rows = cells.len();
        } else if cells.len() != self.n_rows {
            return Err(TableError::RaggedColumn { name, expected: self.n_rows, found: cells.len() });
        }
        self.columns.push(Column { name, cells });
        Ok(())
    }

    /// Removes a column, returning it if it existed.
    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let idx = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(idx))
    }

    /// New table with the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> TableResult<Self> {
        if let Some(&index) = rows.iter().find(|&&i| i >= self.n_rows) {
            return Err(TableError::RowOutOfRange { index, rows: self.n_rows });
        }
        let columns = self
            .columns
            .iter()
            .map(|c| Column { name: c.name.clone(), cells: rows.iter().map(|&i| c.cells[i].clone()).collect() })
            .collect();
        Ok(Self { columns, n_rows: rows.len() })
    }

    pub fn row(&self, index: usize) -> impl Iterator<Item = &Cell> {
        self.columns.iter().map(move |c| &c.cells[index])
    }

    /// Missing-cell count per column, in column order.
    #[must_use]
    pub fn missing_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.cells.iter().filter(|cell| cell.is_missing()).count()))
            .collect()
    }

    /// Rows identical to an earlier row.
    #[must_use]
    pub fn duplicate_row_count(&self) -> usize {
        let mut seen = HashSet::with_capacity(self.n_rows);
        (0..self.n_rows)
            .filter(|&i| {
                let key = self.row(i).map(ToString::to_string).collect::<Vec<_>>().join("\u{1f}");
                !seen.insert(key)
            })
            .count()
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> TableResult<Self> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut cells: Vec<Vec<Cell>> = vec![Vec::new(); headers.len()];
        for record in reader.records() {
            let record = record?;
            for (column, field) in cells.iter_mut().zip(record.iter()) {
                column.push(Cell::parse(field));
            }
        }

        let mut table = Self::new();
        for (name, column) in headers.into_iter().zip(cells) {
            table.push_column(name, column)?;
        }
        Ok(table)
    }

    pub fn read_csv(path: &Path) -> TableResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(std::io::BufReader::new(file))
    }

    pub fn to_csv_writer<W: Write>(&self, writer: W) -> TableResult<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(self.column_names())?;
        for i in 0..self.n_rows {
            writer.write_record(self.row(i).map(ToString::to_string))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: &Path) -> TableResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        self.to_csv_writer(std::io::BufWriter::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "id,age,gender,outcome\n1,34,male,0\n2,,female,1\n3,51,male,0\n";

    #[test]
    fn test_cells_are_typed_on_read() {
        let table = Table::from_csv_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.n_cols(), 4);
        let age = &table.column("age").unwrap().cells;
        assert_eq!(age[0], Cell::Number(34.0));
        assert_eq!(age[1], Cell::Missing);
        assert_eq!(table.column("gender").unwrap().cells[1], Cell::Text("female".into()));
    }

    #[test]
    fn test_csv_write_read_preserves_cells() {
        let table = Table::from_csv_reader(SAMPLE.as_bytes()).unwrap();
        let mut buf = Vec::new();
        table.to_csv_writer(&mut buf).unwrap();
        let back = Table::from_csv_reader(buf.as_slice()).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_select_rows_and_bounds() {
        let table = Table::from_csv_reader(SAMPLE.as_bytes()).unwrap();
        let picked = table.select_rows(&[2, 0]).unwrap();
        assert_eq!(picked.column("id").unwrap().cells, vec![Cell::Number(3.0), Cell::Number(1.0)]);
        assert!(matches!(table.select_rows(&[3]), Err(TableError::RowOutOfRange { .. })));
    }

    #[test]
    fn test_ragged_and_duplicate_columns_rejected() {
        let mut table = Table::new();
        table.push_column("a", vec![Cell::Number(1.0)]).unwrap();
        assert!(matches!(table.push_column("a", vec![Cell::Missing]), Err(TableError::DuplicateColumn(_))));
        assert!(matches!(table.push_column("b", vec![]), Err(TableError::RaggedColumn { .. })));
    }

    #[test]
    fn test_profile_counts() {
        let csv = "a,b\n1,x\n1,x\n,y\n";
        let table = Table::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.duplicate_row_count(), 1);
        assert_eq!(table.missing_counts(), vec![("a".to_string(), 1), ("b".to_string(), 0)]);
    }
}
