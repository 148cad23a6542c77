use std::collections::HashMap;
use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};
use tracing::debug;

use crate::error::{Error, Result};
use crate::form::FormFieldSet;

/// One spreadsheet record: free-form cells keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: HashMap<String, String>,
}

impl Row {
    pub fn from_cells(cells: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            cells: cells.into_iter().collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }
}

/// The challenge input data: first sheet of an xlsx file, header row first,
/// data rows below in file order. Read once, immutable afterwards.
#[derive(Debug)]
pub struct Spreadsheet {
    rows: Vec<Row>,
}

impl Spreadsheet {
    /// Read the whole source up front. A missing or unreadable file, or a
    /// workbook without a sheet, is a data-source error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut workbook: Xlsx<_> = open_workbook(path)
            .map_err(|e| Error::DataSourceError(format!("{}: {e}", path.display())))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| {
                Error::DataSourceError(format!("{}: workbook has no sheets", path.display()))
            })?
            .map_err(|e| Error::DataSourceError(format!("{}: {e}", path.display())))?;

        let mut raw_rows = range.rows();
        let header: Vec<String> = match raw_rows.next() {
            Some(cells) => cells.iter().map(cell_text).collect(),
            None => Vec::new(),
        };

        let rows: Vec<Row> = raw_rows
            .map(|cells| {
                Row::from_cells(
                    header
                        .iter()
                        .zip(cells.iter())
                        .map(|(name, cell)| (name.clone(), cell_text(cell))),
                )
            })
            .collect();

        debug!("read {} data rows from {}", rows.len(), path.display());
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Row by zero-based index. Indexes past the data are a data-source
    /// error, not a panic.
    pub fn row(&self, index: usize) -> Result<&Row> {
        self.rows.get(index).ok_or_else(|| {
            Error::DataSourceError(format!(
                "row {index} does not exist (total rows: {})",
                self.rows.len()
            ))
        })
    }

    /// The seven form values for one row.
    pub fn field_set(&self, index: usize) -> Result<FormFieldSet> {
        Ok(FormFieldSet::from_row(self.row(index)?))
    }
}

/// Render a cell the way the form expects to receive it typed.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_owned(),
        Data::Float(f) => float_text(*f),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(format_date)
            .unwrap_or_else(|| float_text(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}

/// Dates render month/day/year without zero padding, matching what the
/// form's date field expects typed.
fn format_date(d: chrono::NaiveDateTime) -> String {
    d.format("%-m/%-d/%Y").to_string()
}

/// Whole numbers come out of Excel as floats; render them without the
/// trailing `.0` the form would reject.
fn float_text(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}
