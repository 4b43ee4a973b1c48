//! Spreadsheet workbooks (`.xlsx`, `.xlsm`, `.xls`, `.ods`), read only
//!
//! The first worksheet is read; its first row holds the column names.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use log::debug;

use crate::error::{Error, Result};
use crate::io::traits::RowSetProvider;
use crate::table::RowSet;
use crate::types::Value;

/// Reads the first worksheet of a workbook into a row-set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkbookProvider;

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => Value::from_f64(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => Value::infer(s),
        Data::DateTime(dt) => Value::from_f64(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::from(s.as_str()),
    }
}

fn header(cell: &Data, index: usize) -> String {
    match cell_value(cell) {
        Value::Null => format!("column_{}", index + 1),
        value => value.to_string(),
    }
}

impl RowSetProvider for WorkbookProvider {
    fn name(&self) -> &'static str {
        "workbook"
    }

    fn load(&self, path: &Path) -> Result<RowSet> {
        let mut workbook = open_workbook_auto(path)?;
        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| Error::Workbook(format!("{} has no worksheets", path.display())))?;
        let range = workbook.worksheet_range(&sheet)?;

        let mut lines = range.rows();
        let columns: Vec<String> = match lines.next() {
            Some(first) => first.iter().enumerate().map(|(i, c)| header(c, i)).collect(),
            None => Vec::new(),
        };

        let mut rows = RowSet::new(columns);
        for line in lines {
            if line.iter().all(|c| matches!(c, Data::Empty)) {
                continue;
            }
            rows.push(line.iter().map(cell_value).collect());
        }

        debug!(
            "read {} rows from sheet '{}' of {}",
            rows.len(),
            sheet,
            path.display()
        );
        Ok(rows)
    }

    fn save(&self, _rows: &RowSet, path: &Path) -> Result<()> {
        Err(Error::UnsupportedFormat(format!(
            "{} (workbooks are read only)",
            path.display()
        )))
    }
}
