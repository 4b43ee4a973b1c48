//! Row-set file formats
//!
//! Delimited text and GeoJSON are read and written, spreadsheet workbooks
//! are read only; the format is chosen from the file extension. The [`archive`] module unpacks custom CRS definition files.

pub mod archive;
pub mod csv;
pub mod geojson;
pub mod traits;
pub mod workbook;

use std::path::Path;

use crate::error::{Error, Result};

pub use self::csv::CsvProvider;
pub use self::geojson::GeoJsonProvider;
pub use self::traits::RowSetProvider;
pub use self::workbook::WorkbookProvider;

/// Picks the provider for `path` by its extension
pub fn provider_for(path: &Path) -> Result<Box<dyn RowSetProvider>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" | "txt" | "asc" => Ok(Box::new(CsvProvider::default())),
        "tsv" => Ok(Box::new(CsvProvider::with_delimiter(b'\t'))),
        "json" | "geojson" => Ok(Box::new(GeoJsonProvider)),
        "xlsx" | "xlsm" | "xls" | "ods" => Ok(Box::new(WorkbookProvider)),
        _ => Err(Error::UnsupportedFormat(path.display().to_string())),
    }
}
