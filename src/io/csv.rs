//! Delimited text row-sets

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use log::debug;

use crate::error::Result;
use crate::io::traits::RowSetProvider;
use crate::table::RowSet;
use crate::types::Value;

/// Reads and writes delimited text with a header row
///
/// Cell types are inferred on load: empty fields are null, numeric fields
/// become numbers, and everything else is kept as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvProvider {
    delimiter: u8,
}

impl CsvProvider {
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Reads a row-set from any reader
    pub fn read_from<R: Read>(&self, reader: R) -> Result<RowSet> {
        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        let mut rows = RowSet::new(headers);

        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(Value::infer).collect());
        }
        Ok(rows)
    }

    /// Writes a row-set, header first
    pub fn write_to<W: Write>(&self, rows: &RowSet, writer: W) -> Result<()> {
        let mut writer = ::csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(writer);

        writer.write_record(rows.columns())?;
        for row in rows.rows() {
            writer.write_record(row.cells().iter().map(|v| v.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl Default for CsvProvider {
    fn default() -> Self {
        Self::with_delimiter(b',')
    }
}

impl RowSetProvider for CsvProvider {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn load(&self, path: &Path) -> Result<RowSet> {
        let rows = self.read_from(File::open(path)?)?;
        debug!("read {} rows from {}", rows.len(), path.display());
        Ok(rows)
    }

    fn save(&self, rows: &RowSet, path: &Path) -> Result<()> {
        self.write_to(rows, File::create(path)?)?;
        debug!("wrote {} rows to {}", rows.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_infers_types() {
        let data = "x,y,name,flag\n1.5,-2,A,true\n,3,\"B, C\",\n";
        let rows = CsvProvider::default().read_from(data.as_bytes()).unwrap();

        assert_eq!(rows.columns(), &["x", "y", "name", "flag"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.get(0, "x"), Some(&Value::Number(1.5)));
        assert_eq!(rows.get(0, "flag"), Some(&Value::Bool(true)));
        assert_eq!(rows.get(1, "x"), Some(&Value::Null));
        assert_eq!(rows.get(1, "name"), Some(&Value::from("B, C")));
    }

    #[test]
    fn test_short_records_are_padded() {
        let data = "a,b,c\n1\n";
        let rows = CsvProvider::default().read_from(data.as_bytes()).unwrap();
        assert_eq!(rows.get(0, "c"), Some(&Value::Null));
    }

    #[test]
    fn test_write_formats_cells() {
        let rows = RowSet::from_rows(
            ["EPSG", "x", "note"],
            vec![vec![4326.0.into(), 0.25.into(), Value::Null]],
        );
        let mut out = Vec::new();
        CsvProvider::default().write_to(&rows, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "EPSG,x,note\n4326,0.25,\n");
    }

    #[test]
    fn test_tab_delimited_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.tsv");
        std::fs::write(&path, "x\ty\n1\t2\n").unwrap();

        let provider = CsvProvider::with_delimiter(b'\t');
        let rows = provider.load(&path).unwrap();
        assert_eq!(rows.get(0, "y"), Some(&Value::Number(2.0)));

        provider.save(&rows, &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x\ty\n1\t2\n");
    }
}
