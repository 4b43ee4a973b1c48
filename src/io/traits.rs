//! Core I/O traits

use std::path::Path;

use crate::error::Result;
use crate::table::RowSet;

/// Loads and saves row-sets in one file format
///
/// Implementations are picked by file extension through
/// [`provider_for`](crate::io::provider_for).
pub trait RowSetProvider: Send + Sync {
    /// Short format name used in log messages
    fn name(&self) -> &'static str;

    /// Reads every row of `path`
    fn load(&self, path: &Path) -> Result<RowSet>;

    /// Writes `rows` to `path`, replacing any existing file
    fn save(&self, rows: &RowSet, path: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    struct Memory;

    impl RowSetProvider for Memory {
        fn name(&self) -> &'static str {
            "memory"
        }

        fn load(&self, _path: &Path) -> Result<RowSet> {
            Ok(RowSet::from_rows(["x"], vec![vec![Value::from(1.0)]]))
        }

        fn save(&self, _rows: &RowSet, _path: &Path) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_provider_is_object_safe() {
        let provider: Box<dyn RowSetProvider> = Box::new(Memory);
        let rows = provider.load(Path::new("ignored")).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(provider.save(&rows, Path::new("ignored")).is_ok());
        assert_eq!(provider.name(), "memory");
    }
}
