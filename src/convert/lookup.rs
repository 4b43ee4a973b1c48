//! Per-group source CRS selection
//!
//! Rows are grouped by the raw value of a CRS column. Each group's source
//! CRS is taken from the lookup table, then from the raw value itself, then
//! from the global default. Converted groups are merged back into the full
//! row-set by row identity so the original order is kept.

use std::collections::HashMap;
use std::path::Path;

use log::{info, warn};

use crate::cache::TransformCache;
use crate::config::AxisColumns;
use crate::convert::reproject::{reproject, PointSource, EPSG_COLUMN};
use crate::error::{Error, Result};
use crate::io;
use crate::projection::CrsDescriptor;
use crate::table::RowSet;
use crate::types::Value;

/// Mapping from raw CRS values to CRS descriptors
///
/// Built from a two-column table: first column is the raw value, second the
/// descriptor. Keys compare by their text form so `4326` and `4326.0` match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupTable {
    entries: HashMap<String, Value>,
}

impl LookupTable {
    /// Builds a table from the first two columns of a row-set
    pub fn from_rows(rows: &RowSet) -> Result<Self> {
        if rows.columns().len() < 2 {
            return Err(Error::MissingColumn(
                "lookup table needs a key and a value column".to_string(),
            ));
        }

        let mut entries = HashMap::new();
        for row in rows.rows() {
            let key = &row.cells()[0];
            if key.is_null() {
                continue;
            }
            entries
                .entry(key.to_string())
                .or_insert_with(|| row.cells()[1].clone());
        }
        Ok(Self { entries })
    }

    /// Loads a table from any supported row-set file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let rows = io::provider_for(path)?.load(path)?;
        let table = Self::from_rows(&rows)?;
        info!("loaded {} CRS lookup entries from {}", table.len(), path.display());
        Ok(table)
    }

    /// Mapped value for a raw key
    pub fn get(&self, key: &Value) -> Option<&Value> {
        if key.is_null() {
            return None;
        }
        self.entries.get(&key.to_string())
    }

    /// Mapped values in no particular order
    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for LookupTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut entries = HashMap::new();
        for (key, value) in iter {
            entries.entry(key.into().to_string()).or_insert(value.into());
        }
        Self { entries }
    }
}

/// What happened to one group of rows
#[derive(Debug, Clone, PartialEq)]
pub enum GroupOutcome {
    /// Reprojected from `source`
    Converted {
        source: CrsDescriptor,
        points: PointSource,
    },
    /// The lookup maps the key to a blank or unrecognised descriptor
    SkippedUnresolved,
    /// No lookup entry, the raw value is not a CRS, and there is no default
    SkippedNoDefault,
}

/// Report for one distinct CRS column value
#[derive(Debug, Clone, PartialEq)]
pub struct GroupReport {
    pub key: Value,
    pub rows: usize,
    pub outcome: GroupOutcome,
}

impl GroupReport {
    pub fn is_converted(&self) -> bool {
        matches!(self.outcome, GroupOutcome::Converted { .. })
    }
}

/// Report for a whole lookup conversion, groups in first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupReport {
    pub groups: Vec<GroupReport>,
}

impl LookupReport {
    /// Rows that were reprojected
    pub fn converted_rows(&self) -> usize {
        self.groups.iter().filter(|g| g.is_converted()).map(|g| g.rows).sum()
    }

    /// Rows left untouched
    pub fn skipped_rows(&self) -> usize {
        self.groups.iter().filter(|g| !g.is_converted()).map(|g| g.rows).sum()
    }
}

/// Picks the source CRS of one group
fn select_source(
    key: &Value,
    lookup: &LookupTable,
    default_source: Option<&CrsDescriptor>,
) -> Result<std::result::Result<CrsDescriptor, GroupOutcome>> {
    if let Some(mapped) = lookup.get(key) {
        return Ok(match CrsDescriptor::resolve(mapped, true)? {
            Some(source) => Ok(source),
            None => Err(GroupOutcome::SkippedUnresolved),
        });
    }

    if let Some(source) = CrsDescriptor::resolve(key, true)? {
        return Ok(Ok(source));
    }

    Ok(match default_source {
        Some(source) => Ok(source.clone()),
        None => Err(GroupOutcome::SkippedNoDefault),
    })
}

/// Reprojects `rows` group by group, choosing each group's source CRS from
/// the value in `key_column`
///
/// The z column is added to the full row-set before grouping so every group
/// writes into it. Converted coordinates and the `EPSG` column are written
/// back as they are, nulls included. Skipped groups keep their original
/// values.
pub fn convert_by_lookup(
    rows: &mut RowSet,
    key_column: &str,
    lookup: &LookupTable,
    default_source: Option<&CrsDescriptor>,
    target: &CrsDescriptor,
    axes: &AxisColumns,
    cache: &mut TransformCache,
) -> Result<LookupReport> {
    let key_index = rows
        .column_index(key_column)
        .ok_or_else(|| Error::MissingColumn(key_column.to_string()))?;

    rows.ensure_column(&axes.z, Value::Number(0.0));
    if let PointSource::Geometry(_) = PointSource::detect(rows) {
        rows.ensure_column(&axes.x, Value::Null);
        rows.ensure_column(&axes.y, Value::Null);
    }

    let mut report = LookupReport::default();
    for key in rows.distinct(key_index) {
        let mut group = rows.filter(|row| row.cells()[key_index] == key);
        let count = group.len();

        let outcome = match select_source(&key, lookup, default_source)? {
            Ok(source) => {
                info!("{} {} ({} rows)", key, source, count);
                let summary = reproject(&mut group, &source, target, axes, cache)?;
                rows.update(&group);
                // nulls from rejected points or a code-less target must replace the old values
                rows.assign_columns(
                    &group,
                    &[axes.x.as_str(), axes.y.as_str(), axes.z.as_str(), EPSG_COLUMN],
                );
                GroupOutcome::Converted {
                    source,
                    points: summary.source,
                }
            }
            Err(skipped) => {
                warn!("skipping {} rows with CRS value '{}': {:?}", count, key, skipped);
                skipped
            }
        };

        report.groups.push(GroupReport {
            key,
            rows: count,
            outcome,
        });
    }

    info!(
        "lookup conversion: {} rows converted, {} skipped",
        report.converted_rows(),
        report.skipped_rows()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epsg(code: u32) -> CrsDescriptor {
        CrsDescriptor::Epsg(format!("epsg:{}", code))
    }

    fn points() -> RowSet {
        RowSet::from_rows(
            ["x", "y", "srs"],
            vec![
                vec![10.0.into(), 0.0.into(), "A".into()],
                vec![500_000.0.into(), 10_000_000.0.into(), 32723.0.into()],
                vec![1.0.into(), 1.0.into(), "C".into()],
                vec![10.0.into(), 0.0.into(), "A".into()],
            ],
        )
    }

    #[test]
    fn test_lookup_from_rows() {
        let rows = RowSet::from_rows(
            ["raw", "crs"],
            vec![
                vec![4326.0.into(), "epsg:4326".into()],
                vec!["SAD69".into(), "4618".into()],
                vec![Value::Null, "ignored".into()],
            ],
        );
        let table = LookupTable::from_rows(&rows).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&Value::from(4326.0)), Some(&Value::from("epsg:4326")));
        assert_eq!(table.get(&Value::from("SAD69")), Some(&Value::from("4618")));
        assert_eq!(table.get(&Value::Null), None);
    }

    #[test]
    fn test_lookup_needs_two_columns() {
        let rows = RowSet::new(["only"]);
        assert!(LookupTable::from_rows(&rows).is_err());
    }

    #[test]
    fn test_select_source_order() {
        let lookup: LookupTable = [("A", "epsg:4326"), ("BLANK", "")].into_iter().collect();
        let default = epsg(3857);

        let pick = |key: Value, default: Option<&CrsDescriptor>| {
            select_source(&key, &lookup, default).unwrap()
        };

        assert_eq!(pick("A".into(), Some(&default)), Ok(epsg(4326)));
        assert_eq!(pick(32723.0.into(), Some(&default)), Ok(epsg(32723)));
        assert_eq!(pick("C".into(), Some(&default)), Ok(epsg(3857)));
        assert_eq!(pick("C".into(), None), Err(GroupOutcome::SkippedNoDefault));
        assert_eq!(pick("BLANK".into(), Some(&default)), Err(GroupOutcome::SkippedUnresolved));
    }

    #[test]
    fn test_convert_by_lookup_keeps_order() {
        let mut rows = points();
        let lookup: LookupTable = [("A", "epsg:4326")].into_iter().collect();
        let mut cache = TransformCache::new();

        let report = convert_by_lookup(
            &mut rows,
            "srs",
            &lookup,
            None,
            &epsg(3857),
            &AxisColumns::default(),
            &mut cache,
        )
        .unwrap();

        assert_eq!(report.groups.len(), 3);
        assert_eq!(report.converted_rows(), 3);
        assert_eq!(report.skipped_rows(), 1);
        assert_eq!(report.groups[2].outcome, GroupOutcome::SkippedNoDefault);

        assert_eq!(rows.len(), 4);
        let srs: Vec<String> = rows.column(2).map(|v| v.to_string()).collect();
        assert_eq!(srs, vec!["A", "32723", "C", "A"]);

        let x0 = rows.get(0, "x").and_then(Value::as_f64).unwrap();
        let x3 = rows.get(3, "x").and_then(Value::as_f64).unwrap();
        assert!((x0 - 1_113_194.9).abs() < 1.0);
        assert_eq!(x0, x3);

        // UTM 23S false easting lands on the central meridian, 45W
        let x1 = rows.get(1, "x").and_then(Value::as_f64).unwrap();
        assert!((x1 + 5_009_377.1).abs() < 1.0, "{}", x1);

        // skipped group untouched, z still defaulted
        assert_eq!(rows.get(2, "x"), Some(&Value::Number(1.0)));
        assert_eq!(rows.get(2, "z"), Some(&Value::Number(0.0)));
        assert_eq!(cache.stats().transformers, 2);
    }

    #[test]
    fn test_convert_by_lookup_default() {
        let mut rows = points();
        let lookup = LookupTable::default();
        let mut cache = TransformCache::new();

        let report = convert_by_lookup(
            &mut rows,
            "srs",
            &lookup,
            Some(&epsg(4326)),
            &epsg(4326),
            &AxisColumns::default(),
            &mut cache,
        )
        .unwrap();

        assert_eq!(report.skipped_rows(), 0);
        assert_eq!(
            report.groups[0].outcome,
            GroupOutcome::Converted {
                source: epsg(4326),
                points: PointSource::Columns
            }
        );
        let x2 = rows.get(2, "x").and_then(Value::as_f64).unwrap();
        assert!((x2 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_convert_by_lookup_writes_back_nulls() {
        let mut rows = RowSet::from_rows(
            ["x", "y", "srs", "EPSG"],
            vec![
                vec![10.0.into(), 0.0.into(), "A".into(), 4326.0.into()],
                vec![10.0.into(), 95.0.into(), "A".into(), 4326.0.into()],
            ],
        );
        let lookup: LookupTable = [("A", "epsg:4326")].into_iter().collect();
        let target = CrsDescriptor::Text("+proj=merc +datum=WGS84 +type=crs".into());
        let mut cache = TransformCache::new();

        convert_by_lookup(
            &mut rows,
            "srs",
            &lookup,
            None,
            &target,
            &AxisColumns::default(),
            &mut cache,
        )
        .unwrap();

        assert!(rows.get(0, "x").and_then(Value::as_f64).is_some());
        assert_eq!(rows.get(1, "x"), Some(&Value::Null));
        assert_eq!(rows.get(1, "y"), Some(&Value::Null));
        assert_eq!(rows.get(0, "EPSG"), Some(&Value::Null));
        assert_eq!(rows.get(1, "EPSG"), Some(&Value::Null));
        assert_eq!(rows.get(1, "srs"), Some(&Value::from("A")));
    }

    #[test]
    fn test_missing_key_column() {
        let mut rows = points();
        let mut cache = TransformCache::new();
        let err = convert_by_lookup(
            &mut rows,
            "datum",
            &LookupTable::default(),
            None,
            &epsg(4326),
            &AxisColumns::default(),
            &mut cache,
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingColumn(ref c) if c == "datum"));
    }
}
