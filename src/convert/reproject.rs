//! Batch reprojection of the points stored in a row-set

use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;

use crate::cache::TransformCache;
use crate::config::AxisColumns;
use crate::error::{Error, Result};
use crate::projection::{Coordinate, CrsDescriptor};
use crate::table::RowSet;
use crate::types::Value;

/// Column holding serialized point geometries
pub const SHAPE_COLUMN: &str = "SHAPE";

/// Column holding the EPSG code of each row's coordinates
pub const EPSG_COLUMN: &str = "EPSG";

lazy_static! {
    static ref WKT_POINT: Regex =
        Regex::new(r"(?i)^POINT\s*(?:ZM|Z|M)?\s*\(\s*([^)]*?)\s*\)$").unwrap();
}

/// Where the points of a row-set come from, decided once per row-set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointSource {
    /// Serialized geometries in the given column
    Geometry(usize),
    /// Plain x/y/z columns
    Columns,
}

impl PointSource {
    /// Picks the geometry column when present, otherwise plain columns
    pub fn detect(rows: &RowSet) -> Self {
        match rows.column_index(SHAPE_COLUMN) {
            Some(index) => PointSource::Geometry(index),
            None => PointSource::Columns,
        }
    }
}

/// Outcome of one [`reproject`] call
#[derive(Debug, Clone, PartialEq)]
pub struct ReprojectSummary {
    /// Rows in the batch
    pub rows: usize,
    /// Rows that had a usable x/y pair
    pub transformed: usize,
    /// Strategy used to read the points
    pub source: PointSource,
    /// Whether a composed step pipeline was used
    pub pipeline: bool,
    /// Code written to the EPSG column, if that column exists and a code was found
    pub epsg: Option<u32>,
}

/// Parses a serialized point: `(x, y[, z])` tuple text or `POINT [Z] (x y [z])`
pub fn parse_point(text: &str) -> Option<Coordinate> {
    let text = text.trim();
    let body = match WKT_POINT.captures(text) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or_default(),
        None => text
            .trim_start_matches(|c| c == '(' || c == '[')
            .trim_end_matches(|c| c == ')' || c == ']'),
    };

    let values: Vec<f64> = body
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .ok()?;

    match values.as_slice() {
        [x, y] => Some(Coordinate::new(*x, *y)),
        [x, y, z] => Some(Coordinate::new_3d(*x, *y, *z)),
        _ => None,
    }
}

/// Reprojects every point of `rows` from `source` to `target` in place
///
/// The z column is created with zeros when missing. When a `SHAPE` column is
/// present the x/y/z columns are rebuilt from it first; rows without a
/// readable point end up with null coordinates. All points go through PROJ in
/// a single batch; points outside the operation's domain end up null too. An
/// `EPSG` column, when present, is overwritten with the
/// target's code (or null when the target has none).
pub fn reproject(
    rows: &mut RowSet,
    source: &CrsDescriptor,
    target: &CrsDescriptor,
    axes: &AxisColumns,
    cache: &mut TransformCache,
) -> Result<ReprojectSummary> {
    let strategy = PointSource::detect(rows);
    let z = rows.ensure_column(&axes.z, Value::Number(0.0));

    let (x, y) = match strategy {
        PointSource::Geometry(shape) => {
            let x = rows.ensure_column(&axes.x, Value::Null);
            let y = rows.ensure_column(&axes.y, Value::Null);
            extract_geometry(rows, shape, (x, y, z));
            (x, y)
        }
        PointSource::Columns => {
            let x = rows
                .column_index(&axes.x)
                .ok_or_else(|| Error::MissingColumn(axes.x.clone()))?;
            let y = rows
                .column_index(&axes.y)
                .ok_or_else(|| Error::MissingColumn(axes.y.clone()))?;
            (x, y)
        }
    };

    let read = |column: usize, rows: &RowSet| -> Vec<f64> {
        rows.column(column)
            .map(|v| v.as_f64().unwrap_or(f64::NAN))
            .collect()
    };
    let mut xs = read(x, rows);
    let mut ys = read(y, rows);
    let mut zs = read(z, rows);

    let transformer = cache.get_or_build(source, target)?;
    let transformed = transformer.transform_columns(&mut xs, &mut ys, &mut zs)?;
    let pipeline = transformer.pipeline().is_some();

    for row in 0..rows.len() {
        rows.set_cell(row, x, Value::from_f64(xs[row]));
        rows.set_cell(row, y, Value::from_f64(ys[row]));
        rows.set_cell(row, z, Value::from_f64(zs[row]));
    }

    let mut epsg = None;
    if let Some(column) = rows.column_index(EPSG_COLUMN) {
        epsg = target.epsg_code();
        match epsg {
            Some(code) => rows.fill_column(column, Value::Number(code as f64)),
            None => {
                warn!("no EPSG code for {}, clearing {} column", target, EPSG_COLUMN);
                rows.fill_column(column, Value::Null);
            }
        }
    }

    info!(
        "reprojected {} of {} rows from {} to {}",
        transformed,
        rows.len(),
        source,
        target
    );

    Ok(ReprojectSummary {
        rows: rows.len(),
        transformed,
        source: strategy,
        pipeline,
        epsg,
    })
}

/// Rebuilds the coordinate columns from the geometry column
fn extract_geometry(rows: &mut RowSet, shape: usize, (x, y, z): (usize, usize, usize)) {
    for row in 0..rows.len() {
        let point = match rows.cell(row, shape) {
            Value::Text(text) => parse_point(text),
            _ => None,
        };

        let (vx, vy, vz) = match point {
            Some(p) => (Value::Number(p.x), Value::Number(p.y), Value::Number(p.z)),
            None => {
                debug!("row {} has no point geometry", rows.rows()[row].id());
                (Value::Null, Value::Null, Value::Null)
            }
        };
        rows.set_cell(row, x, vx);
        rows.set_cell(row, y, vy);
        rows.set_cell(row, z, vz);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epsg(code: u32) -> CrsDescriptor {
        CrsDescriptor::Epsg(format!("epsg:{}", code))
    }

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("(1.5, -2)"), Some(Coordinate::new(1.5, -2.0)));
        assert_eq!(parse_point("(1, 2, 3)"), Some(Coordinate::new_3d(1.0, 2.0, 3.0)));
        assert_eq!(parse_point("POINT (10 20)"), Some(Coordinate::new(10.0, 20.0)));
        assert_eq!(parse_point("point z (10 20 30)"), Some(Coordinate::new_3d(10.0, 20.0, 30.0)));
        assert_eq!(parse_point("POINT EMPTY"), None);
        assert_eq!(parse_point("LINESTRING (1 2, 3 4)"), None);
        assert_eq!(parse_point("(1)"), None);
    }

    #[test]
    fn test_detect_strategy() {
        let plain = RowSet::new(["x", "y"]);
        assert_eq!(PointSource::detect(&plain), PointSource::Columns);

        let shaped = RowSet::new(["id", "SHAPE"]);
        assert_eq!(PointSource::detect(&shaped), PointSource::Geometry(1));
    }

    #[test]
    fn test_reproject_columns_adds_z() {
        let mut rows = RowSet::from_rows(
            ["x", "y", "name"],
            vec![
                vec![10.0.into(), 0.0.into(), "a".into()],
                vec![Value::Null, Value::Null, "b".into()],
            ],
        );
        let mut cache = TransformCache::new();
        let summary =
            reproject(&mut rows, &epsg(4326), &epsg(3857), &AxisColumns::default(), &mut cache).unwrap();

        assert_eq!(summary.rows, 2);
        assert_eq!(summary.transformed, 1);
        assert_eq!(summary.source, PointSource::Columns);
        assert!(!summary.pipeline);

        let x = rows.get(0, "x").and_then(Value::as_f64).unwrap();
        assert!((x - 1_113_194.9).abs() < 1.0);
        assert_eq!(rows.get(0, "z"), Some(&Value::Number(0.0)));
        assert_eq!(rows.get(1, "x"), Some(&Value::Null));
        assert_eq!(rows.get(1, "name"), Some(&Value::from("b")));
    }

    #[test]
    fn test_reproject_missing_axis() {
        let mut rows = RowSet::new(["lon", "lat"]);
        let mut cache = TransformCache::new();
        let err = reproject(&mut rows, &epsg(4326), &epsg(3857), &AxisColumns::default(), &mut cache)
            .unwrap_err();
        assert!(matches!(err, Error::MissingColumn(ref c) if c == "x"));
    }

    #[test]
    fn test_reproject_geometry_column() {
        let mut rows = RowSet::from_rows(
            ["SHAPE", "x", "y"],
            vec![
                vec!["(10.0, 0.0, 7.0)".into(), 99.0.into(), 99.0.into()],
                vec![Value::Null, 99.0.into(), 99.0.into()],
            ],
        );
        let mut cache = TransformCache::new();
        let summary =
            reproject(&mut rows, &epsg(4326), &epsg(3857), &AxisColumns::default(), &mut cache).unwrap();

        assert_eq!(summary.source, PointSource::Geometry(0));
        assert_eq!(summary.transformed, 1);
        let x = rows.get(0, "x").and_then(Value::as_f64).unwrap();
        assert!((x - 1_113_194.9).abs() < 1.0);
        assert_eq!(rows.get(0, "z"), Some(&Value::Number(7.0)));
        assert_eq!(rows.get(1, "x"), Some(&Value::Null));
        assert_eq!(rows.get(1, "y"), Some(&Value::Null));
    }

    #[test]
    fn test_epsg_column_updated() {
        let mut rows = RowSet::from_rows(
            ["x", "y", "EPSG"],
            vec![vec![1.0.into(), 1.0.into(), 4326.0.into()]],
        );
        let mut cache = TransformCache::new();
        let summary =
            reproject(&mut rows, &epsg(4326), &epsg(3857), &AxisColumns::default(), &mut cache).unwrap();

        assert_eq!(summary.epsg, Some(3857));
        assert_eq!(rows.get(0, "EPSG"), Some(&Value::Number(3857.0)));
    }

    #[test]
    fn test_epsg_column_cleared_for_unknown_code() {
        let mut rows = RowSet::from_rows(
            ["x", "y", "EPSG"],
            vec![vec![1.0.into(), 1.0.into(), 4326.0.into()]],
        );
        let target = CrsDescriptor::Text("+proj=longlat +datum=WGS84 +no_defs".into());
        let mut cache = TransformCache::new();
        let summary =
            reproject(&mut rows, &epsg(4326), &target, &AxisColumns::default(), &mut cache).unwrap();

        assert_eq!(summary.epsg, None);
        assert_eq!(rows.get(0, "EPSG"), Some(&Value::Null));
    }
    #[test]
    fn test_out_of_range_row_becomes_null() {
        let mut rows = RowSet::from_rows(
            ["x", "y"],
            vec![
                vec![10.0.into(), 0.0.into()],
                vec![10.0.into(), 95.0.into()],
                vec![10.0.into(), 0.0.into()],
            ],
        );
        let mut cache = TransformCache::new();
        let summary =
            reproject(&mut rows, &epsg(4326), &epsg(3857), &AxisColumns::default(), &mut cache).unwrap();

        assert_eq!(summary.transformed, 2);
        assert_eq!(rows.get(1, "x"), Some(&Value::Null));
        assert_eq!(rows.get(1, "y"), Some(&Value::Null));
        let x = rows.get(2, "x").and_then(Value::as_f64).unwrap();
        assert!((x - 1_113_194.9).abs() < 1.0);
    }

    #[test]
    fn test_vertical_component_updates_z_column() {
        let mut rows = RowSet::from_rows(
            ["x", "y", "z"],
            vec![vec![10.0.into(), 0.0.into(), 20.0.into()]],
        );
        let source = CrsDescriptor::resolve_str("4326+zoff=5", true).unwrap().unwrap();
        let mut cache = TransformCache::new();
        let summary =
            reproject(&mut rows, &source, &epsg(3857), &AxisColumns::default(), &mut cache).unwrap();

        assert!(summary.pipeline);
        assert_eq!(rows.get(0, "z"), Some(&Value::Number(15.0)));
    }

    #[test]
    fn test_affine_is_relative_to_the_other_crs() {
        let mut rows = RowSet::from_rows(
            ["x", "y", "EPSG"],
            vec![vec![101.0.into(), 202.0.into(), Value::Null]],
        );
        let local = CrsDescriptor::resolve_str("xoff=1 yoff=2", true).unwrap().unwrap();
        let mut cache = TransformCache::new();
        let summary =
            reproject(&mut rows, &local, &epsg(3857), &AxisColumns::default(), &mut cache).unwrap();

        assert_eq!(summary.epsg, Some(3857));
        assert_eq!(rows.get(0, "x"), Some(&Value::Number(100.0)));
        assert_eq!(rows.get(0, "y"), Some(&Value::Number(200.0)));
        assert_eq!(rows.get(0, "EPSG"), Some(&Value::Number(3857.0)));

        let summary =
            reproject(&mut rows, &epsg(3857), &local, &AxisColumns::default(), &mut cache).unwrap();
        assert_eq!(summary.epsg, None);
        assert_eq!(rows.get(0, "x"), Some(&Value::Number(101.0)));
        assert_eq!(rows.get(0, "EPSG"), Some(&Value::Null));
    }
}
