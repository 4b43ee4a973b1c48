//! GeoJSON row-sets
//!
//! Each vertex of each feature becomes one row with `x`, `y`, `z`, the part's
//! geometry `type`, its vertex index `n`, a continuation flag `t` (false on
//! the first vertex of a part), a weight `w` and the `layer` name, followed by
//! the feature's properties under lower-cased names. Saving walks the rows
//! back into one feature per part, starting a new part wherever `n` is 0.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::error::{Error, Result};
use crate::io::traits::RowSetProvider;
use crate::table::RowSet;
use crate::types::Value;

const VERTEX_COLUMNS: [&str; 8] = ["x", "y", "z", "type", "n", "t", "w", "layer"];

type Position = Vec<f64>;

#[derive(Debug, Serialize, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    features: Vec<Feature>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    properties: Option<Map<String, serde_json::Value>>,
    geometry: Option<Geometry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

/// One simple part of a geometry: its type name and vertices
struct Part<'a> {
    kind: &'static str,
    vertices: Vec<&'a Position>,
}

impl Geometry {
    /// Flattens into simple parts, polygons into their rings
    fn parts(&self) -> Vec<Part<'_>> {
        let mut parts = Vec::new();
        self.collect_parts(&mut parts);
        parts
    }

    fn collect_parts<'a>(&'a self, parts: &mut Vec<Part<'a>>) {
        let ring = |r: &'a Vec<Position>| Part {
            kind: "LINEARRING",
            vertices: r.iter().collect(),
        };
        match self {
            Geometry::Point { coordinates } => parts.push(Part {
                kind: "POINT",
                vertices: vec![coordinates],
            }),
            Geometry::MultiPoint { coordinates } => {
                parts.extend(coordinates.iter().map(|p| Part {
                    kind: "POINT",
                    vertices: vec![p],
                }));
            }
            Geometry::LineString { coordinates } => parts.push(Part {
                kind: "LINESTRING",
                vertices: coordinates.iter().collect(),
            }),
            Geometry::MultiLineString { coordinates } => {
                parts.extend(coordinates.iter().map(|l| Part {
                    kind: "LINESTRING",
                    vertices: l.iter().collect(),
                }));
            }
            Geometry::Polygon { coordinates } => parts.extend(coordinates.iter().map(ring)),
            Geometry::MultiPolygon { coordinates } => {
                parts.extend(coordinates.iter().flatten().map(ring));
            }
            Geometry::GeometryCollection { geometries } => {
                for geometry in geometries {
                    geometry.collect_parts(parts);
                }
            }
        }
    }

    /// Rebuilds a single-part geometry from a vertex type name
    fn from_part(kind: &str, mut vertices: Vec<Position>) -> Option<Self> {
        let kind = kind.to_ascii_uppercase();
        if vertices.is_empty() {
            return None;
        }
        if kind.contains("POINT") {
            return Some(if vertices.len() == 1 {
                Geometry::Point {
                    coordinates: vertices.remove(0),
                }
            } else {
                Geometry::MultiPoint {
                    coordinates: vertices,
                }
            });
        }
        if kind == "LINEARRING" || kind.contains("POLY") {
            return Some(Geometry::Polygon {
                coordinates: vec![vertices],
            });
        }
        Some(Geometry::LineString {
            coordinates: vertices,
        })
    }
}

fn json_to_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => n.as_f64().map(Value::from_f64).unwrap_or(Value::Null),
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => serde_json::Value::String(s.clone()),
    }
}

/// Reads and writes GeoJSON feature collections as vertex rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeoJsonProvider;

impl GeoJsonProvider {
    /// Reads a feature collection; `layer` names it when the document does not
    pub fn read_from<R: Read>(&self, reader: R, layer: &str) -> Result<RowSet> {
        let collection: FeatureCollection = serde_json::from_reader(reader)?;
        let layer = collection.name.as_deref().unwrap_or(layer);

        let mut rows = RowSet::new(VERTEX_COLUMNS);
        for feature in &collection.features {
            let Some(geometry) = &feature.geometry else {
                continue;
            };
            let properties: Vec<(String, Value)> = feature
                .properties
                .iter()
                .flatten()
                .map(|(k, v)| (k.to_lowercase(), json_to_value(v)))
                .filter(|(k, _)| !VERTEX_COLUMNS.contains(&k.as_str()))
                .collect();

            for part in geometry.parts() {
                for (n, position) in part.vertices.iter().enumerate() {
                    let coord = |i: usize| position.get(i).copied().unwrap_or(if i == 2 { 0.0 } else { f64::NAN });
                    rows.push(vec![
                        Value::from_f64(coord(0)),
                        Value::from_f64(coord(1)),
                        Value::from_f64(coord(2)),
                        Value::from(part.kind),
                        Value::Number(n as f64),
                        Value::Bool(n > 0),
                        Value::Number(0.0),
                        Value::from(layer),
                    ]);
                    let row = rows.len() - 1;
                    for (name, value) in &properties {
                        let column = rows.ensure_column(name, Value::Null);
                        rows.set_cell(row, column, value.clone());
                    }
                }
            }
        }
        Ok(rows)
    }

    /// Writes rows back as a feature collection, one feature per part
    pub fn write_to<W: Write>(&self, rows: &RowSet, writer: W, layer: &str) -> Result<()> {
        let index = |name: &str| rows.column_index(name);
        let x = index("x").ok_or_else(|| Error::MissingColumn("x".to_string()))?;
        let y = index("y").ok_or_else(|| Error::MissingColumn("y".to_string()))?;
        let (z, n, kind) = (index("z"), index("n"), index("type"));
        let properties: Vec<usize> = (0..rows.columns().len())
            .filter(|&c| !VERTEX_COLUMNS[..7].contains(&rows.columns()[c].as_str()))
            .collect();

        let mut features = Vec::new();
        let mut current: Option<(usize, Vec<Position>)> = None;
        for row in 0..rows.len() {
            let starts_part = n.map_or(true, |n| rows.cell(row, n).as_f64() == Some(0.0));
            if starts_part || current.is_none() {
                if let Some((first, vertices)) = current.take() {
                    features.push(self.feature(rows, first, vertices, kind, &properties));
                }
                current = Some((row, Vec::new()));
            }

            let (Some(vx), Some(vy)) = (rows.cell(row, x).as_f64(), rows.cell(row, y).as_f64()) else {
                continue;
            };
            let vz = z.and_then(|z| rows.cell(row, z).as_f64()).unwrap_or(0.0);
            if let Some((_, vertices)) = current.as_mut() {
                vertices.push(vec![vx, vy, vz]);
            }
        }
        if let Some((first, vertices)) = current {
            features.push(self.feature(rows, first, vertices, kind, &properties));
        }

        let name = rows
            .get(0, "layer")
            .filter(|v| !v.is_null())
            .map(|v| v.to_string())
            .unwrap_or_else(|| layer.to_string());
        let collection = FeatureCollection {
            kind: "FeatureCollection".to_string(),
            name: Some(name),
            features,
        };
        serde_json::to_writer_pretty(writer, &collection)?;
        Ok(())
    }

    fn feature(
        &self,
        rows: &RowSet,
        first: usize,
        vertices: Vec<Position>,
        kind: Option<usize>,
        properties: &[usize],
    ) -> Feature {
        let kind = kind
            .map(|k| rows.cell(first, k).to_string())
            .unwrap_or_default();
        let properties = properties
            .iter()
            .map(|&c| (rows.columns()[c].clone(), value_to_json(rows.cell(first, c))))
            .collect();

        Feature {
            kind: "Feature".to_string(),
            properties: Some(properties),
            geometry: Geometry::from_part(&kind, vertices),
        }
    }
}

fn layer_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl RowSetProvider for GeoJsonProvider {
    fn name(&self) -> &'static str {
        "geojson"
    }

    fn load(&self, path: &Path) -> Result<RowSet> {
        let reader = BufReader::new(File::open(path)?);
        let rows = self.read_from(reader, &layer_name(path))?;
        debug!("read {} vertices from {}", rows.len(), path.display());
        Ok(rows)
    }

    fn save(&self, rows: &RowSet, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(rows, &mut writer, &layer_name(path))?;
        writer.flush()?;
        Ok(())
    }
}
