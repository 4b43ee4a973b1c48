use crate::error::{Error, Result};
use crate::projection::coordinate::Coordinate;
use crate::projection::descriptor::CrsDescriptor;
use crate::projection::operation::{Operation, DEFERRED_DEFINITION};
use crate::projection::pipeline::{Pipeline, Step};
use log::{debug, warn};

/// Transforms coordinates between two resolved CRS descriptors
///
/// Plain descriptor pairs use PROJ's CRS-to-CRS operation, normalised to
/// x/easting-first axis order. Compound or affine descriptors are turned
/// into an explicit step pipeline built around that same operation. All
/// three axes go through PROJ, so vertical steps change z.
pub struct Transformer {
    operation: Operation,
    source: CrsDescriptor,
    target: CrsDescriptor,
    pipeline: Option<Pipeline>,
}

impl Transformer {
    /// Creates a transformer between two descriptors
    pub fn between(source: &CrsDescriptor, target: &CrsDescriptor) -> Result<Self> {
        let pipeline = Self::compose(source, target)?;

        let operation = match &pipeline {
            Some(pipeline) => {
                debug!("pipeline {} -> {}: {}", source, target, pipeline);
                Operation::from_definition(&pipeline.definition())?
            }
            None => Self::direct(source, target)?,
        };

        Ok(Self {
            operation,
            source: source.clone(),
            target: target.clone(),
            pipeline,
        })
    }

    /// Resolves two raw descriptor strings with compound expansion and
    /// creates the transformer
    pub fn from_raw(source: &str, target: &str) -> Result<Self> {
        let source = CrsDescriptor::resolve_str(source, true)?
            .ok_or_else(|| Error::Descriptor(format!("unrecognised source CRS '{}'", source)))?;
        let target = CrsDescriptor::resolve_str(target, true)?
            .ok_or_else(|| Error::Descriptor(format!("unrecognised target CRS '{}'", target)))?;

        Self::between(&source, &target)
    }

    /// Builds the step pipeline for a descriptor pair, or `None` when the
    /// direct CRS-to-CRS operation is enough
    ///
    /// Extra source components become inverse steps, each inserted at the
    /// front so the last component runs first. Extra target components
    /// become forward steps appended after the CRS-to-CRS operation.
    ///
    /// An affine primary is a local grid laid over the CRS on the other
    /// side, not a CRS of its own: `xoff=1` to `epsg:3857` means the input
    /// is 3857 shifted by one unit, so only the affine step runs and no
    /// CRS-to-CRS operation is added.
    pub fn compose(source: &CrsDescriptor, target: &CrsDescriptor) -> Result<Option<Pipeline>> {
        let source_primary = source.primary();
        let target_primary = target.primary();

        if !source.is_compound()
            && !target.is_compound()
            && !source_primary.is_affine()
            && !target_primary.is_affine()
        {
            return Ok(None);
        }

        let mut pipeline = if source_primary.is_affine() || target_primary.is_affine() {
            Pipeline::new()
        } else {
            Pipeline::parse(&Self::core_definition(source_primary, target_primary)?)?
        };

        if source_primary.is_affine() {
            pipeline.insert_front(Step::from_component(source_primary, true)?);
        }
        for component in source.extra_components() {
            pipeline.insert_front(Step::from_component(component, true)?);
        }

        if target_primary.is_affine() {
            pipeline.push(Step::from_component(target_primary, false)?);
        }
        for component in target.extra_components() {
            pipeline.push(Step::from_component(component, false)?);
        }

        Ok(Some(pipeline))
    }

    /// PROJ string of the operation between two primary CRS
    ///
    /// When PROJ defers the choice among several candidate operations, the
    /// candidate it ranks first is used.
    fn core_definition(source: &CrsDescriptor, target: &CrsDescriptor) -> Result<String> {
        match Self::direct(source, target)?.definition() {
            Some(definition) if definition != DEFERRED_DEFINITION => Ok(definition),
            _ => {
                warn!(
                    "several operations from {} to {}, composing with the preferred one",
                    source, target
                );
                Operation::preferred(source.definition(), target.definition())?
                    .proj_string()
                    .ok_or_else(|| {
                        Error::Projection(format!(
                            "Operation from {} to {} has no PROJ string form",
                            source, target
                        ))
                    })
            }
        }
    }

    fn direct(source: &CrsDescriptor, target: &CrsDescriptor) -> Result<Operation> {
        Operation::between(source.definition(), target.definition())
    }

    /// Transforms a single coordinate
    pub fn transform(&self, coord: Coordinate) -> Result<Coordinate> {
        let (x, y, z) = self.operation.transform(coord.x, coord.y, coord.z)?;
        Ok(Coordinate::new_3d(x, y, z))
    }

    /// Transforms whole coordinate columns in one PROJ call
    ///
    /// Points with a non-finite x or y are left untouched. Points PROJ
    /// cannot transform are set to NaN on all three axes. Returns how many
    /// points were transformed.
    pub fn transform_columns(&self, xs: &mut [f64], ys: &mut [f64], zs: &mut [f64]) -> Result<usize> {
        if xs.len() != ys.len() || xs.len() != zs.len() {
            return Err(Error::Projection(format!(
                "Coordinate columns differ in length: {}, {}, {}",
                xs.len(),
                ys.len(),
                zs.len()
            )));
        }

        let valid: Vec<usize> = (0..xs.len())
            .filter(|&i| xs[i].is_finite() && ys[i].is_finite())
            .collect();
        if valid.is_empty() {
            return Ok(0);
        }

        let mut points: Vec<(f64, f64, f64)> = valid
            .iter()
            .map(|&i| (xs[i], ys[i], if zs[i].is_finite() { zs[i] } else { 0.0 }))
            .collect();
        let transformed = self.operation.transform_array(&mut points);
        if transformed < valid.len() {
            warn!(
                "{} of {} points could not be transformed from {} to {}",
                valid.len() - transformed,
                valid.len(),
                self.source,
                self.target
            );
        }

        for (&i, &(x, y, z)) in valid.iter().zip(points.iter()) {
            xs[i] = x;
            ys[i] = y;
            zs[i] = z;
        }
        Ok(transformed)
    }

    /// Transforms multiple coordinates in bulk
    pub fn transform_many(&self, coords: &[Coordinate]) -> Result<Vec<Coordinate>> {
        let mut xs: Vec<f64> = coords.iter().map(|c| c.x).collect();
        let mut ys: Vec<f64> = coords.iter().map(|c| c.y).collect();
        let mut zs: Vec<f64> = coords.iter().map(|c| c.z).collect();

        self.transform_columns(&mut xs, &mut ys, &mut zs)?;

        Ok((0..coords.len())
            .map(|i| Coordinate::new_3d(xs[i], ys[i], zs[i]))
            .collect())
    }

    /// Returns the source descriptor
    pub fn source(&self) -> &CrsDescriptor {
        &self.source
    }

    /// Returns the target descriptor
    pub fn target(&self) -> &CrsDescriptor {
        &self.target
    }

    /// Returns the composed pipeline, `None` for a direct transform
    pub fn pipeline(&self) -> Option<&Pipeline> {
        self.pipeline.as_ref()
    }
}
