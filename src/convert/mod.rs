//! Conversion runs
//!
//! [`convert_rows`] applies a [`ConversionConfig`] to an in-memory row-set;
//! [`run`] wraps it with file loading, saving, archive extraction and the
//! optional `.prj` sidecar.

pub mod lookup;
pub mod reproject;

use std::env;
use std::fmt;
use std::path::PathBuf;

use log::info;

use crate::angle;
use crate::cache::{CacheStats, TransformCache};
use crate::config::ConversionConfig;
use crate::error::{Error, Result};
use crate::io;
use crate::projection::sidecar;
use crate::projection::CrsDescriptor;
use crate::table::RowSet;

pub use lookup::{convert_by_lookup, GroupOutcome, GroupReport, LookupReport, LookupTable};
pub use reproject::{parse_point, reproject, PointSource, ReprojectSummary, EPSG_COLUMN, SHAPE_COLUMN};

/// How the rows were converted
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionOutcome {
    /// One source CRS for the whole row-set
    Global(ReprojectSummary),
    /// Source CRS chosen per group of rows
    Lookup(LookupReport),
}

/// Result of [`convert_rows`]
#[derive(Debug, Clone, PartialEq)]
pub struct RowsReport {
    pub outcome: ConversionOutcome,
    pub target: CrsDescriptor,
    pub cache: CacheStats,
}

/// Result of a full [`run`]
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    pub rows: usize,
    pub output_path: PathBuf,
    pub sidecar: Option<PathBuf>,
    pub extracted: Vec<PathBuf>,
    pub conversion: RowsReport,
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rows: {}", self.rows)?;
        writeln!(f, "Output: {}", self.output_path.display())?;
        writeln!(f, "Target CRS: {}", self.conversion.target)?;
        match &self.conversion.outcome {
            ConversionOutcome::Global(summary) => {
                writeln!(f, "Transformed: {} of {}", summary.transformed, summary.rows)?;
            }
            ConversionOutcome::Lookup(report) => {
                writeln!(
                    f,
                    "Groups: {} ({} rows converted, {} skipped)",
                    report.groups.len(),
                    report.converted_rows(),
                    report.skipped_rows()
                )?;
                for group in &report.groups {
                    writeln!(f, "  {} [{} rows]: {:?}", group.key, group.rows, group.outcome)?;
                }
            }
        }
        if let Some(path) = &self.sidecar {
            writeln!(f, "Sidecar: {}", path.display())?;
        }
        write!(
            f,
            "Transformers built: {} (reused {} times)",
            self.conversion.cache.misses, self.conversion.cache.hits
        )
    }
}

fn require(raw: &str, what: &str) -> Result<CrsDescriptor> {
    CrsDescriptor::resolve_str(raw, true)?
        .ok_or_else(|| Error::Descriptor(format!("{} '{}' is not a recognised CRS", what, raw)))
}

/// Applies `config` to `rows` in place
///
/// `lookup` is required when `config.convert_lookup` is set. File paths in
/// `config` are not used here.
pub fn convert_rows(
    rows: &mut RowSet,
    config: &ConversionConfig,
    lookup: Option<&LookupTable>,
) -> Result<RowsReport> {
    let axes = config.axes();
    if config.convert_clock_to_decimal {
        angle::normalize_columns(rows, &[axes.x.as_str(), axes.y.as_str()])?;
    }

    let target = require(&config.srs_output, "srs_output")?;
    let mut cache = TransformCache::new();

    let outcome = if config.convert_lookup {
        let lookup = lookup
            .ok_or_else(|| Error::Config("convert_lookup requires a lookup table".to_string()))?;
        let default_source = if config.srs_input.trim().is_empty() {
            None
        } else {
            Some(require(&config.srs_input, "srs_input")?)
        };
        let report = convert_by_lookup(
            rows,
            &config.srs_column,
            lookup,
            default_source.as_ref(),
            &target,
            &axes,
            &mut cache,
        )?;
        ConversionOutcome::Lookup(report)
    } else {
        let source = require(&config.srs_input, "srs_input")?;
        ConversionOutcome::Global(reproject(rows, &source, &target, &axes, &mut cache)?)
    };

    Ok(RowsReport {
        outcome,
        target,
        cache: cache.stats(),
    })
}

/// Runs one file-to-file conversion
pub fn run(config: &ConversionConfig) -> Result<ConversionReport> {
    config.validate()?;

    let mut extracted = Vec::new();
    if config.custom_crs {
        if let Some(archive) = &config.custom_crs_archive {
            let dest = env::current_dir()?;
            extracted = io::archive::extract_definitions(
                archive,
                &[config.srs_input.as_str(), config.srs_output.as_str()],
                &dest,
            )?;
        }
    }

    let lookup = if config.convert_lookup {
        match &config.srs_lookup {
            Some(path) => Some(LookupTable::load(path)?),
            None => None,
        }
    } else {
        None
    };

    let reader = io::provider_for(&config.input_path)?;
    let mut rows = reader.load(&config.input_path)?;
    info!(
        "loaded {} rows from {} ({})",
        rows.len(),
        config.input_path.display(),
        reader.name()
    );

    let conversion = convert_rows(&mut rows, config, lookup.as_ref())?;

    let writer = io::provider_for(&config.output_path)?;
    writer.save(&rows, &config.output_path)?;
    info!("saved {} rows to {}", rows.len(), config.output_path.display());

    let sidecar = if config.write_prj {
        sidecar::write_sidecar(&config.output_path, &conversion.target)?
    } else {
        None
    };

    Ok(ConversionReport {
        rows: rows.len(),
        output_path: config.output_path.clone(),
        sidecar,
        extracted,
        conversion,
    })
}
