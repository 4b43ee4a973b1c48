//! epsg-convert - Coordinate reference system conversion for tabular point data
//!
//! Rows of points are read from delimited text or GeoJSON, reprojected from a
//! source CRS to a destination CRS with PROJ, and written back. The source CRS
//! can be global or chosen per group of rows from a CRS column and a lookup
//! table. CRS descriptors accept EPSG codes, WKT/PRJ files, PROJ affine
//! parameter strings and `+`-joined compound descriptors.
//!
//! # Examples
//!
//! ## Global conversion
//!
//! ```no_run
//! use epsg_convert::{convert, ConversionConfig};
//!
//! let config = ConversionConfig {
//!     input_path: "points.csv".into(),
//!     output_path: "points_3857.csv".into(),
//!     srs_input: "4326".into(),
//!     srs_output: "3857".into(),
//!     ..Default::default()
//! };
//! let report = convert::run(&config)?;
//! println!("{}", report);
//! # Ok::<(), epsg_convert::Error>(())
//! ```
//!
//! ## Resolving descriptors
//!
//! ```no_run
//! use epsg_convert::CrsDescriptor;
//!
//! let compound = CrsDescriptor::resolve_str("32723+geoid.gtx", true)?;
//! if let Some(descriptor) = compound {
//!     println!("{} -> EPSG {:?}", descriptor, descriptor.epsg_code());
//! }
//! # Ok::<(), epsg_convert::Error>(())
//! ```

pub mod angle;
pub mod api;
pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod io;
pub mod projection;
pub mod table;
pub mod types;

pub use cache::{CacheStats, TransformCache};
pub use config::{AxisColumns, ConversionConfig};
pub use convert::{ConversionOutcome, ConversionReport, LookupTable};
pub use error::{Error, Result};
pub use projection::{Coordinate, CrsDescriptor, Pipeline, Step, Transformer};
pub use table::{Row, RowSet};
pub use types::Value;
