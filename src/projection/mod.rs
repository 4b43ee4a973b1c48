//! CRS resolution and coordinate transformation

pub mod coordinate;
pub mod descriptor;
pub mod operation;
pub mod pipeline;
pub mod sidecar;
pub mod transformer;

pub use coordinate::Coordinate;
pub use descriptor::CrsDescriptor;
pub use pipeline::{Pipeline, Step};
pub use transformer::Transformer;
