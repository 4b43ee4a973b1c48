use serde::{Deserialize, Serialize};

use crate::projection::CrsDescriptor;

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub srs: String,
    #[serde(default = "default_expand")]
    pub expand: bool,
}

fn default_expand() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub input: String,
    pub descriptor: Option<CrsDescriptor>,
    pub display: Option<String>,
    pub epsg: Option<u32>,
}

/// Form fields accepted next to the uploaded file in `/api/convert`
#[derive(Debug, Default)]
pub struct ConvertForm {
    pub file: Option<Vec<u8>>,
    pub lookup: Option<Vec<u8>>,
    pub x: String,
    pub y: String,
    pub z: String,
    pub srs_input: String,
    pub srs_output: String,
    pub srs_column: String,
    pub convert_clock_to_decimal: bool,
    pub convert_lookup: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
