//! Error types for epsg-convert

use std::fmt;
use std::io;

/// Result type for epsg-convert operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while converting a row-set
#[derive(Debug)]
pub enum Error {
    /// I/O error, including unreadable `.wkt`/`.prj` descriptor files
    Io(io::Error),

    /// Delimited-text read/write error
    Csv(csv::Error),

    /// JSON (GeoJSON) read/write error
    Json(serde_json::Error),

    /// Custom CRS archive error
    Archive(String),

    /// Spreadsheet workbook read error
    Workbook(String),

    /// Invalid configuration
    Config(String),

    /// CRS descriptor could not be used to build a transformation
    Descriptor(String),

    /// PROJ failed to create or apply a transformation
    Projection(String),

    /// Required column is not present in the row-set
    MissingColumn(String),

    /// No provider handles the given file format
    UnsupportedFormat(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Csv(e) => write!(f, "CSV error: {}", e),
            Error::Json(e) => write!(f, "JSON error: {}", e),
            Error::Archive(msg) => write!(f, "Archive error: {}", msg),
            Error::Workbook(msg) => write!(f, "Workbook error: {}", msg),
            Error::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::Descriptor(msg) => write!(f, "Invalid CRS descriptor: {}", msg),
            Error::Projection(msg) => write!(f, "Projection error: {}", msg),
            Error::MissingColumn(name) => write!(f, "Missing column: {}", name),
            Error::UnsupportedFormat(ext) => write!(f, "Unsupported format: {}", ext),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Csv(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(error)
    }
}

impl From<csv::Error> for Error {
    fn from(error: csv::Error) -> Self {
        Error::Csv(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json(error)
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(error: zip::result::ZipError) -> Self {
        Error::Archive(error.to_string())
    }
}

impl From<calamine::Error> for Error {
    fn from(error: calamine::Error) -> Self {
        Error::Workbook(error.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Config(error.to_string())
    }
}
