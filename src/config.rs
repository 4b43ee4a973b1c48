//! Conversion parameters
//!
//! A [`ConversionConfig`] can be read from a TOML file and then overridden
//! field by field from the command line. Axis column names are resolved once
//! into an [`AxisColumns`] before any data is touched.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default x column name
pub const DEFAULT_X: &str = "x";
/// Default y column name
pub const DEFAULT_Y: &str = "y";
/// Default z column name
pub const DEFAULT_Z: &str = "z";

/// Parameters of one conversion run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// File to read points from
    pub input_path: PathBuf,
    /// File to write converted points to
    pub output_path: PathBuf,
    /// X/longitude column, `x` when empty
    pub x: String,
    /// Y/latitude column, `y` when empty
    pub y: String,
    /// Z/elevation column, `z` when empty
    pub z: String,
    /// Parse X/Y text such as `23°26'16"S` into decimal degrees first
    pub convert_clock_to_decimal: bool,
    /// Pick each row's source CRS from `srs_column` and `srs_lookup`
    pub convert_lookup: bool,
    /// Column holding the raw per-row CRS value
    pub srs_column: String,
    /// Two-column table mapping raw CRS values to descriptors
    pub srs_lookup: Option<PathBuf>,
    /// Source CRS, also the fallback for unresolvable rows in lookup mode
    pub srs_input: String,
    /// Destination CRS
    pub srs_output: String,
    /// Extract custom CRS definitions from `custom_crs_archive` first
    pub custom_crs: bool,
    /// Zip archive with entries named after `srs_input`/`srs_output`
    pub custom_crs_archive: Option<PathBuf>,
    /// Write a `.prj` sidecar next to the output
    pub write_prj: bool,
}

impl ConversionConfig {
    /// Parses a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Axis columns with defaults applied
    pub fn axes(&self) -> AxisColumns {
        AxisColumns::resolve(&self.x, &self.y, &self.z)
    }

    /// Checks that the parameters describe a runnable conversion
    pub fn validate(&self) -> Result<()> {
        if self.input_path.as_os_str().is_empty() {
            return Err(Error::Config("input_path is required".to_string()));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(Error::Config("output_path is required".to_string()));
        }
        if self.srs_output.trim().is_empty() {
            return Err(Error::Config("srs_output is required".to_string()));
        }
        if self.convert_lookup {
            if self.srs_column.trim().is_empty() {
                return Err(Error::Config("convert_lookup requires srs_column".to_string()));
            }
            if self.srs_lookup.is_none() {
                return Err(Error::Config("convert_lookup requires srs_lookup".to_string()));
            }
        } else if self.srs_input.trim().is_empty() {
            return Err(Error::Config("srs_input is required".to_string()));
        }
        if self.custom_crs && self.custom_crs_archive.is_none() {
            return Err(Error::Config("custom_crs requires custom_crs_archive".to_string()));
        }
        Ok(())
    }
}

/// Resolved names of the coordinate columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisColumns {
    pub x: String,
    pub y: String,
    pub z: String,
    /// Whether any name fell back to its default
    pub defaults_applied: bool,
}

impl AxisColumns {
    /// Applies `x`/`y`/`z` defaults to empty names
    pub fn resolve(x: &str, y: &str, z: &str) -> Self {
        let mut defaults_applied = false;
        let mut pick = |name: &str, default: &str| {
            let name = name.trim();
            if name.is_empty() {
                defaults_applied = true;
                default.to_string()
            } else {
                name.to_string()
            }
        };

        let x = pick(x, DEFAULT_X);
        let y = pick(y, DEFAULT_Y);
        let z = pick(z, DEFAULT_Z);

        Self {
            x,
            y,
            z,
            defaults_applied,
        }
    }
}

impl Default for AxisColumns {
    fn default() -> Self {
        Self::resolve("", "", "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_defaults() {
        let axes = AxisColumns::default();
        assert_eq!((axes.x.as_str(), axes.y.as_str(), axes.z.as_str()), ("x", "y", "z"));
        assert!(axes.defaults_applied);

        let axes = AxisColumns::resolve("lon", "lat", "elev");
        assert_eq!(axes.x, "lon");
        assert!(!axes.defaults_applied);

        let axes = AxisColumns::resolve("lon", "lat", " ");
        assert_eq!(axes.z, "z");
        assert!(axes.defaults_applied);
    }

    #[test]
    fn test_from_toml() {
        let config = ConversionConfig::from_toml_str(
            r#"
            input_path = "points.csv"
            output_path = "out.csv"
            x = "lon"
            convert_lookup = true
            srs_column = "datum"
            srs_lookup = "lookup.csv"
            srs_output = "4326"
            "#,
        )
        .unwrap();

        assert_eq!(config.input_path, PathBuf::from("points.csv"));
        assert_eq!(config.axes().x, "lon");
        assert_eq!(config.axes().y, "y");
        assert!(config.convert_lookup);
        assert!(!config.write_prj);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let mut config = ConversionConfig {
            input_path: "in.csv".into(),
            output_path: "out.csv".into(),
            srs_input: "4326".into(),
            srs_output: "3857".into(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.convert_lookup = true;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.convert_lookup = false;
        config.custom_crs = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        let err = ConversionConfig::from_toml_str("convert_lookup = \"maybe\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
