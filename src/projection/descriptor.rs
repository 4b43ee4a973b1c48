//! Resolution of user-supplied CRS values into descriptors PROJ can use
//!
//! Accepted shapes, checked in this order:
//!
//! | input                         | descriptor                       |
//! |-------------------------------|----------------------------------|
//! | number, all-digit text        | `epsg:<n>`                       |
//! | `epsg:<n>`                    | `epsg:<n>`                       |
//! | text containing `+`           | compound (or its first component)|
//! | text containing `=`           | `proj=affine <text>`             |
//! | path ending `.wkt` / `.prj`   | file content                     |
//!
//! Anything else is unresolved (`None`) and the caller picks a fallback.

use std::fmt;
use std::fs;

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::Serialize;

use crate::error::Result;
use crate::types::Value;

lazy_static! {
    static ref EPSG_PREFIXED: Regex = Regex::new(r"(?i)^epsg:\s*([0-9]+)$").unwrap();
    static ref WKT_AUTHORITY: Regex =
        Regex::new(r#"(?:AUTHORITY|ID)\[\s*"EPSG"\s*,\s*"?([0-9]+)"?"#).unwrap();
}

/// Prefix applied to `=`-style parameter strings
const AFFINE_PREFIX: &str = "proj=affine ";

/// A resolved coordinate reference system descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CrsDescriptor {
    /// Canonical `epsg:<n>` text
    Epsg(String),
    /// WKT or PROJ text, usually read from a `.wkt`/`.prj` file
    Text(String),
    /// `+`-joined components, primary first
    Compound(Vec<CrsDescriptor>),
    /// `proj=affine ...` operation text
    Affine(String),
}

impl CrsDescriptor {
    /// Resolves a cell value
    ///
    /// Non-text values are taken as EPSG codes. Null and boolean cells are
    /// unresolved.
    ///
    /// With `expand_compound` false a `+`-joined value resolves to its
    /// primary component only and the remaining components are dropped.
    /// Callers that must honour vertical or grid components have to pass
    /// `true`.
    pub fn resolve(raw: &Value, expand_compound: bool) -> Result<Option<Self>> {
        match raw {
            Value::Number(n) if n.is_finite() => Ok(Some(Self::epsg(&raw.to_string()))),
            Value::Text(text) => Self::resolve_str(text, expand_compound),
            _ => Ok(None),
        }
    }

    /// Resolves a text value, see [`CrsDescriptor::resolve`]
    ///
    /// Fails only when a `.wkt`/`.prj` path cannot be read.
    pub fn resolve_str(raw: &str, expand_compound: bool) -> Result<Option<Self>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        if raw.chars().all(|c| c.is_ascii_digit()) {
            return Ok(Some(Self::epsg(raw)));
        }

        if let Some(caps) = EPSG_PREFIXED.captures(raw) {
            return Ok(Some(Self::epsg(&caps[1])));
        }

        if raw.contains('+') {
            let mut components = Vec::new();
            for part in raw.split('+').map(str::trim).filter(|p| !p.is_empty()) {
                components.push(Self::resolve_component(part)?);
            }
            return Ok(match components.len() {
                0 => None,
                1 => components.pop(),
                _ if expand_compound => Some(CrsDescriptor::Compound(components)),
                _ => Some(components.swap_remove(0)),
            });
        }

        if raw.contains('=') {
            return Ok(Some(CrsDescriptor::Affine(format!("{}{}", AFFINE_PREFIX, raw))));
        }

        let lower = raw.to_lowercase();
        if lower.ends_with(".wkt") || lower.ends_with(".prj") {
            debug!("reading CRS definition from {}", raw);
            return Ok(Some(CrsDescriptor::Text(fs::read_to_string(raw)?)));
        }

        Ok(None)
    }

    /// A single component of a compound value; unrecognised parts are kept as
    /// raw text (typically a grid file name)
    fn resolve_component(part: &str) -> Result<Self> {
        Ok(Self::resolve_str(part, false)?
            .unwrap_or_else(|| CrsDescriptor::Text(part.to_string())))
    }

    fn epsg(code: &str) -> Self {
        CrsDescriptor::Epsg(format!("epsg:{}", code))
    }

    /// Returns true for multi-component descriptors
    pub fn is_compound(&self) -> bool {
        matches!(self, CrsDescriptor::Compound(parts) if parts.len() > 1)
    }

    /// Returns true for affine operation descriptors
    pub fn is_affine(&self) -> bool {
        matches!(self, CrsDescriptor::Affine(_))
    }

    /// The primary CRS: the first component of a compound, otherwise itself
    pub fn primary(&self) -> &CrsDescriptor {
        match self {
            CrsDescriptor::Compound(parts) if !parts.is_empty() => parts[0].primary(),
            _ => self,
        }
    }

    /// Components after the primary one
    pub fn extra_components(&self) -> &[CrsDescriptor] {
        match self {
            CrsDescriptor::Compound(parts) if parts.len() > 1 => &parts[1..],
            _ => &[],
        }
    }

    /// Definition text handed to PROJ for the primary CRS
    pub fn definition(&self) -> &str {
        match self.primary() {
            CrsDescriptor::Epsg(text) | CrsDescriptor::Text(text) | CrsDescriptor::Affine(text) => text,
            CrsDescriptor::Compound(_) => "",
        }
    }

    /// Best-effort EPSG code of the primary CRS
    ///
    /// WKT text yields its top-level authority code, which is the last
    /// `AUTHORITY`/`ID` entry in both WKT1 and WKT2.
    pub fn epsg_code(&self) -> Option<u32> {
        match self.primary() {
            CrsDescriptor::Epsg(text) => text.trim_start_matches("epsg:").parse().ok(),
            CrsDescriptor::Text(text) => WKT_AUTHORITY
                .captures_iter(text)
                .last()
                .and_then(|caps| caps[1].parse().ok()),
            _ => None,
        }
    }

    /// Returns true when the text looks like WKT rather than a PROJ string
    pub fn is_wkt(&self) -> bool {
        matches!(self.primary(), CrsDescriptor::Text(text) if text.contains('['))
    }
}

impl fmt::Display for CrsDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrsDescriptor::Epsg(code) => write!(f, "{}", code),
            CrsDescriptor::Affine(text) => write!(f, "{}", text),
            CrsDescriptor::Text(text) => {
                let first_line = text.lines().next().unwrap_or_default();
                if first_line.chars().count() > 60 || text.lines().count() > 1 {
                    let head: String = first_line.chars().take(57).collect();
                    write!(f, "{}...", head)
                } else {
                    write!(f, "{}", first_line)
                }
            }
            CrsDescriptor::Compound(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, "+")?;
                    }
                    write!(f, "{}", part)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;

    fn resolve(raw: &str) -> Option<CrsDescriptor> {
        CrsDescriptor::resolve_str(raw, true).unwrap()
    }

    #[test]
    fn test_numeric_values_are_epsg() {
        assert_eq!(resolve("4326"), Some(CrsDescriptor::Epsg("epsg:4326".into())));
        let number = CrsDescriptor::resolve(&Value::Number(31983.0), false).unwrap();
        assert_eq!(number, Some(CrsDescriptor::Epsg("epsg:31983".into())));
    }

    #[test]
    fn test_prefixed_epsg() {
        assert_eq!(resolve("EPSG:3857"), Some(CrsDescriptor::Epsg("epsg:3857".into())));
    }

    #[test]
    fn test_compound_expansion() {
        let expanded = resolve("4326+geoidgrid").unwrap();
        assert!(expanded.is_compound());
        assert_eq!(
            expanded,
            CrsDescriptor::Compound(vec![
                CrsDescriptor::Epsg("epsg:4326".into()),
                CrsDescriptor::Text("geoidgrid".into()),
            ])
        );
        assert_eq!(expanded.extra_components().len(), 1);
        assert_eq!(expanded.to_string(), "epsg:4326+geoidgrid");
    }

    #[test]
    fn test_compound_without_expansion_keeps_primary() {
        let primary = CrsDescriptor::resolve_str("4326+geoidgrid", false).unwrap();
        assert_eq!(primary, Some(CrsDescriptor::Epsg("epsg:4326".into())));
    }

    #[test]
    fn test_compound_affine_component() {
        let expanded = resolve("31983+xoff=10 yoff=20").unwrap();
        assert_eq!(
            expanded.extra_components(),
            &[CrsDescriptor::Affine("proj=affine xoff=10 yoff=20".into())]
        );
    }

    #[test]
    fn test_affine() {
        let affine = resolve("xoff=100 yoff=-50").unwrap();
        assert_eq!(affine, CrsDescriptor::Affine("proj=affine xoff=100 yoff=-50".into()));
        assert!(affine.is_affine());
        assert_eq!(affine.epsg_code(), None);
    }

    #[test]
    fn test_wkt_file() {
        let mut file = tempfile::Builder::new().suffix(".PRJ").tempfile().unwrap();
        write!(
            file,
            r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433],AUTHORITY["EPSG","4326"]]"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let text = resolve(&path).unwrap();
        assert!(text.is_wkt());
        assert_eq!(text.epsg_code(), Some(4326));
    }

    #[test]
    fn test_missing_wkt_file_is_error() {
        let err = CrsDescriptor::resolve_str("/nonexistent/dir/custom.wkt", true).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_unresolved_values() {
        assert_eq!(resolve("SAD69"), None);
        assert_eq!(resolve("   "), None);
        assert_eq!(resolve("utm zone 23"), None);
        assert_eq!(CrsDescriptor::resolve(&Value::Null, true).unwrap(), None);
    }

    #[test]
    fn test_resolution_is_total() {
        let inputs = ["", "+", "a+b", "=", "x.wkt.bak", "épsg", "12a", "+proj=utm +zone=23"];
        for input in inputs {
            assert!(CrsDescriptor::resolve_str(input, true).is_ok(), "{}", input);
        }
    }

    #[test]
    fn test_epsg_code() {
        let compound = resolve("32723+egm96_15.gtx").unwrap();
        assert_eq!(compound.epsg_code(), Some(32723));
        assert_eq!(compound.definition(), "epsg:32723");
    }
}
