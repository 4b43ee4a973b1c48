use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::Result;
use crate::projection::descriptor::CrsDescriptor;

/// Legacy (WKT1) definition of a descriptor's primary CRS, if one is known
///
/// EPSG codes are looked up in the bundled definition table; WKT read from a
/// `.wkt`/`.prj` file is returned as-is.
pub fn legacy_wkt(descriptor: &CrsDescriptor) -> Option<String> {
    let primary = descriptor.primary();
    if primary.is_wkt() {
        return Some(primary.definition().to_string());
    }

    match primary {
        CrsDescriptor::Epsg(_) => primary
            .epsg_code()
            .and_then(|code| u16::try_from(code).ok())
            .and_then(crs_definitions::from_code)
            .map(|def| def.wkt.to_string()),
        _ => None,
    }
}

/// Path of the `.prj` file that accompanies `output`
pub fn sidecar_path(output: &Path) -> PathBuf {
    output.with_extension("prj")
}

/// Writes the `.prj` sidecar for `output`
///
/// Returns the written path, or `None` when the descriptor has no legacy WKT
/// form.
pub fn write_sidecar(output: &Path, descriptor: &CrsDescriptor) -> Result<Option<PathBuf>> {
    let Some(wkt) = legacy_wkt(descriptor) else {
        warn!("no WKT definition known for {}, skipping .prj sidecar", descriptor);
        return Ok(None);
    };

    let path = sidecar_path(output);
    fs::write(&path, wkt)?;
    info!("wrote projection sidecar {}", path.display());
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_path() {
        assert_eq!(sidecar_path(Path::new("out/points.csv")), PathBuf::from("out/points.prj"));
        assert_eq!(sidecar_path(Path::new("points")), PathBuf::from("points.prj"));
    }

    #[test]
    fn test_epsg_legacy_wkt() {
        let wkt = legacy_wkt(&CrsDescriptor::Epsg("epsg:4326".into())).unwrap();
        assert!(wkt.starts_with("GEOGCS"), "{}", wkt);
    }

    #[test]
    fn test_affine_has_no_wkt() {
        assert!(legacy_wkt(&CrsDescriptor::Affine("proj=affine xoff=1".into())).is_none());
    }

    #[test]
    fn test_write_sidecar_from_wkt_text() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("result.csv");
        let descriptor = CrsDescriptor::Text("PROJCS[\"custom\"]".into());

        let written = write_sidecar(&output, &descriptor).unwrap().unwrap();
        assert_eq!(written, dir.path().join("result.prj"));
        assert_eq!(fs::read_to_string(written).unwrap(), "PROJCS[\"custom\"]");
    }

    #[test]
    fn test_write_sidecar_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("result.csv");
        let descriptor = CrsDescriptor::Affine("proj=affine xoff=1".into());
        assert!(write_sidecar(&output, &descriptor).unwrap().is_none());
        assert!(!dir.path().join("result.prj").exists());
    }
}
