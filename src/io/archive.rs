//! Custom CRS definition archives
//!
//! A zip archive may carry `.wkt`/`.prj` files for CRS that are not in the
//! PROJ database. Entries whose names equal a requested descriptor are
//! extracted before descriptors are resolved.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::Result;

/// Extracts the entries named in `names` from `archive` into `dest`
///
/// Names that are blank, absent from the archive, or unsafe as paths are
/// skipped. Returns the written files.
pub fn extract_definitions<S: AsRef<str>>(
    archive: &Path,
    names: &[S],
    dest: &Path,
) -> Result<Vec<PathBuf>> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    let mut written = Vec::new();

    for name in names.iter().map(|n| n.as_ref().trim()) {
        if name.is_empty() {
            continue;
        }

        let mut entry = match zip.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                debug!("{} not found in {}", name, archive.display());
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            debug!("skipping unsafe archive entry {}", name);
            continue;
        };
        if entry.is_dir() {
            continue;
        }

        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        info!("extracted {} from {}", name, archive.display());
        written.push(target);
    }

    Ok(written)
}
