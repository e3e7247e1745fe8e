//! File formats and companion-file resolution.
//!
//! A store is a set of files sharing a base name:
//!
//! | Extension | Content                     | Required |
//! |-----------|-----------------------------|----------|
//! | `.shp`    | geometry records            | yes      |
//! | `.dbf`    | attribute table             | no       |
//! | `.prj`    | CRS hint (code or WKT)      | no       |
//! | `.cpg`    | attribute text encoding     | no       |
//! | `.rti`    | spatial index cache         | no       |
//!
//! Extensions are matched case-insensitively.

pub mod cpg;
pub mod dbf;
pub mod index_cache;
pub mod prj;
pub mod shp;

pub use dbf::{DbfReader, TextEncoding};
pub use index_cache::IndexCache;
pub use shp::{ShapeReader, ShapeType};

use crate::error::{Result, StoreError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const GEOMETRY_EXT: &str = "shp";
pub const ATTRIBUTES_EXT: &str = "dbf";
pub const CRS_HINT_EXT: &str = "prj";
pub const ENCODING_HINT_EXT: &str = "cpg";
pub const INDEX_EXT: &str = "rti";

/// Strip a trailing `.shp` (any case) so either form names the same store.
pub fn base_path(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case(GEOMETRY_EXT) => path.with_extension(""),
        _ => path.to_path_buf(),
    }
}

fn with_suffix(base: &Path, ext: &str) -> PathBuf {
    let mut name: OsString = base.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Path of the `ext` companion of `base`.
///
/// Tries the lower- and upper-case spellings, then any casing present in
/// the directory. When nothing exists the lower-case path is returned.
pub fn companion(base: &Path, ext: &str) -> PathBuf {
    let lower = with_suffix(base, &ext.to_ascii_lowercase());
    if lower.exists() {
        return lower;
    }
    let upper = with_suffix(base, &ext.to_ascii_uppercase());
    if upper.exists() {
        return upper;
    }

    if let (Some(dir), Some(stem)) = (base.parent(), base.file_name()) {
        let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
        let wanted = with_suffix(Path::new(stem), ext).to_string_lossy().to_lowercase();
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                if entry.file_name().to_string_lossy().to_lowercase() == wanted {
                    return entry.path();
                }
            }
        }
    }
    lower
}

/// Modification time of `path`.
pub fn modified(path: &Path) -> Result<SystemTime> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| StoreError::io_at(path, e))
}
