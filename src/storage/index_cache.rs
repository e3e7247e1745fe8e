//! On-disk cache of the spatial index (`.rti`).
//!
//! The cache is valid while its modification time is not older than the
//! geometry file's. Anything wrong with it (stale, unreadable, corrupt,
//! built with another fanout) triggers a rebuild and a rewrite; cache
//! problems are logged and never fail an open.

use super::shp::ShapeReader;
use crate::compute::spatial::rtree::PackedRTree;
use crate::error::{Result, StoreError};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

#[derive(Debug, Clone)]
pub struct IndexCache {
    path: PathBuf,
}

impl IndexCache {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// The cached tree, if it is at least as new as `source_modified` and
    /// decodes cleanly.
    pub fn load_if_fresh(&self, source_modified: SystemTime) -> Option<PackedRTree> {
        let modified = match std::fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Cannot stat index cache {}: {}", self.path.display(), e);
                }
                return None;
            }
        };
        if modified < source_modified {
            log::debug!("Index cache {} is stale", self.path.display());
            return None;
        }

        let loaded = File::open(&self.path)
            .map_err(|e| StoreError::io_at(&self.path, e))
            .and_then(|file| PackedRTree::deserialize(BufReader::new(file)));
        match loaded {
            Ok(tree) => Some(tree),
            Err(e) => {
                log::warn!("Discarding index cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Write `tree` to a temporary file and move it over the cache.
    pub fn save(&self, tree: &PackedRTree) -> Result<()> {
        let temp_path = self.temp_path();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| StoreError::io_at(&temp_path, e))?;

        let mut writer = BufWriter::new(file);
        tree.serialize(&mut writer)?;
        let file = writer
            .into_inner()
            .map_err(|e| StoreError::io_at(&temp_path, e.into_error()))?;
        file.sync_all()?;

        std::fs::rename(&temp_path, &self.path).map_err(|e| StoreError::io_at(&self.path, e))?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

/// Index for `reader`: the cached tree when it is fresh and matches, a
/// freshly built one otherwise.
pub fn load_or_build(
    reader: &ShapeReader,
    source_modified: SystemTime,
    cache: Option<&IndexCache>,
    fanout: usize,
) -> PackedRTree {
    if let Some(tree) = cache.and_then(|c| c.load_if_fresh(source_modified)) {
        if tree.fanout() == fanout && tree.len() <= reader.len() {
            log::debug!("Reusing cached index with {} entries", tree.len());
            return tree;
        }
        log::debug!("Cached index does not match the geometry file, rebuilding");
    }
    rebuild(reader, cache, fanout)
}

/// Build the index from the stored record envelopes and write it to `cache`.
pub fn rebuild(reader: &ShapeReader, cache: Option<&IndexCache>, fanout: usize) -> PackedRTree {
    let started = Instant::now();
    let tree = PackedRTree::build(reader.read_envelopes(), fanout);
    log::debug!(
        "Built index over {} records in {:?} (height {})",
        tree.len(),
        started.elapsed(),
        tree.stats().height
    );

    if let Some(cache) = cache {
        match cache.save(&tree) {
            Ok(()) => log::debug!("Wrote index cache {}", cache.path().display()),
            Err(e) => log::warn!("Could not write index cache {}: {}", cache.path().display(), e),
        }
    }
    tree
}
