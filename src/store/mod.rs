//! The feature store coordinator.
//!
//! A [`FeatureStore`] owns the geometry reader, the attribute reader and the
//! spatial index of one set of companion files. Every query first checks
//! the files' modification times and reopens whatever changed, then runs
//! against an immutable snapshot of `{geometry, index, attributes}`.
//!
//! Reopening the geometry file and reopening the attribute file are
//! independent critical sections. A reopen builds the replacement off to the
//! side and publishes it with one pointer swap, so queries see either the
//! old or the new state and in-flight queries finish on the old one.

mod features;
mod slot;

pub use features::{Features, QueryOptions};

use crate::compute::spatial::rtree::{IndexStats, PackedRTree};
use crate::compute::transform::CrsTransformer;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::storage::{
    self, ATTRIBUTES_EXT, CRS_HINT_EXT, DbfReader, ENCODING_HINT_EXT, GEOMETRY_EXT, INDEX_EXT,
    IndexCache, ShapeReader, TextEncoding, cpg, index_cache, prj,
};
use parking_lot::RwLock;
use shapestore_types::crs::Crs;
use shapestore_types::envelope::Envelope;
use shapestore_types::feature::{FeatureRecord, FeatureTypeDescriptor};
use slot::FileWatch;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

pub(crate) struct GeometrySource {
    pub(crate) reader: ShapeReader,
    pub(crate) index: Arc<PackedRTree>,
}

pub(crate) struct AttributeSource {
    pub(crate) reader: Option<DbfReader>,
    pub(crate) descriptor: Arc<FeatureTypeDescriptor>,
}

impl AttributeSource {
    fn geometry_only(name: &str) -> Self {
        Self {
            reader: None,
            descriptor: Arc::new(FeatureTypeDescriptor::geometry_only(name)),
        }
    }
}

/// A mutually consistent view of the store's sources.
pub(crate) struct Snapshot {
    pub(crate) geometry: Arc<GeometrySource>,
    pub(crate) attributes: Arc<AttributeSource>,
}

fn load_geometry(
    path: &Path,
    modified: SystemTime,
    cache: Option<&IndexCache>,
    fanout: usize,
    force_rebuild: bool,
) -> Result<GeometrySource> {
    let reader = ShapeReader::open(path)?;
    let index = if force_rebuild {
        index_cache::rebuild(&reader, cache, fanout)
    } else {
        index_cache::load_or_build(&reader, modified, cache, fanout)
    };
    Ok(GeometrySource {
        reader,
        index: Arc::new(index),
    })
}

/// Open the attribute table. A missing or malformed table degrades to a
/// geometry-only feature type; other I/O failures are returned.
fn load_attributes(path: &Path, encoding: TextEncoding, name: &str) -> Result<AttributeSource> {
    match DbfReader::open(path, encoding) {
        Ok(reader) => Ok(AttributeSource {
            descriptor: Arc::new(reader.descriptor(name)),
            reader: Some(reader),
        }),
        Err(e) if e.is_missing_file() => {
            log::warn!(
                "No attribute file {} (no attributes will be available)",
                path.display()
            );
            Ok(AttributeSource::geometry_only(name))
        }
        Err(e) if e.is_io() => Err(e),
        Err(e) => {
            log::warn!("Ignoring attribute file {}: {}", path.display(), e);
            Ok(AttributeSource::geometry_only(name))
        }
    }
}

fn resolve_crs(base: &Path, config: &StoreConfig) -> Result<Crs> {
    let path = storage::companion(base, CRS_HINT_EXT);
    let hinted = match prj::read_crs_hint(&path) {
        Ok(crs) => crs,
        Err(e) if e.is_missing_file() => None,
        Err(e) => {
            log::warn!("Could not read CRS hint {}: {}", path.display(), e);
            None
        }
    };
    match hinted {
        Some(crs) => Ok(config.apply_height(crs)),
        None => {
            let crs = config.fallback_crs()?;
            log::debug!("Assuming {} for {}", crs, base.display());
            Ok(crs)
        }
    }
}

fn resolve_encoding(base: &Path) -> TextEncoding {
    let path = storage::companion(base, ENCODING_HINT_EXT);
    match cpg::read_encoding_hint(&path) {
        Ok(Some(encoding)) => encoding,
        Ok(None) => TextEncoding::default(),
        Err(e) => {
            if !e.is_missing_file() {
                log::warn!("Could not read encoding hint {}: {}", path.display(), e);
            }
            TextEncoding::default()
        }
    }
}

/// A spatial feature store over one geometry file and its companions.
///
/// # Examples
///
/// ```rust,no_run
/// use shapestore::{FeatureStore, QueryOptions};
/// use shapestore::Envelope;
///
/// let store = FeatureStore::open("data/cities")?;
/// let options = QueryOptions::within(Envelope::new(5.8, 47.2, 15.1, 55.1));
/// for feature in store.query(options, |f| f.get("pop").and_then(|v| v.as_i64()) > Some(100_000)) {
///     println!("{} {:?}", feature.feature_id(), feature.get("name"));
/// }
/// # Ok::<(), shapestore::StoreError>(())
/// ```
pub struct FeatureStore {
    name: String,
    base: PathBuf,
    crs: Crs,
    encoding: TextEncoding,
    config: StoreConfig,
    cache: Option<IndexCache>,
    current: RwLock<Option<Arc<Snapshot>>>,
    geometry_watch: FileWatch,
    attributes_watch: FileWatch,
    closed: AtomicBool,
}

impl FeatureStore {
    /// Open the store at `base` (with or without the `.shp` suffix) using
    /// the default configuration.
    pub fn open<P: AsRef<Path>>(base: P) -> Result<Self> {
        Self::open_with(base, None, StoreConfig::default())
    }

    /// Open with an optional CRS override and explicit configuration.
    ///
    /// Fails only when the configuration is invalid or the geometry file
    /// cannot be read or parsed; every other companion is optional.
    pub fn open_with<P: AsRef<Path>>(base: P, crs: Option<Crs>, config: StoreConfig) -> Result<Self> {
        config.check()?;
        let base = storage::base_path(base.as_ref());
        let name = base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let crs = match crs {
            Some(crs) => config.apply_height(crs),
            None => resolve_crs(&base, &config)?,
        };
        let encoding = config.encoding.unwrap_or_else(|| resolve_encoding(&base));
        let cache = config
            .index_cache
            .then(|| IndexCache::new(storage::companion(&base, INDEX_EXT)));

        let shp_path = storage::companion(&base, GEOMETRY_EXT);
        let shp_modified = storage::modified(&shp_path)?;
        let geometry = load_geometry(
            &shp_path,
            shp_modified,
            cache.as_ref(),
            config.index_fanout,
            false,
        )?;

        let dbf_path = storage::companion(&base, ATTRIBUTES_EXT);
        let dbf_modified = storage::modified(&dbf_path).ok();
        let attributes = load_attributes(&dbf_path, encoding, &name).unwrap_or_else(|e| {
            log::warn!(
                "Attribute file {} was not loaded (no attributes will be available): {}",
                dbf_path.display(),
                e
            );
            AttributeSource::geometry_only(&name)
        });
        if let Some(dbf) = &attributes.reader
            && dbf.len() != geometry.reader.len()
        {
            log::warn!(
                "{} has {} geometry records but {} attribute rows",
                name,
                geometry.reader.len(),
                dbf.len()
            );
        }

        log::debug!(
            "Opened store {} ({} records, {}, {} attribute fields)",
            name,
            geometry.reader.len(),
            crs,
            attributes.descriptor.fields().len()
        );

        let attributes_watch = FileWatch::companion(&base, ATTRIBUTES_EXT, dbf_modified);
        Ok(Self {
            name,
            base,
            crs,
            encoding,
            config,
            cache,
            current: RwLock::new(Some(Arc::new(Snapshot {
                geometry: Arc::new(geometry),
                attributes: Arc::new(attributes),
            }))),
            geometry_watch: FileWatch::new(shp_path, Some(shp_modified)),
            attributes_watch,
            closed: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    /// The CRS stored coordinates are expressed in.
    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Whether the last checks found every present source readable.
    pub fn is_available(&self) -> bool {
        !self.is_closed() && !self.geometry_watch.is_failed() && !self.attributes_watch.is_failed()
    }

    fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.current.read().clone()
    }

    fn publish<F>(&self, update: F)
    where
        F: FnOnce(&Snapshot) -> Snapshot,
    {
        let mut current = self.current.write();
        if let Some(snapshot) = current.as_ref() {
            let next = Arc::new(update(snapshot));
            *current = Some(next);
        }
    }

    /// Reopen whichever source file changed since it was last seen.
    ///
    /// Failures are logged and leave the store unavailable until the file
    /// changes again; they are never returned. Returns availability.
    pub fn check_for_update(&self) -> bool {
        if self.is_closed() {
            return false;
        }

        self.geometry_watch.refresh(|path, modified| {
            let modified = modified.ok_or_else(|| {
                StoreError::io_at(path, std::io::ErrorKind::NotFound.into())
            })?;
            log::debug!("Re-opening the geometry file {}", path.display());
            let source = load_geometry(
                path,
                modified,
                self.cache.as_ref(),
                self.config.index_fanout,
                true,
            )?;
            self.publish(|s| Snapshot {
                geometry: Arc::new(source),
                attributes: Arc::clone(&s.attributes),
            });
            Ok(())
        });

        self.attributes_watch.refresh(|path, _| {
            log::debug!("Re-opening the attribute file {}", path.display());
            let source = load_attributes(path, self.encoding, &self.name)?;
            self.publish(|s| Snapshot {
                geometry: Arc::clone(&s.geometry),
                attributes: Arc::new(source),
            });
            Ok(())
        });

        self.is_available()
    }

    /// Features matching `options` and accepted by `predicate`.
    ///
    /// An envelope tagged with another CRS is transformed into the store
    /// CRS first; if that fails the envelope is used as given. When the
    /// store is unavailable or closed the stream is empty.
    pub fn query<P>(&self, options: QueryOptions, predicate: P) -> Features<P>
    where
        P: FnMut(&FeatureRecord) -> bool,
    {
        if !self.check_for_update() {
            log::debug!("Store {} is unavailable, returning no features", self.name);
            return Features::empty(self.crs.clone(), predicate);
        }
        let Some(snapshot) = self.snapshot() else {
            return Features::empty(self.crs.clone(), predicate);
        };
        let envelope = options.envelope.as_ref().map(|env| self.to_store_crs(env));
        Features::new(snapshot, envelope, &options, self.crs.clone(), predicate)
    }

    fn to_store_crs(&self, envelope: &Envelope) -> Envelope {
        match envelope.crs() {
            Some(source) if !source.is_equivalent(&self.crs) => {
                let transformer = CrsTransformer::new(source.clone(), self.crs.clone());
                match transformer.transform_envelope(envelope) {
                    Ok(env) => env,
                    Err(e) => {
                        log::warn!("Using untransformed query envelope {}: {}", envelope, e);
                        envelope.clone()
                    }
                }
            }
            _ => envelope.clone(),
        }
    }

    /// The declared extent of the geometry file, `None` when unavailable.
    pub fn envelope(&self) -> Option<Envelope> {
        if !self.check_for_update() {
            return None;
        }
        self.snapshot()
            .map(|s| s.geometry.reader.global_envelope().with_crs(self.crs.clone()))
    }

    /// Attribute fields plus the geometry field.
    pub fn feature_type(&self) -> Arc<FeatureTypeDescriptor> {
        match self.snapshot() {
            Some(s) => Arc::clone(&s.attributes.descriptor),
            None => Arc::new(FeatureTypeDescriptor::geometry_only(&self.name)),
        }
    }

    /// Number of geometry records, null records included.
    pub fn len(&self) -> usize {
        self.snapshot().map_or(0, |s| s.geometry.reader.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index_stats(&self) -> Option<IndexStats> {
        self.snapshot().map(|s| s.geometry.index.stats())
    }

    /// Release both readers and the index. Streams already handed out keep
    /// their snapshot until dropped. Calling `close` again does nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.current.write().take();
        log::debug!("Closed store {}", self.name);
    }
}

impl std::fmt::Debug for FeatureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureStore")
            .field("name", &self.name)
            .field("base", &self.base)
            .field("crs", &self.crs.id())
            .field("available", &self.is_available())
            .finish()
    }
}
