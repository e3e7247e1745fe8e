//! Query options and the lazy feature stream.

use super::Snapshot;
use crate::compute::spatial::refine::intersects_envelope;
use crate::compute::spatial::rtree::{Intersecting, PackedRTree};
use crate::compute::transform::CrsTransformer;
use crate::error::StoreError;
use shapestore_types::crs::Crs;
use shapestore_types::envelope::Envelope;
use shapestore_types::feature::{FeatureRecord, RecordId};
use shapestore_types::geometry::Geometry;
use std::ops::Range;
use std::sync::Arc;

/// Parameters of a [`FeatureStore::query`](crate::FeatureStore::query).
///
/// # Examples
///
/// ```rust
/// use shapestore::QueryOptions;
/// use shapestore::Envelope;
///
/// let options = QueryOptions::within(Envelope::new(-1.0, -1.0, 11.0, 11.0)).exact(true);
/// assert!(options.include_geometries);
/// ```
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Search box; an untagged envelope is taken to be in the store CRS.
    /// `None` scans every record.
    pub envelope: Option<Envelope>,
    pub include_geometries: bool,
    /// Drop candidates whose geometry does not truly intersect the envelope
    pub exact: bool,
    /// Reproject result geometries into this CRS
    pub output_crs: Option<Crs>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            envelope: None,
            include_geometries: true,
            exact: false,
            output_crs: None,
        }
    }
}

impl QueryOptions {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn within(envelope: Envelope) -> Self {
        Self {
            envelope: Some(envelope),
            ..Self::default()
        }
    }

    pub fn include_geometries(mut self, include: bool) -> Self {
        self.include_geometries = include;
        self
    }

    pub fn exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    pub fn output_crs(mut self, crs: Crs) -> Self {
        self.output_crs = Some(crs);
        self
    }
}

enum Candidates {
    None,
    Index(Intersecting<Arc<PackedRTree>>),
    Scan(Range<RecordId>),
}

impl Iterator for Candidates {
    type Item = RecordId;

    fn next(&mut self) -> Option<RecordId> {
        match self {
            Candidates::None => None,
            Candidates::Index(iter) => iter.next(),
            Candidates::Scan(range) => range.next(),
        }
    }
}

/// Features matching a query, assembled one at a time.
///
/// The stream reads from the snapshot of readers and index captured when
/// the query started; a concurrent reload does not affect it. Dropping the
/// stream early stops all further work.
pub struct Features<P> {
    snapshot: Option<Arc<Snapshot>>,
    candidates: Candidates,
    /// Query envelope in the store CRS, used for exact refinement
    envelope: Option<Envelope>,
    include_geometries: bool,
    exact: bool,
    store_crs: Crs,
    output: Option<CrsTransformer>,
    predicate: P,
}

impl<P> Features<P>
where
    P: FnMut(&FeatureRecord) -> bool,
{
    pub(crate) fn empty(store_crs: Crs, predicate: P) -> Self {
        Self {
            snapshot: None,
            candidates: Candidates::None,
            envelope: None,
            include_geometries: false,
            exact: false,
            store_crs,
            output: None,
            predicate,
        }
    }

    pub(crate) fn new(
        snapshot: Arc<Snapshot>,
        envelope: Option<Envelope>,
        options: &QueryOptions,
        store_crs: Crs,
        predicate: P,
    ) -> Self {
        let candidates = match &envelope {
            Some(env) => Candidates::Index(snapshot.geometry.index.query_shared(&env.into())),
            None => Candidates::Scan(0..snapshot.geometry.reader.len() as RecordId),
        };
        let output = options
            .output_crs
            .as_ref()
            .filter(|target| !target.is_equivalent(&store_crs))
            .map(|target| CrsTransformer::new(store_crs.clone(), target.clone()));

        Self {
            snapshot: Some(snapshot),
            candidates,
            envelope,
            include_geometries: options.include_geometries,
            exact: options.exact,
            store_crs,
            output,
            predicate,
        }
    }

    /// Assemble record `id`, or `None` when it is filtered out.
    fn assemble(&self, snapshot: &Snapshot, id: RecordId) -> Option<FeatureRecord> {
        let reader = &snapshot.geometry.reader;

        let geometry = if self.include_geometries || self.exact {
            match reader.fetch(id) {
                Ok(g) => Some(g),
                Err(StoreError::NotFound(_)) => None,
                Err(e) => {
                    log::warn!("Skipping record {}: {}", id, e);
                    return None;
                }
            }
        } else {
            None
        };
        let has_geometry = geometry.is_some() || reader.has_geometry(id);

        if self.exact
            && let Some(env) = &self.envelope
        {
            match &geometry {
                Some(g) if intersects_envelope(g.shape(), env) => {}
                _ => return None,
            }
        }

        let attributes = snapshot
            .attributes
            .reader
            .as_ref()
            .and_then(|dbf| match dbf.fetch(id) {
                Ok(values) => Some(values),
                Err(StoreError::NotFound(_)) => None,
                Err(e) => {
                    log::warn!("No attributes for record {}: {}", id, e);
                    None
                }
            });
        if !has_geometry && attributes.is_none() {
            return None;
        }

        let geometry = match geometry {
            Some(g) if self.include_geometries => Some(self.tag(g)),
            _ => None,
        };
        Some(FeatureRecord::new(id, geometry, attributes.unwrap_or_default()))
    }

    fn tag(&self, geometry: Geometry) -> Geometry {
        match &self.output {
            Some(transformer) => match transformer.transform_geometry(&geometry) {
                Ok(g) => g,
                Err(e) => {
                    log::warn!("Returning untransformed geometry: {}", e);
                    geometry.with_crs(self.store_crs.clone())
                }
            },
            None => geometry.with_crs(self.store_crs.clone()),
        }
    }
}

impl<P> Iterator for Features<P>
where
    P: FnMut(&FeatureRecord) -> bool,
{
    type Item = FeatureRecord;

    fn next(&mut self) -> Option<FeatureRecord> {
        let snapshot = Arc::clone(self.snapshot.as_ref()?);
        loop {
            let id = self.candidates.next()?;
            if let Some(record) = self.assemble(&snapshot, id)
                && (self.predicate)(&record)
            {
                return Some(record);
            }
        }
    }
}
