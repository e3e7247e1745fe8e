//! Packed R-tree built in one pass with Sort-Tile-Recursive (STR) loading.
//!
//! The tree is static: it is bulk loaded from the complete set of record
//! envelopes and rebuilt wholesale when the source changes. Entries sit in a
//! flat array in STR order; each level above groups at most `fanout`
//! consecutive members of the level below, so the children of any node are
//! contiguous and the whole tree serializes as a handful of flat arrays.
//!
//! ## Query semantics
//!
//! An entry is returned iff its envelope intersects the query envelope,
//! boundaries included. The tree filters on envelopes only; exact geometry
//! tests are the caller's business. Each matching record id is yielded
//! exactly once, in traversal order.
//!
//! ## Example
//!
//! ```rust
//! use shapestore::compute::spatial::rtree::{Bounds, IndexEntry, PackedRTree};
//!
//! let entries = (0..100u32).map(|i| {
//!     let x = i as f64;
//!     IndexEntry::new(i, Bounds::new(x, x, x + 0.5, x + 0.5))
//! });
//! let tree = PackedRTree::build(entries, 8);
//!
//! let mut hits: Vec<u32> = tree.query(&Bounds::new(10.0, 10.0, 12.0, 12.0)).collect();
//! hits.sort();
//! assert_eq!(hits, vec![10, 11, 12]);
//! ```

use crate::error::{FileKind, Result, StoreError};
use bincode::Options;
use serde::{Deserialize, Serialize};
use shapestore_types::envelope::Envelope;
use shapestore_types::feature::RecordId;
use std::borrow::Borrow;
use std::io::{Read, Write};
use std::sync::Arc;

const INDEX_MAGIC: &[u8] = b"SHAPESTORE_RTI";
const INDEX_VERSION: u8 = 1;

/// Default number of children per node.
pub const DEFAULT_FANOUT: usize = 16;

/// A plain bounding rectangle used inside the index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Normalize the corners. A NaN ordinate is kept, so the result
    /// reports itself as non-finite.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let (min_x, max_x) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let (min_y, max_y) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_envelope(env: &Envelope) -> Self {
        Self::new(env.min_x(), env.min_y(), env.max_x(), env.max_y())
    }

    pub fn to_envelope(&self) -> Envelope {
        Envelope::new(self.min_x, self.min_y, self.max_x, self.max_y)
    }

    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
    }

    #[inline]
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    pub fn contains(&self, other: &Bounds) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    fn center_x(&self) -> f64 {
        (self.min_x + self.max_x) / 2.0
    }

    fn center_y(&self) -> f64 {
        (self.min_y + self.max_y) / 2.0
    }
}

impl From<&Envelope> for Bounds {
    fn from(env: &Envelope) -> Self {
        Bounds::from_envelope(env)
    }
}

/// The unit bulk-loaded into the index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub record_id: RecordId,
    pub bounds: Bounds,
}

impl IndexEntry {
    pub fn new(record_id: RecordId, bounds: Bounds) -> Self {
        Self { record_id, bounds }
    }
}

/// Internal node: union bounds plus the contiguous child range
/// `[first, first + count)` in the level below.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Node {
    bounds: Bounds,
    first: u32,
    count: u32,
}

/// Shape of a built tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexStats {
    pub entries: usize,
    /// Levels including the entry level; 0 for an empty index
    pub height: usize,
    pub nodes: usize,
    pub fanout: usize,
}

/// A static, bulk-loaded R-tree over record envelopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackedRTree {
    fanout: u32,
    entries: Vec<IndexEntry>,
    /// `levels[0]` groups `entries`; the last level holds the single root.
    levels: Vec<Vec<Node>>,
}

/// Reorder `items` in STR order for leaves of `fanout` members: sort by
/// center x, cut into vertical slices of `ceil(sqrt(P)) * fanout` items,
/// sort each slice by center y.
fn str_sort<T, F>(items: &mut [T], fanout: usize, bounds_of: F)
where
    F: Fn(&T) -> Bounds,
{
    let n = items.len();
    if n <= fanout {
        return;
    }
    let leaf_count = n.div_ceil(fanout);
    let slice_count = (leaf_count as f64).sqrt().ceil() as usize;
    let slice_len = slice_count * fanout;

    items.sort_by(|a, b| bounds_of(a).center_x().total_cmp(&bounds_of(b).center_x()));
    for slice in items.chunks_mut(slice_len) {
        slice.sort_by(|a, b| bounds_of(a).center_y().total_cmp(&bounds_of(b).center_y()));
    }
}

/// Group consecutive members into parent nodes of at most `fanout` children.
fn pack_level<T, F>(items: &[T], fanout: usize, bounds_of: F) -> Vec<Node>
where
    F: Fn(&T) -> Bounds,
{
    items
        .chunks(fanout)
        .enumerate()
        .map(|(i, chunk)| {
            let bounds = chunk
                .iter()
                .map(&bounds_of)
                .reduce(|a, b| a.union(&b))
                .unwrap_or(Bounds::new(0.0, 0.0, 0.0, 0.0));
            Node {
                bounds,
                first: (i * fanout) as u32,
                count: chunk.len() as u32,
            }
        })
        .collect()
}

impl PackedRTree {
    /// Bulk load a tree from `(record id, envelope)` entries.
    ///
    /// Entries with non-finite bounds are dropped. `fanout` is clamped to at
    /// least 2. Zero entries yield an index whose queries are always empty.
    pub fn build<I>(entries: I, fanout: usize) -> Self
    where
        I: IntoIterator<Item = IndexEntry>,
    {
        let fanout = fanout.max(2);
        let mut entries: Vec<IndexEntry> = entries
            .into_iter()
            .filter(|e| e.bounds.is_finite())
            .collect();

        let mut levels = Vec::new();
        if !entries.is_empty() {
            str_sort(&mut entries, fanout, |e| e.bounds);
            let mut level = pack_level(&entries, fanout, |e| e.bounds);
            while level.len() > 1 {
                str_sort(&mut level, fanout, |n| n.bounds);
                let parent = pack_level(&level, fanout, |n| n.bounds);
                levels.push(level);
                level = parent;
            }
            levels.push(level);
        }

        Self {
            fanout: fanout as u32,
            entries,
            levels,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fanout(&self) -> usize {
        self.fanout as usize
    }

    /// Union of all entry envelopes, `None` when empty.
    pub fn root_bounds(&self) -> Option<Bounds> {
        self.levels.last().and_then(|root| root.first()).map(|n| n.bounds)
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            entries: self.entries.len(),
            height: if self.entries.is_empty() {
                0
            } else {
                self.levels.len() + 1
            },
            nodes: self.levels.iter().map(Vec::len).sum(),
            fanout: self.fanout as usize,
        }
    }

    /// Record ids whose envelope intersects `query`, produced lazily.
    pub fn query(&self, query: &Bounds) -> Intersecting<&PackedRTree> {
        Intersecting::new(self, *query)
    }

    /// Like [`PackedRTree::query`], but the iterator keeps the tree alive on
    /// its own so it can outlive the caller's borrow.
    pub fn query_shared(self: &Arc<Self>, query: &Bounds) -> Intersecting<Arc<PackedRTree>> {
        Intersecting::new(Arc::clone(self), *query)
    }

    /// Write the tree in the private index format: a magic tag, a version
    /// byte, then the bincode-encoded tree.
    pub fn serialize<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(INDEX_MAGIC)?;
        writer.write_all(&[INDEX_VERSION])?;
        bincode::DefaultOptions::new()
            .serialize_into(&mut writer, self)
            .map_err(|e| StoreError::format(FileKind::Index, e.to_string()))?;
        writer.flush()?;
        Ok(())
    }

    /// Read a tree written by [`PackedRTree::serialize`].
    ///
    /// The decoded structure is validated: every child range must lie in
    /// bounds, every entry must be reachable exactly once and node bounds
    /// must cover their children.
    pub fn deserialize<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        let header_len = INDEX_MAGIC.len() + 1;
        if data.len() < header_len || &data[..INDEX_MAGIC.len()] != INDEX_MAGIC {
            return Err(StoreError::format(FileKind::Index, "missing index magic"));
        }
        let version = data[INDEX_MAGIC.len()];
        if version != INDEX_VERSION {
            return Err(StoreError::format(
                FileKind::Index,
                format!("unsupported index version {version}"),
            ));
        }

        let body = &data[header_len..];
        let tree: PackedRTree = bincode::DefaultOptions::new()
            .with_limit(body.len() as u64)
            .deserialize(body)
            .map_err(|e| StoreError::format(FileKind::Index, e.to_string()))?;
        tree.validate()?;
        Ok(tree)
    }

    fn validate(&self) -> Result<()> {
        let corrupt = |reason: String| Err(StoreError::format(FileKind::Index, reason));

        if self.fanout < 2 {
            return corrupt(format!("fanout {} is below 2", self.fanout));
        }
        if self.levels.is_empty() {
            if self.entries.is_empty() {
                return Ok(());
            }
            return corrupt("entries present without nodes".to_string());
        }
        if self.levels.last().map(Vec::len) != Some(1) {
            return corrupt("top level must hold exactly one root".to_string());
        }

        for (depth, level) in self.levels.iter().enumerate() {
            let below: Vec<Bounds> = if depth == 0 {
                self.entries.iter().map(|e| e.bounds).collect()
            } else {
                self.levels[depth - 1].iter().map(|n| n.bounds).collect()
            };

            let mut ranges: Vec<(usize, usize)> = Vec::with_capacity(level.len());
            for node in level {
                let first = node.first as usize;
                let end = first + node.count as usize;
                if node.count == 0 || node.count > self.fanout || end > below.len() {
                    return corrupt(format!("bad child range {first}..{end} at level {depth}"));
                }
                if !node.bounds.is_finite() {
                    return corrupt(format!("non-finite node bounds at level {depth}"));
                }
                if below[first..end].iter().any(|b| !node.bounds.contains(b)) {
                    return corrupt(format!("node at level {depth} does not cover its children"));
                }
                ranges.push((first, end));
            }

            // Child ranges must tile the level below exactly once.
            ranges.sort_unstable();
            let mut expected = 0;
            for (first, end) in ranges {
                if first != expected {
                    return corrupt(format!("children at level {depth} overlap or leave gaps"));
                }
                expected = end;
            }
            if expected != below.len() {
                return corrupt(format!("level {depth} leaves children unreferenced"));
            }
        }
        Ok(())
    }
}

/// Lazy depth-first traversal yielding ids of intersecting entries.
pub struct Intersecting<T: Borrow<PackedRTree>> {
    tree: T,
    query: Bounds,
    /// Nodes still to visit, as `(level, index)`
    stack: Vec<(usize, usize)>,
    /// Entry range of the leaf node being scanned
    leaf: Option<(usize, usize)>,
}

impl<T: Borrow<PackedRTree>> Intersecting<T> {
    fn new(tree: T, query: Bounds) -> Self {
        let mut stack = Vec::new();
        let levels = tree.borrow().levels.len();
        if levels > 0 && query.is_finite() {
            stack.push((levels - 1, 0));
        } else if levels > 0 {
            log::warn!("Rejecting index query with non-finite coordinates");
        }
        Self {
            tree,
            query,
            stack,
            leaf: None,
        }
    }
}

impl<T: Borrow<PackedRTree>> Iterator for Intersecting<T> {
    type Item = RecordId;

    fn next(&mut self) -> Option<RecordId> {
        let tree: &PackedRTree = self.tree.borrow();
        loop {
            if let Some((pos, end)) = self.leaf.as_mut() {
                while *pos < *end {
                    let entry = &tree.entries[*pos];
                    *pos += 1;
                    if entry.bounds.intersects(&self.query) {
                        return Some(entry.record_id);
                    }
                }
                self.leaf = None;
            }

            let (level, index) = self.stack.pop()?;
            let node = tree.levels[level][index];
            if !node.bounds.intersects(&self.query) {
                continue;
            }
            let first = node.first as usize;
            let end = first + node.count as usize;
            if level == 0 {
                self.leaf = Some((first, end));
            } else {
                self.stack.extend((first..end).rev().map(|child| (level - 1, child)));
            }
        }
    }
}
