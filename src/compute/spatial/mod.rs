//! Envelope indexing and exact geometric refinement.

pub mod refine;
pub mod rtree;

pub use refine::intersects_envelope;
pub use rtree::{Bounds, IndexEntry, IndexStats, PackedRTree};
