//! Compute layer for query processing.
//!
//! This module separates computation from the on-disk formats:
//! - Spatial indexing and exact refinement (`spatial`)
//! - Coordinate reference system transforms (`transform`)
//!
//! Nothing here touches the filesystem; readers in `storage` feed it
//! envelopes and shapes, and the store composes the results.

pub mod spatial;
pub mod transform;
